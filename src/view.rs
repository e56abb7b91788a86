// View handles and the host-side view registry seam.
use std::fmt;

use crate::error::Result;

/// Opaque, non-owning handle to a host view.
///
/// The host owns the view; the core only keeps ids and drops them when the
/// view unmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub i64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role classification supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRole {
    Toplevel,
    Overlay,
    Other,
}

/// Stacking layer, ordered bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewLayer {
    Background,
    Bottom,
    Workspace,
    Floating,
    Top,
    Overlay,
    Lock,
}

impl ViewLayer {
    pub fn is_above_workspace(self) -> bool {
        self > ViewLayer::Workspace
    }
}

/// Snapshot of one view as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    pub id: ViewId,
    pub role: ViewRole,
    pub layer: ViewLayer,
    pub app_id: Option<String>,
    pub title: Option<String>,
}

impl ViewInfo {
    pub fn new(id: i64, role: ViewRole, layer: ViewLayer) -> Self {
        Self {
            id: ViewId(id),
            role,
            layer,
            app_id: None,
            title: None,
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// An ordinary application view sitting in the workspace layer.
    pub fn is_workspace_toplevel(&self) -> bool {
        self.role == ViewRole::Toplevel && self.layer == ViewLayer::Workspace
    }

    /// Overlay role above the workspace, before any predicate is applied.
    pub fn is_overlay_candidate(&self) -> bool {
        self.role == ViewRole::Overlay && self.layer.is_above_workspace()
    }
}

/// Read access to the host's views plus the focus operations the core drives.
pub trait ViewSource {
    /// All views in the host's natural enumeration order.
    fn views(&mut self) -> Result<Vec<ViewInfo>>;

    /// The view currently holding keyboard focus, if any.
    fn active_view(&mut self) -> Result<Option<ViewInfo>>;

    fn focus_view(&mut self, view: ViewId) -> Result<()>;

    /// Re-run the host's own keyboard focus resolution.
    fn refocus(&mut self) -> Result<()>;
}
