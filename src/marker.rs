// Keyboard-refocus suppression marker and its attach/detach helpers.
use log::debug;

use crate::error::Result;
use crate::view::ViewId;

/// Name the marker is attached under on each view.
pub const SUPPRESSION_MARKER: &str = "panel_focus_suppressor";

/// Opaque per-view attachment that takes a view out of the pool the host
/// picks from when it resolves keyboard focus on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuppressionMarker {
    view: ViewId,
    name: &'static str,
    serial: u64,
}

impl SuppressionMarker {
    pub fn new(view: ViewId, name: &'static str, serial: u64) -> Self {
        Self { view, name, serial }
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Distinguishes separate attachments on the same view.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Answer given to the host's automatic keyboard refocus: never a target.
    pub fn keyboard_refocus(&self) -> Option<ViewId> {
        None
    }
}

/// Per-view named attachment point provided by the host.
pub trait MarkerHost {
    fn attach_marker(&mut self, view: ViewId, marker: SuppressionMarker) -> Result<()>;

    /// Detaching a marker that is not there must be a no-op.
    fn detach_marker(&mut self, view: ViewId, name: &str) -> Result<()>;

    fn marker(&mut self, view: ViewId, name: &str) -> Result<Option<SuppressionMarker>>;

    /// Every marker attached under `name`, whichever view carries it.
    fn markers(&mut self, name: &str) -> Result<Vec<SuppressionMarker>>;

    fn detach_markers(&mut self, markers: &[SuppressionMarker]) -> Result<()> {
        for marker in markers {
            self.detach_marker(marker.view(), marker.name())?;
        }
        Ok(())
    }
}

/// Attaches and detaches [`SuppressionMarker`]s; never touches focus state.
#[derive(Debug, Clone)]
pub struct MarkerManager {
    name: &'static str,
    next_serial: u64,
}

impl Default for MarkerManager {
    fn default() -> Self {
        Self::new(SUPPRESSION_MARKER)
    }
}

impl MarkerManager {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_serial: 1,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn has_marker<H: MarkerHost>(&self, host: &mut H, view: ViewId) -> Result<bool> {
        Ok(host.marker(view, self.name)?.is_some())
    }

    /// Return the marker already on `view`, or attach a fresh one.
    pub fn ensure_marker<H: MarkerHost>(
        &mut self,
        host: &mut H,
        view: ViewId,
    ) -> Result<SuppressionMarker> {
        if let Some(existing) = host.marker(view, self.name)? {
            return Ok(existing);
        }

        let marker = SuppressionMarker::new(view, self.name, self.next_serial);
        self.next_serial += 1;
        host.attach_marker(view, marker.clone())?;
        debug!("attached {} to view {view}", self.name);
        Ok(marker)
    }

    pub fn remove_marker<H: MarkerHost>(&self, host: &mut H, view: ViewId) -> Result<()> {
        if host.marker(view, self.name)?.is_some() {
            host.detach_marker(view, self.name)?;
            debug!("detached {} from view {view}", self.name);
        }
        Ok(())
    }

    /// Detach every marker under this manager's name in one batch.
    pub fn remove_all_markers<H: MarkerHost>(&self, host: &mut H) -> Result<()> {
        let attached = host.markers(self.name)?;
        if attached.is_empty() {
            return Ok(());
        }
        host.detach_markers(&attached)?;
        debug!("detached {} from {} views", self.name, attached.len());
        Ok(())
    }
}
