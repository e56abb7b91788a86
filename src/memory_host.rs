// In-memory host used by tests and benchmarks, and by embedders that push view snapshots.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::listener::HostEvent;
use crate::marker::{MarkerHost, SuppressionMarker};
use crate::view::{ViewId, ViewInfo, ViewRole, ViewSource};

/// A view registry held entirely in memory.
///
/// Views are kept in enumeration order, bottom of the stack first. Refocus
/// resolution walks from the top and skips any view whose markers refuse to
/// provide a keyboard focus target.
#[derive(Debug, Default)]
pub struct MemoryHost {
    views: Vec<ViewInfo>,
    active: Option<ViewInfo>,
    markers: HashMap<(ViewId, String), SuppressionMarker>,
    focus_history: Vec<ViewId>,
    attach_count: usize,
    detach_count: usize,
    refocus_count: usize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_views(views: impl IntoIterator<Item = ViewInfo>) -> Self {
        Self {
            views: views.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add a view on top of the stack and return the matching notification.
    pub fn map_view(&mut self, view: ViewInfo) -> HostEvent {
        self.views.retain(|existing| existing.id != view.id);
        self.views.push(view.clone());
        HostEvent::ViewMapped(view)
    }

    /// Remove a view and return the matching notification.
    ///
    /// The active view is left as is, so a handler running for this
    /// notification still sees the departing view as active. Markers stay
    /// attached until someone detaches them.
    pub fn unmap_view(&mut self, id: ViewId) -> Option<HostEvent> {
        let index = self.views.iter().position(|view| view.id == id)?;
        let view = self.views.remove(index);
        Some(HostEvent::ViewUnmapped(view))
    }

    /// Focus a view directly, as a user click would.
    pub fn activate(&mut self, id: ViewId) -> Result<()> {
        self.focus_view(id)
    }

    pub fn active_id(&self) -> Option<ViewId> {
        self.active.as_ref().map(|view| view.id)
    }

    pub fn view(&self, id: ViewId) -> Option<&ViewInfo> {
        self.views.iter().find(|view| view.id == id)
    }

    /// Views carrying a marker under `name`, in id order.
    pub fn marked_views(&self, name: &str) -> Vec<ViewId> {
        let mut marked: Vec<ViewId> = self
            .markers
            .keys()
            .filter(|(_, marker_name)| marker_name == name)
            .map(|(view, _)| *view)
            .collect();
        marked.sort();
        marked
    }

    pub fn focus_history(&self) -> &[ViewId] {
        &self.focus_history
    }

    pub fn attach_count(&self) -> usize {
        self.attach_count
    }

    pub fn detach_count(&self) -> usize {
        self.detach_count
    }

    pub fn refocus_count(&self) -> usize {
        self.refocus_count
    }

    fn accepts_keyboard_refocus(&self, view: &ViewInfo) -> bool {
        if view.role == ViewRole::Other {
            return false;
        }
        self.markers
            .iter()
            .filter(|((id, _), _)| *id == view.id)
            .all(|(_, marker)| marker.keyboard_refocus().is_some())
    }
}

impl ViewSource for MemoryHost {
    fn views(&mut self) -> Result<Vec<ViewInfo>> {
        Ok(self.views.clone())
    }

    fn active_view(&mut self) -> Result<Option<ViewInfo>> {
        Ok(self.active.clone())
    }

    fn focus_view(&mut self, view: ViewId) -> Result<()> {
        let info = self.view(view).cloned().ok_or(Error::UnknownView(view))?;
        self.active = Some(info);
        self.focus_history.push(view);
        Ok(())
    }

    fn refocus(&mut self) -> Result<()> {
        self.refocus_count += 1;
        let target = self
            .views
            .iter()
            .rev()
            .find(|view| self.accepts_keyboard_refocus(view))
            .cloned();
        match target {
            Some(view) => self.focus_view(view.id),
            None => {
                self.active = None;
                Ok(())
            }
        }
    }
}

impl MarkerHost for MemoryHost {
    fn attach_marker(&mut self, view: ViewId, marker: SuppressionMarker) -> Result<()> {
        if self.view(view).is_none() {
            return Err(Error::UnknownView(view));
        }
        self.markers
            .insert((view, marker.name().to_string()), marker);
        self.attach_count += 1;
        Ok(())
    }

    fn detach_marker(&mut self, view: ViewId, name: &str) -> Result<()> {
        if self.markers.remove(&(view, name.to_string())).is_some() {
            self.detach_count += 1;
        }
        Ok(())
    }

    fn marker(&mut self, view: ViewId, name: &str) -> Result<Option<SuppressionMarker>> {
        Ok(self.markers.get(&(view, name.to_string())).cloned())
    }

    fn markers(&mut self, name: &str) -> Result<Vec<SuppressionMarker>> {
        let mut found: Vec<SuppressionMarker> = self
            .markers
            .values()
            .filter(|marker| marker.name() == name)
            .cloned()
            .collect();
        found.sort_by_key(SuppressionMarker::view);
        Ok(found)
    }
}
