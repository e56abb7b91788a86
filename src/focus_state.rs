// Focus bookkeeping owned by the arbitrator: what we focused, where to return, and whether a session is live.
use crate::view::ViewId;

/// Whether an overlay focus session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPhase {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusState {
    current_focus_view: Option<ViewId>,
    pending_toplevel_view: Option<ViewId>,
    overlay_active: bool,
}

impl FocusState {
    /// Start inactive, remembering whatever the host had focused.
    pub fn seeded(active: Option<ViewId>) -> Self {
        Self {
            current_focus_view: active,
            pending_toplevel_view: None,
            overlay_active: false,
        }
    }

    pub fn current_focus_view(&self) -> Option<ViewId> {
        self.current_focus_view
    }

    pub fn pending_toplevel_view(&self) -> Option<ViewId> {
        self.pending_toplevel_view
    }

    pub fn overlay_active(&self) -> bool {
        self.overlay_active
    }

    pub fn phase(&self) -> FocusPhase {
        if self.overlay_active {
            FocusPhase::Active
        } else {
            FocusPhase::Inactive
        }
    }

    pub fn set_pending_toplevel(&mut self, view: ViewId) {
        self.pending_toplevel_view = Some(view);
    }

    pub fn set_current(&mut self, view: ViewId) {
        self.current_focus_view = Some(view);
    }

    /// Drop the restore target. Without one there is no session to end, so
    /// the phase falls back to inactive.
    pub fn clear_pending_toplevel(&mut self) {
        self.pending_toplevel_view = None;
        self.overlay_active = false;
    }

    /// An overlay was just focused by a cycle.
    pub fn enter_overlay(&mut self, view: ViewId) {
        self.current_focus_view = Some(view);
        self.overlay_active = true;
    }

    /// End the session by handing back the restore target, if there is one.
    pub fn take_restore_target(&mut self) -> Option<ViewId> {
        let target = self.pending_toplevel_view.take()?;
        self.current_focus_view = Some(target);
        self.overlay_active = false;
        Some(target)
    }

    /// Clear every reference to a view that is going away.
    pub fn forget(&mut self, view: ViewId) {
        if self.pending_toplevel_view == Some(view) {
            self.clear_pending_toplevel();
        }
        if self.current_focus_view == Some(view) {
            self.current_focus_view = None;
            self.overlay_active = false;
        }
    }
}
