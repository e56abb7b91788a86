// Cycle/restore rules and the reactions to views appearing and disappearing.
use log::{debug, info};

use crate::config::{FocusConfig, MapPolicy, MarkerMode};
use crate::error::Result;
use crate::focus_state::FocusState;
use crate::marker::{MarkerHost, MarkerManager};
use crate::matcher::OverlayMatcher;
use crate::view::{ViewId, ViewInfo, ViewSource};

/// Owns the focus state and decides which view gets focus.
///
/// Every operation borrows the host for its duration; nothing is kept between
/// calls except [`FocusState`] and the marker serial counter.
#[derive(Debug)]
pub struct FocusArbitrator<M> {
    state: FocusState,
    markers: MarkerManager,
    matcher: M,
    config: FocusConfig,
}

impl<M: OverlayMatcher> FocusArbitrator<M> {
    pub fn new(config: FocusConfig, matcher: M) -> Self {
        Self {
            state: FocusState::default(),
            markers: MarkerManager::default(),
            matcher,
            config,
        }
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn markers(&self) -> &MarkerManager {
        &self.markers
    }

    /// Overlay role, above the workspace, and accepted by the matcher unless
    /// matching is switched off.
    pub fn is_eligible_overlay(&self, view: &ViewInfo) -> bool {
        view.is_overlay_candidate() && (!self.config.require_match || self.matcher.matches(view))
    }

    /// Seed state from the host and, in persistent mode, mark every eligible
    /// overlay already on screen.
    pub fn start<H: ViewSource + MarkerHost>(&mut self, host: &mut H) -> Result<()> {
        let active = host.active_view()?.map(|view| view.id);
        self.state = FocusState::seeded(active);

        if self.config.marker_mode == MarkerMode::Persistent {
            for view in host.views()? {
                if self.is_eligible_overlay(&view) {
                    self.markers.ensure_marker(host, view.id)?;
                }
            }
        }
        debug!("focus arbitration started, active view {active:?}");
        Ok(())
    }

    pub fn stop<H: ViewSource + MarkerHost>(&mut self, host: &mut H) -> Result<()> {
        self.markers.remove_all_markers(host)
    }

    /// Move focus to the next eligible overlay after the current one,
    /// wrapping to the first. Returns `false` when no overlay qualifies.
    pub fn cycle<H: ViewSource + MarkerHost>(&mut self, host: &mut H) -> Result<bool> {
        if self.state.pending_toplevel_view().is_none()
            && let Some(active) = host.active_view()?
            && active.is_workspace_toplevel()
        {
            self.state.set_pending_toplevel(active.id);
        }

        let views = host.views()?;
        let Some(target) = self.next_overlay(&views) else {
            info!("Failed to cycle views: no eligible overlay view");
            return Ok(false);
        };

        // Markers only move once the host has accepted the new focus.
        host.focus_view(target)?;
        self.state.set_current(target);
        match self.config.marker_mode {
            MarkerMode::PerCycle => self.markers.remove_all_markers(host)?,
            MarkerMode::Persistent => self.markers.remove_marker(host, target)?,
        }
        self.markers.ensure_marker(host, target)?;
        self.state.enter_overlay(target);
        debug!("cycled focus to overlay view {target}");
        Ok(true)
    }

    fn next_overlay(&self, views: &[ViewInfo]) -> Option<ViewId> {
        let current = self.state.current_focus_view();
        // A current view missing from the list skips everything, which sends
        // the scan to the wraparound pass.
        views
            .iter()
            .skip_while(|view| Some(view.id) != current)
            .skip(1)
            .find(|view| self.is_eligible_overlay(view))
            .or_else(|| views.iter().find(|view| self.is_eligible_overlay(view)))
            .map(|view| view.id)
    }

    /// Hand focus back to the stored application view. Returns `false` when
    /// there is nothing to restore.
    pub fn deactivate<H: ViewSource>(&mut self, host: &mut H) -> Result<bool> {
        let Some(target) = self.state.pending_toplevel_view() else {
            debug!("nothing to restore");
            return Ok(false);
        };
        host.focus_view(target)?;
        self.state.take_restore_target();
        debug!("restored focus to view {target}");
        Ok(true)
    }

    pub fn view_mapped<H: ViewSource + MarkerHost>(
        &mut self,
        host: &mut H,
        view: &ViewInfo,
    ) -> Result<()> {
        if view.is_workspace_toplevel() && !self.state.overlay_active() {
            self.state.set_pending_toplevel(view.id);
        }

        if !self.is_eligible_overlay(view) {
            return Ok(());
        }
        self.markers.ensure_marker(host, view.id)?;

        match self.config.map_policy {
            MapPolicy::Refocus => {
                host.refocus()?;
                self.hold_session_focus(host)?;
            }
            MapPolicy::RestoreToplevel => self.redirect_to_toplevel(host)?,
            MapPolicy::Ignore => {}
        }
        Ok(())
    }

    // Host refocus skips marked views, including the overlay a running
    // session focused; hand focus back to it.
    fn hold_session_focus<H: ViewSource>(&self, host: &mut H) -> Result<()> {
        if !self.state.overlay_active() {
            return Ok(());
        }
        let Some(current) = self.state.current_focus_view() else {
            return Ok(());
        };
        if host.active_view()?.map(|view| view.id) != Some(current) {
            host.focus_view(current)?;
            debug!("kept session focus on overlay view {current}");
        }
        Ok(())
    }

    /// Outside a session the stored toplevel wins, then the application view
    /// focused last. With neither, focus stays where the host put it.
    fn redirect_to_toplevel<H: ViewSource>(&mut self, host: &mut H) -> Result<()> {
        if self.state.overlay_active() {
            self.deactivate(host)?;
            return Ok(());
        }
        let target = match self.state.pending_toplevel_view() {
            Some(target) => Some(target),
            None => self.current_toplevel(host)?,
        };
        if let Some(target) = target {
            host.focus_view(target)?;
            self.state.set_current(target);
        }
        Ok(())
    }

    fn current_toplevel<H: ViewSource>(&self, host: &mut H) -> Result<Option<ViewId>> {
        let Some(current) = self.state.current_focus_view() else {
            return Ok(None);
        };
        Ok(host
            .views()?
            .into_iter()
            .find(|view| view.id == current && view.is_workspace_toplevel())
            .map(|view| view.id))
    }

    pub fn view_unmapped<H: ViewSource + MarkerHost>(
        &mut self,
        host: &mut H,
        view: &ViewInfo,
    ) -> Result<()> {
        if host
            .active_view()?
            .is_some_and(|active| active.id == view.id)
        {
            self.state.clear_pending_toplevel();
        }
        self.state.forget(view.id);
        self.markers.remove_marker(host, view.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus_state::FocusPhase;
    use crate::marker::SUPPRESSION_MARKER;
    use crate::matcher::ViewMatcher;
    use crate::memory_host::MemoryHost;
    use crate::view::{ViewLayer, ViewRole};
    use proptest::prelude::*;

    fn app(id: i64) -> ViewInfo {
        ViewInfo::new(id, ViewRole::Toplevel, ViewLayer::Workspace)
    }

    fn panel(id: i64) -> ViewInfo {
        ViewInfo::new(id, ViewRole::Overlay, ViewLayer::Top).with_app_id("panel")
    }

    fn arbitrator(config: FocusConfig) -> FocusArbitrator<ViewMatcher> {
        FocusArbitrator::new(config, ViewMatcher::All)
    }

    /// App 1 focused, overlays 10, 11 and 12 on top.
    fn desktop() -> (MemoryHost, FocusArbitrator<ViewMatcher>) {
        let mut host = MemoryHost::with_views([app(1), panel(10), panel(11), panel(12)]);
        host.activate(ViewId(1)).expect("activate app");
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");
        (host, arb)
    }

    fn current(arb: &FocusArbitrator<ViewMatcher>) -> Option<i64> {
        arb.state().current_focus_view().map(|view| view.0)
    }

    #[test]
    fn cycle_walks_overlays_with_wraparound() {
        let (mut host, mut arb) = desktop();
        arb.state.set_current(ViewId(11));

        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(current(&arb), Some(12));
        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(current(&arb), Some(10));
        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(current(&arb), Some(11));
        assert_eq!(host.active_id(), Some(ViewId(11)));
    }

    #[test]
    fn first_cycle_seeds_restore_target() {
        let (mut host, mut arb) = desktop();

        assert!(arb.cycle(&mut host).expect("cycle"));

        assert_eq!(arb.state().pending_toplevel_view(), Some(ViewId(1)));
        assert_eq!(current(&arb), Some(10));
        assert_eq!(arb.state().phase(), FocusPhase::Active);
    }

    #[test]
    fn cycle_without_overlays_fails_quietly() {
        let mut host = MemoryHost::with_views([app(1), app(2)]);
        host.activate(ViewId(2)).expect("activate");
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");
        let before_current = arb.state().current_focus_view();

        assert!(!arb.cycle(&mut host).expect("cycle"));

        assert_eq!(arb.state().current_focus_view(), before_current);
        assert!(!arb.state().overlay_active());
        assert_eq!(host.focus_history(), &[ViewId(2)]);
    }

    #[test]
    fn cycle_respects_matcher_when_required() {
        let mut host = MemoryHost::with_views([
            app(1),
            panel(10),
            ViewInfo::new(11, ViewRole::Overlay, ViewLayer::Top).with_app_id("dock"),
        ]);
        host.activate(ViewId(1)).expect("activate");
        let docks_only = |view: &ViewInfo| view.app_id.as_deref() == Some("dock");
        let mut arb = FocusArbitrator::new(FocusConfig::default(), docks_only);
        arb.start(&mut host).expect("start");

        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(11)));
        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(11)));
    }

    #[test]
    fn cycle_ignores_matcher_when_not_required() {
        let mut host = MemoryHost::with_views([app(1), panel(10)]);
        host.activate(ViewId(1)).expect("activate");
        let config = FocusConfig {
            require_match: false,
            ..FocusConfig::default()
        };
        let mut arb = FocusArbitrator::new(config, ViewMatcher::None);
        arb.start(&mut host).expect("start");

        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(10)));
    }

    #[test]
    fn cycle_skips_overlays_at_workspace_layer() {
        let mut host = MemoryHost::with_views([
            app(1),
            ViewInfo::new(10, ViewRole::Overlay, ViewLayer::Workspace),
            ViewInfo::new(11, ViewRole::Other, ViewLayer::Overlay),
        ]);
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");

        assert!(!arb.cycle(&mut host).expect("cycle"));
    }

    #[test]
    fn per_cycle_marker_is_exclusive() {
        let (mut host, mut arb) = desktop();

        arb.cycle(&mut host).expect("cycle to 10");
        arb.cycle(&mut host).expect("cycle to 11");

        assert_eq!(host.marked_views(SUPPRESSION_MARKER), vec![ViewId(11)]);
    }

    #[test]
    fn persistent_mode_marks_every_overlay() {
        let mut host = MemoryHost::with_views([app(1), panel(10), panel(11)]);
        host.activate(ViewId(1)).expect("activate");
        let config = FocusConfig {
            marker_mode: MarkerMode::Persistent,
            ..FocusConfig::default()
        };
        let mut arb = arbitrator(config);

        arb.start(&mut host).expect("start");
        assert_eq!(
            host.marked_views(SUPPRESSION_MARKER),
            vec![ViewId(10), ViewId(11)]
        );

        arb.cycle(&mut host).expect("cycle");
        assert_eq!(
            host.marked_views(SUPPRESSION_MARKER),
            vec![ViewId(10), ViewId(11)]
        );
        assert_eq!(host.active_id(), Some(ViewId(10)));
    }

    #[test]
    fn deactivate_restores_mapped_toplevel() {
        let mut host = MemoryHost::with_views([panel(10)]);
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");

        let mapped = app(5);
        host.map_view(mapped.clone());
        arb.view_mapped(&mut host, &mapped).expect("mapped");
        arb.cycle(&mut host).expect("cycle");

        assert!(arb.deactivate(&mut host).expect("deactivate"));
        assert_eq!(host.active_id(), Some(ViewId(5)));
        assert_eq!(arb.state().pending_toplevel_view(), None);

        let before = arb.state().clone();
        assert!(!arb.deactivate(&mut host).expect("second deactivate"));
        assert_eq!(arb.state(), &before);
    }

    #[test]
    fn cycle_then_deactivate_round_trips() {
        let (mut host, mut arb) = desktop();

        arb.cycle(&mut host).expect("cycle");
        arb.deactivate(&mut host).expect("deactivate");

        assert_eq!(arb.state().current_focus_view(), Some(ViewId(1)));
        assert_eq!(arb.state().phase(), FocusPhase::Inactive);
        assert_eq!(host.active_id(), Some(ViewId(1)));
    }

    #[test]
    fn toplevel_mapped_during_session_is_not_adopted() {
        let (mut host, mut arb) = desktop();
        arb.cycle(&mut host).expect("cycle");

        let late = app(7);
        host.map_view(late.clone());
        arb.view_mapped(&mut host, &late).expect("mapped");

        assert_eq!(arb.state().pending_toplevel_view(), Some(ViewId(1)));
    }

    #[test]
    fn mapped_overlay_is_marked_and_refocus_skips_it() {
        let (mut host, mut arb) = desktop();

        let fresh = panel(20);
        host.map_view(fresh.clone());
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert!(host.marked_views(SUPPRESSION_MARKER).contains(&ViewId(20)));
        assert_eq!(host.refocus_count(), 1);
        assert_ne!(host.active_id(), Some(ViewId(20)));
    }

    #[test]
    fn mapped_overlay_redirects_when_configured() {
        let mut host = MemoryHost::with_views([app(1), panel(10)]);
        host.activate(ViewId(1)).expect("activate");
        let config = FocusConfig {
            map_policy: MapPolicy::RestoreToplevel,
            ..FocusConfig::default()
        };
        let mut arb = arbitrator(config);
        arb.start(&mut host).expect("start");
        arb.cycle(&mut host).expect("cycle");

        let fresh = panel(20);
        host.map_view(fresh.clone());
        host.activate(ViewId(20)).expect("host hands focus to the new overlay");
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert_eq!(host.active_id(), Some(ViewId(1)));
        assert!(!arb.state().overlay_active());
        assert_eq!(host.refocus_count(), 0);
    }

    #[test]
    fn mapped_overlay_ignored_when_configured() {
        let mut host = MemoryHost::with_views([app(1)]);
        host.activate(ViewId(1)).expect("activate");
        let config = FocusConfig {
            map_policy: MapPolicy::Ignore,
            ..FocusConfig::default()
        };
        let mut arb = arbitrator(config);
        arb.start(&mut host).expect("start");

        let fresh = panel(20);
        host.map_view(fresh.clone());
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert_eq!(host.refocus_count(), 0);
        assert_eq!(host.focus_history(), &[ViewId(1)]);
        assert_eq!(host.marked_views(SUPPRESSION_MARKER), vec![ViewId(20)]);
    }

    #[test]
    fn mapped_overlay_during_session_keeps_cycled_overlay_focused() {
        let mut host = MemoryHost::with_views([app(1), panel(10)]);
        host.activate(ViewId(1)).expect("activate");
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");
        arb.cycle(&mut host).expect("cycle");

        let fresh = panel(20);
        host.map_view(fresh.clone());
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert_eq!(host.refocus_count(), 1);
        assert!(arb.state().overlay_active());
        assert_eq!(host.active_id(), arb.state().current_focus_view());
        assert_eq!(host.active_id(), Some(ViewId(10)));
        assert!(host.marked_views(SUPPRESSION_MARKER).contains(&ViewId(10)));
    }

    #[test]
    fn redirect_outside_session_falls_back_to_focused_app() {
        let mut host = MemoryHost::with_views([app(1), panel(10)]);
        host.activate(ViewId(1)).expect("activate");
        let config = FocusConfig {
            map_policy: MapPolicy::RestoreToplevel,
            ..FocusConfig::default()
        };
        let mut arb = arbitrator(config);
        arb.start(&mut host).expect("start");
        assert_eq!(arb.state().pending_toplevel_view(), None);

        let fresh = panel(20);
        host.map_view(fresh.clone());
        host.activate(ViewId(20)).expect("host hands focus to the new overlay");
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert_eq!(host.active_id(), Some(ViewId(1)));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(1)));
        assert!(!arb.state().overlay_active());
    }

    #[test]
    fn redirect_without_known_app_leaves_focus_alone() {
        let mut host = MemoryHost::with_views([panel(10)]);
        let config = FocusConfig {
            map_policy: MapPolicy::RestoreToplevel,
            ..FocusConfig::default()
        };
        let mut arb = arbitrator(config);
        arb.start(&mut host).expect("start");

        let fresh = panel(20);
        host.map_view(fresh.clone());
        host.activate(ViewId(20)).expect("host hands focus to the new overlay");
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        assert_eq!(host.active_id(), Some(ViewId(20)));
        assert_eq!(host.focus_history(), &[ViewId(20)]);
    }

    /// Delegates to a [`MemoryHost`] but refuses every focus change, as when
    /// the target window closes before the command lands.
    struct FocusRefusingHost(MemoryHost);

    impl ViewSource for FocusRefusingHost {
        fn views(&mut self) -> Result<Vec<ViewInfo>> {
            self.0.views()
        }

        fn active_view(&mut self) -> Result<Option<ViewInfo>> {
            self.0.active_view()
        }

        fn focus_view(&mut self, view: ViewId) -> Result<()> {
            Err(crate::error::Error::UnknownView(view))
        }

        fn refocus(&mut self) -> Result<()> {
            self.0.refocus()
        }
    }

    impl MarkerHost for FocusRefusingHost {
        fn attach_marker(
            &mut self,
            view: ViewId,
            marker: crate::marker::SuppressionMarker,
        ) -> Result<()> {
            self.0.attach_marker(view, marker)
        }

        fn detach_marker(&mut self, view: ViewId, name: &str) -> Result<()> {
            self.0.detach_marker(view, name)
        }

        fn marker(
            &mut self,
            view: ViewId,
            name: &str,
        ) -> Result<Option<crate::marker::SuppressionMarker>> {
            self.0.marker(view, name)
        }

        fn markers(&mut self, name: &str) -> Result<Vec<crate::marker::SuppressionMarker>> {
            self.0.markers(name)
        }
    }

    #[test]
    fn failed_focus_keeps_markers_and_state() {
        let (mut host, mut arb) = desktop();
        arb.cycle(&mut host).expect("cycle to 10");
        let before = arb.state().clone();
        let mut refusing = FocusRefusingHost(host);

        assert!(arb.cycle(&mut refusing).is_err());

        assert_eq!(arb.state(), &before);
        assert_eq!(
            refusing.0.marked_views(SUPPRESSION_MARKER),
            vec![ViewId(10)]
        );
    }

    #[test]
    fn unmapping_restore_target_makes_deactivate_noop() {
        let (mut host, mut arb) = desktop();
        arb.cycle(&mut host).expect("cycle");

        let gone = host.unmap_view(ViewId(1)).expect("app was mapped");
        let crate::listener::HostEvent::ViewUnmapped(gone) = gone else {
            panic!("expected unmap notification");
        };
        arb.view_unmapped(&mut host, &gone).expect("unmapped");

        assert!(!arb.deactivate(&mut host).expect("deactivate"));
    }

    #[test]
    fn unmapping_active_view_drops_restore_target() {
        let mut host = MemoryHost::with_views([app(1), app(2), panel(10)]);
        host.activate(ViewId(1)).expect("activate");
        let mut arb = arbitrator(FocusConfig::default());
        arb.start(&mut host).expect("start");
        arb.view_mapped(&mut host, &app(1)).expect("baseline");
        host.activate(ViewId(2)).expect("user clicks another app");

        let gone = app(2);
        host.unmap_view(gone.id);
        arb.view_unmapped(&mut host, &gone).expect("unmapped");

        assert_eq!(arb.state().pending_toplevel_view(), None);
    }

    #[test]
    fn unmapping_current_overlay_removes_marker_and_next_cycle_wraps() {
        let (mut host, mut arb) = desktop();
        arb.cycle(&mut host).expect("cycle to 10");
        arb.cycle(&mut host).expect("cycle to 11");

        let gone = panel(11);
        host.unmap_view(gone.id);
        arb.view_unmapped(&mut host, &gone).expect("unmapped");
        assert!(host.marked_views(SUPPRESSION_MARKER).is_empty());

        assert!(arb.cycle(&mut host).expect("cycle after unmap"));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(10)));
    }

    #[test]
    fn stale_current_view_restarts_scan() {
        let (mut host, mut arb) = desktop();
        arb.state.set_current(ViewId(99));

        assert!(arb.cycle(&mut host).expect("cycle"));
        assert_eq!(arb.state().current_focus_view(), Some(ViewId(10)));
    }

    #[test]
    fn stop_detaches_everything() {
        let (mut host, mut arb) = desktop();
        arb.cycle(&mut host).expect("cycle");
        let fresh = panel(20);
        host.map_view(fresh.clone());
        arb.view_mapped(&mut host, &fresh).expect("mapped");

        arb.stop(&mut host).expect("stop");

        assert!(host.marked_views(SUPPRESSION_MARKER).is_empty());
    }

    proptest! {
        #[test]
        fn cycle_visits_every_overlay_before_repeating(
            layout in prop::collection::vec(any::<bool>(), 1..24)
        ) {
            let views: Vec<ViewInfo> = layout
                .iter()
                .enumerate()
                .map(|(index, overlay)| if *overlay { panel(index as i64) } else { app(index as i64) })
                .collect();
            let overlays: Vec<ViewId> = views
                .iter()
                .filter(|view| view.role == ViewRole::Overlay)
                .map(|view| view.id)
                .collect();
            let mut host = MemoryHost::with_views(views);
            let mut arb = arbitrator(FocusConfig::default());
            arb.start(&mut host).expect("start");

            let mut visited = Vec::new();
            for _ in 0..overlays.len() {
                prop_assert!(arb.cycle(&mut host).expect("cycle"));
                visited.push(arb.state().current_focus_view().expect("focused overlay"));
            }
            prop_assert_eq!(&visited, &overlays);

            if overlays.is_empty() {
                prop_assert!(!arb.cycle(&mut host).expect("cycle"));
            } else {
                prop_assert!(arb.cycle(&mut host).expect("cycle"));
                prop_assert_eq!(arb.state().current_focus_view(), Some(overlays[0]));
            }
        }
    }
}
