// Plugin entry point: lifecycle, command dispatch, and host notifications.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use crate::arbitrator::FocusArbitrator;
use crate::config::FocusConfig;
use crate::error::Result;
use crate::marker::MarkerHost;
use crate::matcher::OverlayMatcher;
use crate::view::{ViewInfo, ViewRole, ViewSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Notifications the host delivers to the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ViewMapped(ViewInfo),
    ViewUnmapped(ViewInfo),
    Key { code: u32, state: KeyState },
    PointerButton { button: u32, state: ButtonState },
    /// Another component asks for `ViewInfo` to be focused.
    FocusRequest(ViewInfo),
}

impl HostEvent {
    pub fn subscription(&self) -> Subscription {
        match self {
            HostEvent::ViewMapped(_) => Subscription::ViewMapped,
            HostEvent::ViewUnmapped(_) => Subscription::ViewUnmapped,
            HostEvent::Key { .. } => Subscription::Key,
            HostEvent::PointerButton { .. } => Subscription::PointerButton,
            HostEvent::FocusRequest(_) => Subscription::FocusRequest,
        }
    }
}

/// Event streams the plugin can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subscription {
    ViewMapped,
    ViewUnmapped,
    Key,
    PointerButton,
    FocusRequest,
}

/// What the plugin did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not subscribed, or nothing to do.
    Ignored,
    /// State was updated.
    Observed,
    /// Focus went back to the stored application view.
    Restored,
    /// The host must not carry out the focus request.
    Suppressed,
}

/// User-triggered commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Cycle,
    Deactivate,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Cycle => "cycle",
            Command::Deactivate => "deactivate",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cycle" => Ok(Command::Cycle),
            "deactivate" => Ok(Command::Deactivate),
            other => Err(format!(
                "Invalid command '{other}', expected 'cycle' or 'deactivate'"
            )),
        }
    }
}

/// The overlay focus plugin.
///
/// Listening is bracketed by [`init`](Self::init) and [`fini`](Self::fini);
/// notifications arriving outside that window are ignored.
#[derive(Debug)]
pub struct PanelFocus<M> {
    arbitrator: FocusArbitrator<M>,
    connected: BTreeSet<Subscription>,
}

impl<M: OverlayMatcher> PanelFocus<M> {
    pub fn new(config: FocusConfig, matcher: M) -> Self {
        Self {
            arbitrator: FocusArbitrator::new(config, matcher),
            connected: BTreeSet::new(),
        }
    }

    pub fn arbitrator(&self) -> &FocusArbitrator<M> {
        &self.arbitrator
    }

    /// Streams this configuration needs.
    pub fn wanted_subscriptions(&self) -> Vec<Subscription> {
        let config = self.arbitrator.config();
        let mut wanted = vec![Subscription::ViewMapped, Subscription::ViewUnmapped];
        if config.restore_key.is_some() {
            wanted.push(Subscription::Key);
        }
        if config.restore_on_button {
            wanted.push(Subscription::PointerButton);
        }
        if config.intercept_focus_requests {
            wanted.push(Subscription::FocusRequest);
        }
        wanted
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = Subscription> + '_ {
        self.connected.iter().copied()
    }

    pub fn is_connected(&self) -> bool {
        !self.connected.is_empty()
    }

    pub fn init<H: ViewSource + MarkerHost>(&mut self, host: &mut H) -> Result<()> {
        self.arbitrator.start(host)?;
        self.connected = self.wanted_subscriptions().into_iter().collect();
        info!(
            "panel focus listening for {:?}",
            self.connected.iter().collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Disconnects before detaching markers; nothing stays subscribed even
    /// when detaching fails.
    pub fn fini<H: ViewSource + MarkerHost>(&mut self, host: &mut H) -> Result<()> {
        self.connected.clear();
        self.arbitrator.stop(host)?;
        info!("panel focus stopped");
        Ok(())
    }

    pub fn command<H: ViewSource + MarkerHost>(
        &mut self,
        host: &mut H,
        command: Command,
    ) -> Result<bool> {
        debug!("command {command}");
        match command {
            Command::Cycle => self.arbitrator.cycle(host),
            Command::Deactivate => self.arbitrator.deactivate(host),
        }
    }

    pub fn handle<H: ViewSource + MarkerHost>(
        &mut self,
        host: &mut H,
        event: &HostEvent,
    ) -> Result<EventOutcome> {
        if !self.connected.contains(&event.subscription()) {
            return Ok(EventOutcome::Ignored);
        }

        match event {
            HostEvent::ViewMapped(view) => {
                self.arbitrator.view_mapped(host, view)?;
                Ok(EventOutcome::Observed)
            }
            HostEvent::ViewUnmapped(view) => {
                self.arbitrator.view_unmapped(host, view)?;
                Ok(EventOutcome::Observed)
            }
            HostEvent::Key { code, state } => {
                let is_restore_key = self.arbitrator.config().restore_key == Some(*code);
                if is_restore_key && *state == KeyState::Released {
                    self.restore_session(host)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
            HostEvent::PointerButton { state, .. } => {
                if *state != ButtonState::Released {
                    return Ok(EventOutcome::Ignored);
                }
                let on_overlay = host
                    .active_view()?
                    .is_some_and(|view| view.role == ViewRole::Overlay);
                if on_overlay {
                    self.restore_session(host)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
            HostEvent::FocusRequest(view) => {
                if view.role == ViewRole::Overlay {
                    debug!("suppressed focus request for overlay view {}", view.id);
                    Ok(EventOutcome::Suppressed)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
        }
    }

    // Input-driven restores only end a running session.
    fn restore_session<H: ViewSource>(&mut self, host: &mut H) -> Result<EventOutcome> {
        if !self.arbitrator.state().overlay_active() {
            return Ok(EventOutcome::Ignored);
        }
        if self.arbitrator.deactivate(host)? {
            Ok(EventOutcome::Restored)
        } else {
            Ok(EventOutcome::Ignored)
        }
    }
}
