// Policy configuration for the arbitrator, read from settings.
// Consumes Settings: panel_focus.*.
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::matcher::ViewMatcher;
use crate::settings::{SettingSpec, Settings};

/// evdev code of the Escape key.
pub const KEY_ESC: u32 = 1;

/// Overlays are opt-in: floating dialogs share the overlay role under sway.
pub const DEFAULT_MATCH: &str = "none";

pub const SETTING_SPECS: &[SettingSpec] = &[
    SettingSpec {
        key: "panel_focus.match",
        default: DEFAULT_MATCH,
        description: "overlay views taking part in cycling: none, all, or app_id=/title= rules",
    },
    SettingSpec {
        key: "panel_focus.require_match",
        default: "true",
        description: "only cycle overlays accepted by panel_focus.match",
    },
    SettingSpec {
        key: "panel_focus.marker_mode",
        default: "per_cycle",
        description: "per_cycle: only the cycled-to overlay is marked; persistent: every overlay is",
    },
    SettingSpec {
        key: "panel_focus.map_policy",
        default: "refocus",
        description: "when an overlay maps: refocus, restore_toplevel or ignore",
    },
    SettingSpec {
        key: "panel_focus.restore_key",
        default: "1",
        description: "key code whose release restores the application view, or none",
    },
    SettingSpec {
        key: "panel_focus.restore_on_button",
        default: "false",
        description: "restore the application view after a click on an overlay",
    },
    SettingSpec {
        key: "panel_focus.intercept_focus_requests",
        default: "false",
        description: "swallow focus requests aimed at overlay views",
    },
    SettingSpec {
        key: "panel_focus.binding_prefix",
        default: "panel-focus",
        description: "word after `nop` in sway bindings handled by the daemon",
    },
];

/// How suppression markers are kept on overlay views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerMode {
    /// Every cycle clears all markers and marks only the new target.
    #[default]
    PerCycle,
    /// Every eligible overlay keeps a marker for the plugin's lifetime.
    Persistent,
}

/// What happens right after an eligible overlay view maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapPolicy {
    /// Ask the host to resolve keyboard focus again; the marker keeps the
    /// new overlay out of the running.
    #[default]
    Refocus,
    /// Send focus straight back to the stored application view.
    RestoreToplevel,
    Ignore,
}

impl FromStr for MarkerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_cycle" => Ok(MarkerMode::PerCycle),
            "persistent" => Ok(MarkerMode::Persistent),
            other => Err(format!(
                "Invalid marker mode '{other}', expected 'per_cycle' or 'persistent'"
            )),
        }
    }
}

impl fmt::Display for MarkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarkerMode::PerCycle => "per_cycle",
            MarkerMode::Persistent => "persistent",
        })
    }
}

impl FromStr for MapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refocus" => Ok(MapPolicy::Refocus),
            "restore_toplevel" => Ok(MapPolicy::RestoreToplevel),
            "ignore" => Ok(MapPolicy::Ignore),
            other => Err(format!(
                "Invalid map policy '{other}', expected 'refocus', 'restore_toplevel' or 'ignore'"
            )),
        }
    }
}

impl fmt::Display for MapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MapPolicy::Refocus => "refocus",
            MapPolicy::RestoreToplevel => "restore_toplevel",
            MapPolicy::Ignore => "ignore",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusConfig {
    pub require_match: bool,
    pub marker_mode: MarkerMode,
    pub map_policy: MapPolicy,
    pub restore_key: Option<u32>,
    pub restore_on_button: bool,
    pub intercept_focus_requests: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            require_match: true,
            marker_mode: MarkerMode::default(),
            map_policy: MapPolicy::default(),
            restore_key: Some(KEY_ESC),
            restore_on_button: false,
            intercept_focus_requests: false,
        }
    }
}

impl FocusConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            require_match: settings
                .get_bool_or("panel_focus.require_match", defaults.require_match)
                .map_err(Error::Settings)?,
            marker_mode: settings
                .get_parsed_or("panel_focus.marker_mode", defaults.marker_mode)
                .map_err(Error::Settings)?,
            map_policy: settings
                .get_parsed_or("panel_focus.map_policy", defaults.map_policy)
                .map_err(Error::Settings)?,
            restore_key: match settings.get("panel_focus.restore_key") {
                None => defaults.restore_key,
                Some(raw) => parse_restore_key(raw).map_err(Error::Settings)?,
            },
            restore_on_button: settings
                .get_bool_or("panel_focus.restore_on_button", defaults.restore_on_button)
                .map_err(Error::Settings)?,
            intercept_focus_requests: settings
                .get_bool_or(
                    "panel_focus.intercept_focus_requests",
                    defaults.intercept_focus_requests,
                )
                .map_err(Error::Settings)?,
        })
    }
}

/// Everything the daemon reads from settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub focus: FocusConfig,
    pub matcher: ViewMatcher,
    pub binding_prefix: String,
}

impl DaemonConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let matcher = settings
            .get_or("panel_focus.match", DEFAULT_MATCH)
            .parse::<ViewMatcher>()
            .map_err(|err| Error::Settings(format!("panel_focus.match: {err}")))?;
        let binding_prefix = settings
            .get_or("panel_focus.binding_prefix", "panel-focus")
            .trim()
            .to_string();
        if binding_prefix.is_empty() || binding_prefix.contains(char::is_whitespace) {
            return Err(Error::Settings(format!(
                "panel_focus.binding_prefix must be a single word, got '{binding_prefix}'"
            )));
        }

        Ok(Self {
            focus: FocusConfig::from_settings(settings)?,
            matcher,
            binding_prefix,
        })
    }
}

fn parse_restore_key(raw: &str) -> Result<Option<u32>, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| format!("Invalid setting 'panel_focus.restore_key': '{trimmed}'"))
}
