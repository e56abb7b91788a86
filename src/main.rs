// panel-focus daemon: overlay focus cycling for sway.
use std::collections::HashMap;
use std::process::ExitCode;

use argh::FromArgs;
use log::{LevelFilter, debug, error, info, warn};
use syslog::Facility;

use panel_focus::config::{DaemonConfig, SETTING_SPECS};
use panel_focus::listener::PanelFocus;
use panel_focus::matcher::ViewMatcher;
use panel_focus::settings::{Settings, list_settings, parse_settings_arg};
use panel_focus::settings_storage::SettingsStorage;
use panel_focus::sway_events::{SwayInput, translate};
use panel_focus::sway_host::{SwayHost, subscribe_events};

#[derive(FromArgs, Debug)]
/// Cycle keyboard focus through floating overlay windows
struct Args {
    /// override a setting for this run (key=value), may be repeated
    #[argh(option)]
    setting: Vec<String>,

    /// list all settings with their defaults and exit
    #[argh(switch)]
    list_settings: bool,

    /// log debug messages
    #[argh(switch)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(err) = syslog::init(Facility::LOG_USER, level, Some("panel-focus")) {
        eprintln!("panel-focus: syslog unavailable, logging disabled: {err}");
    }
}

fn load_config(args: &Args) -> Result<DaemonConfig, String> {
    let mut overrides = HashMap::new();
    for arg in &args.setting {
        overrides.extend(parse_settings_arg(arg)?);
    }

    let storage = SettingsStorage::new(SettingsStorage::default_path());
    debug!("settings file {}", storage.path().display());
    let mut settings = Settings::new(storage);
    settings.ensure_defaults(SETTING_SPECS);
    settings.apply_overrides(overrides);
    DaemonConfig::from_settings(&settings).map_err(|err| err.to_string())
}

fn run(
    plugin: &mut PanelFocus<ViewMatcher>,
    host: &mut SwayHost,
    binding_prefix: &str,
) -> panel_focus::Result<()> {
    let events = subscribe_events(plugin.subscriptions())?;
    for event in events {
        let event = event?;
        let Some(input) = translate(&event, binding_prefix) else {
            continue;
        };
        let outcome = match input {
            SwayInput::Command(command) => plugin
                .command(host, command)
                .map(|done| debug!("{command}: {done}")),
            SwayInput::Event(event) => plugin
                .handle(host, &event)
                .map(|outcome| debug!("{event:?}: {outcome:?}")),
        };
        // A window can vanish between the event and our commands.
        if let Err(err) = outcome {
            warn!("panel focus: {err}");
        }
    }
    info!("sway event stream ended");
    Ok(())
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    if args.list_settings {
        list_settings(SETTING_SPECS);
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("panel-focus: {err}");
            error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut host = match SwayHost::connect() {
        Ok(host) => host,
        Err(err) => {
            eprintln!("panel-focus: {err}");
            error!("failed to connect to sway: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut plugin = PanelFocus::new(config.focus, config.matcher);
    let mut result = plugin.init(&mut host);
    if result.is_ok() {
        result = run(&mut plugin, &mut host, &config.binding_prefix);
    }
    if let Err(err) = plugin.fini(&mut host) {
        warn!("failed to clear suppression markers: {err}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("panel-focus: {err}");
            error!("panel focus stopped: {err}");
            ExitCode::FAILURE
        }
    }
}
