// Translate sway IPC events into plugin notifications and commands.
use swayipc::{Event, WindowChange};

use crate::config::KEY_ESC;
use crate::listener::{ButtonState, Command, HostEvent, KeyState};
use crate::sway_host::view_info;

/// evdev code of the left mouse button.
pub const BTN_LEFT: u32 = 0x110;

/// One unit of work for the daemon loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwayInput {
    Event(HostEvent),
    Command(Command),
}

/// `None` for events the plugin has no use for.
pub fn translate(event: &Event, binding_prefix: &str) -> Option<SwayInput> {
    match event {
        Event::Window(window) => {
            let view = view_info(&window.container)?;
            match &window.change {
                WindowChange::New => Some(SwayInput::Event(HostEvent::ViewMapped(view))),
                WindowChange::Close => Some(SwayInput::Event(HostEvent::ViewUnmapped(view))),
                _ => None,
            }
        }
        Event::Binding(binding) => parse_binding_command(&binding.binding.command, binding_prefix),
        _ => None,
    }
}

/// Parse `nop <prefix> <verb>`.
///
/// `cycle` and `deactivate` are commands; `escape` and `button` stand in for
/// the key and pointer input sway keeps to itself.
pub fn parse_binding_command(command: &str, binding_prefix: &str) -> Option<SwayInput> {
    let mut words = command.split_whitespace();
    if words.next() != Some("nop") || words.next() != Some(binding_prefix) {
        return None;
    }
    let verb = words.next()?;
    if words.next().is_some() {
        return None;
    }

    match verb {
        "escape" => Some(SwayInput::Event(HostEvent::Key {
            code: KEY_ESC,
            state: KeyState::Released,
        })),
        "button" => Some(SwayInput::Event(HostEvent::PointerButton {
            button: BTN_LEFT,
            state: ButtonState::Released,
        })),
        other => other.parse::<Command>().ok().map(SwayInput::Command),
    }
}
