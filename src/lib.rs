pub mod arbitrator;
pub mod config;
pub mod error;
pub mod focus_state;
pub mod listener;
pub mod marker;
pub mod matcher;
pub mod memory_host;
pub mod settings;
pub mod settings_storage;
pub mod view;

#[cfg(feature = "sway")]
pub mod sway_events;
#[cfg(feature = "sway")]
pub mod sway_host;

pub use error::{Error, Result};
