// Crate-wide error type for host interaction and settings.
use thiserror::Error;

use crate::view::ViewId;

#[derive(Debug, Error)]
pub enum Error {
    #[cfg(feature = "sway")]
    #[error("sway ipc: {0}")]
    Sway(#[from] swayipc::Error),

    #[error("sway command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("unknown view {0}")]
    UnknownView(ViewId),

    #[error("invalid setting: {0}")]
    Settings(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
