//! Room lobby: directory, room state machine, error taxonomy

pub mod directory;
pub mod room;

pub use directory::RoomDirectory;
pub use room::RoomId;

use thiserror::Error;

/// Errors surfaced to the requesting client.
///
/// Everything else on the intent path — moves or drops from unknown, dead,
/// or roomless players — is silently dropped, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Cannot join room")]
    RoomUnavailable,

    #[error("Already logged in")]
    DuplicateConnection,
}

impl RoomError {
    /// Stable machine-readable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::RoomNotFound => "room_not_found",
            RoomError::RoomUnavailable => "room_unavailable",
            RoomError::DuplicateConnection => "duplicate_connection",
        }
    }
}
