//! Error types for the playback core
//!
//! One enum per concern. Command-path errors are returned to the caller,
//! engine errors travel on the event stream, device errors only get logged.

use std::time::Duration;
use thiserror::Error;

/// Unsupported or malformed source description
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Type is not a leaf stream or wrapper, or cannot be nested where it appears
    #[error("Source is unsupported or can not be nested: {0}")]
    UnsupportedSourceType(String),

    /// Required field absent
    #[error("Source description is missing '{0}'")]
    MissingField(&'static str),

    /// Field present but of the wrong shape
    #[error("Malformed {kind} source: {reason}")]
    Malformed { kind: String, reason: String },

    /// Clip end does not come after clip start
    #[error("Clip end {end:?} must be after start {start:?}")]
    InvalidClipRange { start: Duration, end: Duration },

    /// Playlist expands to more items than a queue may hold
    #[error("{kind} source expands to more than {max} items")]
    TooManyItems { kind: &'static str, max: usize },
}

/// Index and range validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    /// Index outside the allowed bounds for the operation
    #[error("Index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Range is empty, reversed or exceeds the queue
    #[error("Invalid range {start}..{end} for queue of length {len}")]
    InvalidRange { start: i64, end: i64, len: usize },

    /// Shuffle order does not describe the queue
    #[error("Invalid shuffle order for {len} items: {reason}")]
    InvalidShuffleOrder { len: usize, reason: String },

    /// Engine rejected the edit part way through
    #[error("Engine rejected queue edit: {0}")]
    Engine(#[from] EngineError),
}

/// Platform media errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No resolvable output device
    #[error("No audio output device")]
    NoDevice,

    /// Engine has been closed
    #[error("Media engine is closed")]
    Closed,

    /// Any other platform failure
    #[error("Platform error 0x{code:08x}: {message}")]
    Platform { code: u32, message: String },
}

/// Output device resolution and commit failures
///
/// Diagnostic only; never returned to a command caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Failed to enumerate audio devices: {0}")]
    EnumerationFailed(String),

    #[error("No audio device matches '{0}'")]
    DeviceNotFound(String),

    #[error("Failed to start device resolver: {0}")]
    WorkerSpawn(String),

    #[error("Failed to set audio device: {0}")]
    Commit(#[from] EngineError),
}

/// Errors returned on the command path
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required argument absent
    #[error("{name} argument missing")]
    MissingArgument {
        command: &'static str,
        name: &'static str,
    },

    /// Argument present but unusable
    #[error("{name} is invalid: {reason}")]
    InvalidArgument {
        command: &'static str,
        name: &'static str,
        reason: String,
    },

    /// Source description could not be built
    #[error("{error}")]
    Source {
        command: &'static str,
        #[source]
        error: SourceError,
    },

    /// Index or range validation failed
    #[error("{error}")]
    Queue {
        command: &'static str,
        #[source]
        error: QueueError,
    },

    /// `setOutputDevice` without an id
    #[error("Device ID not found in method arguments")]
    MissingDeviceId,

    /// Unknown method name
    #[error("Method '{0}' is not implemented")]
    NotImplemented(String),

    /// Owner thread has stopped
    #[error("Player thread is not running")]
    Disconnected,

    /// Owner thread did not answer in time
    #[error("Timed out after {0:?} waiting for the player thread")]
    Timeout(Duration),
}

impl CommandError {
    /// Stable wire code for this error
    pub fn code(&self) -> String {
        match self {
            CommandError::MissingArgument { command, .. }
            | CommandError::InvalidArgument { command, .. }
            | CommandError::Source { command, .. }
            | CommandError::Queue { command, .. } => format!("{command}_error"),
            CommandError::MissingDeviceId => "device_id_not_found".to_string(),
            CommandError::NotImplemented(_) => "not_implemented".to_string(),
            CommandError::Disconnected => "player_disconnected".to_string(),
            CommandError::Timeout(_) => "player_timeout".to_string(),
        }
    }

    /// Human readable message for this error
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Player registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Player '{0}' already exists")]
    PlayerAlreadyExists(String),

    #[error("Player '{0}' not found")]
    PlayerNotFound(String),

    #[error("Failed to start player thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_use_command_prefix() {
        let err = CommandError::MissingArgument {
            command: "volume",
            name: "volume",
        };
        assert_eq!(err.code(), "volume_error");
        assert_eq!(err.message(), "volume argument missing");
    }

    #[test]
    fn source_errors_carry_type_name() {
        let err = CommandError::Source {
            command: "load",
            error: SourceError::UnsupportedSourceType("silence".to_string()),
        };
        assert_eq!(err.code(), "load_error");
        assert!(err.message().contains("silence"));
    }

    #[test]
    fn range_errors_use_command_prefix() {
        let err = CommandError::Queue {
            command: "concatenatingRemoveRange",
            error: QueueError::InvalidRange {
                start: 2,
                end: 1,
                len: 3,
            },
        };
        assert_eq!(err.code(), "concatenatingRemoveRange_error");
    }

    #[test]
    fn fixed_codes() {
        assert_eq!(CommandError::MissingDeviceId.code(), "device_id_not_found");
        assert_eq!(
            CommandError::NotImplemented("foo".to_string()).code(),
            "not_implemented"
        );
    }
}
