use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Invalid payload for command {command}: {reason}")]
    InvalidPayload { command: u8, reason: String },

    #[error("Invalid UTF-8 in payload of command {command}")]
    InvalidUtf8 { command: u8 },

    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    // State machine errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Collaborator errors
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    // Scheduler errors
    #[error("Scheduler cleared: {0}")]
    SchedulerCleared(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidPayload`].
    pub fn invalid_payload(command: u8, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            command,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
