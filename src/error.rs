//! Error types for the playback engine.

/// Top-level error type for the streaming playback engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A new utterance was requested while the previous one is still being
    /// synthesized. The record stays registered; only the request is withheld.
    #[error("previous utterance is still being synthesized")]
    PipelineBusy,

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
