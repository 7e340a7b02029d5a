//! Error types
//!
//! Errors are split by the boundary they come from: the decoder engine,
//! a single session's buffer negotiation, and the host runtime. The crate
//! level [`Error`] is what registry operations report.

use std::fmt;

/// Errors reported by a decoder engine implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be constructed from the given options
    Init(String),
    /// The locator could not be turned into media
    Open(String),
    /// A player could not be created from the media
    Player(String),
    /// Playback failed to begin
    Play(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Init(msg) => write!(f, "Engine init failed: {}", msg),
            EngineError::Open(msg) => write!(f, "Media open failed: {}", msg),
            EngineError::Player(msg) => write!(f, "Player creation failed: {}", msg),
            EngineError::Play(msg) => write!(f, "Playback failed to start: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors raised inside a session while answering engine callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The frame buffer could not be sized for the negotiated format
    Allocation { requested: usize, limit: usize },
    /// The engine proposed a format with a zero dimension
    InvalidFormat { width: u32, height: u32 },
    /// The session is shutting down and refuses further callbacks
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Allocation { requested, limit } => write!(
                f,
                "Frame buffer allocation of {} bytes failed (limit {})",
                requested, limit
            ),
            SessionError::InvalidFormat { width, height } => {
                write!(f, "Invalid frame format: {}x{}", width, height)
            }
            SessionError::Closed => write!(f, "Session closed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from the host runtime boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The current thread could not be attached to the host runtime
    Unreachable(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Unreachable(msg) => write!(f, "Host runtime unreachable: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// Error returned by a frame sink that could not consume a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame sink error: {}", self.0)
    }
}

impl std::error::Error for SinkError {}

/// Crate-level error for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The shared decoder engine could not be constructed
    EngineInit(EngineError),
    /// The stream locator could not be resolved into media
    MediaOpen(String),
    /// Media opened but playback did not begin
    PlaybackStart(String),
    /// Frame buffer allocation failed
    Allocation(SessionError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EngineInit(e) => write!(f, "{}", e),
            Error::MediaOpen(locator) => write!(f, "Cannot open media: {}", locator),
            Error::PlaybackStart(msg) => write!(f, "Playback start failed: {}", msg),
            Error::Allocation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::EngineInit(e) => Some(e),
            Error::Allocation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Error::Allocation(e)
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;
