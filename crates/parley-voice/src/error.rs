use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// The operation needs a connected room and there is none.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failures reported by the real-time transport or the channel API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("failed to fetch call credentials: {0}")]
    Join(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("room is closed")]
    Closed,
}

/// Failures while loading or playing a notification cue. These never leave
/// the cue library; they are logged and the cue is skipped.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("failed to fetch cue audio: {0}")]
    Fetch(String),

    #[error("failed to decode cue audio: {0}")]
    Decode(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("audio output unavailable")]
    Unavailable,
}

impl From<std::io::Error> for AudioError {
    fn from(e: std::io::Error) -> Self {
        AudioError::Fetch(e.to_string())
    }
}

impl From<reqwest::Error> for AudioError {
    fn from(e: reqwest::Error) -> Self {
        AudioError::Fetch(e.to_string())
    }
}
