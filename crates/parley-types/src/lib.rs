//! Shared types for the Parley voice client.
//!
//! This crate provides the plain data used across the Parley crates: the
//! voice session state enum, the notification cue names, channel permission
//! names, call credentials, push-to-talk configuration and the voice settings
//! payload with its sanitising loader.
//!
//! Nothing here performs I/O. Behaviour lives in `parley-voice` and
//! `parley-drawer`; keeping the data definitions separate prevents those
//! crates from depending on each other.

use serde::{Deserialize, Serialize};

mod ptt;
mod settings;

pub use ptt::{
    PushToTalkActivation, PushToTalkConfig, PushToTalkMode, PushToTalkUpdate,
    MAX_RELEASE_DELAY_MS,
};
pub use settings::{CueToggles, VoiceSettings};

/// Connection state of the voice session.
///
/// Transitions are owned by the session controller:
/// `Ready -> Connecting -> Connected -> {Disconnected, Reconnecting}` and
/// `Reconnecting -> {Connected, Disconnected}`. A manual hang-up returns to
/// `Ready` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No call. Initial state and the state after a manual disconnect.
    #[default]
    Ready,
    /// A room has been created and the transport is connecting.
    Connecting,
    /// The transport reported a live connection.
    Connected,
    /// The connection was lost and will not be retried.
    Disconnected,
    /// The connection was lost and a reconnect attempt is pending or running.
    Reconnecting,
}

impl SessionState {
    /// Returns the string label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Reconnecting => "RECONNECTING",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Short notification sounds played on voice events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// The local user joined a call.
    JoinCall,
    /// The local user left a call.
    LeaveCall,
    /// A remote participant joined.
    SomeoneJoined,
    /// A remote participant left.
    SomeoneLeft,
    /// The local microphone was muted.
    Mute,
    /// The local microphone was unmuted.
    Unmute,
    /// A message arrived.
    ReceiveMessage,
    /// The call dropped and will not be retried.
    Disconnect,
}

impl Cue {
    /// Every cue, in a stable order.
    pub const ALL: [Cue; 8] = [
        Cue::JoinCall,
        Cue::LeaveCall,
        Cue::SomeoneJoined,
        Cue::SomeoneLeft,
        Cue::Mute,
        Cue::Unmute,
        Cue::ReceiveMessage,
        Cue::Disconnect,
    ];

    /// Returns the symbolic name of this cue.
    pub fn name(self) -> &'static str {
        match self {
            Self::JoinCall => "join_call",
            Self::LeaveCall => "leave_call",
            Self::SomeoneJoined => "someone_joined",
            Self::SomeoneLeft => "someone_left",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::ReceiveMessage => "receive_message",
            Self::Disconnect => "disconnect",
        }
    }

    /// Looks a cue up by its symbolic name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cue| cue.name() == name)
    }

    /// Asset file backing this cue. `Disconnect` shares the leave sound.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::JoinCall => "join_call.wav",
            Self::LeaveCall | Self::Disconnect => "leave_call.wav",
            Self::SomeoneJoined => "someone_joined.wav",
            Self::SomeoneLeft => "someone_left.wav",
            Self::Mute => "mute.wav",
            Self::Unmute => "unmute.wav",
            Self::ReceiveMessage => "receive_message.wav",
        }
    }
}

/// Channel capabilities the voice core checks before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// May receive audio in the call.
    Listen,
    /// May publish microphone audio.
    Speak,
}

/// Credentials for joining a call, issued by the channel.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGrant {
    /// Transport server URL.
    pub url: String,
    /// Signed join token.
    pub token: String,
}

impl CallGrant {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for CallGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGrant")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
