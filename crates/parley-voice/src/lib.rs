//! Voice core for the Parley client.
//!
//! Owns the call lifecycle: joining and leaving a channel's call through an
//! abstract transport, automatic reconnection with capped backoff, the
//! microphone/camera/screenshare/deafen flags, push-to-talk arbitration,
//! and the notification sounds that accompany each of those changes.
//!
//! The real-time transport, the channel API, the platform audio output and
//! the push-to-talk integration are traits implemented by the embedding
//! application. [`loopback`] and [`issuer`] provide in-process and
//! LiveKit-dev-server implementations for tests and the headless client.

pub mod config;
pub mod cues;
pub mod error;
pub mod issuer;
pub mod loopback;
pub mod ptt;
pub mod reconnect;
pub mod session;
pub mod settings;
pub mod transport;

pub use config::{LiveKitConfig, DEV_LIVEKIT_API_KEY, DEV_LIVEKIT_API_SECRET, DEV_LIVEKIT_URL};
pub use cues::{AudioBackend, CueBuffer, CueSource, SoundCueLibrary};
pub use error::{AudioError, TransportError, VoiceError};
pub use issuer::{DevTokenIssuer, IssuedChannel};
pub use loopback::{LoopbackChannel, LoopbackRoom, LoopbackRooms};
pub use ptt::{HardwarePushToTalk, ListenerId, PushToTalkBridge};
pub use reconnect::ReconnectPolicy;
pub use session::{SessionOptions, VoiceSession};
pub use settings::SettingsStore;
pub use transport::{
    CallChannel, ConnectOptions, ParticipantInfo, Room, RoomEvent, RoomFactory, RoomListener,
    RoomOptions,
};
