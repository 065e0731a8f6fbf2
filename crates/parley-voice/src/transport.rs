//! Seams to the real-time transport and the channel API.
//!
//! The voice core never talks to a media server itself. A [`RoomFactory`]
//! hands out [`Room`] handles; the session owns each handle exclusively and
//! is the only caller of its mutating methods. Channels issue credentials
//! through [`CallChannel`].

use crate::error::TransportError;
use async_trait::async_trait;
use parley_types::{CallGrant, Permission};
use std::sync::Arc;

/// Events delivered by a room to its listeners. Each occurrence is
/// dispatched once to every registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Connected,
    Disconnected,
    ParticipantJoined { identity: String },
    ParticipantLeft { identity: String },
}

/// Callback registered on a room.
pub type RoomListener = Arc<dyn Fn(RoomEvent) + Send + Sync>;

/// Capture and playback preferences applied when a room is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomOptions {
    pub audio_input_device: Option<String>,
    pub audio_output_device: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

/// Options for [`Room::connect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Subscribe to remote media automatically. The voice core always
    /// connects with this off; tracks are subscribed elsewhere.
    pub auto_subscribe: bool,
}

/// A remote participant as seen by the local room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub identity: String,
    pub microphone_enabled: bool,
}

/// A transport room handle.
///
/// Listener registration is balanced by [`Room::remove_all_listeners`],
/// which the session calls before dropping a room.
#[async_trait]
pub trait Room: Send + Sync {
    /// Connects (or reconnects) this handle using the given credentials.
    async fn connect(
        &self,
        url: &str,
        token: &str,
        options: ConnectOptions,
    ) -> Result<(), TransportError>;

    /// Leaves the room. Returns immediately; a `Disconnected` event is
    /// dispatched to any listeners still registered.
    fn disconnect(&self);

    fn add_listener(&self, listener: RoomListener);

    fn remove_all_listeners(&self);

    fn is_microphone_enabled(&self) -> bool;

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    fn is_camera_enabled(&self) -> bool;

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    fn is_screen_share_enabled(&self) -> bool;

    async fn set_screen_share_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    fn participant(&self, identity: &str) -> Option<ParticipantInfo>;
}

/// Creates room handles configured with the caller's device preferences.
pub trait RoomFactory: Send + Sync {
    fn create(&self, options: RoomOptions) -> Arc<dyn Room>;
}

/// The call/channel API of the chat backend.
#[async_trait]
pub trait CallChannel: Send + Sync {
    fn id(&self) -> &str;

    /// Requests credentials for joining this channel's call.
    async fn join_call(&self, region: &str) -> Result<CallGrant, TransportError>;

    fn have_permission(&self, permission: Permission) -> bool;
}
