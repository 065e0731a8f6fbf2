//! Voice session lifecycle.
//!
//! [`VoiceSession`] owns the transport room for the current call and drives
//! the connection state machine:
//!
//! ```text
//! READY -> CONNECTING -> CONNECTED -> DISCONNECTED
//!                            |  ^
//!                            v  |
//!                        RECONNECTING -> DISCONNECTED
//! ```
//!
//! A manual [`VoiceSession::disconnect`] returns to `READY` from any state.
//!
//! # Room ownership
//!
//! Every room gets a generation number when it is created. Transport
//! callbacks and reconnect tasks carry the generation they were started for
//! and do nothing once a newer `connect` or a `disconnect` has replaced it.
//! Room methods are never called while the session lock is held, so a
//! transport that dispatches events synchronously cannot deadlock the
//! session.

use crate::cues::SoundCueLibrary;
use crate::error::{TransportError, VoiceError};
use crate::reconnect::ReconnectPolicy;
use crate::settings::SettingsStore;
use crate::transport::{
    CallChannel, ConnectOptions, ParticipantInfo, Room, RoomEvent, RoomFactory, RoomOptions,
};
use parley_types::{CallGrant, Cue, Permission, SessionState};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Region requested when fetching call credentials.
pub const DEFAULT_REGION: &str = "worldwide";

/// Tunables for a [`VoiceSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub reconnect: ReconnectPolicy,
    pub region: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

/// Handle to the process-wide voice session. Cloning shares the session.
#[derive(Clone)]
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    settings: SettingsStore,
    cues: Arc<SoundCueLibrary>,
    rooms: Arc<dyn RoomFactory>,
    options: SessionOptions,

    state: watch::Sender<SessionState>,
    microphone: watch::Sender<bool>,
    camera: watch::Sender<bool>,
    screenshare: watch::Sender<bool>,
    deafen: watch::Sender<bool>,
    channel_id: watch::Sender<Option<String>>,

    link: Mutex<Link>,
}

/// Mutable connection bookkeeping, guarded by `SessionInner::link`.
#[derive(Default)]
struct Link {
    generation: u64,
    channel: Option<Arc<dyn CallChannel>>,
    room: Option<Arc<dyn Room>>,
    manual_disconnect: bool,
    reconnect_attempts: u32,
    retry: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("state", &self.state())
            .field("channel_id", &self.channel_id())
            .field("microphone", &self.microphone())
            .field("deafened", &self.deafened())
            .finish_non_exhaustive()
    }
}

impl VoiceSession {
    pub fn new(
        settings: SettingsStore,
        cues: Arc<SoundCueLibrary>,
        rooms: Arc<dyn RoomFactory>,
    ) -> Self {
        Self::with_options(settings, cues, rooms, SessionOptions::default())
    }

    pub fn with_options(
        settings: SettingsStore,
        cues: Arc<SoundCueLibrary>,
        rooms: Arc<dyn RoomFactory>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                settings,
                cues,
                rooms,
                options,
                state: watch::channel(SessionState::Ready).0,
                microphone: watch::channel(false).0,
                camera: watch::channel(false).0,
                screenshare: watch::channel(false).0,
                deafen: watch::channel(false).0,
                channel_id: watch::channel(None).0,
                link: Mutex::new(Link::default()),
            }),
        }
    }

    /// Joins `channel`'s call, replacing any current call.
    ///
    /// When `auth` is `None` credentials are requested from the channel. If
    /// fetching credentials or connecting fails the new room is torn down,
    /// the state becomes `DISCONNECTED` and the error is returned.
    ///
    /// A `disconnect` or another `connect` made while this one is pending
    /// supersedes it: its room is released and `Ok` is returned without
    /// touching session state. A microphone device failure after connecting
    /// is logged and leaves the call up.
    pub async fn connect(
        &self,
        channel: Arc<dyn CallChannel>,
        auth: Option<CallGrant>,
    ) -> Result<(), VoiceError> {
        let inner = &self.inner;
        let settings = inner.settings.get();

        let (generation, room, previous) = {
            let mut link = inner.lock();
            link.manual_disconnect = false;
            link.reconnect_attempts = 0;
            if let Some(retry) = link.retry.take() {
                retry.abort();
            }
            let previous = link.room.take();

            let room = inner.rooms.create(RoomOptions {
                audio_input_device: settings.preferred_audio_input_device.clone(),
                audio_output_device: settings.preferred_audio_output_device.clone(),
                echo_cancellation: settings.echo_cancellation,
                noise_suppression: settings.noise_suppression,
            });

            link.generation += 1;
            link.channel = Some(Arc::clone(&channel));
            link.room = Some(Arc::clone(&room));
            (link.generation, room, previous)
        };

        if let Some(previous) = previous {
            debug!("tearing down previous room");
            release(previous.as_ref());
        }

        info!(channel_id = channel.id(), generation, "joining call");
        inner.channel_id.send_replace(Some(channel.id().to_string()));
        inner.set_state(SessionState::Connecting);
        inner
            .microphone
            .send_replace(!settings.push_to_talk.enabled);
        inner.deafen.send_replace(false);
        inner.camera.send_replace(false);
        inner.screenshare.send_replace(false);

        let weak = Arc::downgrade(inner);
        room.add_listener(Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(generation, event);
            }
        }));

        let grant = match auth {
            Some(grant) => grant,
            None => match channel.join_call(&inner.options.region).await {
                Ok(grant) => grant,
                Err(e) => {
                    inner.abandon(generation, &e);
                    return Err(e.into());
                }
            },
        };
        if !inner.is_current(generation) {
            debug!(generation, "call superseded while fetching credentials");
            release(room.as_ref());
            return Ok(());
        }

        if let Err(e) = room
            .connect(&grant.url, &grant.token, ConnectOptions::default())
            .await
        {
            inner.abandon(generation, &e);
            return Err(e.into());
        }
        if !inner.is_current(generation) {
            debug!(generation, "call superseded while connecting");
            release(room.as_ref());
            return Ok(());
        }

        inner
            .reconcile_microphone(generation, room.as_ref(), channel.as_ref())
            .await;
        Ok(())
    }

    /// Hangs up. Runs to completion before returning so the manual flag is
    /// in place before the transport can report the disconnect.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        let room = {
            let mut link = inner.lock();
            let Some(room) = link.room.take() else {
                return;
            };
            link.generation += 1;
            link.manual_disconnect = true;
            link.reconnect_attempts = 0;
            if let Some(retry) = link.retry.take() {
                retry.abort();
            }
            link.channel = None;
            room
        };

        info!("leaving call");
        inner.cues.trigger(Cue::LeaveCall);
        release(room.as_ref());

        inner.set_state(SessionState::Ready);
        inner.clear_call();
    }

    /// Flips the microphone.
    pub async fn toggle_mute(&self) -> Result<(), VoiceError> {
        let room = self.inner.current_room()?;
        let target = !room.is_microphone_enabled();
        self.inner.apply_microphone(room.as_ref(), target).await
    }

    /// Sets the microphone state; `true` unmutes. Does nothing when the
    /// transport already matches.
    pub async fn set_mute(&self, mic_enabled: bool) -> Result<(), VoiceError> {
        let room = self.inner.current_room()?;
        self.inner.apply_microphone(room.as_ref(), mic_enabled).await
    }

    pub async fn toggle_camera(&self) -> Result<(), VoiceError> {
        let room = self.inner.current_room()?;
        room.set_camera_enabled(!room.is_camera_enabled()).await?;
        self.inner.camera.send_replace(room.is_camera_enabled());
        Ok(())
    }

    pub async fn toggle_screenshare(&self) -> Result<(), VoiceError> {
        let room = self.inner.current_room()?;
        room.set_screen_share_enabled(!room.is_screen_share_enabled())
            .await?;
        self.inner
            .screenshare
            .send_replace(room.is_screen_share_enabled());
        Ok(())
    }

    /// Flips local deafen. Not mirrored to the transport. Returns the new
    /// value.
    pub fn toggle_deafen(&self) -> bool {
        let mut deafened = false;
        self.inner.deafen.send_modify(|d| {
            *d = !*d;
            deafened = *d;
        });
        deafened
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn microphone(&self) -> bool {
        *self.inner.microphone.borrow()
    }

    pub fn subscribe_microphone(&self) -> watch::Receiver<bool> {
        self.inner.microphone.subscribe()
    }

    pub fn camera(&self) -> bool {
        *self.inner.camera.borrow()
    }

    pub fn screenshare(&self) -> bool {
        *self.inner.screenshare.borrow()
    }

    pub fn deafened(&self) -> bool {
        *self.inner.deafen.borrow()
    }

    pub fn subscribe_deafen(&self) -> watch::Receiver<bool> {
        self.inner.deafen.subscribe()
    }

    pub fn channel_id(&self) -> Option<String> {
        self.inner.channel_id.borrow().clone()
    }

    pub fn subscribe_channel(&self) -> watch::Receiver<Option<String>> {
        self.inner.channel_id.subscribe()
    }

    pub fn room(&self) -> Option<Arc<dyn Room>> {
        self.inner.lock().room.clone()
    }

    /// Whether a room is held, i.e. mic/camera/screenshare calls are valid.
    pub fn is_in_room(&self) -> bool {
        self.inner.lock().room.is_some()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().reconnect_attempts
    }

    pub fn listen_permission(&self) -> bool {
        self.inner.has_permission(Permission::Listen)
    }

    pub fn speaking_permission(&self) -> bool {
        self.inner.has_permission(Permission::Speak)
    }

    /// Looks up a participant of the current room.
    pub fn participant(&self, identity: &str) -> Option<ParticipantInfo> {
        self.room()?.participant(identity)
    }
}

/// Detaches the session from `room` and closes it.
fn release(room: &dyn Room) {
    room.remove_all_listeners();
    room.disconnect();
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, Link> {
        match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("voice session lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            info!(from = %*state, to = %next, "voice state changed");
            *state = next;
            true
        });
    }

    fn clear_call(&self) {
        self.channel_id.send_replace(None);
        self.microphone.send_replace(false);
        self.camera.send_replace(false);
        self.screenshare.send_replace(false);
    }

    fn current_room(&self) -> Result<Arc<dyn Room>, VoiceError> {
        self.lock()
            .room
            .clone()
            .ok_or(VoiceError::InvalidState("no room is connected"))
    }

    fn has_permission(&self, permission: Permission) -> bool {
        self.lock()
            .channel
            .as_ref()
            .is_some_and(|channel| channel.have_permission(permission))
    }

    /// Mute/unmute cues play unless push-to-talk drives the mic and the user
    /// has not asked for push-to-talk sounds.
    fn should_play_mute_cue(&self) -> bool {
        let ptt = self.settings.push_to_talk();
        !ptt.enabled || ptt.notification_sounds
    }

    async fn apply_microphone(&self, room: &dyn Room, enabled: bool) -> Result<(), VoiceError> {
        if room.is_microphone_enabled() == enabled {
            debug!(enabled, "microphone already in requested state");
            return Ok(());
        }

        room.set_microphone_enabled(enabled).await?;
        self.microphone.send_replace(enabled);
        debug!(enabled, "microphone changed");

        if self.should_play_mute_cue() {
            self.cues
                .trigger(if enabled { Cue::Unmute } else { Cue::Mute });
        }
        Ok(())
    }

    /// Overrides whatever microphone default the transport applied on
    /// connect so that it matches the push-to-talk setting. Device failures
    /// are logged; the published flag follows the transport either way.
    async fn reconcile_microphone(
        &self,
        generation: u64,
        room: &dyn Room,
        channel: &dyn CallChannel,
    ) {
        let push_to_talk = self.settings.push_to_talk_enabled();
        let enabled = room.is_microphone_enabled();

        let result = if push_to_talk && enabled {
            debug!("transport enabled the microphone under push-to-talk, muting");
            room.set_microphone_enabled(false).await
        } else if !push_to_talk && !enabled && channel.have_permission(Permission::Speak) {
            debug!("enabling microphone for open-mic call");
            room.set_microphone_enabled(true).await
        } else {
            Ok(())
        };
        if let Err(e) = result {
            warn!(error = %e, push_to_talk, "failed to reconcile microphone after connect");
        }

        if self.is_current(generation) {
            self.microphone.send_replace(room.is_microphone_enabled());
        }
    }

    /// Tears down a room whose connect failed, unless it was already
    /// replaced.
    fn abandon(&self, generation: u64, error: &TransportError) {
        let room = {
            let mut link = self.lock();
            if link.generation != generation {
                return;
            }
            link.channel = None;
            link.room.take()
        };

        warn!(error = %error, "failed to join call");
        if let Some(room) = room {
            release(room.as_ref());
        }
        self.set_state(SessionState::Disconnected);
        self.clear_call();
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: RoomEvent) {
        let mut link = self.lock();
        if link.generation != generation {
            debug!(?event, "ignoring event from a replaced room");
            return;
        }
        let state = *self.state.borrow();

        match event {
            RoomEvent::Connected => {
                if !matches!(
                    state,
                    SessionState::Connecting | SessionState::Reconnecting
                ) {
                    debug!(%state, "ignoring connected event");
                    return;
                }
                link.reconnect_attempts = 0;
                self.set_state(SessionState::Connected);
                self.cues.trigger(Cue::JoinCall);
            }
            RoomEvent::Disconnected => {
                if link.manual_disconnect {
                    if link.room.take().is_some() {
                        link.channel = None;
                        self.cues.trigger(Cue::LeaveCall);
                        self.set_state(SessionState::Ready);
                        self.clear_call();
                    }
                    return;
                }
                if state != SessionState::Connected {
                    debug!(%state, "ignoring disconnected event");
                    return;
                }
                if !self.settings.auto_reconnect() {
                    info!("connection lost, auto-reconnect disabled");
                    self.set_state(SessionState::Disconnected);
                    self.cues.trigger(Cue::Disconnect);
                    return;
                }
                info!("connection lost");
                self.begin_reconnect(&mut link, generation);
            }
            RoomEvent::ParticipantJoined { identity } => {
                if state == SessionState::Connected {
                    debug!(%identity, "participant joined");
                    self.cues.trigger(Cue::SomeoneJoined);
                }
            }
            RoomEvent::ParticipantLeft { identity } => {
                if state == SessionState::Connected {
                    debug!(%identity, "participant left");
                    self.cues.trigger(Cue::SomeoneLeft);
                }
            }
        }
    }

    /// Starts one reconnect attempt. Called with the link locked; the
    /// transport work runs in a spawned task tracked as `link.retry`.
    fn begin_reconnect(self: &Arc<Self>, link: &mut Link, generation: u64) {
        let (Some(channel), Some(room)) = (link.channel.clone(), link.room.clone()) else {
            warn!("connection lost with no channel to rejoin");
            self.set_state(SessionState::Disconnected);
            self.cues.trigger(Cue::Disconnect);
            return;
        };

        link.reconnect_attempts += 1;
        let attempt = link.reconnect_attempts;
        self.set_state(SessionState::Reconnecting);
        info!(attempt, "reconnecting");

        let inner = Arc::clone(self);
        link.retry = Some(tokio::spawn(async move {
            let result = inner.rejoin(channel.as_ref(), room.as_ref()).await;
            inner.finish_reconnect(generation, result);
        }));
    }

    async fn rejoin(&self, channel: &dyn CallChannel, room: &dyn Room) -> Result<(), TransportError> {
        let grant = channel.join_call(&self.options.region).await?;
        room.connect(&grant.url, &grant.token, ConnectOptions::default())
            .await
    }

    fn finish_reconnect(self: &Arc<Self>, generation: u64, result: Result<(), TransportError>) {
        let mut link = self.lock();
        if link.generation != generation || link.manual_disconnect {
            return;
        }
        link.retry = None;

        match result {
            Ok(()) => {
                link.reconnect_attempts = 0;
                self.set_state(SessionState::Connected);
                info!("reconnected");
            }
            Err(e) => {
                let attempts = link.reconnect_attempts;
                let policy = self.options.reconnect;
                if !policy.should_retry(attempts) {
                    warn!(attempts, error = %e, "giving up on reconnect");
                    self.set_state(SessionState::Disconnected);
                    self.cues.trigger(Cue::Disconnect);
                    return;
                }

                let delay = policy.delay_after(attempts);
                warn!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "reconnect failed, retrying"
                );
                let inner = Arc::clone(self);
                link.retry = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut link = inner.lock();
                    if link.generation == generation && !link.manual_disconnect {
                        inner.begin_reconnect(&mut link, generation);
                    }
                }));
            }
        }
    }
}
