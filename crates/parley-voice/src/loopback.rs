//! In-process transport for tests and the headless client.
//!
//! [`LoopbackRooms`] hands out [`LoopbackRoom`]s that "connect" instantly,
//! dispatch the same events a media server would, and can be scripted to
//! fail connects, auto-enable the microphone or drop the connection.
//! [`LoopbackChannel`] is a matching channel API with a fixed grant.

use crate::error::TransportError;
use crate::transport::{
    CallChannel, ConnectOptions, ParticipantInfo, Room, RoomEvent, RoomFactory, RoomListener,
    RoomOptions,
};
use async_trait::async_trait;
use parley_types::{CallGrant, Permission};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::error!("loopback transport lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[derive(Debug, Default)]
struct Script {
    connect_failures: u32,
    auto_microphone: bool,
    device_failures: bool,
}

/// Room factory producing [`LoopbackRoom`]s. Clones share the script and
/// the list of created rooms.
#[derive(Clone, Default)]
pub struct LoopbackRooms {
    script: Arc<Mutex<Script>>,
    created: Arc<Mutex<Vec<Arc<LoopbackRoom>>>>,
}

impl std::fmt::Debug for LoopbackRooms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackRooms")
            .field("script", &*lock(&self.script))
            .field("created", &lock(&self.created).len())
            .finish()
    }
}

impl LoopbackRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` connect calls fail, across all rooms.
    pub fn fail_connects(&self, count: u32) {
        lock(&self.script).connect_failures = count;
    }

    /// Turns the microphone on as part of every successful connect, like a
    /// transport that publishes audio by default.
    pub fn auto_enable_microphone(&self, enabled: bool) {
        lock(&self.script).auto_microphone = enabled;
    }

    /// Makes every device toggle fail with [`TransportError::Device`].
    pub fn fail_devices(&self, enabled: bool) {
        lock(&self.script).device_failures = enabled;
    }

    /// The most recently created room.
    pub fn last(&self) -> Option<Arc<LoopbackRoom>> {
        lock(&self.created).last().cloned()
    }

    pub fn created(&self) -> usize {
        lock(&self.created).len()
    }
}

impl RoomFactory for LoopbackRooms {
    fn create(&self, options: RoomOptions) -> Arc<dyn Room> {
        let room = Arc::new(LoopbackRoom {
            options,
            script: Arc::clone(&self.script),
            state: Mutex::new(RoomState::default()),
        });
        lock(&self.created).push(Arc::clone(&room));
        room
    }
}

#[derive(Default)]
struct RoomState {
    listeners: Vec<RoomListener>,
    connected: bool,
    microphone: bool,
    camera: bool,
    screen_share: bool,
    participants: BTreeMap<String, ParticipantInfo>,
    connect_attempts: Vec<Instant>,
    microphone_changes: u32,
    last_token: Option<String>,
}

/// A loopback room. Events are dispatched synchronously, outside the
/// room's own lock.
pub struct LoopbackRoom {
    options: RoomOptions,
    script: Arc<Mutex<Script>>,
    state: Mutex<RoomState>,
}

impl std::fmt::Debug for LoopbackRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("LoopbackRoom")
            .field("connected", &state.connected)
            .field("microphone", &state.microphone)
            .field("participants", &state.participants.len())
            .finish_non_exhaustive()
    }
}

impl LoopbackRoom {
    fn emit(&self, event: RoomEvent) {
        let listeners = lock(&self.state).listeners.clone();
        for listener in listeners {
            listener(event.clone());
        }
    }

    fn check_device(&self, kind: &str) -> Result<(), TransportError> {
        if lock(&self.script).device_failures {
            return Err(TransportError::Device(format!("{kind} unavailable")));
        }
        if !lock(&self.state).connected {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// When each connect call was made, successful or not.
    pub fn connect_attempts(&self) -> Vec<Instant> {
        lock(&self.state).connect_attempts.clone()
    }

    /// Number of calls that actually changed the microphone.
    pub fn microphone_changes(&self) -> u32 {
        lock(&self.state).microphone_changes
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    pub fn last_token(&self) -> Option<String> {
        lock(&self.state).last_token.clone()
    }

    /// Loses the connection as if the network dropped.
    pub fn simulate_drop(&self) {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return;
            }
            state.connected = false;
        }
        debug!("loopback room dropped");
        self.emit(RoomEvent::Disconnected);
    }

    /// Dispatches an arbitrary event without touching room state.
    pub fn simulate_event(&self, event: RoomEvent) {
        self.emit(event);
    }

    pub fn simulate_participant_joined(&self, identity: &str) {
        lock(&self.state).participants.insert(
            identity.to_string(),
            ParticipantInfo {
                identity: identity.to_string(),
                microphone_enabled: false,
            },
        );
        self.emit(RoomEvent::ParticipantJoined {
            identity: identity.to_string(),
        });
    }

    pub fn simulate_participant_left(&self, identity: &str) {
        if lock(&self.state).participants.remove(identity).is_some() {
            self.emit(RoomEvent::ParticipantLeft {
                identity: identity.to_string(),
            });
        }
    }
}

#[async_trait]
impl Room for LoopbackRoom {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        _options: ConnectOptions,
    ) -> Result<(), TransportError> {
        lock(&self.state).connect_attempts.push(Instant::now());

        let auto_microphone = {
            let mut script = lock(&self.script);
            if script.connect_failures > 0 {
                script.connect_failures -= 1;
                return Err(TransportError::Connect(format!(
                    "{url} refused the connection"
                )));
            }
            script.auto_microphone
        };

        {
            let mut state = lock(&self.state);
            state.connected = true;
            state.last_token = Some(token.to_string());
            if auto_microphone {
                state.microphone = true;
            }
        }
        debug!(url, "loopback room connected");
        self.emit(RoomEvent::Connected);
        Ok(())
    }

    fn disconnect(&self) {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return;
            }
            state.connected = false;
            state.microphone = false;
            state.camera = false;
            state.screen_share = false;
            state.participants.clear();
        }
        self.emit(RoomEvent::Disconnected);
    }

    fn add_listener(&self, listener: RoomListener) {
        lock(&self.state).listeners.push(listener);
    }

    fn remove_all_listeners(&self) {
        lock(&self.state).listeners.clear();
    }

    fn is_microphone_enabled(&self) -> bool {
        lock(&self.state).microphone
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.check_device("microphone")?;
        let mut state = lock(&self.state);
        if state.microphone != enabled {
            state.microphone = enabled;
            state.microphone_changes += 1;
        }
        Ok(())
    }

    fn is_camera_enabled(&self) -> bool {
        lock(&self.state).camera
    }

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.check_device("camera")?;
        lock(&self.state).camera = enabled;
        Ok(())
    }

    fn is_screen_share_enabled(&self) -> bool {
        lock(&self.state).screen_share
    }

    async fn set_screen_share_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        self.check_device("screen share")?;
        lock(&self.state).screen_share = enabled;
        Ok(())
    }

    fn participant(&self, identity: &str) -> Option<ParticipantInfo> {
        lock(&self.state).participants.get(identity).cloned()
    }
}

/// Channel API answering every join with the same grant.
#[derive(Debug)]
pub struct LoopbackChannel {
    id: String,
    grant: CallGrant,
    permissions: Vec<Permission>,
    join_failures: AtomicU32,
    join_delay_ms: AtomicU64,
    joins: AtomicU32,
}

impl LoopbackChannel {
    /// A channel granting both listen and speak.
    pub fn new(id: impl Into<String>, grant: CallGrant) -> Self {
        Self::with_permissions(id, grant, vec![Permission::Listen, Permission::Speak])
    }

    pub fn with_permissions(
        id: impl Into<String>,
        grant: CallGrant,
        permissions: Vec<Permission>,
    ) -> Self {
        Self {
            id: id.into(),
            grant,
            permissions,
            join_failures: AtomicU32::new(0),
            join_delay_ms: AtomicU64::new(0),
            joins: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` credential requests fail.
    pub fn fail_joins(&self, count: u32) {
        self.join_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every credential request take `delay` before answering.
    pub fn delay_joins(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.join_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn join_count(&self) -> u32 {
        self.joins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallChannel for LoopbackChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn join_call(&self, region: &str) -> Result<CallGrant, TransportError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        let delay = self.join_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let failing = self
            .join_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Join(format!(
                "channel {} has no call in {region}",
                self.id
            )));
        }
        Ok(self.grant.clone())
    }

    fn have_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
