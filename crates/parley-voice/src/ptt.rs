//! Push-to-talk bridge.
//!
//! Feeds push-to-talk activations into [`VoiceSession::set_mute`]. When a
//! [`HardwarePushToTalk`] integration is present its activation and config
//! events drive the microphone; otherwise the host forwards key events to
//! [`PushToTalkBridge::handle_key`].
//!
//! Activations from either source go through one worker task, so the
//! session sees them in the order they happened.

use crate::error::VoiceError;
use crate::session::VoiceSession;
use crate::settings::SettingsStore;
use parley_types::{PushToTalkActivation, PushToTalkMode, PushToTalkUpdate};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle returned by listener registration, used to unregister.
pub type ListenerId = u64;

pub type ActivationListener = Arc<dyn Fn(PushToTalkActivation) + Send + Sync>;
pub type ConfigListener = Arc<dyn Fn(PushToTalkUpdate) + Send + Sync>;

/// Out-of-process push-to-talk integration (global key hooks, hardware
/// buttons). Its config is authoritative over local settings.
pub trait HardwarePushToTalk: Send + Sync {
    fn current_state(&self) -> PushToTalkActivation;

    fn config(&self) -> PushToTalkUpdate;

    fn on_state_change(&self, listener: ActivationListener) -> ListenerId;

    fn off_state_change(&self, id: ListenerId);

    fn on_config_change(&self, listener: ConfigListener) -> ListenerId;

    fn off_config_change(&self, id: ListenerId);

    /// Pushes locally edited fields to the integration.
    fn update_settings(&self, update: &PushToTalkUpdate);
}

struct Mounted {
    activations: mpsc::UnboundedSender<bool>,
    worker: JoinHandle<()>,
    listeners: Option<(ListenerId, ListenerId)>,
}

#[derive(Default)]
struct KeyState {
    held: bool,
    latched: bool,
    release: Option<JoinHandle<()>>,
}

pub struct PushToTalkBridge {
    session: VoiceSession,
    settings: SettingsStore,
    hardware: Option<Arc<dyn HardwarePushToTalk>>,
    mounted: Mutex<Option<Mounted>>,
    keys: Mutex<KeyState>,
}

impl std::fmt::Debug for PushToTalkBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushToTalkBridge")
            .field("hardware", &self.hardware.is_some())
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::error!("push-to-talk lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl PushToTalkBridge {
    pub fn new(
        session: VoiceSession,
        settings: SettingsStore,
        hardware: Option<Arc<dyn HardwarePushToTalk>>,
    ) -> Self {
        Self {
            session,
            settings,
            hardware,
            mounted: Mutex::new(None),
            keys: Mutex::new(KeyState::default()),
        }
    }

    pub fn has_hardware(&self) -> bool {
        self.hardware.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.mounted).is_some()
    }

    /// Starts the activation worker and, with a hardware integration,
    /// adopts its config and current activation and subscribes to both.
    /// Must run inside a tokio runtime. Mounting twice does nothing.
    pub fn mount(&self) {
        let mut mounted = lock(&self.mounted);
        if mounted.is_some() {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(apply_activations(self.session.clone(), rx));

        let listeners = self.hardware.as_ref().map(|hardware| {
            self.settings.apply_push_to_talk(&hardware.config());

            let current = hardware.current_state();
            debug!(active = current.active, "applying current push-to-talk state");
            let _ = tx.send(current.active);

            let activations = tx.clone();
            let state_id = hardware.on_state_change(Arc::new(move |activation| {
                let _ = activations.send(activation.active);
            }));

            let settings = self.settings.clone();
            let config_id = hardware.on_config_change(Arc::new(move |update| {
                settings.apply_push_to_talk(&update);
            }));

            (state_id, config_id)
        });

        info!(hardware = listeners.is_some(), "push-to-talk mounted");
        *mounted = Some(Mounted {
            activations: tx,
            worker,
            listeners,
        });
    }

    /// Unregisters every listener and stops the worker.
    pub fn unmount(&self) {
        let Some(mounted) = lock(&self.mounted).take() else {
            return;
        };

        if let (Some(hardware), Some((state_id, config_id))) = (&self.hardware, mounted.listeners)
        {
            hardware.off_state_change(state_id);
            hardware.off_config_change(config_id);
        }
        mounted.worker.abort();

        let mut keys = lock(&self.keys);
        if let Some(release) = keys.release.take() {
            release.abort();
        }
        *keys = KeyState::default();
        debug!("push-to-talk unmounted");
    }

    /// Writes a local settings edit and mirrors it to the hardware layer.
    pub fn update_settings(&self, update: &PushToTalkUpdate) {
        if update.is_empty() {
            return;
        }
        self.settings.apply_push_to_talk(update);
        if let Some(hardware) = &self.hardware {
            hardware.update_settings(update);
        }
    }

    /// Local keybind handling, used when there is no hardware integration.
    /// Returns whether the key was consumed as push-to-talk.
    pub fn handle_key(&self, key: &str, pressed: bool) -> bool {
        if self.hardware.is_some() {
            return false;
        }
        let config = self.settings.push_to_talk();
        if !config.enabled || !key.eq_ignore_ascii_case(&config.keybind) {
            return false;
        }
        if !self.session.is_in_room() {
            return false;
        }
        let Some(activations) = lock(&self.mounted)
            .as_ref()
            .map(|m| m.activations.clone())
        else {
            warn!("push-to-talk key received before mount");
            return false;
        };

        let mut keys = lock(&self.keys);
        match config.mode {
            PushToTalkMode::Hold if pressed => {
                if let Some(release) = keys.release.take() {
                    release.abort();
                }
                if !keys.held {
                    keys.held = true;
                    let _ = activations.send(true);
                }
            }
            PushToTalkMode::Hold => {
                if !keys.held {
                    return true;
                }
                keys.held = false;
                let delay = Duration::from_millis(u64::from(config.release_delay_ms));
                if delay.is_zero() {
                    let _ = activations.send(false);
                } else {
                    keys.release = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = activations.send(false);
                    }));
                }
            }
            PushToTalkMode::Toggle if pressed => {
                keys.latched = !keys.latched;
                let _ = activations.send(keys.latched);
            }
            PushToTalkMode::Toggle => {}
        }
        true
    }
}

impl Drop for PushToTalkBridge {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn apply_activations(session: VoiceSession, mut rx: mpsc::UnboundedReceiver<bool>) {
    while let Some(active) = rx.recv().await {
        match session.set_mute(active).await {
            Ok(()) => {}
            Err(VoiceError::InvalidState(reason)) => {
                debug!(active, reason, "push-to-talk activation without a call");
            }
            Err(e) => warn!(active, error = %e, "failed to apply push-to-talk activation"),
        }
    }
}
