//! Observable settings store.
//!
//! Wraps a [`VoiceSettings`] value in a `watch` channel so readers always
//! see the latest write and can subscribe to changes. Persistence is the
//! embedding application's job: it seeds the store with
//! [`VoiceSettings::clean`] output and subscribes to write changes back.

use parley_types::{Cue, PushToTalkConfig, PushToTalkMode, PushToTalkUpdate, VoiceSettings};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: watch::Sender<VoiceSettings>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(VoiceSettings::default())
    }
}

impl SettingsStore {
    pub fn new(initial: VoiceSettings) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Returns a snapshot of the current settings.
    pub fn get(&self) -> VoiceSettings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceSettings> {
        self.tx.subscribe()
    }

    /// Applies `f` to the settings, notifying subscribers only on change.
    pub fn update(&self, f: impl FnOnce(&mut VoiceSettings)) {
        self.tx.send_if_modified(|settings| {
            let before = settings.clone();
            f(settings);
            *settings != before
        });
    }

    pub fn preferred_audio_input_device(&self) -> Option<String> {
        self.tx.borrow().preferred_audio_input_device.clone()
    }

    pub fn set_preferred_audio_input_device(&self, device: Option<String>) {
        self.update(|s| s.preferred_audio_input_device = device);
    }

    pub fn preferred_audio_output_device(&self) -> Option<String> {
        self.tx.borrow().preferred_audio_output_device.clone()
    }

    pub fn set_preferred_audio_output_device(&self, device: Option<String>) {
        self.update(|s| s.preferred_audio_output_device = device);
    }

    pub fn echo_cancellation(&self) -> bool {
        self.tx.borrow().echo_cancellation
    }

    pub fn set_echo_cancellation(&self, enabled: bool) {
        self.update(|s| s.echo_cancellation = enabled);
    }

    pub fn noise_suppression(&self) -> bool {
        self.tx.borrow().noise_suppression
    }

    pub fn set_noise_suppression(&self, enabled: bool) {
        self.update(|s| s.noise_suppression = enabled);
    }

    /// Playback volume for a remote user. Defaults to 1.0.
    pub fn user_volume(&self, user_id: &str) -> f32 {
        self.tx
            .borrow()
            .user_volumes
            .get(user_id)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn set_user_volume(&self, user_id: &str, volume: f32) {
        self.update(|s| {
            s.user_volumes.insert(user_id.to_string(), volume);
        });
    }

    pub fn user_muted(&self, user_id: &str) -> bool {
        self.tx
            .borrow()
            .user_mutes
            .get(user_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn set_user_muted(&self, user_id: &str, muted: bool) {
        self.update(|s| {
            if muted {
                s.user_mutes.insert(user_id.to_string(), true);
            } else {
                s.user_mutes.remove(user_id);
            }
        });
    }

    pub fn push_to_talk(&self) -> PushToTalkConfig {
        self.tx.borrow().push_to_talk.clone()
    }

    pub fn push_to_talk_enabled(&self) -> bool {
        self.tx.borrow().push_to_talk.enabled
    }

    pub fn set_push_to_talk_enabled(&self, enabled: bool) {
        self.update(|s| s.push_to_talk.enabled = enabled);
    }

    pub fn push_to_talk_mode(&self) -> PushToTalkMode {
        self.tx.borrow().push_to_talk.mode
    }

    pub fn push_to_talk_notification_sounds(&self) -> bool {
        self.tx.borrow().push_to_talk.notification_sounds
    }

    /// Merges a partial push-to-talk config. Last writer wins per field.
    pub fn apply_push_to_talk(&self, update: &PushToTalkUpdate) {
        debug!(?update, "applying push-to-talk config");
        self.tx
            .send_if_modified(|settings| settings.push_to_talk.apply(update));
    }

    pub fn notification_sounds_enabled(&self) -> bool {
        self.tx.borrow().notification_sounds_enabled
    }

    pub fn set_notification_sounds_enabled(&self, enabled: bool) {
        self.update(|s| s.notification_sounds_enabled = enabled);
    }

    pub fn notification_volume(&self) -> f32 {
        self.tx.borrow().notification_volume
    }

    pub fn set_notification_volume(&self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.update(|s| s.notification_volume = volume);
    }

    pub fn cue_enabled(&self, cue: Cue) -> bool {
        self.tx.borrow().sounds.get(cue)
    }

    pub fn set_cue_enabled(&self, cue: Cue, enabled: bool) {
        self.update(|s| s.sounds.set(cue, enabled));
    }

    pub fn auto_reconnect(&self) -> bool {
        self.tx.borrow().auto_reconnect
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.update(|s| s.auto_reconnect = enabled);
    }
}
