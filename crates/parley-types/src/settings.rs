//! Voice settings payload.
//!
//! The settings store that persists this struct lives outside the voice
//! core. [`VoiceSettings::clean`] turns whatever the store hands back into a
//! compliant value so that a corrupt or outdated entry never reaches the
//! session controller.

use crate::ptt::{PushToTalkConfig, PushToTalkMode, MAX_RELEASE_DELAY_MS};
use crate::Cue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-cue enable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueToggles {
    pub join_call: bool,
    pub leave_call: bool,
    pub someone_joined: bool,
    pub someone_left: bool,
    pub mute: bool,
    pub unmute: bool,
    pub receive_message: bool,
    pub disconnect: bool,
}

impl Default for CueToggles {
    fn default() -> Self {
        Self {
            join_call: true,
            leave_call: true,
            someone_joined: true,
            someone_left: true,
            mute: true,
            unmute: true,
            receive_message: true,
            disconnect: true,
        }
    }
}

impl CueToggles {
    pub fn get(&self, cue: Cue) -> bool {
        *self.slot(cue)
    }

    pub fn set(&mut self, cue: Cue, enabled: bool) {
        *self.slot_mut(cue) = enabled;
    }

    fn slot(&self, cue: Cue) -> &bool {
        match cue {
            Cue::JoinCall => &self.join_call,
            Cue::LeaveCall => &self.leave_call,
            Cue::SomeoneJoined => &self.someone_joined,
            Cue::SomeoneLeft => &self.someone_left,
            Cue::Mute => &self.mute,
            Cue::Unmute => &self.unmute,
            Cue::ReceiveMessage => &self.receive_message,
            Cue::Disconnect => &self.disconnect,
        }
    }

    fn slot_mut(&mut self, cue: Cue) -> &mut bool {
        match cue {
            Cue::JoinCall => &mut self.join_call,
            Cue::LeaveCall => &mut self.leave_call,
            Cue::SomeoneJoined => &mut self.someone_joined,
            Cue::SomeoneLeft => &mut self.someone_left,
            Cue::Mute => &mut self.mute,
            Cue::Unmute => &mut self.unmute,
            Cue::ReceiveMessage => &mut self.receive_message,
            Cue::Disconnect => &mut self.disconnect,
        }
    }
}

/// Local voice preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub preferred_audio_input_device: Option<String>,
    pub preferred_audio_output_device: Option<String>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub input_volume: f32,
    pub output_volume: f32,
    /// Per-user playback volume, keyed by user ID.
    pub user_volumes: BTreeMap<String, f32>,
    /// Users muted locally. Only `true` entries are kept.
    pub user_mutes: BTreeMap<String, bool>,
    pub push_to_talk: PushToTalkConfig,
    pub notification_sounds_enabled: bool,
    /// Notification cue volume in `[0, 1]`.
    pub notification_volume: f32,
    pub sounds: CueToggles,
    /// Retry dropped calls automatically.
    pub auto_reconnect: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            preferred_audio_input_device: None,
            preferred_audio_output_device: None,
            echo_cancellation: true,
            noise_suppression: true,
            input_volume: 1.0,
            output_volume: 1.0,
            user_volumes: BTreeMap::new(),
            user_mutes: BTreeMap::new(),
            push_to_talk: PushToTalkConfig::default(),
            notification_sounds_enabled: true,
            notification_volume: 0.75,
            sounds: CueToggles::default(),
            auto_reconnect: true,
        }
    }
}

impl VoiceSettings {
    /// Builds compliant settings from loosely typed stored data.
    ///
    /// Starts from the defaults and copies over each field whose stored value
    /// has the expected type. Release delays outside `0..=5000` are dropped,
    /// the notification volume is clamped to `[0, 1]` and only `true` user
    /// mutes survive.
    pub fn clean(input: &Value) -> Self {
        let mut data = Self::default();
        let Some(obj) = input.as_object() else {
            return data;
        };

        if let Some(device) = obj.get("preferred_audio_input_device").and_then(Value::as_str) {
            data.preferred_audio_input_device = Some(device.to_string());
        }
        if let Some(device) = obj
            .get("preferred_audio_output_device")
            .and_then(Value::as_str)
        {
            data.preferred_audio_output_device = Some(device.to_string());
        }
        if let Some(v) = obj.get("echo_cancellation").and_then(Value::as_bool) {
            data.echo_cancellation = v;
        }
        if let Some(v) = obj.get("noise_suppression").and_then(Value::as_bool) {
            data.noise_suppression = v;
        }
        if let Some(v) = obj.get("input_volume").and_then(Value::as_f64) {
            data.input_volume = v as f32;
        }
        if let Some(v) = obj.get("output_volume").and_then(Value::as_f64) {
            data.output_volume = v as f32;
        }

        if let Some(volumes) = obj.get("user_volumes").and_then(Value::as_object) {
            for (user, volume) in volumes {
                if let Some(volume) = volume.as_f64() {
                    data.user_volumes.insert(user.clone(), volume as f32);
                }
            }
        }
        if let Some(mutes) = obj.get("user_mutes").and_then(Value::as_object) {
            for (user, muted) in mutes {
                if muted.as_bool() == Some(true) {
                    data.user_mutes.insert(user.clone(), true);
                }
            }
        }

        if let Some(ptt) = obj.get("push_to_talk").and_then(Value::as_object) {
            let config = &mut data.push_to_talk;
            if let Some(v) = ptt.get("enabled").and_then(Value::as_bool) {
                config.enabled = v;
            }
            if let Some(v) = ptt.get("keybind").and_then(Value::as_str) {
                config.keybind = v.to_string();
            }
            match ptt.get("mode").and_then(Value::as_str) {
                Some("hold") => config.mode = PushToTalkMode::Hold,
                Some("toggle") => config.mode = PushToTalkMode::Toggle,
                _ => {}
            }
            if let Some(v) = ptt.get("release_delay_ms").and_then(Value::as_u64) {
                if v <= u64::from(MAX_RELEASE_DELAY_MS) {
                    config.release_delay_ms = v as u32;
                }
            }
            if let Some(v) = ptt.get("notification_sounds").and_then(Value::as_bool) {
                config.notification_sounds = v;
            }
        }

        if let Some(v) = obj.get("notification_sounds_enabled").and_then(Value::as_bool) {
            data.notification_sounds_enabled = v;
        }
        if let Some(v) = obj.get("notification_volume").and_then(Value::as_f64) {
            data.notification_volume = (v as f32).clamp(0.0, 1.0);
        }
        if let Some(sounds) = obj.get("sounds").and_then(Value::as_object) {
            for cue in Cue::ALL {
                if let Some(v) = sounds.get(cue.name()).and_then(Value::as_bool) {
                    data.sounds.set(cue, v);
                }
            }
        }
        if let Some(v) = obj.get("auto_reconnect").and_then(Value::as_bool) {
            data.auto_reconnect = v;
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_of_non_object_yields_defaults() {
        assert_eq!(VoiceSettings::clean(&json!(null)), VoiceSettings::default());
        assert_eq!(VoiceSettings::clean(&json!([1, 2])), VoiceSettings::default());
    }

    #[test]
    fn clean_keeps_well_typed_fields() {
        let settings = VoiceSettings::clean(&json!({
            "preferred_audio_input_device": "mic-1",
            "preferred_audio_output_device": "speakers-2",
            "echo_cancellation": false,
            "push_to_talk": { "enabled": true, "keybind": "F13", "mode": "toggle" },
            "auto_reconnect": false,
        }));

        assert_eq!(settings.preferred_audio_input_device.as_deref(), Some("mic-1"));
        assert_eq!(settings.preferred_audio_output_device.as_deref(), Some("speakers-2"));
        assert!(!settings.echo_cancellation);
        assert!(settings.noise_suppression);
        assert!(settings.push_to_talk.enabled);
        assert_eq!(settings.push_to_talk.keybind, "F13");
        assert_eq!(settings.push_to_talk.mode, PushToTalkMode::Toggle);
        assert!(!settings.auto_reconnect);
    }

    #[test]
    fn clean_discards_wrong_types_and_ranges() {
        let settings = VoiceSettings::clean(&json!({
            "echo_cancellation": "yes",
            "push_to_talk": { "mode": "shout", "release_delay_ms": 9000 },
            "notification_volume": 3.5,
            "user_mutes": { "alice": true, "bob": false, "carol": "true" },
            "user_volumes": { "alice": 0.5, "bob": "loud" },
        }));

        assert!(settings.echo_cancellation);
        assert_eq!(settings.push_to_talk.mode, PushToTalkMode::Hold);
        assert_eq!(settings.push_to_talk.release_delay_ms, 250);
        assert_eq!(settings.notification_volume, 1.0);
        assert_eq!(settings.user_mutes.len(), 1);
        assert!(settings.user_mutes["alice"]);
        assert_eq!(settings.user_volumes.len(), 1);
    }

    #[test]
    fn clean_reads_individual_cue_toggles() {
        let settings = VoiceSettings::clean(&json!({
            "sounds": { "mute": false, "someone_left": false, "bogus": false }
        }));
        assert!(!settings.sounds.get(Cue::Mute));
        assert!(!settings.sounds.get(Cue::SomeoneLeft));
        assert!(settings.sounds.get(Cue::Unmute));
    }

    #[test]
    fn cue_toggles_set_and_get() {
        let mut toggles = CueToggles::default();
        for cue in Cue::ALL {
            assert!(toggles.get(cue));
        }
        toggles.set(Cue::Disconnect, false);
        assert!(!toggles.get(Cue::Disconnect));
        assert!(toggles.get(Cue::LeaveCall));
    }

    #[test]
    fn settings_parse_from_toml_style_defaults() {
        let settings: VoiceSettings = serde_json::from_value(json!({
            "push_to_talk": { "enabled": true }
        }))
        .unwrap();
        assert!(settings.push_to_talk.enabled);
        assert_eq!(settings.push_to_talk.keybind, "V");
        assert_eq!(settings.notification_volume, 0.75);
    }
}
