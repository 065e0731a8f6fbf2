//! Push-to-talk configuration and activation types.

use serde::{Deserialize, Serialize};

/// Upper bound for the push-to-talk release delay, in milliseconds.
pub const MAX_RELEASE_DELAY_MS: u32 = 5000;

/// How the push-to-talk key drives the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushToTalkMode {
    /// Microphone is live only while the key is held.
    #[default]
    Hold,
    /// Each key press flips the microphone on or off.
    Toggle,
}

/// Complete push-to-talk configuration as held in local settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushToTalkConfig {
    pub enabled: bool,
    pub keybind: String,
    pub mode: PushToTalkMode,
    /// Grace period after key release before the microphone is muted again.
    pub release_delay_ms: u32,
    /// Play mute/unmute cues for push-to-talk driven changes.
    pub notification_sounds: bool,
}

impl Default for PushToTalkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keybind: "V".to_string(),
            mode: PushToTalkMode::Hold,
            release_delay_ms: 250,
            notification_sounds: false,
        }
    }
}

impl PushToTalkConfig {
    /// Merges the fields present in `update` into this config.
    ///
    /// Absent fields are left untouched and an out-of-range release delay is
    /// ignored. Returns whether anything changed.
    pub fn apply(&mut self, update: &PushToTalkUpdate) -> bool {
        let before = self.clone();

        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(keybind) = &update.keybind {
            self.keybind = keybind.clone();
        }
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(delay) = update.release_delay {
            if delay <= MAX_RELEASE_DELAY_MS {
                self.release_delay_ms = delay;
            }
        }
        if let Some(sounds) = update.notification_sounds {
            self.notification_sounds = sounds;
        }

        *self != before
    }
}

/// Partial push-to-talk configuration exchanged with the hardware
/// integration layer. Every field is optional; only present fields apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushToTalkUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keybind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PushToTalkMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_sounds: Option<bool>,
}

impl PushToTalkUpdate {
    /// Whether the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&PushToTalkConfig> for PushToTalkUpdate {
    fn from(config: &PushToTalkConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            keybind: Some(config.keybind.clone()),
            mode: Some(config.mode),
            release_delay: Some(config.release_delay_ms),
            notification_sounds: Some(config.notification_sounds),
        }
    }
}

/// Activation signal from the push-to-talk source. `active` means the key is
/// pressed and the microphone should be live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PushToTalkActivation {
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PushToTalkConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.keybind, "V");
        assert_eq!(config.mode, PushToTalkMode::Hold);
        assert_eq!(config.release_delay_ms, 250);
        assert!(!config.notification_sounds);
    }

    #[test]
    fn partial_update_only_overwrites_present_fields() {
        let mut config = PushToTalkConfig::default();
        let update = PushToTalkUpdate {
            enabled: Some(true),
            mode: Some(PushToTalkMode::Toggle),
            ..Default::default()
        };

        assert!(config.apply(&update));
        assert!(config.enabled);
        assert_eq!(config.mode, PushToTalkMode::Toggle);
        assert_eq!(config.keybind, "V");
        assert_eq!(config.release_delay_ms, 250);
    }

    #[test]
    fn out_of_range_release_delay_is_ignored() {
        let mut config = PushToTalkConfig::default();
        let update = PushToTalkUpdate {
            release_delay: Some(MAX_RELEASE_DELAY_MS + 1),
            ..Default::default()
        };
        assert!(!config.apply(&update));
        assert_eq!(config.release_delay_ms, 250);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut config = PushToTalkConfig::default();
        assert!(PushToTalkUpdate::default().is_empty());
        assert!(!config.apply(&PushToTalkUpdate::default()));
    }

    #[test]
    fn update_uses_camel_case_on_the_wire() {
        let update: PushToTalkUpdate =
            serde_json::from_str(r#"{"releaseDelay": 400, "mode": "toggle"}"#).unwrap();
        assert_eq!(update.release_delay, Some(400));
        assert_eq!(update.mode, Some(PushToTalkMode::Toggle));
        assert_eq!(update.enabled, None);

        let json = serde_json::to_string(&PushToTalkUpdate {
            notification_sounds: Some(true),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"notificationSounds":true}"#);
    }
}
