use serde::{Deserialize, Serialize};

fn default_animation_ms() -> u64 {
    200
}

fn default_finalize_slack_ms() -> u64 {
    50
}

fn default_velocity_sample_ms() -> u64 {
    33
}

fn default_velocity_window() -> usize {
    5
}

fn default_velocity_trigger() -> f64 {
    0.3
}

fn default_trigger_x() -> f64 {
    10.0
}

fn default_cancel_y() -> f64 {
    20.0
}

fn default_phone_max_width() -> f64 {
    768.0
}

/// Gesture thresholds and timings for [`SlideDrawer`](crate::SlideDrawer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawerTuning {
    /// Length of the show/hide animation.
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
    /// Extra wait after the animation before the final layout is applied.
    #[serde(default = "default_finalize_slack_ms")]
    pub finalize_slack_ms: u64,
    /// Interval between velocity samples while dragging.
    #[serde(default = "default_velocity_sample_ms")]
    pub velocity_sample_ms: u64,
    /// Number of samples in the velocity moving average.
    #[serde(default = "default_velocity_window")]
    pub velocity_window: usize,
    /// Average speed (px/ms) above which a flick overrides the position.
    #[serde(default = "default_velocity_trigger")]
    pub velocity_trigger: f64,
    /// Horizontal travel (px) that starts a drag.
    #[serde(default = "default_trigger_x")]
    pub trigger_x: f64,
    /// Vertical travel (px) that abandons the gesture before a drag starts.
    #[serde(default = "default_cancel_y")]
    pub cancel_y: f64,
    /// Widest viewport (px) on which the drawer is active.
    #[serde(default = "default_phone_max_width")]
    pub phone_max_width: f64,
}

impl Default for DrawerTuning {
    fn default() -> Self {
        Self {
            animation_ms: default_animation_ms(),
            finalize_slack_ms: default_finalize_slack_ms(),
            velocity_sample_ms: default_velocity_sample_ms(),
            velocity_window: default_velocity_window(),
            velocity_trigger: default_velocity_trigger(),
            trigger_x: default_trigger_x(),
            cancel_y: default_cancel_y(),
            phone_max_width: default_phone_max_width(),
        }
    }
}

impl DrawerTuning {
    /// Delay from starting an animation to applying the final layout.
    pub fn finalize_after_ms(&self) -> u64 {
        self.animation_ms + self.finalize_slack_ms
    }
}
