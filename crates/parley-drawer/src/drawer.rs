//! Horizontal slide gesture controller.
//!
//! The controller is sans-IO: every input carries the host's monotonic
//! clock in milliseconds, and timed work (velocity sampling, deferred
//! programmatic shows, finalising an animation) runs from [`SlideDrawer::poll`].
//! Hosts call `poll` once [`SlideDrawer::next_deadline`] has passed; inputs
//! also run any work that has come due.
//!
//! The drawer offset lives in `[-width, 0]`. An offset of `-width` means
//! the drawer is shown.

use crate::surface::{DrawerSurface, TouchPoint};
use crate::tuning::DrawerTuning;
use tracing::debug;

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A finger is down but has not moved far enough horizontally.
    Tracking,
    /// The drawer follows the finger.
    Dragging,
    /// Moving to a final position under a timed transition.
    Animating,
}

type StateCallback = Box<dyn FnMut(bool) + Send>;

struct Track {
    id: u64,
    x: f64,
    y: f64,
    triggered: bool,
    prev: Option<(f64, u64)>,
    latest: Option<(f64, u64)>,
    velocities: Vec<f64>,
    next_slot: usize,
    next_sample_at: u64,
}

impl Track {
    fn new(point: &TouchPoint) -> Self {
        Self {
            id: point.id,
            x: point.x,
            y: point.y,
            triggered: false,
            prev: None,
            latest: None,
            velocities: Vec::new(),
            next_slot: 0,
            next_sample_at: 0,
        }
    }

    /// Records the speed since the previous sample into the moving window.
    fn sample_velocity(&mut self, window: usize) {
        let (Some((x, t)), Some((prev_x, prev_t))) = (self.latest, self.prev) else {
            return;
        };
        let velocity = if t == prev_t {
            0.0
        } else {
            (x - prev_x) / (t - prev_t) as f64
        };
        self.prev = self.latest;

        if self.velocities.len() < window.max(1) {
            self.velocities.push(velocity);
        } else {
            self.velocities[self.next_slot] = velocity;
        }
        self.next_slot = (self.next_slot + 1) % window.max(1);
    }

    fn average_velocity(&self) -> f64 {
        if self.velocities.is_empty() {
            return 0.0;
        }
        self.velocities.iter().sum::<f64>() / self.velocities.len() as f64
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    at: u64,
    show: bool,
}

/// Drives a drawer that slides in from the side on a horizontal swipe.
pub struct SlideDrawer<S: DrawerSurface> {
    surface: S,
    tuning: DrawerTuning,
    enabled: bool,
    offset: f64,
    touch: Option<Track>,
    pending_show: Option<Scheduled>,
    finalize: Option<Scheduled>,
    on_state_changed: Option<StateCallback>,
}

impl<S: DrawerSurface> std::fmt::Debug for SlideDrawer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideDrawer")
            .field("enabled", &self.enabled)
            .field("offset", &self.offset)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl<S: DrawerSurface> SlideDrawer<S> {
    /// Attaches to `surface`, enabling the drawer if the viewport is
    /// phone-sized.
    pub fn new(surface: S, tuning: DrawerTuning) -> Self {
        let mut drawer = Self {
            surface,
            tuning,
            enabled: false,
            offset: 0.0,
            touch: None,
            pending_show: None,
            finalize: None,
            on_state_changed: None,
        };
        let width = drawer.surface.viewport_width();
        drawer.set_enabled(width <= drawer.tuning.phone_max_width);
        drawer
    }

    /// Registers a callback invoked with the enabled flag on every
    /// [`set_enabled`](Self::set_enabled).
    pub fn set_state_callback(&mut self, callback: impl FnMut(bool) + Send + 'static) {
        self.on_state_changed = Some(Box::new(callback));
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn tuning(&self) -> &DrawerTuning {
        &self.tuning
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_shown(&self) -> bool {
        self.offset != 0.0
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn phase(&self) -> Phase {
        match &self.touch {
            Some(track) if track.triggered => Phase::Dragging,
            Some(_) => Phase::Tracking,
            None if self.finalize.is_some() || self.pending_show.is_some() => Phase::Animating,
            None => Phase::Idle,
        }
    }

    /// Earliest time at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let sample = self
            .touch
            .as_ref()
            .filter(|t| t.triggered)
            .map(|t| t.next_sample_at);
        [
            sample,
            self.pending_show.map(|s| s.at),
            self.finalize.map(|s| s.at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Runs every timer due at or before `now`.
    pub fn poll(&mut self, now: u64) {
        let window = self.tuning.velocity_window;
        let step = self.tuning.velocity_sample_ms.max(1);
        if let Some(track) = self.touch.as_mut().filter(|t| t.triggered) {
            while track.next_sample_at <= now {
                track.sample_velocity(window);
                track.next_sample_at += step;
            }
        }

        if let Some(pending) = self.pending_show.filter(|p| p.at <= now) {
            self.pending_show = None;
            self.animate_to(pending.show, now);
        }

        if let Some(finalize) = self.finalize.filter(|f| f.at <= now) {
            self.finalize = None;
            self.surface.set_transition(None);
            self.surface.set_transform(None);
            self.surface.set_sliding_layout(!finalize.show);
            debug!(shown = finalize.show, "drawer settled");
        }
    }

    /// `touches` holds every finger currently on the screen.
    pub fn touch_start(&mut self, touches: &[TouchPoint], now: u64) {
        self.poll(now);
        if touches.len() > 1 {
            self.end_touch();
            return;
        }
        if self.touch.is_some() || !self.enabled {
            return;
        }
        let Some(point) = touches.first() else {
            return;
        };
        debug!(x = point.x, y = point.y, "drawer touch start");
        self.touch = Some(Track::new(point));
    }

    /// `changed` holds the touches that moved. Returns whether the host
    /// should suppress default scrolling and clicks for this event.
    pub fn touch_move(&mut self, changed: &[TouchPoint], now: u64) -> bool {
        self.track(changed, now, false)
    }

    /// `changed` holds the touches that lifted. Returns whether the host
    /// should suppress default scrolling and clicks for this event.
    pub fn touch_end(&mut self, changed: &[TouchPoint], now: u64) -> bool {
        self.track(changed, now, true)
    }

    fn track(&mut self, changed: &[TouchPoint], now: u64, is_end: bool) -> bool {
        self.poll(now);
        let width = self.surface.viewport_width();

        let Some(track) = self.touch.as_mut() else {
            return false;
        };
        let Some(point) = changed.iter().find(|p| p.id == track.id) else {
            return false;
        };
        let dy = point.y - track.y;
        let raw_dx = point.x - track.x;

        if !track.triggered && dy.abs() > self.tuning.cancel_y {
            debug!(dy, "drawer gesture cancelled by vertical movement");
            self.end_touch();
            return false;
        }
        if !track.triggered && raw_dx.abs() <= self.tuning.trigger_x {
            if is_end {
                self.end_touch();
            }
            return false;
        }

        let started = !track.triggered;
        if started {
            track.prev = Some((raw_dx, now));
            track.triggered = true;
            track.next_sample_at = now + self.tuning.velocity_sample_ms.max(1);
        } else {
            track.latest = Some((raw_dx, now));
        }
        let velocity = is_end.then(|| {
            track.sample_velocity(self.tuning.velocity_window);
            track.average_velocity()
        });

        if started {
            debug!(dx = raw_dx, "drawer drag started");
            self.clear_animation();
        }
        let dx = (self.offset + raw_dx).min(0.0).max(-width);
        self.surface.set_transform(Some(dx));

        if let Some(velocity) = velocity {
            let trigger = self.tuning.velocity_trigger;
            let show = if velocity > trigger {
                false
            } else if velocity < -trigger {
                true
            } else {
                dx < -width / 2.0
            };
            debug!(dx, velocity, shown = show, "drawer drag ended");
            self.animate_to(show, now);
            self.end_touch();
        }
        true
    }

    fn end_touch(&mut self) {
        self.touch = None;
    }

    /// Drops any transition and transform, keeping the sliding layout.
    fn clear_animation(&mut self) {
        self.surface.set_sliding_layout(true);
        self.surface.set_transition(None);
        self.surface.set_transform(None);
        self.finalize = None;
    }

    fn animate_to(&mut self, show: bool, now: u64) {
        self.surface.set_sliding_layout(true);
        self.offset = if show {
            -self.surface.viewport_width()
        } else {
            0.0
        };
        self.surface.set_transition(Some(self.tuning.animation_ms));
        self.surface.set_transform(Some(self.offset));
        self.finalize = Some(Scheduled {
            at: now + self.tuning.finalize_after_ms(),
            show,
        });
    }

    /// Turns gesture handling on or off. Enabling snaps the drawer closed
    /// and drops any gesture in progress; disabling shows the content with
    /// a normal layout.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.surface.set_layered(enabled);
            self.clear_animation();
            self.pending_show = None;
            self.end_touch();
            if !enabled {
                self.surface.set_sliding_layout(false);
            }
            self.offset = 0.0;
            debug!(enabled, "drawer enabled state changed");
        }
        self.enabled = enabled;
        if let Some(callback) = self.on_state_changed.as_mut() {
            callback(enabled);
        }
    }

    /// Re-evaluates the phone breakpoint after a viewport resize.
    pub fn viewport_changed(&mut self, width: f64) {
        let enabled = width <= self.tuning.phone_max_width;
        if enabled != self.enabled {
            self.set_enabled(enabled);
        }
    }

    /// Programmatically shows or hides the drawer. Refused (returns
    /// `false`) while disabled, while a drag is in progress or while an
    /// animation is running.
    pub fn set_shown(&mut self, show: bool, now: u64) -> bool {
        self.poll(now);
        let dragging = self.touch.as_ref().is_some_and(|t| t.triggered);
        if !self.enabled || dragging || self.finalize.is_some() || self.pending_show.is_some() {
            return false;
        }
        if self.is_shown() != show {
            self.surface.set_sliding_layout(true);
            self.surface.set_transform(Some(self.offset));
            self.pending_show = Some(Scheduled { at: now, show });
        }
        true
    }

    /// Disables the controller and hands the surface back.
    pub fn detach(mut self) -> S {
        self.set_enabled(false);
        self.on_state_changed = None;
        self.surface
    }
}
