/// One touch point as reported by the platform, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(id: u64, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// The drawer element and its container. The controller is the only
/// writer of these properties while it is attached.
pub trait DrawerSurface {
    /// Current viewport width in pixels; the drawer slides across this
    /// distance.
    fn viewport_width(&self) -> f64;

    /// Horizontal translation of the drawer. `None` clears it.
    fn set_transform(&mut self, offset: Option<f64>);

    /// Animated transition length for the transform. `None` clears it.
    fn set_transition(&mut self, duration_ms: Option<u64>);

    /// Widens the container to hold both panes side by side while sliding.
    fn set_sliding_layout(&mut self, sliding: bool);

    /// Raises the drawer above its siblings.
    fn set_layered(&mut self, layered: bool);
}
