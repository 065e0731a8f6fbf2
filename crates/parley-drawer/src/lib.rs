//! Touch-driven slide drawer for narrow viewports.
//!
//! On phone-sized screens the sidebar and the main content sit side by
//! side in a double-width container; a horizontal swipe slides between
//! them. [`SlideDrawer`] turns raw touch input into drawer positions and
//! hands every element change to a [`DrawerSurface`].

mod drawer;
mod surface;
mod tuning;

pub use drawer::{Phase, SlideDrawer};
pub use surface::{DrawerSurface, TouchPoint};
pub use tuning::DrawerTuning;
