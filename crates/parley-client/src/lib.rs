//! Headless Parley client: configuration, a terminal audio backend and the
//! command loop that drives a voice session over the loopback transport.

pub mod app;
pub mod commands;
pub mod config;
pub mod headless;

pub use app::Client;
pub use commands::Command;
pub use config::{load_config, Config, ConfigError};
pub use headless::HeadlessBackend;
