//! # Configuration
//!
//! Controller-level configuration.
//!
//! - `controller`: settings loaded from environment variables with CLI overrides

mod controller;

pub use controller::{ControllerConfig, LogFormat, SharedControllerConfig};
