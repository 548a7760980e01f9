//! GreenSub Common Utilities
//!
//! Shared infrastructure for all GreenSub crates:
//! - Error taxonomy and result aliases
//! - Job timing and stall detection for engine processes
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
