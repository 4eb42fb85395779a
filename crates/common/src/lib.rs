//! Cropaway Common Utilities
//!
//! Shared infrastructure for all Cropaway crates:
//! - Error types and result aliases
//! - Timecode and frame-rate utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
