//! Core utilities for powerscan
//!
//! This crate provides fundamental types and utilities used across the
//! scanner: frequency arithmetic and parsing, the monotonic scan clock,
//! and logging setup.

/// Git version string, set at compile time
pub const GIT_VERSION: &str = git_version::git_version!(fallback = "unknown");
/// Scanner version followed by git version string, e.g., "0.3.1-aabbccdd"
pub const STACK_VERSION: &str = const_format::formatcp!("{}-{}", env!("CARGO_PKG_VERSION"), GIT_VERSION);

pub mod clock;
pub mod debug;
pub mod freqs;

// Re-export commonly used items
pub use clock::{ClockTime, monotonic_micros, ns_to_micros};
pub use freqs::{Frequency, frequency_from_str};
