//! powerscan configuration management
//!
//! This crate provides the immutable scan configuration and the optional
//! TOML preset loader:
//! - `ScanConfig`: everything the planner and radio setup need
//! - TOML preset file parsing, overridden field-by-field from the CLI

pub mod scan_config;
pub mod toml_config;

pub use scan_config::*;
pub use toml_config::*;
