//! # SVO Common Library
//!
//! Shared code for the service-order heatmap tools including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Atomic file writes
//! - Calendar and timestamp helpers

pub mod config;
pub mod error;
pub mod fs_utils;
pub mod time;

pub use error::{Error, Result};
