//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Strongly typed named and range-checked values
//! - Lifetime accounting for instrumented types
//! - Logging utilities

pub mod counters;
pub mod logging;
pub mod math;
pub mod named;
pub mod ranged;
