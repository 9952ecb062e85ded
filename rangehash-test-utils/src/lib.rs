//! Test utilities for rangehash
//!
//! This crate provides an in-memory content resolver, content builders and
//! polling helpers for testing hash jobs.

pub mod builders;
pub mod mocks;
pub mod wait;

// Re-export commonly used types
pub use builders::{ContentBuilder, patterned_bytes};
pub use mocks::{FailingRange, Gate, MemoryResolver};
pub use wait::wait_for_terminal;
