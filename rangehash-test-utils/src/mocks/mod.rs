//! Mock implementations for testing

mod resolver;

pub use resolver::{FailingRange, Gate, MemoryResolver};
