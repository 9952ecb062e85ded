//! Builders for test content and jobs

mod content;

pub use content::{ContentBuilder, patterned_bytes};
