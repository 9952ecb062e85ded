//! Library side of the `rangehash` binary, shared with its tests

pub mod config;
pub mod output;
pub mod poll;
pub mod terminal;
