//! Interactive command handling
//!
//! Parses prompt lines, runs them against the supervisor and renders the
//! results.

pub mod parser;
pub mod render;
pub mod repl;

pub use parser::*;
