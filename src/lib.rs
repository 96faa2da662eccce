//! pman library
//!
//! Interactive background process manager: launches children with exec
//! failure detection, signals and reaps them without blocking, and reads
//! per-process statistics from procfs.

#[cfg(not(unix))]
compile_error!("pman only supports Unix-like systems");

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod launcher;
pub mod platform;
pub mod reaper;
pub mod signal;
pub mod stats;
pub mod supervisor;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::models::*;
pub use core::process_table::{ProcessTable, TableError};
pub use error::{ErrorCategory, PmanResult, SupervisorError};
pub use reaper::{SweepEvent, SweepReport};
pub use signal::{DispatchOutcome, DispatchReport};
pub use stats::{StatsOutcome, StatsRecord, StatsReporter};
pub use supervisor::Supervisor;
