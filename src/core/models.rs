//! Data model shared by every supervision component

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One supervised child, owned by the process table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedProcess {
    pub pid: u32,
    /// Program token used to launch it, not the resolved path
    pub name: String,
    pub argv: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl TrackedProcess {
    pub fn new(pid: u32, argv: Vec<String>) -> Self {
        let name = argv.first().cloned().unwrap_or_default();
        Self {
            pid,
            name,
            argv,
            started_at: Utc::now(),
        }
    }

    /// Full command line as typed
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Why a child stopped existing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "lowercase")]
pub enum TerminationReason {
    Killed { signal: i32 },
    Exited { code: i32 },
}

impl TerminationReason {
    pub fn is_killed(&self) -> bool {
        matches!(self, TerminationReason::Killed { .. })
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Killed { .. } => f.write_str("Killed"),
            TerminationReason::Exited { .. } => f.write_str("Exited"),
        }
    }
}

/// Emitted whenever a tracked entry leaves the table because its process ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationEvent {
    pub pid: u32,
    pub name: String,
    #[serde(flatten)]
    pub reason: TerminationReason,
}

impl TerminationEvent {
    pub fn from_entry(entry: TrackedProcess, reason: TerminationReason) -> Self {
        Self {
            pid: entry.pid,
            name: entry.name,
            reason,
        }
    }
}

/// Per-target problems; never fatal to a batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid pid '{0}'")]
    Invalid(String),
    #[error("pid {0} is not a tracked process")]
    Unknown(u32),
}

/// Decode a pid token typed at the prompt
///
/// Only positive values that fit a `pid_t` are accepted; zero and negative
/// values would address process groups.
pub fn parse_pid(token: &str) -> Result<u32, TargetError> {
    let invalid = || TargetError::Invalid(token.to_string());
    let value: i64 = token.trim().parse().map_err(|_| invalid())?;
    if value <= 0 || value > i64::from(i32::MAX) {
        return Err(invalid());
    }
    u32::try_from(value).map_err(|_| invalid())
}
