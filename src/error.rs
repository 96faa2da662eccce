//! Unified error handling for pman
//!
//! Fatal conditions abort the batch operation that raised them; per-target
//! problems (bad pid tokens, untracked pids) are outcomes, not errors, and
//! live next to the operations that produce them.

use crate::core::process_table::TableError;
use nix::sys::signal::Signal;
use std::fmt;
use thiserror::Error;

/// Step of a launch at which resource setup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Pipe,
    PipeFlags,
    Fork,
    Handshake,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SetupStage::Pipe => "creating the exec pipe",
            SetupStage::PipeFlags => "marking the exec pipe close-on-exec",
            SetupStage::Fork => "creating the child process",
            SetupStage::Handshake => "waiting for the exec handshake",
        };
        f.write_str(stage)
    }
}

/// What a failed status query was asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Pid(u32),
    AnyChild,
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitTarget::Pid(pid) => write!(f, "pid {}", pid),
            WaitTarget::AnyChild => f.write_str("any child"),
        }
    }
}

/// Main error type for the supervision engine
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Pipe, flag or fork problems; nothing was left running
    #[error("Aborting launch while {stage}: {source}")]
    SetupFailed {
        stage: SetupStage,
        #[source]
        source: nix::Error,
    },

    /// The child was created but could not replace its image; it has been reaped
    #[error("Failed to start '{program}' (pid={pid}): exec failed, is the program valid?")]
    ExecFailed { program: String, pid: u32 },

    /// The non-blocking status primitive itself errored
    #[error("Status query for {target} failed: {source}")]
    QueryFailed {
        target: WaitTarget,
        #[source]
        source: nix::Error,
    },

    /// A confirmed-alive process could not be signalled
    #[error("Sending {} to pid {pid} failed: {source}", signal.as_str())]
    DeliveryFailed {
        pid: u32,
        signal: Signal,
        #[source]
        source: nix::Error,
    },

    /// The command line handed to the launcher is unusable
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Process table error: {0}")]
    Table(#[from] TableError),
}

/// Coarse classification used for user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Setup,
    Exec,
    Query,
    Delivery,
    Input,
    Internal,
}

impl SupervisorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SupervisorError::SetupFailed { .. } => ErrorCategory::Setup,
            SupervisorError::ExecFailed { .. } => ErrorCategory::Exec,
            SupervisorError::QueryFailed { .. } => ErrorCategory::Query,
            SupervisorError::DeliveryFailed { .. } => ErrorCategory::Delivery,
            SupervisorError::InvalidCommand(_) => ErrorCategory::Input,
            SupervisorError::Table(_) => ErrorCategory::Internal,
        }
    }

    /// Fatal errors abandon the rest of the current batch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Query | ErrorCategory::Delivery | ErrorCategory::Internal
        )
    }

    /// Message shown at the prompt
    pub fn user_message(&self) -> String {
        if self.is_fatal() {
            format!("Aborting all: {}", self)
        } else {
            self.to_string()
        }
    }
}

pub type PmanResult<T> = Result<T, SupervisorError>;
