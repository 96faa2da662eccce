//! Platform layer
//!
//! Everything that talks to the kernel about child processes goes through
//! here. The non-blocking status queries and signal delivery sit behind the
//! [`ProcessOs`] trait so dispatch and reaping logic can be exercised without
//! real children.

use crate::core::models::TerminationReason;
use nix::sys::signal::Signal;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{
    clock_ticks_per_second, discard_child, reap_blocking, spawn_with_handshake, Handshake,
    UnixProcessOs, EXEC_FAILED_EXIT_CODE, EXEC_FAILED_MARKER,
};

/// Result of a non-blocking status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStatus {
    /// Nothing has terminated
    Running,
    /// The child is gone and has been reaped by this query
    Terminated {
        pid: u32,
        reason: TerminationReason,
    },
    /// A status change that is not a termination (stop/continue/ptrace)
    Unexpected { pid: u32, status: String },
}

/// Non-blocking status queries and signal delivery for supervised children
#[cfg_attr(test, mockall::automock)]
pub trait ProcessOs {
    /// Check one child without blocking; a terminated child is reaped
    fn poll_child(&self, pid: u32) -> nix::Result<ChildStatus>;

    /// Check whether any child has terminated, without blocking
    fn poll_any_child(&self) -> nix::Result<ChildStatus>;

    fn send_signal(&self, pid: u32, signal: Signal) -> nix::Result<()>;
}
