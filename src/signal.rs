//! Signal dispatch to tracked children
//!
//! Every target is checked with a non-blocking wait before anything is sent,
//! so a child that already died is reaped and reported instead of having its
//! (possibly recycled) pid signalled.

use crate::core::models::{parse_pid, TerminationEvent};
use crate::core::process_table::ProcessTable;
use crate::error::{SupervisorError, WaitTarget};
use crate::platform::{ChildStatus, ProcessOs};
use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

/// What happened to one target token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { pid: u32, signal: Signal },
    /// The target had already terminated; it was reaped and removed instead
    AlreadyTerminated(TerminationEvent),
    UnknownTarget { pid: u32 },
    InvalidTarget { token: String },
}

#[derive(Debug)]
pub struct DispatchReport {
    pub signal: Signal,
    pub outcomes: Vec<DispatchOutcome>,
    /// Set when a fatal error abandoned the remaining targets
    pub aborted: Option<SupervisorError>,
}

impl DispatchReport {
    fn new(signal: Signal) -> Self {
        Self {
            signal,
            outcomes: Vec::new(),
            aborted: None,
        }
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, DispatchOutcome::Delivered { .. }))
            .count()
    }
}

/// Send `signal` to every tracked target in `targets`
pub fn dispatch<O, S>(
    table: &mut ProcessTable,
    os: &O,
    targets: &[S],
    signal: Signal,
) -> DispatchReport
where
    O: ProcessOs + ?Sized,
    S: AsRef<str>,
{
    let mut report = DispatchReport::new(signal);

    for token in targets {
        let token = token.as_ref();
        match dispatch_one(table, os, token, signal) {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(err) => {
                error!(%err, "signal dispatch aborted");
                report.aborted = Some(err);
                break;
            }
        }
    }

    report
}

fn dispatch_one<O>(
    table: &mut ProcessTable,
    os: &O,
    token: &str,
    signal: Signal,
) -> Result<DispatchOutcome, SupervisorError>
where
    O: ProcessOs + ?Sized,
{
    let pid = match parse_pid(token) {
        Ok(pid) => pid,
        Err(err) => {
            debug!(token, %err, "skipping pid token");
            return Ok(DispatchOutcome::InvalidTarget {
                token: token.to_string(),
            });
        }
    };

    // Only pids we launched are ours to signal
    let Some(position) = table.position_of(pid) else {
        debug!(pid, "pid is not tracked, nothing sent");
        return Ok(DispatchOutcome::UnknownTarget { pid });
    };

    let status = os
        .poll_child(pid)
        .map_err(|source| SupervisorError::QueryFailed {
            target: WaitTarget::Pid(pid),
            source,
        })?;

    match status {
        ChildStatus::Terminated { reason, .. } => {
            let entry = table.remove_at(position)?;
            info!(pid, name = %entry.name, %reason, "target already terminated, no signal sent");
            Ok(DispatchOutcome::AlreadyTerminated(
                TerminationEvent::from_entry(entry, reason),
            ))
        }
        ChildStatus::Running | ChildStatus::Unexpected { .. } => {
            if let ChildStatus::Unexpected { status, .. } = &status {
                warn!(pid, %status, "unexpected wait status, treating target as alive");
            }
            os.send_signal(pid, signal)
                .map_err(|source| SupervisorError::DeliveryFailed {
                    pid,
                    signal,
                    source,
                })?;
            debug!(pid, signal = signal.as_str(), "signal delivered");
            Ok(DispatchOutcome::Delivered { pid, signal })
        }
    }
}
