//! Reaper
//!
//! Drains every child that has terminated since the last sweep without ever
//! blocking on one that is still running.

use crate::core::models::{TerminationEvent, TerminationReason};
use crate::core::process_table::ProcessTable;
use crate::error::{SupervisorError, WaitTarget};
use crate::platform::{ChildStatus, ProcessOs};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    Finished(TerminationEvent),
    /// The OS reported a child the table does not know about
    UnknownChild {
        pid: u32,
        reason: TerminationReason,
    },
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub events: Vec<SweepEvent>,
    /// Set when the status query itself failed and the sweep stopped early
    pub aborted: Option<SupervisorError>,
}

impl SweepReport {
    pub fn finished(&self) -> impl Iterator<Item = &TerminationEvent> {
        self.events.iter().filter_map(|event| match event {
            SweepEvent::Finished(event) => Some(event),
            SweepEvent::UnknownChild { .. } => None,
        })
    }

    pub fn finished_count(&self) -> usize {
        self.finished().count()
    }
}

/// Reap every terminated child and drop it from `table`
pub fn sweep<O>(table: &mut ProcessTable, os: &O) -> SweepReport
where
    O: ProcessOs + ?Sized,
{
    let mut report = SweepReport::default();

    while !table.is_empty() {
        let status = match os.poll_any_child() {
            Ok(status) => status,
            Err(source) => {
                let err = SupervisorError::QueryFailed {
                    target: WaitTarget::AnyChild,
                    source,
                };
                error!(%err, "sweep aborted");
                report.aborted = Some(err);
                break;
            }
        };

        match status {
            ChildStatus::Running => break,
            ChildStatus::Unexpected { pid, status } => {
                warn!(pid, %status, "non-terminal wait status during sweep");
            }
            ChildStatus::Terminated { pid, reason } => {
                let Some(position) = table.position_of(pid) else {
                    warn!(pid, %reason, "waitpid returned an unknown pid");
                    report.events.push(SweepEvent::UnknownChild { pid, reason });
                    continue;
                };
                match table.remove_at(position) {
                    Ok(entry) => {
                        info!(pid, name = %entry.name, %reason, "process finished");
                        let event = TerminationEvent::from_entry(entry, reason);
                        report.events.push(SweepEvent::Finished(event));
                    }
                    Err(err) => {
                        report.aborted = Some(err.into());
                        break;
                    }
                }
            }
        }
    }

    report
}
