//! Supervisor
//!
//! Owns the process table for one controller run and routes every command
//! through it. All operations take `&mut self`/`&self` from the single
//! control loop, so no locking is involved.

use crate::core::models::TrackedProcess;
use crate::core::process_table::ProcessTable;
use crate::error::PmanResult;
use crate::launcher;
use crate::platform::{ProcessOs, UnixProcessOs};
use crate::reaper::{self, SweepReport};
use crate::signal::{self, DispatchReport};
use crate::stats::{StatsOutcome, StatsReporter};
use nix::sys::signal::Signal;

pub struct Supervisor<O: ProcessOs = UnixProcessOs> {
    table: ProcessTable,
    os: O,
    stats: StatsReporter,
}

impl Supervisor<UnixProcessOs> {
    pub fn new(stats: StatsReporter) -> Self {
        Self::with_os(UnixProcessOs, stats)
    }
}

impl<O: ProcessOs> Supervisor<O> {
    pub fn with_os(os: O, stats: StatsReporter) -> Self {
        Self {
            table: ProcessTable::new(),
            os,
            stats,
        }
    }

    /// Start `argv` in the background and track it
    pub fn launch<S: AsRef<str>>(&mut self, argv: &[S]) -> PmanResult<TrackedProcess> {
        launcher::launch(&mut self.table, argv)
    }

    /// Deliver `signal` to each tracked target
    pub fn dispatch<S: AsRef<str>>(&mut self, targets: &[S], signal: Signal) -> DispatchReport {
        signal::dispatch(&mut self.table, &self.os, targets, signal)
    }

    /// Reap everything that has finished
    pub fn sweep(&mut self) -> SweepReport {
        reaper::sweep(&mut self.table, &self.os)
    }

    /// Read stats for each tracked target; never mutates the table
    pub fn report<S: AsRef<str>>(&self, targets: &[S]) -> Vec<StatsOutcome> {
        self.stats.report(&self.table, targets)
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn stats(&self) -> &StatsReporter {
        &self.stats
    }
}
