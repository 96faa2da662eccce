//! User-facing output for every command
//!
//! Per-target results go to `out`; batch aborts go to `err`.

use crate::core::models::{TerminationEvent, TerminationReason, TrackedProcess};
use crate::core::process_table::ProcessTable;
use crate::error::SupervisorError;
use crate::reaper::SweepReport;
use crate::signal::{DispatchOutcome, DispatchReport};
use crate::stats::{StatsOutcome, StatsRecord};
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use serde_json::json;
use std::io::{self, Write};

pub fn render_launch<W: Write>(entry: &TrackedProcess, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}(pid={}) {}", entry.name, entry.pid, "started".green())
}

/// Launch failures are reported on the error stream
pub fn render_error<E: Write>(error: &SupervisorError, err: &mut E) -> io::Result<()> {
    let message = error.user_message();
    if error.is_fatal() {
        writeln!(err, "{}", message.red().bold())
    } else {
        writeln!(err, "{}", message.yellow())
    }
}

pub fn render_dispatch<W: Write, E: Write>(
    report: &DispatchReport,
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    let signame = report.signal.as_str();
    for outcome in &report.outcomes {
        match outcome {
            DispatchOutcome::Delivered { pid, .. } => {
                writeln!(out, "{} sent to {}", signame, pid)?;
            }
            DispatchOutcome::AlreadyTerminated(event) => {
                writeln!(
                    out,
                    "No signal sent to {} (pid={}), {}",
                    event.name,
                    event.pid,
                    termination_phrase(&event.reason)
                )?;
            }
            DispatchOutcome::UnknownTarget { pid } => {
                writeln!(out, "Cannot send {} to {} (PID UNKNOWN)", signame, pid)?;
            }
            DispatchOutcome::InvalidTarget { token } => {
                writeln!(out, "Invalid pid, skipping {}", token)?;
            }
        }
    }

    if let Some(error) = &report.aborted {
        render_error(error, err)?;
    }
    Ok(())
}

fn termination_phrase(reason: &TerminationReason) -> &'static str {
    match reason {
        TerminationReason::Killed { .. } => "it has been killed",
        TerminationReason::Exited { .. } => "it has exited",
    }
}

fn colored_reason(reason: &TerminationReason) -> String {
    match reason {
        TerminationReason::Killed { signal } => format!("{} ({})", "Killed".red(), signal),
        TerminationReason::Exited { code } => format!("{} ({})", "Exited".yellow(), code),
    }
}

/// Table of jobs reaped by this sweep
pub fn format_finished_table<'a, I>(events: I) -> Table
where
    I: IntoIterator<Item = &'a TerminationEvent>,
{
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(vec![
        Cell::new("PID"),
        Cell::new("NAME"),
        Cell::new("REASON"),
    ]));

    for event in events {
        table.add_row(Row::new(vec![
            Cell::new(&event.pid.to_string()),
            Cell::new(&event.name),
            Cell::new(&colored_reason(&event.reason)),
        ]));
    }
    table
}

/// Table of everything still tracked, most recent first
pub fn format_jobs_table(table: &ProcessTable) -> Table {
    let mut jobs = Table::new();
    jobs.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    jobs.set_titles(Row::new(vec![
        Cell::new("PID"),
        Cell::new("NAME"),
        Cell::new("COMMAND"),
        Cell::new("STARTED_AT"),
    ]));

    for entry in table.iter() {
        let started = entry
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        jobs.add_row(Row::new(vec![
            Cell::new(&entry.pid.to_string()),
            Cell::new(&entry.name),
            Cell::new(&entry.command_line()),
            Cell::new(&started),
        ]));
    }
    jobs
}

pub fn render_sweep<W: Write, E: Write>(
    report: &SweepReport,
    table: &ProcessTable,
    out: &mut W,
    err: &mut E,
) -> io::Result<()> {
    let finished = report.finished_count();
    if finished > 0 {
        writeln!(out, "{}", "Exited jobs".bold())?;
        format_finished_table(report.finished()).print(out)?;
    }
    writeln!(out, "Newly finished jobs: {}", finished)?;

    if !table.is_empty() {
        writeln!(out, "{}", "Background jobs".bold())?;
        format_jobs_table(table).print(out)?;
    }
    writeln!(out, "Total background jobs: {}", table.len())?;

    if let Some(error) = &report.aborted {
        render_error(error, err)?;
    }
    Ok(())
}

pub fn render_stats<W: Write>(
    outcomes: &[StatsOutcome],
    json: bool,
    out: &mut W,
) -> io::Result<()> {
    for outcome in outcomes {
        match (outcome, json) {
            (StatsOutcome::Report(record), false) => write_record(record, out)?,
            (StatsOutcome::Report(record), true) => {
                let line = serde_json::to_string(record).map_err(io::Error::other)?;
                writeln!(out, "{}", line)?;
            }
            (StatsOutcome::Skipped { token, reason }, false) => {
                writeln!(out, "Skipping {}: {}", token, reason)?;
            }
            (StatsOutcome::Skipped { token, reason }, true) => {
                let line = json!({ "token": token, "error": reason.to_string() });
                writeln!(out, "{}", line)?;
            }
        }
    }
    Ok(())
}

fn write_record<W: Write>(record: &StatsRecord, out: &mut W) -> io::Result<()> {
    writeln!(out, "Name:\t{}", record.name)?;
    writeln!(out, "Pid:\t{}", record.pid)?;
    writeln!(out, "State:\t{}", record.state)?;
    writeln!(out, "Utime:\t{:.6}", record.utime)?;
    writeln!(out, "Stime:\t{:.6}", record.stime)?;
    writeln!(out, "Rss:\t{}", record.rss)?;
    writeln!(out, "Voluntary_ctxt_switches:\t{}", record.voluntary_ctxt_switches)?;
    writeln!(
        out,
        "Nonvoluntary_ctxt_switches:\t{}",
        record.nonvoluntary_ctxt_switches
    )?;
    writeln!(out)
}

pub fn help_text() -> &'static str {
    "\
Commands:
  bg <program> [args...]   start a program in the background
  bglist                   reap finished jobs and list running ones
  bgkill <pid>...          send SIGKILL
  bgstop <pid>...          send SIGSTOP
  bgstart <pid>...         send SIGCONT
  pstat [--json] <pid>...  show state, CPU time, RSS and context switches
  help                     show this summary
  exit                     leave pman; background processes keep running"
}
