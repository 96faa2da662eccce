//! Per-process statistics from procfs
//!
//! Each tracked pid is decoded from two records: `<proc>/<pid>/stat` for run
//! state, CPU times and resident size, and `<proc>/<pid>/status` for context
//! switch counters. Every file is read in one go; the two reads are separate
//! snapshots and are not assumed to be consistent with each other.

use crate::core::models::{parse_pid, TargetError, TrackedProcess};
use crate::core::process_table::ProcessTable;
use crate::platform;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

static VOLUNTARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^voluntary_ctxt_switches:\s+(\d+)")
        .expect("valid voluntary_ctxt_switches regex")
});
static NONVOLUNTARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^nonvoluntary_ctxt_switches:\s+(\d+)")
        .expect("valid nonvoluntary_ctxt_switches regex")
});

// Positions in /proc/<pid>/stat, 1-based as in proc(5)
const STAT_STATE: usize = 3;
const STAT_UTIME: usize = 14;
const STAT_STIME: usize = 15;
const STAT_RSS: usize = 24;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {}: {detail}", path.display())]
    MalformedStat { path: PathBuf, detail: String },
    #[error("{field} not found in {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },
    #[error("cannot determine clock ticks per second: {0}")]
    ClockTicks(nix::Error),
}

/// Decoded statistics for one tracked process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    pub name: String,
    pub pid: u32,
    pub state: char,
    /// Seconds of user CPU time
    pub utime: f64,
    /// Seconds of system CPU time
    pub stime: f64,
    /// Resident set size in pages
    pub rss: i64,
    pub voluntary_ctxt_switches: u64,
    pub nonvoluntary_ctxt_switches: u64,
}

/// Raw fields taken from a stat record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFields {
    pub state: char,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub rss_pages: i64,
}

#[derive(Debug)]
pub enum SkipReason {
    Target(TargetError),
    Decode(StatsError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Target(err) => write!(f, "{}", err),
            SkipReason::Decode(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug)]
pub enum StatsOutcome {
    Report(StatsRecord),
    Skipped { token: String, reason: SkipReason },
}

/// Reads procfs records for processes in the table
#[derive(Debug, Clone)]
pub struct StatsReporter {
    proc_root: PathBuf,
    clock_ticks: u64,
}

impl StatsReporter {
    pub fn new(proc_root: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let clock_ticks = platform::clock_ticks_per_second().map_err(StatsError::ClockTicks)?;
        Ok(Self::with_clock_ticks(proc_root, clock_ticks))
    }

    pub fn with_clock_ticks(proc_root: impl Into<PathBuf>, clock_ticks: u64) -> Self {
        Self {
            proc_root: proc_root.into(),
            clock_ticks: clock_ticks.max(1),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// One outcome per token; a bad token or unreadable pid never stops the rest
    pub fn report<S: AsRef<str>>(&self, table: &ProcessTable, targets: &[S]) -> Vec<StatsOutcome> {
        targets
            .iter()
            .map(|token| {
                let token = token.as_ref();
                self.report_one(table, token)
                    .unwrap_or_else(|reason| {
                        debug!(token, %reason, "skipping stats target");
                        StatsOutcome::Skipped {
                            token: token.to_string(),
                            reason,
                        }
                    })
            })
            .collect()
    }

    fn report_one(&self, table: &ProcessTable, token: &str) -> Result<StatsOutcome, SkipReason> {
        let pid = parse_pid(token).map_err(SkipReason::Target)?;
        // Untracked pids are never queried, even if they exist on the system
        let position = table
            .position_of(pid)
            .ok_or(SkipReason::Target(TargetError::Unknown(pid)))?;
        let entry = table
            .peek(position)
            .map_err(|_| SkipReason::Target(TargetError::Unknown(pid)))?;
        self.read_record(entry)
            .map(StatsOutcome::Report)
            .map_err(SkipReason::Decode)
    }

    pub fn read_record(&self, entry: &TrackedProcess) -> Result<StatsRecord, StatsError> {
        let pid_dir = self.proc_root.join(entry.pid.to_string());

        let stat_path = pid_dir.join("stat");
        let stat = read_snapshot(&stat_path)?;
        let fields = parse_stat(&stat).map_err(|detail| StatsError::MalformedStat {
            path: stat_path.clone(),
            detail,
        })?;

        let status_path = pid_dir.join("status");
        let status = read_snapshot(&status_path)?;
        let (voluntary, nonvoluntary) = parse_context_switches(&status, &status_path)?;

        let ticks = self.clock_ticks as f64;
        Ok(StatsRecord {
            name: entry.name.clone(),
            pid: entry.pid,
            state: fields.state,
            utime: fields.utime_ticks as f64 / ticks,
            stime: fields.stime_ticks as f64 / ticks,
            rss: fields.rss_pages,
            voluntary_ctxt_switches: voluntary,
            nonvoluntary_ctxt_switches: nonvoluntary,
        })
    }
}

fn read_snapshot(path: &Path) -> Result<String, StatsError> {
    fs::read_to_string(path).map_err(|source| StatsError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode the fields we need from a `/proc/<pid>/stat` line
///
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so splitting starts after the last `)`.
pub fn parse_stat(content: &str) -> Result<StatFields, String> {
    let close = content
        .rfind(')')
        .ok_or_else(|| "missing ')' after the command name".to_string())?;
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();

    let field = |position: usize| {
        rest.get(position - STAT_STATE)
            .copied()
            .ok_or_else(|| format!("field {} missing", position))
    };
    let number = |position: usize| {
        field(position).and_then(|raw| {
            raw.parse::<u64>()
                .map_err(|_| format!("field {} is not a number: {:?}", position, raw))
        })
    };

    let state_raw = field(STAT_STATE)?;
    let mut chars = state_raw.chars();
    let state = match (chars.next(), chars.next()) {
        (Some(state), None) => state,
        _ => return Err(format!("unexpected state field {:?}", state_raw)),
    };

    let rss_raw = field(STAT_RSS)?;
    let rss_pages = rss_raw
        .parse()
        .map_err(|_| format!("field {} is not a number: {:?}", STAT_RSS, rss_raw))?;

    Ok(StatFields {
        state,
        utime_ticks: number(STAT_UTIME)?,
        stime_ticks: number(STAT_STIME)?,
        rss_pages,
    })
}

fn parse_context_switches(content: &str, path: &Path) -> Result<(u64, u64), StatsError> {
    let voluntary = capture_counter(&VOLUNTARY_RE, content, path, "voluntary_ctxt_switches")?;
    let nonvoluntary =
        capture_counter(&NONVOLUNTARY_RE, content, path, "nonvoluntary_ctxt_switches")?;
    Ok((voluntary, nonvoluntary))
}

fn capture_counter(
    pattern: &Regex,
    content: &str,
    path: &Path,
    field: &'static str,
) -> Result<u64, StatsError> {
    let missing = || StatsError::MissingField {
        path: path.to_path_buf(),
        field,
    };
    let captures = pattern.captures(content).ok_or_else(missing)?;
    captures
        .get(1)
        .ok_or_else(missing)?
        .as_str()
        .parse()
        .map_err(|_| StatsError::MalformedStat {
            path: path.to_path_buf(),
            detail: format!("{} out of range", field),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const STAT: &str = "4321 (sleep) S 1000 4321 1000 34816 4321 4194304 97 0 0 0 250 50 0 0 20 0 1 0 123456 8577024 230 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0\n";

    const STATUS: &str = "Name:\tsleep\nState:\tS (sleeping)\nVmRSS:\t     920 kB\nvoluntary_ctxt_switches:\t3\nnonvoluntary_ctxt_switches:\t1\n";

    fn fake_proc(pid: u32, stat: Option<&str>, status: Option<&str>) -> TempDir {
        let root = TempDir::new().expect("temp dir");
        let dir = root.path().join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        if let Some(stat) = stat {
            fs::write(dir.join("stat"), stat).unwrap();
        }
        if let Some(status) = status {
            fs::write(dir.join("status"), status).unwrap();
        }
        root
    }

    fn tracked(pid: u32) -> ProcessTable {
        let mut table = ProcessTable::new();
        table
            .insert(TrackedProcess::new(pid, vec!["sleep".into(), "30".into()]), 0)
            .unwrap();
        table
    }

    #[test]
    fn test_parse_stat_fields() {
        let fields = parse_stat(STAT).unwrap();
        assert_eq!(
            fields,
            StatFields {
                state: 'S',
                utime_ticks: 250,
                stime_ticks: 50,
                rss_pages: 230,
            }
        );
    }

    #[test]
    fn test_parse_stat_command_with_spaces_and_parens() {
        let line = STAT.replacen("(sleep)", "(my (odd) prog)", 1);
        let fields = parse_stat(&line).unwrap();
        assert_eq!(fields.state, 'S');
        assert_eq!(fields.rss_pages, 230);
    }

    #[test]
    fn test_parse_stat_rejects_truncated_record() {
        assert!(parse_stat("4321 (sleep) S 1000").is_err());
        assert!(parse_stat("garbage").is_err());
        let bad_utime = STAT.replacen(" 250 ", " x ", 1);
        assert!(parse_stat(&bad_utime).unwrap_err().contains("field 14"));
    }

    #[test]
    fn test_report_decodes_fake_proc() {
        let root = fake_proc(4321, Some(STAT), Some(STATUS));
        let reporter = StatsReporter::with_clock_ticks(root.path(), 100);
        let table = tracked(4321);

        let outcomes = reporter.report(&table, &["4321"]);

        match &outcomes[..] {
            [StatsOutcome::Report(record)] => assert_eq!(
                record,
                &StatsRecord {
                    name: "sleep".to_string(),
                    pid: 4321,
                    state: 'S',
                    utime: 2.5,
                    stime: 0.5,
                    rss: 230,
                    voluntary_ctxt_switches: 3,
                    nonvoluntary_ctxt_switches: 1,
                }
            ),
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn test_untracked_pid_is_never_read() {
        let root = fake_proc(4321, Some(STAT), Some(STATUS));
        let reporter = StatsReporter::with_clock_ticks(root.path(), 100);
        let table = ProcessTable::new();

        let outcomes = reporter.report(&table, &["4321", "nope"]);

        assert!(matches!(
            &outcomes[0],
            StatsOutcome::Skipped {
                reason: SkipReason::Target(TargetError::Unknown(4321)),
                ..
            }
        ));
        assert!(matches!(
            &outcomes[1],
            StatsOutcome::Skipped {
                reason: SkipReason::Target(TargetError::Invalid(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_status_skips_only_that_pid() {
        let root = fake_proc(4321, Some(STAT), None);
        let dir = root.path().join("5555");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), STAT.replacen("4321", "5555", 1)).unwrap();
        fs::write(dir.join("status"), STATUS).unwrap();

        let reporter = StatsReporter::with_clock_ticks(root.path(), 100);
        let mut table = tracked(4321);
        table
            .insert(TrackedProcess::new(5555, vec!["sleep".into()]), 0)
            .unwrap();

        let outcomes = reporter.report(&table, &["4321", "5555"]);

        assert!(matches!(
            &outcomes[0],
            StatsOutcome::Skipped {
                reason: SkipReason::Decode(StatsError::Unreadable { .. }),
                ..
            }
        ));
        assert!(matches!(&outcomes[1], StatsOutcome::Report(record) if record.pid == 5555));
    }

    #[test]
    fn test_missing_context_switch_counter() {
        let root = fake_proc(4321, Some(STAT), Some("Name:\tsleep\nvoluntary_ctxt_switches:\t3\n"));
        let reporter = StatsReporter::with_clock_ticks(root.path(), 100);

        let outcomes = reporter.report(&tracked(4321), &["4321"]);

        match &outcomes[..] {
            [StatsOutcome::Skipped {
                reason: SkipReason::Decode(StatsError::MissingField { field, .. }),
                ..
            }] => assert_eq!(*field, "nonvoluntary_ctxt_switches"),
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = StatsRecord {
            name: "sleep".to_string(),
            pid: 1,
            state: 'R',
            utime: 0.0,
            stime: 0.0,
            rss: 10,
            voluntary_ctxt_switches: 0,
            nonvoluntary_ctxt_switches: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "R");
        assert_eq!(json["rss"], 10);
    }
}
