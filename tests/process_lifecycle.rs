#![cfg(unix)]

//! Lifecycle scenarios against real children
//!
//! `waitpid(-1)` reaps any child of the test process, so every test here
//! runs serially.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use pman::stats::parse_stat;
use pman::{
    DispatchOutcome, StatsOutcome, StatsReporter, Supervisor, SupervisorError, TerminationReason,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

fn supervisor() -> Supervisor {
    Supervisor::new(StatsReporter::new("/proc").expect("clock ticks"))
}

fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

fn proc_state(pid: u32) -> Option<char> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat(&stat).ok().map(|fields| fields.state)
}

/// Kill and reap whatever is left so later tests start clean
fn cleanup(sup: &mut Supervisor) {
    let pids: Vec<String> = sup.table().pids().iter().map(u32::to_string).collect();
    if pids.is_empty() {
        return;
    }
    sup.dispatch(&pids, Signal::SIGKILL);
    assert!(wait_until(|| {
        sup.sweep();
        sup.table().is_empty()
    }));
}

#[test]
#[serial]
fn test_launch_registers_running_child() {
    let mut sup = supervisor();

    let first = sup.launch(&["sleep", "30"]).expect("launch sleep");
    let second = sup.launch(&["sleep", "31"]).expect("launch sleep");

    assert_eq!(first.name, "sleep");
    assert_eq!(sup.table().pids(), vec![second.pid, first.pid]);
    assert!(psutil::process::Process::new(first.pid).is_ok());

    cleanup(&mut sup);
}

#[test]
#[serial]
fn test_exec_failure_leaves_no_child() {
    let mut sup = supervisor();

    let err = sup
        .launch(&["/nonexistent/pman-no-such-program", "--flag"])
        .unwrap_err();

    let pid = match err {
        SupervisorError::ExecFailed { ref program, pid } => {
            assert_eq!(program, "/nonexistent/pman-no-such-program");
            pid
        }
        other => panic!("unexpected error: {:?}", other),
    };
    assert!(sup.table().is_empty());
    // Already reaped by the launcher
    assert_eq!(
        waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
    assert!(psutil::process::Process::new(pid).is_err());
}

#[test]
#[serial]
fn test_exec_failure_after_path_search() {
    let mut sup = supervisor();

    let err = sup.launch(&["nonexistent-binary-xyz"]).unwrap_err();

    let SupervisorError::ExecFailed { program, pid } = err else {
        panic!("unexpected error: {:?}", err);
    };
    assert_eq!(program, "nonexistent-binary-xyz");
    assert!(sup.table().is_empty());
    assert_eq!(
        waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD)
    );
    assert!(psutil::process::Process::new(pid).is_err());
}

#[test]
#[serial]
fn test_stop_and_continue() {
    let mut sup = supervisor();
    let entry = sup.launch(&["sleep", "30"]).unwrap();
    let token = [entry.pid.to_string()];

    let report = sup.dispatch(&token, Signal::SIGSTOP);
    assert_eq!(
        report.outcomes,
        vec![DispatchOutcome::Delivered {
            pid: entry.pid,
            signal: Signal::SIGSTOP
        }]
    );
    assert!(wait_until(|| proc_state(entry.pid) == Some('T')));

    let report = sup.dispatch(&token, Signal::SIGCONT);
    assert_eq!(report.delivered(), 1);
    assert!(wait_until(|| matches!(proc_state(entry.pid), Some(state) if state != 'T')));

    // A stopped-then-continued child is still tracked
    assert!(sup.sweep().events.is_empty());
    assert_eq!(sup.table().len(), 1);

    cleanup(&mut sup);
}

#[test]
#[serial]
fn test_sweep_reports_normal_exit() {
    let mut sup = supervisor();
    let entry = sup.launch(&["true"]).unwrap();

    let mut finished = Vec::new();
    assert!(wait_until(|| {
        finished.extend(sup.sweep().finished().cloned());
        !finished.is_empty()
    }));

    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].pid, entry.pid);
    assert_eq!(finished[0].reason, TerminationReason::Exited { code: 0 });
    assert!(sup.table().is_empty());
}

#[test]
#[serial]
fn test_kill_then_sweep_reports_killed() {
    let mut sup = supervisor();
    let entry = sup.launch(&["sleep", "30"]).unwrap();

    let report = sup.dispatch(&[entry.pid.to_string()], Signal::SIGKILL);
    assert_eq!(report.delivered(), 1);
    assert!(report.aborted.is_none());

    let mut finished = Vec::new();
    assert!(wait_until(|| {
        finished.extend(sup.sweep().finished().cloned());
        !finished.is_empty()
    }));
    assert_eq!(
        finished[0].reason,
        TerminationReason::Killed {
            signal: Signal::SIGKILL as i32
        }
    );
}

#[test]
#[serial]
fn test_signal_to_zombie_reaps_instead_of_sending() {
    let mut sup = supervisor();
    let entry = sup.launch(&["true"]).unwrap();
    assert!(wait_until(|| proc_state(entry.pid) == Some('Z')));

    let report = sup.dispatch(&[entry.pid.to_string()], Signal::SIGKILL);

    match &report.outcomes[..] {
        [DispatchOutcome::AlreadyTerminated(event)] => {
            assert_eq!(event.pid, entry.pid);
            assert_eq!(event.reason, TerminationReason::Exited { code: 0 });
        }
        other => panic!("unexpected outcomes: {:?}", other),
    }
    assert!(sup.table().is_empty());
    // Removed by the dispatcher, so the next sweep has nothing to report
    assert!(sup.sweep().events.is_empty());
}

#[test]
#[serial]
fn test_stats_of_stopped_child_are_stable() {
    let mut sup = supervisor();
    let entry = sup.launch(&["sleep", "30"]).unwrap();
    let token = [entry.pid.to_string()];
    sup.dispatch(&token, Signal::SIGSTOP);
    assert!(wait_until(|| proc_state(entry.pid) == Some('T')));

    let first = sup.report(&token);
    let second = sup.report(&token);

    match (&first[..], &second[..]) {
        ([StatsOutcome::Report(a)], [StatsOutcome::Report(b)]) => {
            assert_eq!(a, b);
            assert_eq!(a.state, 'T');
            assert_eq!(a.name, "sleep");
            assert!(a.rss > 0);
        }
        other => panic!("unexpected outcomes: {:?}", other),
    }
    assert_eq!(sup.table().len(), 1);

    cleanup(&mut sup);
}

#[test]
#[serial]
fn test_sweep_with_only_running_children_returns_immediately() {
    let mut sup = supervisor();
    assert!(sup.sweep().events.is_empty());

    sup.launch(&["sleep", "30"]).unwrap();
    let started = Instant::now();
    let report = sup.sweep();

    assert!(report.events.is_empty());
    assert!(report.aborted.is_none());
    assert!(started.elapsed() < Duration::from_secs(1));

    cleanup(&mut sup);
}

#[test]
#[serial]
fn test_stopped_and_resumed_child_exits_normally() {
    let mut sup = supervisor();
    let entry = sup.launch(&["sleep", "1"]).unwrap();
    assert_eq!(sup.table().len(), 1);
    let token = [entry.pid.to_string()];

    assert_eq!(sup.dispatch(&token, Signal::SIGSTOP).delivered(), 1);
    assert_eq!(sup.dispatch(&token, Signal::SIGCONT).delivered(), 1);

    let mut finished = Vec::new();
    assert!(wait_until(|| {
        finished.extend(sup.sweep().finished().cloned());
        !finished.is_empty()
    }));
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].pid, entry.pid);
    assert_eq!(finished[0].name, "sleep");
    assert_eq!(finished[0].reason, TerminationReason::Exited { code: 0 });
    assert!(sup.table().is_empty());
}
