//! Process launcher
//!
//! Starts a background child and registers it only once the exec handshake
//! confirms the new image is running.

use crate::core::models::TrackedProcess;
use crate::core::process_table::ProcessTable;
use crate::error::{PmanResult, SupervisorError};
use crate::platform::{self, Handshake};
use std::ffi::CString;
use tracing::{info, warn};

/// Launch `argv` in the background
///
/// On success exactly one entry is inserted at the front of `table` and a
/// copy of it is returned. On any failure the table is untouched and no
/// child is left behind.
pub fn launch<S: AsRef<str>>(table: &mut ProcessTable, argv: &[S]) -> PmanResult<TrackedProcess> {
    let argv: Vec<String> = argv.iter().map(|arg| arg.as_ref().to_string()).collect();
    let c_argv = to_c_argv(&argv)?;

    match platform::spawn_with_handshake(&c_argv)? {
        Handshake::Replaced(pid) => register(table, pid, argv),
        Handshake::ExecFailed(pid) => {
            // The child exits right after writing the marker
            if let Err(err) = platform::reap_blocking(pid) {
                warn!(pid, %err, "waitpid for failed exec child failed");
            }
            let program = argv[0].clone();
            info!(pid, %program, "exec failed, child reaped");
            Err(SupervisorError::ExecFailed { program, pid })
        }
    }
}

/// Track a freshly started child at the front of `table`
///
/// A child that cannot be tracked is killed and reaped before the error is
/// returned.
fn register(table: &mut ProcessTable, pid: u32, argv: Vec<String>) -> PmanResult<TrackedProcess> {
    let entry = TrackedProcess::new(pid, argv);
    if let Err(err) = table.insert(entry.clone(), 0) {
        warn!(pid, %err, "cannot track started child, discarding it");
        platform::discard_child(pid);
        return Err(err.into());
    }
    info!(pid, name = %entry.name, "process started");
    Ok(entry)
}

fn to_c_argv(argv: &[String]) -> PmanResult<Vec<CString>> {
    if argv.is_empty() || argv[0].is_empty() {
        return Err(SupervisorError::InvalidCommand("no program given".to_string()));
    }
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|_| {
                SupervisorError::InvalidCommand(format!("argument {:?} contains a NUL byte", arg))
            })
        })
        .collect()
}
