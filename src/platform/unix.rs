use super::{ChildStatus, ProcessOs};
use crate::core::models::TerminationReason;
use crate::error::{SetupStage, SupervisorError};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, read, sysconf, ForkResult, Pid, SysconfVar};
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use tracing::{debug, warn};

/// Byte written by a child whose exec failed
pub const EXEC_FAILED_MARKER: u8 = b'f';

/// Exit status of a child whose exec failed
pub const EXEC_FAILED_EXIT_CODE: i32 = 127;

/// How the exec handshake ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The pipe closed without data: the child image was replaced
    Replaced(u32),
    /// The child wrote the failure marker; it has not been reaped yet
    ExecFailed(u32),
}

/// Fork a child that execs `argv` and report whether the exec happened
///
/// Both ends of a private pipe are close-on-exec from the moment it exists.
/// A successful exec closes it silently, a failed exec writes
/// [`EXEC_FAILED_MARKER`] into it, so the blocking read in the parent returns
/// either zero bytes or one byte and never races the child.
pub fn spawn_with_handshake(argv: &[CString]) -> Result<Handshake, SupervisorError> {
    if argv.is_empty() {
        return Err(SupervisorError::InvalidCommand("no program given".to_string()));
    }

    // Built before forking: the child must not allocate
    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    let (read_end, write_end) = exec_pipe()?;

    let read_fd = read_end.as_raw_fd();
    let write_fd = write_end.as_raw_fd();

    // SAFETY: the child branch only calls async-signal-safe functions on
    // memory prepared before the fork and never returns.
    let child = match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => child,
        Ok(ForkResult::Child) => unsafe { exec_or_report(read_fd, write_fd, &argv_ptrs) },
        Err(source) => {
            return Err(SupervisorError::SetupFailed {
                stage: SetupStage::Fork,
                source,
            })
        }
    };

    drop(write_end);
    let pid = child.as_raw() as u32;
    let marker = read_marker(&read_end);
    drop(read_end);

    match marker {
        Ok(0) => {
            debug!(pid, "exec handshake: image replaced");
            Ok(Handshake::Replaced(pid))
        }
        Ok(_) => {
            debug!(pid, "exec handshake: failure marker received");
            Ok(Handshake::ExecFailed(pid))
        }
        Err(source) => {
            warn!(pid, %source, "exec handshake read failed, killing child");
            discard_child(pid);
            Err(SupervisorError::SetupFailed {
                stage: SetupStage::Handshake,
                source,
            })
        }
    }
}

/// Child side of the handshake
///
/// Encapsulates the raw libc calls; only async-signal-safe functions are used.
unsafe fn exec_or_report(read_fd: RawFd, write_fd: RawFd, argv: &[*const libc::c_char]) -> ! {
    libc::close(read_fd);
    libc::execvp(argv[0], argv.as_ptr());

    // Still here: exec failed and the pipe is open
    let marker = EXEC_FAILED_MARKER;
    libc::write(write_fd, &marker as *const u8 as *const libc::c_void, 1);
    libc::close(write_fd);
    libc::_exit(EXEC_FAILED_EXIT_CODE)
}

#[cfg(not(target_vendor = "apple"))]
fn exec_pipe() -> Result<(OwnedFd, OwnedFd), SupervisorError> {
    use nix::fcntl::OFlag;

    nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|source| SupervisorError::SetupFailed {
        stage: SetupStage::Pipe,
        source,
    })
}

// No pipe2 on Apple targets
#[cfg(target_vendor = "apple")]
fn exec_pipe() -> Result<(OwnedFd, OwnedFd), SupervisorError> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    let (read_end, write_end) =
        nix::unistd::pipe().map_err(|source| SupervisorError::SetupFailed {
            stage: SetupStage::Pipe,
            source,
        })?;
    for fd in [&read_end, &write_end] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(|source| {
            SupervisorError::SetupFailed {
                stage: SetupStage::PipeFlags,
                source,
            }
        })?;
    }
    Ok((read_end, write_end))
}

/// Blocks until the child either writes the marker or the pipe closes
fn read_marker(read_end: &OwnedFd) -> nix::Result<usize> {
    let mut marker = [0u8; 1];
    loop {
        match read(read_end.as_raw_fd(), &mut marker) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Blocking wait for one specific child
pub fn reap_blocking(pid: u32) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(to_pid(pid), None) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// SIGKILL a child we will not track and collect it
pub fn discard_child(pid: u32) {
    if let Err(err) = kill(to_pid(pid), Signal::SIGKILL) {
        warn!(pid, %err, "could not kill discarded child");
    }
    if let Err(err) = reap_blocking(pid) {
        warn!(pid, %err, "could not reap discarded child");
    }
}

/// Clock ticks per second used by the kernel's CPU accounting
pub fn clock_ticks_per_second() -> nix::Result<u64> {
    match sysconf(SysconfVar::CLK_TCK)? {
        Some(ticks) if ticks > 0 => Ok(ticks as u64),
        _ => Err(Errno::EINVAL),
    }
}

fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as libc::pid_t)
}

fn poll(target: Pid) -> nix::Result<ChildStatus> {
    loop {
        match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err),
            Ok(status) => return Ok(classify(status)),
        }
    }
}

fn classify(status: WaitStatus) -> ChildStatus {
    match status {
        WaitStatus::StillAlive => ChildStatus::Running,
        WaitStatus::Exited(pid, code) => ChildStatus::Terminated {
            pid: pid.as_raw() as u32,
            reason: TerminationReason::Exited { code },
        },
        WaitStatus::Signaled(pid, signal, _) => ChildStatus::Terminated {
            pid: pid.as_raw() as u32,
            reason: TerminationReason::Killed {
                signal: signal as i32,
            },
        },
        other => match other.pid() {
            Some(pid) => ChildStatus::Unexpected {
                pid: pid.as_raw() as u32,
                status: format!("{:?}", other),
            },
            None => ChildStatus::Running,
        },
    }
}

/// The real kernel interface
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessOs;

impl ProcessOs for UnixProcessOs {
    fn poll_child(&self, pid: u32) -> nix::Result<ChildStatus> {
        poll(to_pid(pid))
    }

    fn poll_any_child(&self) -> nix::Result<ChildStatus> {
        poll(Pid::from_raw(-1))
    }

    fn send_signal(&self, pid: u32, signal: Signal) -> nix::Result<()> {
        kill(to_pid(pid), signal)
    }
}
