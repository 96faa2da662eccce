//! Interactive control loop
//!
//! Reads one command per line and runs it to completion before reading the
//! next. The loop never waits on a child except during the launch handshake.

use super::parser::{parse_line, ReplCommand};
use super::render;
use crate::config::{Settings, EXIT_MESSAGE};
use crate::platform::ProcessOs;
use crate::supervisor::Supervisor;
use dialoguer::{BasicHistory, Input};
use nix::sys::signal::Signal;
use std::io::{self, BufRead, IsTerminal, Write};
use std::ops::ControlFlow;
use tracing::debug;

/// Run a single command line
///
/// Returns `ControlFlow::Break` when the user asked to leave.
pub fn execute_line<O, W, E>(
    supervisor: &mut Supervisor<O>,
    line: &str,
    out: &mut W,
    err: &mut E,
) -> io::Result<ControlFlow<()>>
where
    O: ProcessOs,
    W: Write,
    E: Write,
{
    let command = match parse_line(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(ControlFlow::Continue(())),
        Err(parse_error) => {
            write!(err, "{}", parse_error.render())?;
            writeln!(err, "Type 'help' for the list of commands")?;
            return Ok(ControlFlow::Continue(()));
        }
    };
    debug!(?command, "executing");

    match command {
        ReplCommand::Bg { argv } => match supervisor.launch(&argv) {
            Ok(entry) => render::render_launch(&entry, out)?,
            Err(error) => render::render_error(&error, err)?,
        },
        ReplCommand::Bglist => {
            let report = supervisor.sweep();
            render::render_sweep(&report, supervisor.table(), out, err)?;
        }
        ReplCommand::Bgkill { pids } => {
            let report = supervisor.dispatch(&pids, Signal::SIGKILL);
            render::render_dispatch(&report, out, err)?;
        }
        ReplCommand::Bgstop { pids } => {
            let report = supervisor.dispatch(&pids, Signal::SIGSTOP);
            render::render_dispatch(&report, out, err)?;
        }
        ReplCommand::Bgstart { pids } => {
            let report = supervisor.dispatch(&pids, Signal::SIGCONT);
            render::render_dispatch(&report, out, err)?;
        }
        ReplCommand::Pstat { json, pids } => {
            let outcomes = supervisor.report(&pids);
            render::render_stats(&outcomes, json, out)?;
        }
        ReplCommand::Help => writeln!(out, "{}", render::help_text())?,
        ReplCommand::Exit => return Ok(ControlFlow::Break(())),
    }

    out.flush()?;
    Ok(ControlFlow::Continue(()))
}

enum LineSource {
    Interactive {
        prompt: String,
        history: BasicHistory,
    },
    Piped(io::Lines<io::StdinLock<'static>>),
}

impl LineSource {
    fn for_settings(settings: &Settings) -> Self {
        if console::user_attended() && io::stdin().is_terminal() {
            LineSource::Interactive {
                prompt: settings.prompt.clone(),
                history: BasicHistory::new()
                    .max_entries(settings.history_limit)
                    .no_duplicates(true),
            }
        } else {
            LineSource::Piped(io::stdin().lock().lines())
        }
    }

    /// `None` once input is exhausted
    fn next_line(&mut self) -> io::Result<Option<String>> {
        match self {
            LineSource::Interactive { prompt, history } => {
                let read = Input::<String>::new()
                    .with_prompt(prompt.as_str())
                    .history_with(history)
                    .allow_empty(true)
                    .interact_text();
                match read {
                    Ok(line) => Ok(Some(line)),
                    // EOF and Ctrl-C both end the session
                    Err(error) => {
                        debug!(%error, "prompt closed");
                        Ok(None)
                    }
                }
            }
            LineSource::Piped(lines) => lines.next().transpose(),
        }
    }
}

/// Run the control loop until `exit` or end of input
pub fn run<O: ProcessOs>(supervisor: &mut Supervisor<O>, settings: &Settings) -> io::Result<()> {
    let mut source = LineSource::for_settings(settings);
    let stdout = io::stdout();
    let stderr = io::stderr();

    while let Some(line) = source.next_line()? {
        let flow = execute_line(supervisor, &line, &mut stdout.lock(), &mut stderr.lock())?;
        if flow.is_break() {
            break;
        }
    }

    println!("{}", EXIT_MESSAGE);
    Ok(())
}
