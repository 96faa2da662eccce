//! Command-line and prompt grammar
//!
//! `Cli` parses the process arguments; `ReplLine` parses one line typed at
//! the prompt, after whitespace tokenization.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Process arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "pman",
    version,
    about = "Interactive background process manager",
    long_about = "Starts programs in the background, tracks them by pid, sends them \
                  kill/stop/continue signals, reaps them as they finish and reports \
                  per-process statistics from procfs. Type 'help' at the prompt."
)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Use this config file instead of ~/.pman/config.json
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root of the procfs tree read by pstat
    #[arg(long, value_name = "DIR")]
    pub proc_root: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// One line typed at the prompt
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "pman",
    no_binary_name = true,
    disable_help_subcommand = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct ReplLine {
    #[command(subcommand)]
    pub command: ReplCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Start a program in the background
    Bg {
        /// Program followed by its arguments
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "PROGRAM"
        )]
        argv: Vec<String>,
    },

    /// Reap finished jobs and list the ones still running
    Bglist,

    /// Send SIGKILL to tracked processes
    Bgkill {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, value_name = "PID")]
        pids: Vec<String>,
    },

    /// Send SIGSTOP to tracked processes
    Bgstop {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, value_name = "PID")]
        pids: Vec<String>,
    },

    /// Send SIGCONT to tracked processes
    Bgstart {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, value_name = "PID")]
        pids: Vec<String>,
    },

    /// Show statistics for tracked processes
    Pstat {
        /// Print one JSON object per process
        #[arg(long)]
        json: bool,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true, value_name = "PID")]
        pids: Vec<String>,
    },

    /// Show the command summary
    Help,

    /// Leave pman; background processes keep running
    Exit,
}

/// Split a prompt line on whitespace
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Parse a prompt line; `Ok(None)` for a blank line
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, clap::Error> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    ReplLine::try_parse_from(tokens).map(|parsed| Some(parsed.command))
}
