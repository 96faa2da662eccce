use crate::commands::parser::Cli;
use crate::utils::config_paths::{expand_home, UserConfig};
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "PMan";
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_HISTORY_LIMIT: usize = 200;
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub const CONFIG_DIR: &str = ".pman";
pub const CONFIG_FILE: &str = "config.json";

pub const LOG_ENV: &str = "PMAN_LOG";
pub const PROC_ROOT_ENV: &str = "PMAN_PROC_ROOT";

pub const EXIT_MESSAGE: &str =
    "Exiting pman. All background processes will be left in current state.";

/// Settings for one controller run
///
/// Precedence: command-line flag, then environment, then config file, then
/// the defaults above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub prompt: String,
    pub proc_root: PathBuf,
    pub history_limit: usize,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, user: &UserConfig) -> Self {
        Self::resolve_with_env(cli, user, |key| std::env::var(key).ok())
    }

    fn resolve_with_env<F>(cli: &Cli, user: &UserConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let proc_root = cli
            .proc_root
            .clone()
            .or_else(|| env(PROC_ROOT_ENV).map(PathBuf::from))
            .or_else(|| user.proc_root.as_deref().map(expand_home))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT));

        let log_level = cli
            .log_level
            .clone()
            .or_else(|| env(LOG_ENV))
            .or_else(|| user.log_level.clone());

        let log_file = cli
            .log_file
            .clone()
            .or_else(|| user.log_file.as_deref().map(expand_home));

        Self {
            prompt: user
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            proc_root,
            history_limit: user.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            log_level,
            log_file,
            color: !cli.no_color,
        }
    }

    /// Turn off colored output when disabled or not writing to a terminal
    pub fn apply_color(&self) {
        if !self.color || !console::colors_enabled() {
            colored::control::set_override(false);
        }
    }
}
