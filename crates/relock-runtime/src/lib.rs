//! Resolver backends and prerequisite checks for relock.
//!
//! This crate implements the execution layer: the pluggable `Resolver` trait
//! with a `pip-compile` backend that shells out to pip-tools and a
//! deterministic `mock` backend for tests, plus checks for the executables
//! a run needs.

pub mod mock;
pub mod pip;
pub mod prereq;
pub mod resolver;

pub use prereq::{check_all_prereqs, check_upgrade_prereqs, format_missing, MissingPrereq};
pub use resolver::{select_resolver, Resolver, ResolverConfig, COMPILE_COMMAND_ENV};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file error: {0}")]
    Lock(#[from] relock_schema::LockError),
    #[error("unknown resolver '{0}' (expected 'pip-compile' or 'mock')")]
    UnknownResolver(String),
    #[error("'{0}' not found on PATH")]
    ToolUnavailable(String),
    #[error("command failed ({}): {command}", exit_label(.code))]
    StepFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}

impl RuntimeError {
    /// Exit code of the failed external command, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RuntimeError::StepFailed { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured output of the failed external command.
    pub fn command_output(&self) -> Option<&str> {
        match self {
            RuntimeError::StepFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_owned(), |c| format!("exit code {c}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failed_message_includes_exit_code() {
        let err = RuntimeError::StepFailed {
            command: "pip-compile --output-file requirements/ci.txt requirements/ci.in".to_owned(),
            code: Some(2),
            output: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "command failed (exit code 2): pip-compile --output-file requirements/ci.txt requirements/ci.in"
        );
        assert_eq!(err.exit_code(), Some(2));
    }

    #[test]
    fn signal_termination_has_no_exit_code() {
        let err = RuntimeError::StepFailed {
            command: "pip".to_owned(),
            code: None,
            output: "killed".to_owned(),
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.command_output(), Some("killed"));
    }
}
