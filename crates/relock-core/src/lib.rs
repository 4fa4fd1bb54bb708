//! Core orchestration engine for relock upgrade runs.
//!
//! This crate ties together the upgrade plan from `relock-schema` and the
//! resolver backends from `relock-runtime` into the `Engine`, which executes
//! install, compile and strip steps in order, stops at the first failure,
//! and returns an `UpgradeReport`. It also owns Ctrl-C handling.

pub mod engine;
pub mod report;
pub mod signal;

pub use engine::{Engine, UpgradeOptions};
pub use report::{SilentObserver, StepDetail, StepOutcome, UpgradeObserver, UpgradeReport};
pub use signal::{install_signal_handler, shutdown_requested};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("plan error: {0}")]
    Plan(#[from] relock_schema::PlanError),
    #[error("lock file error: {0}")]
    Lock(#[from] relock_schema::LockError),
    #[error("{0}")]
    Runtime(#[from] relock_runtime::RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interrupted")]
    Interrupted,
}

impl CoreError {
    /// Exit code of the external command that failed, if that is what
    /// aborted the run.
    pub fn step_exit_code(&self) -> Option<i32> {
        match self {
            CoreError::Runtime(e) => e.exit_code(),
            _ => None,
        }
    }

    pub fn command_output(&self) -> Option<&str> {
        match self {
            CoreError::Runtime(e) => e.command_output(),
            _ => None,
        }
    }
}
