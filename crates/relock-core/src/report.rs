use relock_schema::{PackageName, ShortDigest, Step};
use serde::Serialize;
use std::path::PathBuf;

/// What a finished step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepDetail {
    Installed {
        requirements: Vec<PathBuf>,
    },
    Compiled {
        name: String,
        output: PathBuf,
        pins: usize,
        digest: ShortDigest,
        /// `false` when the resolver reproduced the previous file exactly.
        changed: bool,
        /// Direct requirements the lock file does not pin.
        missing_direct: Vec<PackageName>,
    },
    Stripped {
        file: PathBuf,
        removed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub label: String,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub detail: StepDetail,
}

impl StepOutcome {
    pub fn summary(&self) -> String {
        match &self.detail {
            StepDetail::Installed { requirements } => {
                format!("installed toolchain from {} file(s)", requirements.len())
            }
            StepDetail::Compiled {
                output,
                pins,
                changed,
                ..
            } => format!(
                "{} ({pins} pins, {})",
                output.display(),
                if *changed { "updated" } else { "unchanged" }
            ),
            StepDetail::Stripped { file, removed } => {
                format!("{} ({} line(s) removed)", file.display(), removed.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub project_root: PathBuf,
    pub resolver: String,
    pub started_at: String,
    pub finished_at: String,
    pub steps: Vec<StepOutcome>,
}

impl UpgradeReport {
    pub fn changed_lock_files(&self) -> Vec<&PathBuf> {
        self.steps
            .iter()
            .filter_map(|s| match &s.detail {
                StepDetail::Compiled {
                    output,
                    changed: true,
                    ..
                } => Some(output),
                StepDetail::Stripped { file, removed } if !removed.is_empty() => Some(file),
                _ => None,
            })
            .collect()
    }
}

/// Receives progress events while the engine runs a plan.
pub trait UpgradeObserver {
    fn step_started(&mut self, _index: usize, _total: usize, _step: &Step) {}
    fn step_finished(&mut self, _outcome: &StepOutcome) {}
    fn step_failed(&mut self, _step: &Step, _error: &crate::CoreError) {}
}

/// Observer that ignores every event.
pub struct SilentObserver;

impl UpgradeObserver for SilentObserver {}
