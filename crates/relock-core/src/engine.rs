use crate::report::{StepDetail, StepOutcome, UpgradeObserver, UpgradeReport};
use crate::signal::shutdown_requested;
use crate::CoreError;
use relock_runtime::Resolver;
use relock_schema::{
    digest_file, load_plan_or_default, parse_requirements_file, strip_pins_in_file, CompileSpec,
    InstallSpec, LockFile, PinFilter, Plan, Step, StripEntry, PLAN_FILE_NAME,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs upgrade plans against a project directory.
///
/// Steps execute strictly in order. The first failure aborts the run and
/// lock files regenerated before it are left in place.
pub struct Engine {
    project_root: PathBuf,
    stop_requested: fn() -> bool,
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeOptions {
    /// Pass `--upgrade` to the resolver.
    pub upgrade: bool,
    /// Skip the toolchain install step.
    pub skip_install: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            upgrade: true,
            skip_install: false,
        }
    }
}

impl Engine {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            stop_requested: shutdown_requested,
        }
    }

    /// Replace the Ctrl-C check consulted before every step.
    #[must_use]
    pub fn with_stop_check(mut self, check: fn() -> bool) -> Self {
        self.stop_requested = check;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn default_plan_path(&self) -> PathBuf {
        self.project_root.join(PLAN_FILE_NAME)
    }

    /// Load the plan at `path` (or `<root>/relock.toml`), falling back to the
    /// built-in plan when the file does not exist.
    pub fn load_plan(&self, path: Option<&Path>) -> Result<Plan, CoreError> {
        let path = path.map_or_else(|| self.default_plan_path(), Path::to_path_buf);
        if path.exists() {
            debug!("loading plan from {}", path.display());
        } else {
            debug!("no plan at {}, using built-in plan", path.display());
        }
        Ok(load_plan_or_default(&path)?)
    }

    pub fn upgrade(
        &self,
        plan: &Plan,
        resolver: &dyn Resolver,
        options: UpgradeOptions,
        observer: &mut dyn UpgradeObserver,
    ) -> Result<UpgradeReport, CoreError> {
        plan.validate()?;
        info!(
            "upgrading lock files in {} with {}",
            self.project_root.display(),
            resolver.name()
        );
        let started_at = chrono::Utc::now().to_rfc3339();

        let steps: Vec<Step> = plan
            .steps(options.upgrade)
            .into_iter()
            .filter(|s| !(options.skip_install && matches!(s, Step::Install(_))))
            .collect();
        let total = steps.len();

        let mut outcomes = Vec::with_capacity(total);
        for (index, step) in steps.iter().enumerate() {
            if (self.stop_requested)() {
                warn!("interrupted before step {}/{total}: {}", index + 1, step.label());
                return Err(CoreError::Interrupted);
            }

            observer.step_started(index, total, step);
            let started = Instant::now();
            let detail = match self.run_step(step, resolver) {
                Ok(d) => d,
                Err(e) => {
                    observer.step_failed(step, &e);
                    return Err(e);
                }
            };
            let outcome = StepOutcome {
                label: step.label(),
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                detail,
            };
            observer.step_finished(&outcome);
            outcomes.push(outcome);
        }

        Ok(UpgradeReport {
            project_root: self.project_root.clone(),
            resolver: resolver.name().to_owned(),
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            steps: outcomes,
        })
    }

    fn run_step(&self, step: &Step, resolver: &dyn Resolver) -> Result<StepDetail, CoreError> {
        match step {
            Step::Install(spec) => self.install(spec, resolver),
            Step::Compile(spec) => self.compile(spec, resolver),
            Step::Strip(entry) => self.strip(entry),
        }
    }

    fn install(&self, spec: &InstallSpec, resolver: &dyn Resolver) -> Result<StepDetail, CoreError> {
        info!("installing resolver toolchain");
        resolver.install(spec)?;
        Ok(StepDetail::Installed {
            requirements: spec.requirements.clone(),
        })
    }

    fn compile(&self, spec: &CompileSpec, resolver: &dyn Resolver) -> Result<StepDetail, CoreError> {
        let output = self.project_root.join(&spec.output);
        let before = digest_file(&output)?;

        info!("compiling {} -> {}", spec.input.display(), spec.output.display());
        resolver.compile(spec)?;

        let content = std::fs::read(&output)?;
        let digest = relock_schema::ShortDigest::of(&content);
        let lock = LockFile::parse(&String::from_utf8_lossy(&content));

        let missing_direct = match parse_requirements_file(self.project_root.join(&spec.input)) {
            Ok(manifest) => lock.missing_direct(&manifest),
            Err(e) => {
                debug!("cannot re-read {}: {e}", spec.input.display());
                Vec::new()
            }
        };
        for name in &missing_direct {
            warn!(
                "{} does not pin '{name}', which {} requires directly",
                spec.output.display(),
                spec.input.display()
            );
        }

        Ok(StepDetail::Compiled {
            name: spec.name.clone(),
            output: spec.output.clone(),
            pins: lock.pins.len(),
            changed: before.as_ref() != Some(&digest),
            digest,
            missing_direct,
        })
    }

    fn strip(&self, entry: &StripEntry) -> Result<StepDetail, CoreError> {
        if let Some(reason) = &entry.reason {
            debug!("stripping {} pins: {reason}", entry.packages.join(", "));
        }
        let filter = PinFilter::new(entry.packages.as_slice());
        let outcome = strip_pins_in_file(&self.project_root.join(&entry.file), &filter)?;
        for line in &outcome.removed {
            info!("removed '{line}' from {}", entry.file.display());
        }
        Ok(StepDetail::Stripped {
            file: entry.file.clone(),
            removed: outcome.removed,
        })
    }
}
