use super::{
    colorize_status, failure_exit_code, json_pretty, load_plan, spin_fail, spin_ok, spinner,
    EXIT_SUCCESS,
};
use indicatif::ProgressBar;
use relock_core::{
    CoreError, Engine, SilentObserver, StepDetail, StepOutcome, UpgradeObserver, UpgradeOptions,
};
use relock_runtime::{select_resolver, ResolverConfig};
use relock_schema::Step;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Drives one spinner per step on stderr.
struct SpinnerObserver {
    current: Option<(ProgressBar, String)>,
}

impl UpgradeObserver for SpinnerObserver {
    fn step_started(&mut self, index: usize, total: usize, step: &Step) {
        let prefix = format!("[{}/{total}]", index + 1);
        let pb = spinner(&format!("{prefix} {}...", step.label()));
        self.current = Some((pb, prefix));
    }

    fn step_finished(&mut self, outcome: &StepOutcome) {
        if let Some((pb, prefix)) = self.current.take() {
            spin_ok(&pb, &format!("{prefix} {}", outcome.summary()));
        }
    }

    fn step_failed(&mut self, step: &Step, _error: &CoreError) {
        if let Some((pb, prefix)) = self.current.take() {
            spin_fail(&pb, &format!("{prefix} {} failed", step.label()));
        }
    }
}

pub fn run(
    engine: &Engine,
    config: Option<&Path>,
    options: UpgradeOptions,
    resolver_override: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let plan = load_plan(engine, config)?;
    let resolver_name = resolver_override.unwrap_or(&plan.resolver);

    if resolver_name == "pip-compile"
        && std::env::var("RELOCK_SKIP_PREREQS").as_deref() != Ok("1")
    {
        let missing = relock_runtime::check_upgrade_prereqs(&plan.toolchain);
        if !missing.is_empty() {
            return Err(relock_runtime::format_missing(&missing));
        }
    }

    let resolver_config = ResolverConfig::new(engine.project_root(), &plan.toolchain)
        .with_compile_command(&plan.compile_command);
    let resolver = select_resolver(resolver_name, &resolver_config).map_err(|e| e.to_string())?;
    debug!(
        "resolver {} with CUSTOM_COMPILE_COMMAND=\"{}\"",
        resolver.name(),
        resolver_config.compile_command
    );

    let result = if json {
        engine.upgrade(&plan, resolver.as_ref(), options, &mut SilentObserver)
    } else {
        engine.upgrade(
            &plan,
            resolver.as_ref(),
            options,
            &mut SpinnerObserver { current: None },
        )
    };

    let report = match result {
        Ok(r) => r,
        Err(e) if e.command_output().is_some() => {
            if let Some(output) = e.command_output().filter(|o| !o.trim().is_empty()) {
                eprintln!("{}", output.trim_end());
            }
            if json {
                let payload = serde_json::json!({
                    "status": "failed",
                    "error": e.to_string(),
                    "exit_code": e.step_exit_code(),
                });
                println!("{}", json_pretty(&payload)?);
            }
            eprintln!("error: {e}");
            return Ok(failure_exit_code(&e));
        }
        Err(e) => return Err(e.to_string()),
    };

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    for step in &report.steps {
        if let StepDetail::Compiled {
            output, changed, ..
        } = &step.detail
        {
            let status = if *changed { "updated" } else { "unchanged" };
            println!("{:<10} {}", colorize_status(status), output.display());
        }
    }
    let changed = report.changed_lock_files();
    if changed.is_empty() {
        println!("all lock files up to date");
    } else {
        let files: BTreeSet<_> = changed.into_iter().collect();
        println!("{} lock file(s) changed", files.len());
    }
    Ok(EXIT_SUCCESS)
}
