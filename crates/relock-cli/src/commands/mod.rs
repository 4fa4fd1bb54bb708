pub mod completions;
pub mod doctor;
pub mod man_pages;
pub mod plan;
pub mod strip;
pub mod upgrade;

use indicatif::{ProgressBar, ProgressStyle};
use relock_core::{CoreError, Engine};
use relock_schema::Plan;
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PLAN_ERROR: u8 = 2;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "pass" | "updated" => Style::new().green().apply_to(status).to_string(),
        "fail" => Style::new().red().bold().apply_to(status).to_string(),
        "warn" => Style::new().yellow().apply_to(status).to_string(),
        "unchanged" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

/// Load the plan for `engine`, honoring an explicit `--config`.
pub fn load_plan(engine: &Engine, config: Option<&Path>) -> Result<Plan, String> {
    if let Some(path) = config {
        if !path.exists() {
            return Err(format!("failed to read plan: {} does not exist", path.display()));
        }
    }
    engine.load_plan(config).map_err(|e| e.to_string())
}

/// Exit code for a failed run: the failing command's own code when there is
/// one, otherwise [`EXIT_FAILURE`].
pub fn failure_exit_code(err: &CoreError) -> u8 {
    err.step_exit_code()
        .and_then(|c| u8::try_from(c).ok())
        .filter(|c| *c != EXIT_SUCCESS)
        .unwrap_or(EXIT_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relock_runtime::RuntimeError;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_status_keeps_text() {
        for status in ["pass", "fail", "warn", "updated", "unchanged"] {
            assert!(colorize_status(status).contains(status));
        }
        assert_eq!(colorize_status("info"), "info");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_PLAN_ERROR);
    }

    #[test]
    fn failure_exit_code_uses_command_code() {
        let err = CoreError::Runtime(RuntimeError::StepFailed {
            command: "pip-compile".to_owned(),
            code: Some(2),
            output: String::new(),
        });
        assert_eq!(failure_exit_code(&err), 2);
    }

    #[test]
    fn failure_exit_code_falls_back_to_generic() {
        let signal = CoreError::Runtime(RuntimeError::StepFailed {
            command: "pip-compile".to_owned(),
            code: None,
            output: String::new(),
        });
        assert_eq!(failure_exit_code(&signal), EXIT_FAILURE);
        assert_eq!(failure_exit_code(&CoreError::Interrupted), EXIT_FAILURE);

        let out_of_range = CoreError::Runtime(RuntimeError::StepFailed {
            command: "pip".to_owned(),
            code: Some(-1),
            output: String::new(),
        });
        assert_eq!(failure_exit_code(&out_of_range), EXIT_FAILURE);
    }

    #[test]
    fn load_plan_rejects_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path());
        let err = load_plan(&engine, Some(&dir.path().join("custom.toml"))).unwrap_err();
        assert!(err.starts_with("failed to read plan"));
        assert_eq!(load_plan(&engine, None).unwrap(), Plan::default());
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
