use super::{colorize_status, EXIT_FAILURE, EXIT_SUCCESS};
use relock_core::Engine;
use relock_runtime::prereq::command_exists;
use relock_schema::Plan;
use std::path::Path;

pub fn run(engine: &Engine, config: Option<&Path>, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let plan_path = config.map_or_else(|| engine.default_plan_path(), Path::to_path_buf);
    let plan = match engine.load_plan(Some(&plan_path)) {
        Ok(plan) => {
            if plan_path.exists() {
                checks.push(Check::pass(
                    "plan",
                    &format!("Plan loaded from {}", plan_path.display()),
                ));
            } else {
                checks.push(Check::info(
                    "plan",
                    &format!("No {} found, using the built-in plan", plan_path.display()),
                ));
            }
            plan
        }
        Err(e) => {
            checks.push(Check::fail("plan", &format!("Plan is invalid: {e}")));
            return print_results(&checks, false, json_output);
        }
    };

    check_tools(&plan, &mut checks, &mut all_pass);
    check_files(engine.project_root(), &plan, &mut checks, &mut all_pass);

    print_results(&checks, all_pass, json_output)
}

fn check_tools(plan: &Plan, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if plan.resolver == "mock" {
        checks.push(Check::info("resolver", "Mock resolver selected; no tools needed"));
        return;
    }

    let pip = &plan.toolchain.pip;
    if command_exists(pip) {
        checks.push(Check::pass("pip", &format!("'{pip}' is available")));
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "pip",
            &format!("'{pip}' not found; it installs the resolver toolchain"),
        ));
    }

    let pip_compile = &plan.toolchain.pip_compile;
    if command_exists(pip_compile) {
        checks.push(Check::pass(
            "pip_compile",
            &format!("'{pip_compile}' is available"),
        ));
    } else {
        checks.push(Check::warn(
            "pip_compile",
            &format!("'{pip_compile}' not found yet (the install step provides it)"),
        ));
    }
}

fn check_files(root: &Path, plan: &Plan, checks: &mut Vec<Check>, all_pass: &mut bool) {
    for req in &plan.toolchain.requirements {
        if root.join(req).is_file() {
            checks.push(Check::pass(
                "toolchain",
                &format!("Toolchain requirements {} present", req.display()),
            ));
        } else {
            *all_pass = false;
            checks.push(Check::fail(
                "toolchain",
                &format!("Toolchain requirements {} missing", req.display()),
            ));
        }
    }

    let missing: Vec<_> = plan
        .compile
        .iter()
        .filter(|c| !root.join(&c.input).is_file())
        .collect();
    if missing.is_empty() {
        checks.push(Check::pass(
            "manifests",
            &format!("All {} manifests present", plan.compile.len()),
        ));
    } else {
        *all_pass = false;
        for entry in missing {
            checks.push(Check::fail(
                "manifests",
                &format!("Manifest {} ({}) missing", entry.input.display(), entry.name),
            ));
        }
    }

    for entry in &plan.strip {
        checks.push(Check::info(
            "strip",
            &format!(
                "{} will drop pins for: {}",
                entry.file.display(),
                entry.packages.join(", ")
            ),
        ));
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("relock doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {} {}", colorize_status(check.status), check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
