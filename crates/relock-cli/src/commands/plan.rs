use super::{json_pretty, load_plan, EXIT_SUCCESS};
use relock_core::Engine;
use std::path::Path;

pub fn run(
    engine: &Engine,
    config: Option<&Path>,
    upgrade: bool,
    json: bool,
) -> Result<u8, String> {
    let plan = load_plan(engine, config)?;
    let steps = plan.steps(upgrade);

    if json {
        let payload = serde_json::json!({
            "project": engine.project_root(),
            "resolver": plan.resolver,
            "compile_command": plan.compile_command,
            "steps": steps.iter().map(|s| serde_json::json!({
                "label": s.label(),
                "command": s.command_line(&plan.toolchain),
                "step": s,
            })).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("# resolver: {}", plan.resolver);
    println!("export CUSTOM_COMPILE_COMMAND=\"{}\"", plan.compile_command);
    for step in &steps {
        println!("{}", step.command_line(&plan.toolchain));
    }
    for entry in &plan.strip {
        if let Some(reason) = &entry.reason {
            println!("# {}: {reason}", entry.file.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
