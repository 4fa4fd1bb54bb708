use super::{json_pretty, EXIT_SUCCESS};
use relock_schema::plan::is_valid_package_name;
use relock_schema::{strip_pins_in_file, PinFilter};
use std::path::Path;

pub fn run(file: &Path, packages: &[String], json: bool) -> Result<u8, String> {
    if let Some(bad) = packages.iter().find(|p| !is_valid_package_name(p)) {
        return Err(format!("invalid package name: '{bad}'"));
    }

    let filter = PinFilter::new(packages);
    let outcome = strip_pins_in_file(file, &filter)
        .map_err(|e| format!("failed to strip {}: {e}", file.display()))?;

    if json {
        let payload = serde_json::json!({
            "file": file,
            "packages": packages,
            "removed": outcome.removed,
            "rewritten": outcome.rewritten,
        });
        println!("{}", json_pretty(&payload)?);
    } else if outcome.removed.is_empty() {
        println!("no matching pins in {}", file.display());
    } else {
        for line in &outcome.removed {
            println!("removed {line}");
        }
        println!(
            "{} line(s) removed from {}",
            outcome.removed.len(),
            file.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
