use relock_schema::ToolchainSection;
use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

pub fn command_exists(name: &str) -> bool {
    if name.contains('/') {
        return std::path::Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check what must exist before `relock upgrade` starts. `pip-compile` is
/// deliberately absent: the toolchain install step provides it.
pub fn check_upgrade_prereqs(toolchain: &ToolchainSection) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(&toolchain.pip) {
        missing.push(MissingPrereq {
            name: toolchain.pip.clone(),
            purpose: "installing the resolver toolchain",
            install_hint: "activate the project's virtualenv, or: python -m ensurepip",
        });
    }

    missing
}

/// Like [`check_upgrade_prereqs`], but also reports a missing `pip-compile`.
pub fn check_all_prereqs(toolchain: &ToolchainSection) -> Vec<MissingPrereq> {
    let mut missing = check_upgrade_prereqs(toolchain);

    if !command_exists(&toolchain.pip_compile) {
        missing.push(MissingPrereq {
            name: toolchain.pip_compile.clone(),
            purpose: "resolving manifests into lock files",
            install_hint: "pip install pip-tools (or run 'relock upgrade', which installs it)",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nrelock drives pip and pip-compile to regenerate lock files.");
    msg
}
