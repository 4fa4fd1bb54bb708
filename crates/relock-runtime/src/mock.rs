use crate::resolver::{Resolver, ResolverConfig};
use crate::RuntimeError;
use relock_schema::{
    parse_requirements_str, write_atomic, CompileSpec, InstallSpec, PackageName,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const MOCK_VERSION: &str = "0.0.0-mock";

/// Packages pip-compile only pins with `--allow-unsafe`.
pub const UNSAFE_PACKAGES: &[&str] = &["distribute", "pip", "setuptools"];

const UNSAFE_BANNER: &str =
    "# The following packages are considered to be unsafe in a requirements file:";

/// Deterministic stand-in for pip-compile: every requirement reachable from
/// the manifest (following `-r`) is pinned at [`MOCK_VERSION`].
pub struct MockResolver {
    config: ResolverConfig,
    calls: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every install/compile invocation so far, as `install`/`compile:<name>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .push(call);
        Ok(())
    }

    fn collect(
        &self,
        relative: &Path,
        via: &str,
        seen: &mut BTreeSet<PathBuf>,
        pins: &mut BTreeMap<PackageName, BTreeSet<String>>,
    ) -> Result<(), RuntimeError> {
        let path = self.config.project_root.join(relative);
        if !seen.insert(path.clone()) {
            return Ok(());
        }
        let content = std::fs::read_to_string(&path).map_err(|_| RuntimeError::StepFailed {
            command: format!("mock compile {}", relative.display()),
            code: Some(2),
            output: format!("Error: Path '{}' does not exist.", relative.display()),
        })?;

        let parsed = parse_requirements_str(&content);
        for req in parsed.requirements {
            pins.entry(req.name).or_default().insert(via.to_owned());
        }
        let base = relative.parent().unwrap_or(Path::new(""));
        for include in parsed.includes {
            let nested = base.join(&include);
            let nested_via = format!("-r {}", nested.display());
            self.collect(&nested, &nested_via, seen, pins)?;
        }
        Ok(())
    }

    fn render(&self, spec: &CompileSpec, pins: &BTreeMap<PackageName, BTreeSet<String>>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#");
        let _ = writeln!(out, "# This file is autogenerated by the relock mock resolver");
        let _ = writeln!(out, "# by the following command:");
        let _ = writeln!(out, "#");
        let _ = writeln!(out, "#    {}", self.config.compile_command);
        let _ = writeln!(out, "#");

        let (unsafe_pins, safe_pins): (Vec<_>, Vec<_>) = pins
            .iter()
            .partition(|(name, _)| UNSAFE_PACKAGES.contains(&name.as_str()));

        for (name, via) in safe_pins {
            write_pin(&mut out, name, via);
        }

        if !unsafe_pins.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{UNSAFE_BANNER}");
            for (name, via) in unsafe_pins {
                if spec.allow_unsafe {
                    write_pin(&mut out, name, via);
                } else {
                    let _ = writeln!(out, "# {name}");
                }
            }
        }
        out
    }
}

fn write_pin(out: &mut String, name: &PackageName, via: &BTreeSet<String>) {
    let _ = writeln!(out, "{name}=={MOCK_VERSION}");
    for v in via {
        let _ = writeln!(out, "    # via {v}");
    }
}

impl Resolver for MockResolver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn install(&self, spec: &InstallSpec) -> Result<(), RuntimeError> {
        self.record("install".to_owned())?;
        for req in &spec.requirements {
            if !self.config.project_root.join(req).is_file() {
                return Err(RuntimeError::StepFailed {
                    command: format!("mock install -r {}", req.display()),
                    code: Some(1),
                    output: format!(
                        "ERROR: Could not open requirements file: {}",
                        req.display()
                    ),
                });
            }
        }
        Ok(())
    }

    fn compile(&self, spec: &CompileSpec) -> Result<(), RuntimeError> {
        self.record(format!("compile:{}", spec.name))?;
        let mut seen = BTreeSet::new();
        let mut pins = BTreeMap::new();
        let via = format!("-r {}", spec.input.display());
        self.collect(&spec.input, &via, &mut seen, &mut pins)?;

        let rendered = self.render(spec, &pins);
        write_atomic(
            &self.config.project_root.join(&spec.output),
            rendered.as_bytes(),
        )?;
        Ok(())
    }
}
