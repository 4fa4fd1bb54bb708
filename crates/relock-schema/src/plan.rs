use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::filter::sed_pattern;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Provenance string used when the caller has not exported one.
pub const DEFAULT_COMPILE_COMMAND: &str = "relock upgrade";

/// Conventional config file name looked up in the project root.
pub const PLAN_FILE_NAME: &str = "relock.toml";

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse plan: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("plan must declare at least one [[compile]] entry")]
    NoCompileSteps,
    #[error("compile name must not be empty")]
    EmptyCompileName,
    #[error("duplicate compile name: '{0}'")]
    DuplicateName(String),
    #[error("lock file '{0}' is produced by more than one compile entry")]
    DuplicateOutput(PathBuf),
    #[error("compile '{0}' writes its lock file over its own manifest")]
    OutputIsInput(String),
    #[error("strip entry for '{0}' lists no packages")]
    EmptyStripPackages(PathBuf),
    #[error("invalid package name in strip entry: '{0}'")]
    InvalidPackageName(String),
}

/// The ordered description of one `relock upgrade` run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default = "default_compile_command")]
    pub compile_command: String,
    #[serde(default = "default_resolver")]
    pub resolver: String,
    #[serde(default)]
    pub toolchain: ToolchainSection,
    #[serde(default)]
    pub compile: Vec<CompileEntry>,
    #[serde(default)]
    pub strip: Vec<StripEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSection {
    #[serde(default = "default_pip")]
    pub pip: String,
    #[serde(default = "default_pip_compile")]
    pub pip_compile: String,
    #[serde(default)]
    pub requirements: Vec<PathBuf>,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            pip: default_pip(),
            pip_compile: default_pip_compile(),
            requirements: Vec::new(),
        }
    }
}

/// One manifest → lock file pair.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompileEntry {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Also pin packages the resolver leaves out by default (pip, setuptools).
    #[serde(default)]
    pub allow_unsafe: bool,
    /// Discard cached resolution decisions before resolving.
    #[serde(default)]
    pub rebuild: bool,
}

/// Remove pins for `packages` from an already generated lock file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StripEntry {
    pub file: PathBuf,
    pub packages: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_compile_command() -> String {
    DEFAULT_COMPILE_COMMAND.to_owned()
}

fn default_resolver() -> String {
    "pip-compile".to_owned()
}

fn default_pip() -> String {
    "pip".to_owned()
}

fn default_pip_compile() -> String {
    "pip-compile".to_owned()
}

/// Settings handed to the resolver for a single compile.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompileSpec {
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub upgrade: bool,
    pub allow_unsafe: bool,
    pub rebuild: bool,
}

/// Settings handed to the resolver for the toolchain install.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstallSpec {
    pub requirements: Vec<PathBuf>,
}

/// A single unit of work, in execution order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Install(InstallSpec),
    Compile(CompileSpec),
    Strip(StripEntry),
}

impl Step {
    /// Short label for progress output.
    pub fn label(&self) -> String {
        match self {
            Step::Install(_) => "install toolchain".to_owned(),
            Step::Compile(c) => format!("compile {}", c.output.display()),
            Step::Strip(s) => format!("strip {}", s.file.display()),
        }
    }

    /// Equivalent shell command, using the toolchain's executables.
    pub fn command_line(&self, toolchain: &ToolchainSection) -> String {
        let mut out = String::new();
        match self {
            Step::Install(i) => {
                let _ = write!(out, "{} install -q", toolchain.pip);
                for req in &i.requirements {
                    let _ = write!(out, " -r {}", req.display());
                }
            }
            Step::Compile(c) => {
                out.push_str(&toolchain.pip_compile);
                if c.upgrade {
                    out.push_str(" --upgrade");
                }
                if c.allow_unsafe {
                    out.push_str(" --allow-unsafe");
                }
                if c.rebuild {
                    out.push_str(" --rebuild");
                }
                let _ = write!(
                    out,
                    " --output-file {} {}",
                    c.output.display(),
                    c.input.display()
                );
            }
            Step::Strip(s) => {
                out.push_str("sed -i");
                for package in &s.packages {
                    let _ = write!(out, " -e '/{}/d'", sed_pattern(package));
                }
                let _ = write!(out, " {}", s.file.display());
            }
        }
        out
    }
}

impl Default for Plan {
    /// Built-in layout: `requirements/<name>.in` → `requirements/<name>.txt`.
    fn default() -> Self {
        let compile = ["pip", "pip-tools", "base", "doc", "test", "tox", "ci"]
            .into_iter()
            .map(|name| CompileEntry {
                name: name.to_owned(),
                input: PathBuf::from(format!("requirements/{name}.in")),
                output: PathBuf::from(format!("requirements/{name}.txt")),
                allow_unsafe: name == "pip",
                rebuild: name == "pip",
            })
            .collect();

        Self {
            compile_command: default_compile_command(),
            resolver: default_resolver(),
            toolchain: ToolchainSection {
                requirements: vec![PathBuf::from("requirements/pip-tools.txt")],
                ..ToolchainSection::default()
            },
            compile,
            strip: vec![StripEntry {
                file: PathBuf::from("requirements/test.txt"),
                packages: vec!["django".to_owned()],
                reason: Some("tox controls the Django version used by the test matrix".to_owned()),
            }],
        }
    }
}

impl Plan {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.compile.is_empty() {
            return Err(PlanError::NoCompileSteps);
        }

        let mut names = BTreeSet::new();
        let mut outputs = BTreeSet::new();
        for entry in &self.compile {
            if entry.name.trim().is_empty() {
                return Err(PlanError::EmptyCompileName);
            }
            if !names.insert(entry.name.as_str()) {
                return Err(PlanError::DuplicateName(entry.name.clone()));
            }
            if !outputs.insert(entry.output.as_path()) {
                return Err(PlanError::DuplicateOutput(entry.output.clone()));
            }
            if entry.input == entry.output {
                return Err(PlanError::OutputIsInput(entry.name.clone()));
            }
        }

        for entry in &self.strip {
            if entry.packages.is_empty() {
                return Err(PlanError::EmptyStripPackages(entry.file.clone()));
            }
            for pkg in &entry.packages {
                if !is_valid_package_name(pkg) {
                    return Err(PlanError::InvalidPackageName(pkg.clone()));
                }
            }
        }

        Ok(())
    }

    /// Expand the plan into its linear step sequence.
    pub fn steps(&self, upgrade: bool) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.compile.len() + self.strip.len() + 1);
        if !self.toolchain.requirements.is_empty() {
            steps.push(Step::Install(InstallSpec {
                requirements: self.toolchain.requirements.clone(),
            }));
        }
        steps.extend(self.compile.iter().map(|c| {
            Step::Compile(CompileSpec {
                name: c.name.clone(),
                input: c.input.clone(),
                output: c.output.clone(),
                upgrade,
                allow_unsafe: c.allow_unsafe,
                rebuild: c.rebuild,
            })
        }));
        steps.extend(self.strip.iter().cloned().map(Step::Strip));
        steps
    }
}

pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn parse_plan_str(input: &str) -> Result<Plan, PlanError> {
    let plan: Plan = toml::from_str(input)?;
    plan.validate()?;
    Ok(plan)
}

pub fn parse_plan_file(path: impl AsRef<Path>) -> Result<Plan, PlanError> {
    let content = fs::read_to_string(path)?;
    parse_plan_str(&content)
}

/// Load `path` if it exists, otherwise fall back to [`Plan::default`].
pub fn load_plan_or_default(path: &Path) -> Result<Plan, PlanError> {
    if path.exists() {
        parse_plan_file(path)
    } else {
        Ok(Plan::default())
    }
}
