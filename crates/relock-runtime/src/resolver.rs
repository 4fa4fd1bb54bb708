use crate::RuntimeError;
use relock_schema::{CompileSpec, InstallSpec, ToolchainSection};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable the resolver embeds in lock-file headers.
pub const COMPILE_COMMAND_ENV: &str = "CUSTOM_COMPILE_COMMAND";

/// Everything a resolver backend needs to know about the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Directory every command runs in; plan paths are relative to it.
    pub project_root: PathBuf,
    pub pip: String,
    pub pip_compile: String,
    /// Provenance string exported as `CUSTOM_COMPILE_COMMAND`.
    pub compile_command: String,
}

impl ResolverConfig {
    pub fn new(project_root: impl Into<PathBuf>, toolchain: &ToolchainSection) -> Self {
        Self {
            project_root: project_root.into(),
            pip: toolchain.pip.clone(),
            pip_compile: toolchain.pip_compile.clone(),
            compile_command: relock_schema::DEFAULT_COMPILE_COMMAND.to_owned(),
        }
    }

    /// Use the caller's `CUSTOM_COMPILE_COMMAND` when exported, `fallback`
    /// otherwise.
    #[must_use]
    pub fn with_compile_command(mut self, fallback: &str) -> Self {
        self.compile_command = std::env::var(COMPILE_COMMAND_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| fallback.to_owned());
        self
    }
}

pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Install the toolchain needed for resolution.
    fn install(&self, spec: &InstallSpec) -> Result<(), RuntimeError>;

    /// Resolve `spec.input` and write the fully pinned lock file to
    /// `spec.output`, overwriting whatever was there.
    fn compile(&self, spec: &CompileSpec) -> Result<(), RuntimeError>;
}

pub fn select_resolver(
    name: &str,
    config: &ResolverConfig,
) -> Result<Box<dyn Resolver>, RuntimeError> {
    match name {
        "pip-compile" => Ok(Box::new(crate::pip::PipCompileResolver::new(
            config.clone(),
        ))),
        "mock" => Ok(Box::new(crate::mock::MockResolver::new(config.clone()))),
        other => Err(RuntimeError::UnknownResolver(other.to_owned())),
    }
}
