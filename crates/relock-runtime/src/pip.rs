use crate::resolver::{Resolver, ResolverConfig, COMPILE_COMMAND_ENV};
use crate::RuntimeError;
use relock_schema::{CompileSpec, InstallSpec};
use std::ffi::OsString;
use std::process::Command;
use tracing::{debug, info};

/// Resolver backed by pip-tools' `pip-compile`, with `pip` for the toolchain.
pub struct PipCompileResolver {
    config: ResolverConfig,
}

impl PipCompileResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    fn command(&self, program: &str, args: &[OsString]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.config.project_root)
            .env(COMPILE_COMMAND_ENV, &self.config.compile_command);
        cmd
    }
}

pub fn install_args(spec: &InstallSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["install".into(), "-q".into()];
    for req in &spec.requirements {
        args.push("-r".into());
        args.push(req.into());
    }
    args
}

pub fn compile_args(spec: &CompileSpec) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if spec.upgrade {
        args.push("--upgrade".into());
    }
    if spec.allow_unsafe {
        args.push("--allow-unsafe".into());
    }
    if spec.rebuild {
        args.push("--rebuild".into());
    }
    args.push("--output-file".into());
    args.push(spec.output.clone().into());
    args.push(spec.input.clone().into());
    args
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[OsString]) -> String {
    let mut out = program.to_owned();
    for arg in args {
        out.push(' ');
        out.push_str(&arg.to_string_lossy());
    }
    out
}

/// Run to completion, capturing output. A non-zero exit becomes
/// [`RuntimeError::StepFailed`] carrying the exit code and the output.
pub fn run_captured(mut cmd: Command, command_line: &str) -> Result<String, RuntimeError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RuntimeError::ToolUnavailable(program)
        } else {
            RuntimeError::Io(e)
        }
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    for line in text.lines() {
        debug!("  | {line}");
    }

    if output.status.success() {
        Ok(text)
    } else {
        Err(RuntimeError::StepFailed {
            command: command_line.to_owned(),
            code: output.status.code(),
            output: text,
        })
    }
}

impl Resolver for PipCompileResolver {
    fn name(&self) -> &'static str {
        "pip-compile"
    }

    fn available(&self) -> bool {
        crate::prereq::command_exists(&self.config.pip)
    }

    fn install(&self, spec: &InstallSpec) -> Result<(), RuntimeError> {
        let args = install_args(spec);
        let command_line = display_command(&self.config.pip, &args);
        info!("{command_line}");
        run_captured(self.command(&self.config.pip, &args), &command_line)?;
        Ok(())
    }

    fn compile(&self, spec: &CompileSpec) -> Result<(), RuntimeError> {
        let args = compile_args(spec);
        let command_line = display_command(&self.config.pip_compile, &args);
        info!("{command_line}");
        run_captured(self.command(&self.config.pip_compile, &args), &command_line)?;
        Ok(())
    }
}
