mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_PLAN_ERROR};
use relock_core::{install_signal_handler, Engine, UpgradeOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "relock",
    version,
    about = "Regenerate pinned Python requirement files with pip-compile"
)]
struct Cli {
    /// Project directory; plan paths are relative to it.
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Upgrade plan file, relative to --project (default: relock.toml, built-in plan if absent).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install the toolchain, recompile every lock file, then strip configured pins.
    Upgrade {
        /// Keep existing pins where the manifest still allows them.
        #[arg(long, default_value_t = false)]
        no_upgrade: bool,
        /// Skip the toolchain install step.
        #[arg(long, default_value_t = false)]
        skip_install: bool,
        /// Override the resolver named in the plan ("pip-compile" or "mock").
        #[arg(long)]
        resolver: Option<String>,
    },
    /// Show the steps an upgrade would run, as shell commands.
    Plan {
        /// Show the steps as they would run with --no-upgrade.
        #[arg(long, default_value_t = false)]
        no_upgrade: bool,
    },
    /// Remove pins for the given packages from a lock file, in place.
    Strip {
        /// Lock file to filter.
        file: PathBuf,
        /// Package whose pin is removed (repeatable).
        #[arg(short, long = "package", default_value = "django")]
        packages: Vec<String>,
    },
    /// Check prerequisites and that every manifest in the plan exists.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RELOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let engine = Engine::new(&cli.project);
    let config_path = cli.config.as_ref().map(|c| cli.project.join(c));
    let config = config_path.as_deref();
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Upgrade {
            no_upgrade,
            skip_install,
            resolver,
        } => commands::upgrade::run(
            &engine,
            config,
            UpgradeOptions {
                upgrade: !no_upgrade,
                skip_install,
            },
            resolver.as_deref(),
            json_output,
        ),
        Commands::Plan { no_upgrade } => {
            commands::plan::run(&engine, config, !no_upgrade, json_output)
        }
        Commands::Strip { file, packages } => {
            commands::strip::run(&cli.project.join(file), &packages, json_output)
        }
        Commands::Doctor => commands::doctor::run(&engine, config, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("plan error:")
                || msg.starts_with("failed to parse plan")
                || msg.starts_with("failed to read plan")
            {
                EXIT_PLAN_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
