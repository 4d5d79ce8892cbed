//! rgwible - Declarative state management for Ceph RADOS Gateway
//!
//! This is the main entry point for the rgwible CLI.

mod cli;
mod config;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::output::OutputFormatter;
use cli::{ApplyArgs, Cli, Commands, OutputFormat};
use config::Config;
use rgwible::apply;
use rgwible::modules::{
    ModuleContext, ModuleError, ModuleParams, ModuleRegistry, ModuleStatus,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration (optional; defaults apply when absent)
    let config = Config::load(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        Config::default()
    });

    init_logging(cli.verbose, config.logging.level.as_deref());

    let formatter = OutputFormatter::new(
        !cli.no_color,
        cli.output == OutputFormat::Json,
        cli.verbose,
    );
    let context = ModuleContext::new()
        .with_check_mode(cli.check_mode)
        .with_diff_mode(cli.diff_mode);
    let registry = ModuleRegistry::with_builtins();

    let exit_code = match &cli.command {
        Commands::Bucket(args) => run_module(
            &registry,
            "rgw_bucket",
            args.to_params(&config.connection),
            &context,
            &formatter,
        ),
        Commands::Policy(args) => run_module(
            &registry,
            "rgw_policy",
            args.to_params(&config.connection),
            &context,
            &formatter,
        ),
        Commands::User(args) => run_module(
            &registry,
            "rgw_user",
            args.to_params(&config.connection),
            &context,
            &formatter,
        ),
        Commands::Apply(args) => run_apply(&registry, args, &context, &config, &formatter),
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "rgwible",
                &mut std::io::stdout(),
            );
            0
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, config_level: Option<&str>) {
    let filter = match verbosity {
        0 => config_level.unwrap_or("warn").to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(verbosity >= 3)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
}

/// Execute one module and map its outcome to an exit code.
fn run_module(
    registry: &ModuleRegistry,
    name: &str,
    params: ModuleParams,
    context: &ModuleContext,
    formatter: &OutputFormatter,
) -> i32 {
    match registry.execute(name, &params, context) {
        Ok(output) => {
            formatter.module_result(name, &output);
            if output.status == ModuleStatus::Failed {
                2
            } else {
                0
            }
        }
        Err(err @ (ModuleError::InvalidParameter(_) | ModuleError::MissingParameter(_))) => {
            formatter.error(&err.to_string());
            1
        }
        Err(err) => {
            formatter.error(&err.to_string());
            2
        }
    }
}

/// Run a task file; any failed task makes the run fail.
fn run_apply(
    registry: &ModuleRegistry,
    args: &ApplyArgs,
    context: &ModuleContext,
    config: &Config,
    formatter: &OutputFormatter,
) -> i32 {
    let tasks = match apply::load_tasks(&args.file) {
        Ok(tasks) => tasks,
        Err(err) => {
            formatter.error(&err.to_string());
            return 1;
        }
    };

    let defaults = args.connection.to_params(&config.connection);
    let outcomes = apply::run_tasks(registry, tasks, context, &defaults);

    let (mut ok, mut changed, mut failed) = (0usize, 0usize, 0usize);
    for outcome in &outcomes {
        match &outcome.result {
            Ok(output) => {
                formatter.module_result(outcome.task.display_name(), output);
                match output.status {
                    ModuleStatus::Failed => failed += 1,
                    ModuleStatus::Changed => changed += 1,
                    _ => ok += 1,
                }
            }
            Err(err) => {
                formatter.error(&format!("[{}] {}", outcome.task.display_name(), err));
                failed += 1;
            }
        }
    }

    formatter.recap(ok, changed, failed);
    if failed > 0 {
        2
    } else {
        0
    }
}
