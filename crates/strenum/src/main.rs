//! strenum: string enum declarations and PostgreSQL enum migrations.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strenum_logging::{init_logging, LogConfig};
use tracing::debug;

mod cli;

use cli::compile::CompileArgs;
use cli::config::{ConfigArgs, LoadedConfig};
use cli::inspect::InspectArgs;
use cli::migrate::MigrateArgs;

#[derive(Parser, Debug)]
#[command(name = "strenum", version, about = "String enum compiler and PostgreSQL enum migrator")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ./strenum.toml when present)
    #[arg(long, global = true, env = "STRENUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile enum declarations and list the generated members (no database required)
    Compile(CompileArgs),

    /// Apply a migration script to PostgreSQL
    Migrate(MigrateArgs),

    /// Show an enum type's labels and dependent columns
    Inspect(InspectArgs),

    /// Show the effective configuration
    Config {
        #[command(flatten)]
        args: ConfigArgs,

        /// PostgreSQL connection URL
        #[arg(long, env = "STRENUM_DATABASE_URL")]
        database_url: Option<String>,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Compile(args) => args.json,
        Commands::Migrate(args) => args.json,
        Commands::Inspect(args) => args.json,
        Commands::Config { args, .. } => args.json,
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Compile(_) => "compile",
        Commands::Migrate(_) => "migrate",
        Commands::Inspect(_) => "inspect",
        Commands::Config { .. } => "config",
    }
}

fn run_command(command: Commands, loaded: &LoadedConfig) -> anyhow::Result<()> {
    match command {
        Commands::Compile(args) => cli::compile::run(args, loaded),
        Commands::Migrate(args) => cli::migrate::run(args, loaded),
        Commands::Inspect(args) => cli::inspect::run(args, loaded),
        Commands::Config { args, database_url } => {
            cli::config::run(args, loaded, database_url.as_deref())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let loaded = cli::config::load_config(cli.config.as_deref());
    let filter = loaded
        .as_ref()
        .ok()
        .and_then(|l| l.config.logging.filter.clone());

    let _log_guard = match init_logging(LogConfig {
        app_name: "strenum",
        verbose: cli.verbose,
        filter: filter.as_deref(),
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    let result = loaded.and_then(|loaded| {
        debug!(command = command_name(&cli.command), config = ?loaded.source, "Running command");
        run_command(cli.command, &loaded)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if let Some(helpful) = err.downcast_ref::<cli::error::HelpfulError>() {
                eprint!("{}", helpful);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
