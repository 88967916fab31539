//! `strenum migrate`: apply a migration script to PostgreSQL.

use crate::cli::config::LoadedConfig;
use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use strenum_db::{
    DryRun, EnumMigrator, MigrationError, MigrationReport, MigrationScript, PgExecutor, SqlExecutor,
};
use tracing::info;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration script (TOML)
    pub script: PathBuf,

    /// PostgreSQL connection URL
    #[arg(long, env = "STRENUM_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Print the statements without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct MigrationOutcome {
    pub dry_run: bool,
    pub report: MigrationReport,
    /// Statements a dry run would have executed
    pub planned: Vec<String>,
}

/// Run a script through `executor`. A dry run plays the statements against an
/// in-memory copy of what the script touches and leaves `executor` unchanged.
pub fn execute_script<E: SqlExecutor>(
    executor: E,
    script: &MigrationScript,
    dry_run: bool,
) -> Result<(MigrationOutcome, E), MigrationError> {
    if dry_run {
        let mut migrator = EnumMigrator::new(DryRun::new(executor));
        let report = migrator.run_script(script)?;
        let (executor, planned) = migrator.into_inner().into_parts();
        Ok((
            MigrationOutcome {
                dry_run: true,
                report,
                planned,
            },
            executor,
        ))
    } else {
        let mut migrator = EnumMigrator::new(executor);
        let report = migrator.run_script(script)?;
        Ok((
            MigrationOutcome {
                dry_run: false,
                report,
                planned: Vec::new(),
            },
            migrator.into_inner(),
        ))
    }
}

/// Load a script, filling in the configured schema when it names none.
pub fn load_script(path: &std::path::Path, default_schema: Option<&str>) -> Result<MigrationScript> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let mut script = MigrationScript::load(path).map_err(|e| {
        HelpfulError::migration_failed(&e, format!("While reading {}", path.display()))
    })?;
    if script.schema.is_none() {
        script.schema = default_schema.map(str::to_string);
    }
    Ok(script)
}

pub fn run(args: MigrateArgs, loaded: &LoadedConfig) -> Result<()> {
    let script = load_script(&args.script, loaded.default_schema())?;
    let url = loaded.database_url(args.database_url.as_deref())?;

    let executor = PgExecutor::connect(&url).map_err(|e| {
        HelpfulError::migration_failed(&MigrationError::from(e), "While connecting to PostgreSQL")
    })?;

    info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        dry_run = args.dry_run,
        "Running migration script"
    );
    let (outcome, executor) = execute_script(executor, &script, args.dry_run).map_err(|e| {
        HelpfulError::migration_failed(&e, format!("While applying {}", args.script.display()))
    })?;
    executor.close().map_err(|e| {
        HelpfulError::migration_failed(&MigrationError::from(e), "While closing the connection")
    })?;

    if args.json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &MigrationOutcome) {
    let rows = outcome
        .report
        .steps
        .iter()
        .map(|s| vec![s.index.to_string(), s.description.clone(), s.statements.to_string()])
        .collect();
    print_table(&["#", "Step", "Statements"], rows);

    if outcome.dry_run {
        println!("Dry run: {} statement(s) planned, nothing executed", outcome.planned.len());
        for sql in &outcome.planned {
            println!("  {};", sql);
        }
    } else {
        let elapsed = outcome.report.finished_at - outcome.report.started_at;
        println!(
            "Applied {} step(s), {} statement(s) in {} ms",
            outcome.report.steps.len(),
            outcome.report.total_statements(),
            elapsed.num_milliseconds()
        );
    }
}
