use anyhow::Result;
use s3_migrate::{
    MigrationError, MigrationJob, Migrator, ProgressReporter,
    cli::{self, credentials::CredentialStore, prompt::TerminalPrompter},
    config::AppConfig,
    services::s3_connection::S3Connection,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr; stdout carries prompts and progress) ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::debug!(?cfg, "loaded configuration");

    // --- Decide what to migrate ---
    let mut store = CredentialStore::load(&cfg.credentials_file);
    let mut prompter = TerminalPrompter;
    let Some(plan) = cli::plan_migration(&cfg, &mut prompter, &mut store)? else {
        println!("! Okay. Exiting.");
        return Ok(());
    };

    // --- Connect both sides ---
    let source =
        S3Connection::connect(&plan.source.settings(&cfg.region), "s3migrate-source").await;
    let destination =
        S3Connection::connect(&plan.destination.settings(&cfg.region), "s3migrate-dest").await;
    let job = MigrationJob::new(
        Arc::new(source),
        plan.source.bucket.clone(),
        Arc::new(destination),
        plan.destination.bucket.clone(),
    );

    // --- Run ---
    let reporter = if cfg.progress {
        ProgressReporter::stdout()
    } else {
        ProgressReporter::disabled()
    };
    let mut migrator = Migrator::new(cfg.migration_options(), reporter);
    let summary = migrator.run(&job).await?;

    println!("{}", cli::summary_line(&summary, &plan));

    match summary.into_result() {
        Ok(_) => Ok(()),
        Err(MigrationError::Abandoned { keys }) => {
            eprintln!("! {} files could not be migrated:", keys.len());
            for key in &keys {
                eprintln!("    {key}");
            }
            Err(MigrationError::Abandoned { keys }.into())
        }
        Err(err) => Err(err.into()),
    }
}
