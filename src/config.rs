use crate::{
    cli::credentials::AccessKeys,
    services::{
        enumerator::DEFAULT_PAGE_SIZE,
        orchestrator::{MigrationOptions, default_workers},
        retry::RetryPolicy,
    },
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "S3MIGRATE_";
const DEFAULT_REGION: &str = "us-east-1";
const MAX_PAGE_SIZE: usize = 1000;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; flags win over env.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source_endpoint: Option<String>,
    pub source_bucket: Option<String>,
    pub dest_endpoint: Option<String>,
    pub dest_bucket: Option<String>,
    pub source_keys: Option<AccessKeys>,
    pub dest_keys: Option<AccessKeys>,
    pub region: String,
    pub workers: usize,
    pub page_size: usize,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub max_attempts: Option<u32>,
    pub credentials_file: PathBuf,
    pub assume_yes: bool,
    pub progress: bool,
}

/// Command-line configuration. Every option also reads `S3MIGRATE_<NAME>`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Copy every object from one S3-compatible bucket into another"
)]
pub struct Args {
    /// Source endpoint URL or shorthand (e.g. `aws`, `wasabi-east`)
    #[arg(long)]
    pub source_endpoint: Option<String>,

    /// Bucket to migrate from
    #[arg(long)]
    pub source_bucket: Option<String>,

    /// Destination endpoint URL or shorthand
    #[arg(long)]
    pub dest_endpoint: Option<String>,

    /// Bucket to migrate to
    #[arg(long)]
    pub dest_bucket: Option<String>,

    /// Signing region passed to both endpoints
    #[arg(long)]
    pub region: Option<String>,

    /// Objects copied concurrently (defaults to available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Keys requested per listing call
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Delay after the first failed copy of an object, in seconds
    #[arg(long)]
    pub initial_backoff_secs: Option<u64>,

    /// Upper bound for the retry delay, in seconds
    #[arg(long)]
    pub max_backoff_secs: Option<u64>,

    /// Give up on an object after this many attempts (default: never)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Location of the saved credentials file
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Do not draw the progress line
    #[arg(long)]
    pub no_progress: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::from_parts(args, |name| env::var(name).ok())
    }

    /// Merge parsed args with an environment lookup, then validate.
    pub fn from_parts(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| env(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        let parsed = |name: &str| -> Result<Option<u64>> { parse_var(name, var(name)) };

        let keys = |side: &str| match (
            var(&format!("{side}_ACCESS_ID")),
            var(&format!("{side}_ACCESS_KEY")),
        ) {
            (Some(id), Some(secret)) => Some(AccessKeys::new(id, secret)),
            _ => None,
        };

        let cfg = Self {
            source_endpoint: args.source_endpoint.or_else(|| var("SOURCE_ENDPOINT")),
            source_bucket: args.source_bucket.or_else(|| var("SOURCE_BUCKET")),
            dest_endpoint: args.dest_endpoint.or_else(|| var("DEST_ENDPOINT")),
            dest_bucket: args.dest_bucket.or_else(|| var("DEST_BUCKET")),
            source_keys: keys("SOURCE"),
            dest_keys: keys("DEST"),
            region: args
                .region
                .or_else(|| var("REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.into()),
            workers: match args.workers {
                Some(workers) => workers,
                None => parse_var("WORKERS", var("WORKERS"))?.unwrap_or_else(default_workers),
            },
            page_size: match args.page_size {
                Some(size) => size,
                None => parse_var("PAGE_SIZE", var("PAGE_SIZE"))?.unwrap_or(DEFAULT_PAGE_SIZE),
            },
            initial_backoff_secs: match args.initial_backoff_secs {
                Some(secs) => secs,
                None => parsed("INITIAL_BACKOFF_SECS")?.unwrap_or(5),
            },
            max_backoff_secs: match args.max_backoff_secs {
                Some(secs) => secs,
                None => parsed("MAX_BACKOFF_SECS")?.unwrap_or(60),
            },
            max_attempts: match args.max_attempts {
                Some(max) => Some(max),
                None => parse_var("MAX_ATTEMPTS", var("MAX_ATTEMPTS"))?,
            },
            credentials_file: args
                .credentials_file
                .or_else(|| var("CREDENTIALS_FILE").map(PathBuf::from))
                .unwrap_or_else(default_credentials_file),
            assume_yes: args.yes,
            progress: !args.no_progress,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            bail!("page size must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size);
        }
        if self.initial_backoff_secs == 0 {
            bail!("initial backoff must be at least one second");
        }
        if self.max_backoff_secs < self.initial_backoff_secs {
            bail!(
                "max backoff ({}s) is shorter than the initial backoff ({}s)",
                self.max_backoff_secs,
                self.initial_backoff_secs
            );
        }
        if self.max_attempts == Some(0) {
            bail!("max attempts must be at least 1 when set");
        }
        Ok(())
    }

    pub fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            workers: self.workers,
            page_size: self.page_size,
            retry: RetryPolicy {
                initial_delay: Duration::from_secs(self.initial_backoff_secs),
                max_delay: Duration::from_secs(self.max_backoff_secs),
                max_attempts: self.max_attempts,
            },
        }
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("parsing {ENV_PREFIX}{name} value `{raw}`"))
        })
        .transpose()
}

/// `~/.config/s3migrate/credentials.json`.
pub fn default_credentials_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("s3migrate")
        .join("credentials.json")
}
