//! Interactive front end: decides what to migrate and with which keys.
//!
//! Values given on the command line or in the environment are used as-is;
//! anything missing is asked for. With `--yes` nothing is asked and missing
//! credentials are an error.

pub mod credentials;
pub mod endpoint;
pub mod prompt;

use crate::{
    config::AppConfig,
    services::{orchestrator::MigrationSummary, s3_connection::S3Settings},
};
use anyhow::{Context, Result, bail};
use credentials::{AccessKeys, CredentialStore, SavedScope, redact};
use endpoint::{resolve_endpoint, shorthand_names};
use prompt::Prompter;

/// One side of a migration, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub endpoint: String,
    pub bucket: String,
    pub keys: AccessKeys,
}

impl Target {
    pub fn settings(&self, region: &str) -> S3Settings {
        S3Settings {
            endpoint: self.endpoint.clone(),
            region: region.to_string(),
            access_id: self.keys.id.clone(),
            access_key: self.keys.secret.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub source: Target,
    pub destination: Target,
}

#[derive(Clone, Copy, Debug)]
enum Side {
    Source,
    Destination,
}

impl Side {
    fn name(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }

    fn direction(self) -> &'static str {
        match self {
            Side::Source => "from",
            Side::Destination => "to",
        }
    }

    fn env_name(self) -> &'static str {
        match self {
            Side::Source => "SOURCE",
            Side::Destination => "DEST",
        }
    }
}

/// Work out the full plan, or `None` if the user backed out.
pub fn plan_migration(
    cfg: &AppConfig,
    prompter: &mut dyn Prompter,
    store: &mut CredentialStore,
) -> Result<Option<MigrationPlan>> {
    let [(source_endpoint, source_bucket), (dest_endpoint, dest_bucket)] =
        choose_buckets(cfg, prompter)?;

    let source_keys = choose_keys(
        cfg.source_keys.clone(),
        Side::Source,
        (&source_endpoint, &source_bucket),
        cfg.assume_yes,
        prompter,
        store,
    )?;
    let dest_keys = choose_keys(
        cfg.dest_keys.clone(),
        Side::Destination,
        (&dest_endpoint, &dest_bucket),
        cfg.assume_yes,
        prompter,
        store,
    )?;

    if !cfg.assume_yes {
        prompter.say("! We're ready to migrate the bucket.");
        prompter.say(
            "  Any existing files at the same path in the new bucket as there are files \
             in the old bucket WILL BE OVERWRITTEN!",
        );
        let go = prompter.confirm(
            "This is your last chance: perform the migration? \
             This may incur large egress and ingress fees.",
        )?;
        if !go {
            return Ok(None);
        }
    }

    Ok(Some(MigrationPlan {
        source: Target {
            endpoint: source_endpoint,
            bucket: source_bucket,
            keys: source_keys,
        },
        destination: Target {
            endpoint: dest_endpoint,
            bucket: dest_bucket,
            keys: dest_keys,
        },
    }))
}

/// Closing line of a run. Only a run with nothing abandoned reads as done.
pub fn summary_line(summary: &MigrationSummary, plan: &MigrationPlan) -> String {
    let route = format!(
        "from {}/{} to {}/{}",
        plan.source.endpoint, plan.source.bucket, plan.destination.endpoint, plan.destination.bucket
    );
    let secs = summary.elapsed.as_secs_f64();
    if summary.abandoned.is_empty() {
        format!(
            "All done! Migrated {} files ({} bytes) {route} in {secs:.1}s.",
            summary.copied, summary.listed_bytes
        )
    } else {
        format!(
            "! Finished with {} abandoned files. Migrated {} of {} files {route} in {secs:.1}s.",
            summary.abandoned.len(),
            summary.copied,
            summary.listed
        )
    }
}

/// Endpoints and buckets for both sides, confirmed by the user.
///
/// Declining the summary asks for all four values again.
fn choose_buckets(
    cfg: &AppConfig,
    prompter: &mut dyn Prompter,
) -> Result<[(String, String); 2]> {
    let mut preset = [
        cfg.source_endpoint.clone(),
        cfg.source_bucket.clone(),
        cfg.dest_endpoint.clone(),
        cfg.dest_bucket.clone(),
    ];

    loop {
        let source_endpoint = endpoint_answer(preset[0].take(), Side::Source, prompter)?;
        let source_bucket = bucket_answer(preset[1].take(), Side::Source, prompter)?;
        let dest_endpoint = endpoint_answer(preset[2].take(), Side::Destination, prompter)?;
        let dest_bucket = bucket_answer(preset[3].take(), Side::Destination, prompter)?;

        prompter.say("! Going to migrate...");
        prompter.say(&format!("    from: {source_endpoint}/{source_bucket}"));
        prompter.say(&format!("      to: {dest_endpoint}/{dest_bucket}"));

        if cfg.assume_yes || prompter.confirm("Does this look right?")? {
            return Ok([
                (source_endpoint, source_bucket),
                (dest_endpoint, dest_bucket),
            ]);
        }
    }
}

fn endpoint_answer(
    preset: Option<String>,
    side: Side,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    let endpoint = match preset {
        Some(value) => resolve_endpoint(&value)
            .with_context(|| format!("invalid {} endpoint", side.name()))?,
        None => loop {
            let answer = prompter.text(&format!(
                "What S3 server are you migrating {}? (e.g. https://s3.amazonaws.com)\n  \
                 You may also answer a shorthand service name. The supported ones are {}",
                side.direction(),
                shorthand_names()
            ))?;
            match resolve_endpoint(&answer) {
                Ok(endpoint) => break endpoint,
                Err(err) => prompter.say(&format!("! {err}")),
            }
        },
    };
    prompter.say(&format!("< Using {endpoint} as the {} endpoint", side.name()));
    Ok(endpoint)
}

fn bucket_answer(
    preset: Option<String>,
    side: Side,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    match preset {
        Some(bucket) => Ok(bucket),
        None => prompter.text(&format!(
            "What's the name of the bucket you're migrating {}?",
            side.direction()
        )),
    }
}

fn choose_keys(
    preset: Option<AccessKeys>,
    side: Side,
    (endpoint, bucket): (&str, &str),
    assume_yes: bool,
    prompter: &mut dyn Prompter,
    store: &mut CredentialStore,
) -> Result<AccessKeys> {
    let using = |keys: &AccessKeys| {
        format!("< Using access key ID {} for {} server.", redact(&keys.id), side.name())
    };

    if let Some(keys) = preset {
        prompter.say(&using(&keys));
        return Ok(keys);
    }

    if let Some((scope, saved)) = store
        .lookup(endpoint, bucket)
        .map(|(scope, keys)| (scope, keys.clone()))
    {
        let question = match scope {
            SavedScope::Bucket => {
                format!("Use saved credentials for {} server and bucket?", side.name())
            }
            SavedScope::Endpoint => {
                format!("Use saved credentials for {} server?", side.name())
            }
        };
        if assume_yes || prompter.confirm(&question)? {
            prompter.say(&using(&saved));
            return Ok(saved);
        }
    }

    if assume_yes {
        bail!(
            "no credentials for the {side} server; set S3MIGRATE_{env}_ACCESS_ID and \
             S3MIGRATE_{env}_ACCESS_KEY or save them in {path}",
            side = side.name(),
            env = side.env_name(),
            path = store.path().display()
        );
    }

    let id = prompter.text(&format!("What's the Access ID for the {} server?", side.name()))?;
    let secret =
        prompter.secret(&format!("What's the Access Key for the {} server?", side.name()))?;
    let keys = AccessKeys::new(id, secret);

    if prompter.confirm("Would you like to save these credentials for later?")? {
        store.remember(endpoint, bucket, &keys);
        if !store.try_save() {
            prompter.say("! Failed to save credentials");
        }
    }
    Ok(keys)
}
