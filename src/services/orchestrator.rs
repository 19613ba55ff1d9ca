//! Drives a whole bucket migration: list, fan out, count, report.
//!
//! Pages are processed one at a time. Every object of a page is dispatched to
//! a bounded pool of worker tasks, and the next page is only requested once
//! all objects of the current page have finished. Listing failures end the
//! job; transfer failures never reach this level.

use crate::{
    errors::MigrationError,
    models::{job::MigrationJob, page::Page},
    services::{
        enumerator::{DEFAULT_PAGE_SIZE, Enumerator},
        progress::ProgressReporter,
        retry::{RetryPolicy, RetryingExecutor, TransferOutcome},
    },
};
use futures::{StreamExt, stream};
use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// Tunables of a migration run.
#[derive(Clone, Debug)]
pub struct MigrationOptions {
    /// Maximum number of objects copied at the same time.
    pub workers: usize,
    /// Keys requested per listing call.
    pub page_size: usize,
    pub retry: RetryPolicy,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Worker pool width matching the host's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Objects seen across all listing pages.
    pub listed: u64,
    /// Total size of the listed objects, as reported by the listing.
    pub listed_bytes: u64,
    /// Objects written to the destination; equals the final progress count.
    pub copied: u64,
    /// Keys given up on. Always empty unless a retry cap is configured.
    pub abandoned: Vec<String>,
    pub pages: usize,
    pub elapsed: Duration,
}

impl MigrationSummary {
    /// Turn abandoned objects into an error so they are never silently lost.
    pub fn into_result(self) -> Result<Self, MigrationError> {
        if self.abandoned.is_empty() {
            Ok(self)
        } else {
            Err(MigrationError::Abandoned {
                keys: self.abandoned,
            })
        }
    }
}

#[derive(Default)]
struct Listed {
    objects: u64,
    bytes: u64,
    abandoned: Vec<String>,
}

/// Runs migration jobs with one progress line.
pub struct Migrator {
    options: MigrationOptions,
    reporter: ProgressReporter,
}

impl Migrator {
    pub fn new(options: MigrationOptions, reporter: ProgressReporter) -> Self {
        Self { options, reporter }
    }

    /// Copy every object of the source bucket into the destination bucket.
    pub async fn run(&mut self, job: &MigrationJob) -> Result<MigrationSummary, MigrationError> {
        let started = Instant::now();
        info!(
            ?job,
            workers = self.options.workers,
            page_size = self.options.page_size,
            "starting migration"
        );

        let mut enumerator = Enumerator::new(
            job.source.clone(),
            job.source_bucket.clone(),
            self.options.page_size,
        );

        self.reporter.start("Collecting files").await;
        let first = enumerator.next_page().await;
        self.reporter.stop().await;
        let first = first?;

        self.reporter.start("Copying files").await;
        let counter = self.reporter.counter();
        counter.reset();
        let executor = RetryingExecutor::new(self.options.retry.clone(), counter.clone());

        let copied = self.copy_pages(job, &executor, &mut enumerator, first).await;
        self.reporter.stop().await;
        let Listed {
            objects: listed,
            bytes: listed_bytes,
            abandoned,
        } = copied?;

        let summary = MigrationSummary {
            listed,
            listed_bytes,
            copied: counter.value(),
            abandoned,
            pages: enumerator.pages(),
            elapsed: started.elapsed(),
        };
        info!(
            listed = summary.listed,
            listed_bytes = summary.listed_bytes,
            copied = summary.copied,
            abandoned = summary.abandoned.len(),
            pages = summary.pages,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "migration finished"
        );
        Ok(summary)
    }

    async fn copy_pages(
        &self,
        job: &MigrationJob,
        executor: &RetryingExecutor,
        enumerator: &mut Enumerator,
        first: Option<Page>,
    ) -> Result<Listed, MigrationError> {
        let mut listed = Listed::default();
        let mut next = first;

        while let Some(page) = next {
            listed.objects += page.len() as u64;
            listed.bytes += page.objects.iter().map(|o| o.size_bytes).sum::<u64>();
            listed
                .abandoned
                .extend(self.copy_page(job, executor, page).await);
            next = enumerator.next_page().await?;
        }

        Ok(listed)
    }

    /// Copy one page with at most `workers` objects in flight; returns the
    /// keys that were abandoned.
    async fn copy_page(
        &self,
        job: &MigrationJob,
        executor: &RetryingExecutor,
        page: Page,
    ) -> Vec<String> {
        let workers = self.options.workers.max(1);
        debug!(objects = page.len(), workers, "dispatching page");

        let results: Vec<(String, Result<TransferOutcome, JoinError>)> =
            stream::iter(page.objects)
                .map(|record| {
                    let job = job.clone();
                    let executor = executor.clone();
                    let key = record.name.clone();
                    let handle = tokio::spawn(async move { executor.run(&job, &record).await });
                    async move { (key, handle.await) }
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        results
            .into_iter()
            .filter_map(|(key, joined)| match joined {
                Ok(TransferOutcome::Copied { .. }) => None,
                Ok(TransferOutcome::Abandoned { last_error, .. }) => {
                    error!(key = %key, error = %last_error, "object was not migrated");
                    Some(key)
                }
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    error!(key = %key, error = %err, "transfer task did not finish");
                    Some(key)
                }
            })
            .collect()
    }
}
