//! Copy every object of one S3-compatible bucket into another, keeping each
//! object's storage class, content type, user metadata and access level.

pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{MigrationError, StoreError, TransferError};
pub use models::{
    job::MigrationJob,
    object::{AccessLevel, ObjectRecord, Tier},
    page::Page,
};
pub use services::{
    connection::Connection,
    orchestrator::{MigrationOptions, MigrationSummary, Migrator},
    progress::{ProgressCounter, ProgressReporter},
    retry::{RetryPolicy, RetryingExecutor, TransferOutcome},
};
