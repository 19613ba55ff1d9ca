//! Migration engine: connections, listing, copying, retrying and progress.

pub mod connection;
pub mod enumerator;
pub mod memory_store;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod s3_connection;
pub mod transfer;
