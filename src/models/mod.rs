//! Core data models for bucket migration.
//!
//! These are plain values: a listed object, a listing page and the job that
//! ties a source bucket to a destination bucket. They carry no I/O.

pub mod job;
pub mod object;
pub mod page;
