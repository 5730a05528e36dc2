//! gellyfish-core: Data model, answer grading, and progress tracking.
//!
//! This crate defines the records of the gelly.fish tutorial, the
//! comparator that decides whether a learner's query result matches a
//! challenge, and the two-tier progress store that the rest of the
//! workspace builds on.

pub mod compare;
pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod progress;
pub mod report;
pub mod schema_cache;
pub mod storage;
pub mod traits;
