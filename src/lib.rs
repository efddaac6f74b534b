//! Grade analytics for a university dashboard: grade notations, statistics,
//! rankings, and the storage collaborators that feed them.

pub mod analytics;
pub mod config;
pub mod error;
pub mod grades;
pub mod import;
pub mod models;
pub mod ranking;
pub mod report;
pub mod seed;
pub mod stats;
pub mod store;

pub use error::{Result, StoreError};
