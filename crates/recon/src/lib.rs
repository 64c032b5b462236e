//! `authorlink-recon`: guest author to user account reconciliation engine.
//!
//! Pure engine crate: talks to a record store and a user directory through
//! traits, returns reports. No CLI dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod gate;
pub mod link;
pub mod matcher;
pub mod model;
pub mod progress;
pub mod store;
pub mod summary;

pub use config::ReconConfig;
pub use engine::ReconEngine;
pub use error::ReconError;
pub use model::{BatchCursor, BatchReport, CriterionKind, MatchCriterion, TargetReport, UpdateMode};
pub use progress::{drive, DriveSummary, Progress};
pub use store::{IdentityDirectory, MemoryDirectory, MemoryStore, RecordStore, Snapshot};
