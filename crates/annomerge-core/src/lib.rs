//! annomerge-core: merge engine for annotation backup snapshots
//!
//! This crate reconciles several decoded snapshots into one:
//! - Database: the in-memory record store with lazily built lookup indexes
//! - Validity repair and the foreign-key checker that gates every merge
//! - Cleaner: removal of rows nothing refers to
//! - IdTranslator and Merger: the multi-pass, dependency-ordered merge
//! - Filters: per-source exclusions and removal of underlining by colour
//!
//! Loading snapshots from their container files and writing the result
//! back are left to the caller.

pub mod cleaner;
pub mod config;
pub mod database;
pub mod error;
pub mod filters;
pub mod merger;
pub mod translator;

pub use annomerge_domain as domain;

pub use cleaner::Cleaner;
pub use config::{ConfigError, MergeConfig};
pub use database::{Database, IdentityKey, Repair, RepairAction, RepairReport};
pub use error::{IntegrityViolation, MergeError, Result};
pub use filters::{apply_exclusions, remove_underlining_by_colour, MergeParameters};
pub use merger::{block_ranges_overlap, Merger, ProgressCallback};
pub use translator::IdTranslator;
