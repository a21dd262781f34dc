//! Error types for annomerge-core

use std::fmt::{Display, Formatter};

use thiserror::Error;

use annomerge_domain::RecordKind;

use crate::config::ConfigError;

/// Result type alias for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;

/// Main error type for store and merge operations
#[derive(Error, Debug)]
pub enum MergeError {
    /// A foreign key does not resolve after a merge
    #[error("Integrity violation: {0}")]
    IntegrityViolation(IntegrityViolation),

    /// A record handed to the store is missing a required value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration rejected before merging
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// A dangling reference found by the validity checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Table holding the offending row
    pub record: RecordKind,
    /// Id of the offending row (the location id for input fields)
    pub record_id: i32,
    /// Name of the reference column
    pub reference: &'static str,
    /// The id that does not resolve, if the column was set
    pub missing_id: Option<i32>,
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.missing_id {
            Some(id) => write!(
                f,
                "{} {} references missing {} {}",
                self.record, self.record_id, self.reference, id
            ),
            None => write!(f, "{} {} has no valid {}", self.record, self.record_id, self.reference),
        }
    }
}

impl From<IntegrityViolation> for MergeError {
    fn from(violation: IntegrityViolation) -> Self {
        MergeError::IntegrityViolation(violation)
    }
}
