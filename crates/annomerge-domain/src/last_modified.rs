//! Snapshot-level modification stamp

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::note::format_timestamp;

/// The single-row `LastModified` table of a snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct LastModified {
    pub last_modified: Option<String>,
}

impl LastModified {
    /// Stamp with the current UTC time
    pub fn reset(&mut self) {
        self.last_modified = Some(format_timestamp(Utc::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_stamps_now() {
        let mut stamp = LastModified::default();
        assert!(stamp.last_modified.is_none());
        stamp.reset();
        let value = stamp.last_modified.unwrap();
        assert!(crate::note::parse_timestamp(&value).is_some());
    }
}
