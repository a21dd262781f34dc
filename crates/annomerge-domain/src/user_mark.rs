//! Underlining (user marks) and the token ranges they cover

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A highlight on a location.
///
/// The guid is stable across snapshots and is the mark's identity; the
/// numeric id is local to one snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UserMark {
    pub user_mark_id: i32,
    pub color_index: i32,
    pub location_id: i32,
    pub style_index: i32,
    pub user_mark_guid: String,
    pub version: i32,
}

impl UserMark {
    /// Create a mark with a fresh guid
    pub fn new(user_mark_id: i32, location_id: i32, color_index: i32) -> Self {
        Self {
            user_mark_id,
            color_index,
            location_id,
            style_index: 0,
            user_mark_guid: Uuid::new_v4().to_string(),
            version: 1,
        }
    }

    /// Builder method to set an explicit guid
    pub fn with_guid(mut self, guid: &str) -> Self {
        self.user_mark_guid = guid.to_string();
        self
    }

    /// The parsed guid, if well formed
    pub fn guid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.user_mark_guid).ok()
    }
}

/// A run of tokens covered by a user mark.
///
/// Either bound may be absent for whole-paragraph marks.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BlockRange {
    pub block_range_id: i32,
    pub block_type: i32,
    pub identifier: i32,
    pub start_token: Option<i32>,
    pub end_token: Option<i32>,
    pub user_mark_id: i32,
}

impl BlockRange {
    /// Create a paragraph range
    pub fn new(
        block_range_id: i32,
        user_mark_id: i32,
        identifier: i32,
        start_token: Option<i32>,
        end_token: Option<i32>,
    ) -> Self {
        Self {
            block_range_id,
            block_type: 1,
            identifier,
            start_token,
            end_token,
            user_mark_id,
        }
    }

    /// Whether both bounds are present
    pub fn is_bounded(&self) -> bool {
        self.start_token.is_some() && self.end_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mark_has_valid_guid() {
        let mark = UserMark::new(1, 2, 3);
        assert!(mark.guid().is_some());
        assert_eq!(mark.color_index, 3);
    }

    #[test]
    fn test_malformed_guid() {
        let mark = UserMark::new(1, 2, 3).with_guid("not-a-guid");
        assert!(mark.guid().is_none());
    }

    #[test]
    fn test_range_bounds() {
        assert!(BlockRange::new(1, 1, 4, Some(0), Some(9)).is_bounded());
        assert!(!BlockRange::new(1, 1, 4, None, Some(9)).is_bounded());
    }
}
