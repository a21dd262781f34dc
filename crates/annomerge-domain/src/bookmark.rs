//! Publication bookmarks

use serde::{Deserialize, Serialize};

/// A numbered bookmark.
///
/// `publication_location_id` names the publication; `location_id` the
/// bookmarked position inside it. Each publication has a small fixed set of
/// slots.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Bookmark {
    pub bookmark_id: i32,
    pub location_id: i32,
    pub publication_location_id: i32,
    pub slot: i32,
    pub title: String,
    pub snippet: Option<String>,
    pub block_type: i32,
    pub block_identifier: Option<i32>,
}

impl Bookmark {
    /// Create a bookmark
    pub fn new(bookmark_id: i32, location_id: i32, publication_location_id: i32, slot: i32) -> Self {
        Self {
            bookmark_id,
            location_id,
            publication_location_id,
            slot,
            ..Default::default()
        }
    }
}
