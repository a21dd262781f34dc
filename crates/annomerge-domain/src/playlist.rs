//! Independent media files and playlists

use serde::{Deserialize, Serialize};

/// A media file stored inside the backup.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct IndependentMedia {
    pub independent_media_id: i32,
    pub original_file_name: String,
    pub file_path: String,
    pub mime_type: String,
    pub hash: String,
}

impl IndependentMedia {
    /// Create a media entry
    pub fn new(independent_media_id: i32, file_path: &str, hash: &str) -> Self {
        Self {
            independent_media_id,
            original_file_name: file_path.to_string(),
            file_path: file_path.to_string(),
            mime_type: "image/jpeg".to_string(),
            hash: hash.to_string(),
        }
    }
}

/// One entry of a user playlist.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItem {
    pub playlist_item_id: i32,
    pub label: String,
    pub start_trim_offset_ticks: Option<i64>,
    pub end_trim_offset_ticks: Option<i64>,
    pub accuracy: i32,
    pub end_action: i32,
    pub thumbnail_file_path: Option<String>,
}

impl PlaylistItem {
    /// Create a playlist item
    pub fn new(playlist_item_id: i32, label: &str, thumbnail_file_path: Option<&str>) -> Self {
        Self {
            playlist_item_id,
            label: label.to_string(),
            thumbnail_file_path: thumbnail_file_path.map(str::to_string),
            ..Default::default()
        }
    }

    /// Thumbnail path, treating an empty string as absent
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail_file_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Link from a playlist item to an independent media file.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItemIndependentMediaMap {
    pub playlist_item_id: i32,
    pub independent_media_id: i32,
    pub duration_ticks: i64,
}

/// Link from a playlist item to a publication location.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItemLocationMap {
    pub playlist_item_id: i32,
    pub location_id: i32,
    pub major_multimedia_type: i32,
    pub base_duration_ticks: Option<i64>,
}

/// A timed marker within a playlist item.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItemMarker {
    pub playlist_item_marker_id: i32,
    pub playlist_item_id: i32,
    pub label: String,
    pub start_time_ticks: i64,
    pub duration_ticks: i64,
    pub end_transition_duration_ticks: i64,
}

/// Bible verse covered by a playlist item marker.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItemMarkerBibleVerseMap {
    pub playlist_item_marker_id: i32,
    pub verse_id: i32,
}

/// Paragraph covered by a playlist item marker.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistItemMarkerParagraphMap {
    pub playlist_item_marker_id: i32,
    pub meps_document_id: i32,
    pub paragraph_index: i32,
    pub marker_index_within_paragraph: i32,
}
