//! User notes and input-field values

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Block type of a note attached to a Bible verse
pub const BIBLE_VERSE_BLOCK_TYPE: i32 = 2;

/// A user note, optionally anchored to a user mark and/or a location.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Note {
    pub note_id: i32,
    pub guid: String,
    pub user_mark_id: Option<i32>,
    pub location_id: Option<i32>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub last_modified: String,
    pub created: String,
    pub block_type: i32,
    pub block_identifier: Option<i32>,
}

impl Note {
    /// Create an unanchored note with a fresh guid
    pub fn new(note_id: i32, title: &str, content: &str) -> Self {
        let now = format_timestamp(Utc::now());
        Self {
            note_id,
            guid: Uuid::new_v4().to_string(),
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            last_modified: now.clone(),
            created: now,
            ..Default::default()
        }
    }

    /// Builder method to set an explicit guid
    pub fn with_guid(mut self, guid: &str) -> Self {
        self.guid = guid.to_string();
        self
    }

    /// Builder method to set the modification stamp
    pub fn with_last_modified(mut self, last_modified: &str) -> Self {
        self.last_modified = last_modified.to_string();
        self
    }

    /// The parsed guid, if well formed
    pub fn guid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.guid).ok()
    }

    /// The modification stamp as a UTC instant.
    ///
    /// Accepts RFC 3339 and the bare `YYYY-MM-DDTHH:MM:SS` form; anything
    /// else yields `None`, which orders before every real timestamp.
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_modified)
    }

    /// Whether this note is attached to a Bible verse
    pub fn is_bible_verse_note(&self) -> bool {
        self.block_type == BIBLE_VERSE_BLOCK_TYPE
            && self.location_id.is_some()
            && self.block_identifier.is_some()
    }
}

/// A value typed into a form field of a publication.
///
/// Identified by its location and text tag; there is no numeric id.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InputField {
    pub location_id: i32,
    pub text_tag: String,
    pub value: String,
}

/// Format a UTC instant in the backup's timestamp form
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse a backup timestamp
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_forms() {
        let a = parse_timestamp("2023-05-01T10:00:00Z").unwrap();
        let b = parse_timestamp("2023-05-01T10:00:00").unwrap();
        let c = parse_timestamp("2023-05-01T12:00:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_last_modified_ordering() {
        let older = Note::new(1, "t", "c").with_last_modified("2020-01-01T00:00:00Z");
        let newer = Note::new(2, "t", "c").with_last_modified("2021-01-01T00:00:00Z");
        let junk = Note::new(3, "t", "c").with_last_modified("");
        assert!(older.last_modified_at() < newer.last_modified_at());
        assert!(junk.last_modified_at() < older.last_modified_at());
    }

    #[test]
    fn test_format_round_trip() {
        let note = Note::new(1, "title", "content");
        assert!(note.last_modified_at().is_some());
        assert!(note.last_modified.ends_with('Z'));
    }

    #[test]
    fn test_bible_verse_note() {
        let mut note = Note::new(1, "t", "c");
        assert!(!note.is_bible_verse_note());
        note.block_type = BIBLE_VERSE_BLOCK_TYPE;
        note.location_id = Some(4);
        note.block_identifier = Some(16);
        assert!(note.is_bible_verse_note());
    }
}
