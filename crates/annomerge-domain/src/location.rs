//! Publication locations referenced by marks, notes, tags and bookmarks

use serde::{Deserialize, Serialize};

/// A position inside a publication.
///
/// Bible locations carry `book_number`/`chapter_number`; other publications
/// carry `document_id` and, for media, `track`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub location_id: i32,
    pub book_number: Option<i32>,
    pub chapter_number: Option<i32>,
    pub document_id: Option<i32>,
    pub track: Option<i32>,
    pub issue_tag_number: i32,
    pub key_symbol: Option<String>,
    pub meps_language: i32,
    #[serde(rename = "Type")]
    pub location_type: i32,
    pub title: Option<String>,
}

impl Location {
    /// Create a Bible chapter location
    pub fn bible_chapter(location_id: i32, key_symbol: &str, book: i32, chapter: i32) -> Self {
        Self {
            location_id,
            book_number: Some(book),
            chapter_number: Some(chapter),
            key_symbol: Some(key_symbol.to_string()),
            ..Default::default()
        }
    }

    /// Create a document location
    pub fn document(location_id: i32, key_symbol: &str, document_id: i32) -> Self {
        Self {
            location_id,
            document_id: Some(document_id),
            key_symbol: Some(key_symbol.to_string()),
            ..Default::default()
        }
    }

    /// Builder method to set the language
    pub fn with_language(mut self, meps_language: i32) -> Self {
        self.meps_language = meps_language;
        self
    }

    /// Builder method to set the media track
    pub fn with_track(mut self, track: i32) -> Self {
        self.track = Some(track);
        self
    }

    /// Whether this location points at a Bible chapter
    pub fn is_bible_chapter(&self) -> bool {
        self.book_number.is_some() && self.chapter_number.is_some()
    }
}
