//! Identity keys
//!
//! The natural key of each record type, used to decide whether a record
//! coming from another snapshot is "the same" as one already stored. Numeric
//! ids are store-local and never part of an identity key.

use std::hash::Hash;

use uuid::Uuid;

use annomerge_domain::{
    Bookmark, IndependentMedia, InputField, Location, Note, PlaylistItem,
    PlaylistItemIndependentMediaMap, PlaylistItemLocationMap, PlaylistItemMarker,
    PlaylistItemMarkerBibleVerseMap, PlaylistItemMarkerParagraphMap, Tag, TagMap, TagMapTarget,
    UserMark,
};

/// A record type with a cross-snapshot identity.
pub trait IdentityKey {
    type Key: Eq + Hash + Clone;

    /// The identity of this record, or `None` when it has no usable identity
    /// (for example a malformed guid)
    fn identity_key(&self) -> Option<Self::Key>;
}

/// Location identity. A missing column is its own value: two locations that
/// both lack a document id agree on that column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub key_symbol: Option<String>,
    pub issue_tag_number: i32,
    pub meps_language: i32,
    pub location_type: i32,
    pub book_number: Option<i32>,
    pub chapter_number: Option<i32>,
    pub document_id: Option<i32>,
    pub track: Option<i32>,
}

impl IdentityKey for Location {
    type Key = LocationKey;

    fn identity_key(&self) -> Option<LocationKey> {
        Some(LocationKey {
            key_symbol: self.key_symbol.clone(),
            issue_tag_number: self.issue_tag_number,
            meps_language: self.meps_language,
            location_type: self.location_type,
            book_number: self.book_number,
            chapter_number: self.chapter_number,
            document_id: self.document_id,
            track: self.track,
        })
    }
}

/// Key used when repairing duplicate media locations: only meaningful when
/// both the document and the track are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentTrackKey {
    pub key_symbol: Option<String>,
    pub issue_tag_number: i32,
    pub meps_language: i32,
    pub document_id: i32,
    pub track: i32,
    pub location_type: i32,
}

impl DocumentTrackKey {
    pub fn of(location: &Location) -> Option<Self> {
        Some(Self {
            key_symbol: location.key_symbol.clone(),
            issue_tag_number: location.issue_tag_number,
            meps_language: location.meps_language,
            document_id: location.document_id?,
            track: location.track?,
            location_type: location.location_type,
        })
    }
}

/// A Bible chapter within one edition of the Bible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BibleChapterKey {
    pub book_number: i32,
    pub chapter_number: i32,
    pub key_symbol: String,
}

impl BibleChapterKey {
    pub fn new(key_symbol: &str, book_number: i32, chapter_number: i32) -> Self {
        Self {
            book_number,
            chapter_number,
            key_symbol: key_symbol.to_string(),
        }
    }

    pub fn of(location: &Location) -> Option<Self> {
        Some(Self {
            book_number: location.book_number?,
            chapter_number: location.chapter_number?,
            key_symbol: location.key_symbol.clone().unwrap_or_default(),
        })
    }
}

impl IdentityKey for UserMark {
    type Key = Uuid;

    fn identity_key(&self) -> Option<Uuid> {
        self.guid()
    }
}

impl IdentityKey for Note {
    type Key = Uuid;

    fn identity_key(&self) -> Option<Uuid> {
        self.guid()
    }
}

/// Input fields are keyed by location and text tag; tags compare
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputFieldKey {
    pub location_id: i32,
    pub text_tag: String,
}

impl InputFieldKey {
    pub fn new(location_id: i32, text_tag: &str) -> Self {
        Self {
            location_id,
            text_tag: text_tag.to_lowercase(),
        }
    }
}

impl IdentityKey for InputField {
    type Key = InputFieldKey;

    fn identity_key(&self) -> Option<InputFieldKey> {
        Some(InputFieldKey::new(self.location_id, &self.text_tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagTypeAndName {
    pub tag_type: i32,
    pub name: String,
}

impl TagTypeAndName {
    pub fn new(tag_type: i32, name: &str) -> Self {
        Self {
            tag_type,
            name: name.to_string(),
        }
    }
}

impl IdentityKey for Tag {
    type Key = TagTypeAndName;

    fn identity_key(&self) -> Option<TagTypeAndName> {
        Some(TagTypeAndName::new(self.tag_type, &self.name))
    }
}

impl IdentityKey for TagMap {
    type Key = (i32, TagMapTarget);

    fn identity_key(&self) -> Option<(i32, TagMapTarget)> {
        self.target().map(|target| (self.tag_id, target))
    }
}

impl IdentityKey for Bookmark {
    /// `(location_id, publication_location_id)`
    type Key = (i32, i32);

    fn identity_key(&self) -> Option<(i32, i32)> {
        Some((self.location_id, self.publication_location_id))
    }
}

impl IdentityKey for IndependentMedia {
    /// The trimmed file path
    type Key = String;

    fn identity_key(&self) -> Option<String> {
        Some(self.file_path.trim().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistItemKey {
    pub label: String,
    pub thumbnail_file_path: Option<String>,
}

impl IdentityKey for PlaylistItem {
    type Key = PlaylistItemKey;

    fn identity_key(&self) -> Option<PlaylistItemKey> {
        Some(PlaylistItemKey {
            label: self.label.clone(),
            thumbnail_file_path: self.thumbnail().map(str::to_string),
        })
    }
}

impl IdentityKey for PlaylistItemIndependentMediaMap {
    /// `(playlist_item_id, independent_media_id)`
    type Key = (i32, i32);

    fn identity_key(&self) -> Option<(i32, i32)> {
        Some((self.playlist_item_id, self.independent_media_id))
    }
}

impl IdentityKey for PlaylistItemLocationMap {
    /// One map per location
    type Key = i32;

    fn identity_key(&self) -> Option<i32> {
        Some(self.location_id)
    }
}

/// Content identity of a marker within its (already translated) playlist item.
///
/// Source marker ids are deliberately ignored, so re-merging a merged store
/// finds the markers it already holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    pub playlist_item_id: i32,
    pub label: String,
    pub start_time_ticks: i64,
    pub duration_ticks: i64,
    pub end_transition_duration_ticks: i64,
}

impl IdentityKey for PlaylistItemMarker {
    type Key = MarkerKey;

    fn identity_key(&self) -> Option<MarkerKey> {
        Some(MarkerKey {
            playlist_item_id: self.playlist_item_id,
            label: self.label.clone(),
            start_time_ticks: self.start_time_ticks,
            duration_ticks: self.duration_ticks,
            end_transition_duration_ticks: self.end_transition_duration_ticks,
        })
    }
}

impl IdentityKey for PlaylistItemMarkerBibleVerseMap {
    type Key = (i32, i32);

    fn identity_key(&self) -> Option<(i32, i32)> {
        Some((self.playlist_item_marker_id, self.verse_id))
    }
}

impl IdentityKey for PlaylistItemMarkerParagraphMap {
    type Key = (i32, i32, i32, i32);

    fn identity_key(&self) -> Option<(i32, i32, i32, i32)> {
        Some((
            self.playlist_item_marker_id,
            self.meps_document_id,
            self.paragraph_index,
            self.marker_index_within_paragraph,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_key_treats_missing_columns_as_equal() {
        let a = Location::document(1, "w", 100);
        let b = Location::document(2, "w", 100);
        assert_eq!(a.identity_key(), b.identity_key());

        let c = Location::document(3, "w", 100).with_track(1);
        assert_ne!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn test_document_track_key_needs_both_columns() {
        assert!(DocumentTrackKey::of(&Location::document(1, "w", 100)).is_none());
        assert!(DocumentTrackKey::of(&Location::document(1, "w", 100).with_track(2)).is_some());
    }

    #[test]
    fn test_input_field_key_ignores_case() {
        assert_eq!(InputFieldKey::new(4, "Answer1"), InputFieldKey::new(4, "ANSWER1"));
    }

    #[test]
    fn test_playlist_item_key_empty_thumbnail() {
        let a = PlaylistItem::new(1, "Clip", None);
        let b = PlaylistItem::new(2, "Clip", Some(""));
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_guid_keys() {
        let mark = UserMark::new(1, 1, 0).with_guid("not-a-guid");
        assert!(mark.identity_key().is_none());
        let guid = "4b3c1c3e-5d0a-4c52-9a59-2b8f0a7f6a10";
        let mark = UserMark::new(1, 1, 0).with_guid(guid);
        assert_eq!(mark.identity_key(), Uuid::parse_str(guid).ok());
    }

    #[test]
    fn test_tag_map_key_follows_target() {
        let map = TagMap::new(1, 7, TagMapTarget::Note(3), 0);
        assert_eq!(map.identity_key(), Some((7, TagMapTarget::Note(3))));
        assert!(TagMap::default().identity_key().is_none());
    }
}
