//! The record store
//!
//! A [`Database`] owns every record collection of one snapshot together with
//! the lookup indexes derived from them. Indexes are built on first use and
//! kept current by the `add_*_and_update_index` calls; any other mutation
//! goes through a `*_mut()` accessor, which drops the affected indexes so the
//! next lookup rebuilds them.

mod fixup;
mod index;
pub mod keys;
mod validity;

pub use fixup::{Repair, RepairAction, RepairReport};
pub use keys::{
    BibleChapterKey, DocumentTrackKey, IdentityKey, InputFieldKey, LocationKey, MarkerKey,
    PlaylistItemKey, TagTypeAndName,
};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use annomerge_domain::{
    BibleBookChapterAndVerse, BlockRange, Bookmark, IndependentMedia, InputField, LastModified,
    Location, Note, PlaylistItem, PlaylistItemIndependentMediaMap, PlaylistItemLocationMap,
    PlaylistItemMarker, PlaylistItemMarkerBibleVerseMap, PlaylistItemMarkerParagraphMap,
    RecordKind, Tag, TagMap, TagMapTarget, UserMark,
};

use crate::cleaner::Cleaner;
use crate::error::{MergeError, Result};
use index::{build_grouped, build_unique, GroupIndex, UniqueIndex};

/// Every derived index of a store, grouped by the collection it covers.
#[derive(Debug, Clone, Default)]
struct Indexes {
    locations_by_id: UniqueIndex<i32>,
    locations_by_value: UniqueIndex<LocationKey>,
    locations_by_bible_chapter: UniqueIndex<BibleChapterKey>,

    user_marks_by_guid: UniqueIndex<Uuid>,
    user_marks_by_id: UniqueIndex<i32>,
    user_marks_by_location: GroupIndex<i32>,

    block_ranges_by_user_mark: GroupIndex<i32>,

    notes_by_guid: UniqueIndex<Uuid>,
    notes_by_id: UniqueIndex<i32>,
    notes_by_verse: GroupIndex<BibleBookChapterAndVerse>,

    input_fields_by_key: UniqueIndex<InputFieldKey>,

    tags_by_name: UniqueIndex<TagTypeAndName>,
    tags_by_id: UniqueIndex<i32>,

    tag_maps_by_target: UniqueIndex<(i32, TagMapTarget)>,

    bookmarks_by_locations: UniqueIndex<(i32, i32)>,

    media_by_path: UniqueIndex<String>,
    media_by_hash: UniqueIndex<String>,
    media_by_id: UniqueIndex<i32>,

    playlist_items_by_id: UniqueIndex<i32>,
    playlist_items_by_value: UniqueIndex<PlaylistItemKey>,

    media_maps_by_value: UniqueIndex<(i32, i32)>,
    location_maps_by_location: UniqueIndex<i32>,

    markers_by_id: UniqueIndex<i32>,
    markers_by_value: UniqueIndex<MarkerKey>,

    verse_maps_by_marker: GroupIndex<i32>,
    paragraph_maps_by_marker: GroupIndex<i32>,
}

impl Indexes {
    /// Drop every index over the given collection
    fn invalidate(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Location => {
                self.locations_by_id.invalidate();
                self.locations_by_value.invalidate();
                self.locations_by_bible_chapter.invalidate();
                // verse lookups resolve the note's location
                self.notes_by_verse.invalidate();
            }
            RecordKind::UserMark => {
                self.user_marks_by_guid.invalidate();
                self.user_marks_by_id.invalidate();
                self.user_marks_by_location.invalidate();
            }
            RecordKind::BlockRange => self.block_ranges_by_user_mark.invalidate(),
            RecordKind::Note => {
                self.notes_by_guid.invalidate();
                self.notes_by_id.invalidate();
                self.notes_by_verse.invalidate();
            }
            RecordKind::InputField => self.input_fields_by_key.invalidate(),
            RecordKind::Tag => {
                self.tags_by_name.invalidate();
                self.tags_by_id.invalidate();
            }
            RecordKind::TagMap => self.tag_maps_by_target.invalidate(),
            RecordKind::Bookmark => self.bookmarks_by_locations.invalidate(),
            RecordKind::IndependentMedia => {
                self.media_by_path.invalidate();
                self.media_by_hash.invalidate();
                self.media_by_id.invalidate();
            }
            RecordKind::PlaylistItem => {
                self.playlist_items_by_id.invalidate();
                self.playlist_items_by_value.invalidate();
            }
            RecordKind::PlaylistItemIndependentMediaMap => self.media_maps_by_value.invalidate(),
            RecordKind::PlaylistItemLocationMap => self.location_maps_by_location.invalidate(),
            RecordKind::PlaylistItemMarker => {
                self.markers_by_id.invalidate();
                self.markers_by_value.invalidate();
            }
            RecordKind::PlaylistItemMarkerBibleVerseMap => self.verse_maps_by_marker.invalidate(),
            RecordKind::PlaylistItemMarkerParagraphMap => {
                self.paragraph_maps_by_marker.invalidate()
            }
        }
    }
}

/// One annotation snapshot held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Database {
    last_modified: LastModified,
    locations: Vec<Location>,
    user_marks: Vec<UserMark>,
    block_ranges: Vec<BlockRange>,
    notes: Vec<Note>,
    input_fields: Vec<InputField>,
    tags: Vec<Tag>,
    tag_maps: Vec<TagMap>,
    bookmarks: Vec<Bookmark>,
    independent_medias: Vec<IndependentMedia>,
    playlist_items: Vec<PlaylistItem>,
    playlist_item_independent_media_maps: Vec<PlaylistItemIndependentMediaMap>,
    playlist_item_location_maps: Vec<PlaylistItemLocationMap>,
    playlist_item_markers: Vec<PlaylistItemMarker>,
    playlist_item_marker_bible_verse_maps: Vec<PlaylistItemMarkerBibleVerseMap>,
    playlist_item_marker_paragraph_maps: Vec<PlaylistItemMarkerParagraphMap>,

    #[serde(skip)]
    indexes: Indexes,
    /// Next free bookmark slot per publication location
    #[serde(skip)]
    bookmark_slots: HashMap<i32, i32>,
}

/// Read accessor plus a mutable accessor that drops the collection's indexes
macro_rules! collection_accessors {
    ($($field:ident, $field_mut:ident: $ty:ty => $kind:expr;)*) => {
        $(
            pub fn $field(&self) -> &[$ty] {
                &self.$field
            }

            /// Direct mutable access; every index over this collection is
            /// dropped first
            pub fn $field_mut(&mut self) -> &mut Vec<$ty> {
                self.indexes.invalidate($kind);
                &mut self.$field
            }
        )*
    };
}

fn require_positive(kind: RecordKind, column: &str, value: i32) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(MergeError::InvalidArgument(format!(
            "{} {} must be positive, got {}",
            kind, column, value
        )))
    }
}

fn require_guid(kind: RecordKind, guid: &str) -> Result<()> {
    Uuid::parse_str(guid)
        .map(|_| ())
        .map_err(|_| MergeError::InvalidArgument(format!("{} guid '{}' is malformed", kind, guid)))
}

impl Database {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    collection_accessors! {
        locations, locations_mut: Location => RecordKind::Location;
        user_marks, user_marks_mut: UserMark => RecordKind::UserMark;
        block_ranges, block_ranges_mut: BlockRange => RecordKind::BlockRange;
        notes, notes_mut: Note => RecordKind::Note;
        input_fields, input_fields_mut: InputField => RecordKind::InputField;
        tags, tags_mut: Tag => RecordKind::Tag;
        tag_maps, tag_maps_mut: TagMap => RecordKind::TagMap;
        bookmarks, bookmarks_mut: Bookmark => RecordKind::Bookmark;
        independent_medias, independent_medias_mut: IndependentMedia => RecordKind::IndependentMedia;
        playlist_items, playlist_items_mut: PlaylistItem => RecordKind::PlaylistItem;
        playlist_item_independent_media_maps, playlist_item_independent_media_maps_mut:
            PlaylistItemIndependentMediaMap => RecordKind::PlaylistItemIndependentMediaMap;
        playlist_item_location_maps, playlist_item_location_maps_mut:
            PlaylistItemLocationMap => RecordKind::PlaylistItemLocationMap;
        playlist_item_markers, playlist_item_markers_mut:
            PlaylistItemMarker => RecordKind::PlaylistItemMarker;
        playlist_item_marker_bible_verse_maps, playlist_item_marker_bible_verse_maps_mut:
            PlaylistItemMarkerBibleVerseMap => RecordKind::PlaylistItemMarkerBibleVerseMap;
        playlist_item_marker_paragraph_maps, playlist_item_marker_paragraph_maps_mut:
            PlaylistItemMarkerParagraphMap => RecordKind::PlaylistItemMarkerParagraphMap;
    }

    pub fn last_modified(&self) -> &LastModified {
        &self.last_modified
    }

    /// Empty every collection and stamp the store with the current time.
    ///
    /// Used to prepare a fresh merge destination.
    pub fn init_blank(&mut self) {
        self.last_modified.reset();
        self.locations.clear();
        self.user_marks.clear();
        self.block_ranges.clear();
        self.notes.clear();
        self.input_fields.clear();
        self.tags.clear();
        self.tag_maps.clear();
        self.bookmarks.clear();
        self.independent_medias.clear();
        self.playlist_items.clear();
        self.playlist_item_independent_media_maps.clear();
        self.playlist_item_location_maps.clear();
        self.playlist_item_markers.clear();
        self.playlist_item_marker_bible_verse_maps.clear();
        self.playlist_item_marker_paragraph_maps.clear();
        self.reinitialize_indexes();
    }

    /// Drop every materialized index
    pub fn reinitialize_indexes(&mut self) {
        debug!("Dropping all record indexes");
        self.indexes = Indexes::default();
    }

    /// Rebuild indexes and verify that every reference resolves.
    ///
    /// Never repairs anything: a dangling reference is reported as
    /// [`MergeError::IntegrityViolation`].
    pub fn check_validity(&mut self) -> Result<()> {
        self.reinitialize_indexes();
        validity::check_foreign_keys(self)
    }

    /// Remove rows nothing refers to; returns the number removed
    pub fn clean(&mut self) -> usize {
        Cleaner::new(self).clean()
    }

    /// Allocate the next bookmark slot for a publication.
    ///
    /// Returns 0 on the first call for a publication, then 1, 2 and so on.
    /// The counters live only as long as this store instance.
    pub fn next_bookmark_slot(&mut self, publication_location_id: i32) -> i32 {
        let next = self.bookmark_slots.entry(publication_location_id).or_insert(0);
        let slot = *next;
        *next += 1;
        slot
    }

    /// Number of rows in a table
    pub fn record_count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Location => self.locations.len(),
            RecordKind::UserMark => self.user_marks.len(),
            RecordKind::BlockRange => self.block_ranges.len(),
            RecordKind::Note => self.notes.len(),
            RecordKind::InputField => self.input_fields.len(),
            RecordKind::Tag => self.tags.len(),
            RecordKind::TagMap => self.tag_maps.len(),
            RecordKind::Bookmark => self.bookmarks.len(),
            RecordKind::IndependentMedia => self.independent_medias.len(),
            RecordKind::PlaylistItem => self.playlist_items.len(),
            RecordKind::PlaylistItemIndependentMediaMap => {
                self.playlist_item_independent_media_maps.len()
            }
            RecordKind::PlaylistItemLocationMap => self.playlist_item_location_maps.len(),
            RecordKind::PlaylistItemMarker => self.playlist_item_markers.len(),
            RecordKind::PlaylistItemMarkerBibleVerseMap => {
                self.playlist_item_marker_bible_verse_maps.len()
            }
            RecordKind::PlaylistItemMarkerParagraphMap => {
                self.playlist_item_marker_paragraph_maps.len()
            }
        }
    }

    /// Rows across every table
    pub fn total_records(&self) -> usize {
        RecordKind::ALL.iter().map(|kind| self.record_count(*kind)).sum()
    }

    /// Highest id in a table, 0 when empty or when the table has no numeric id
    pub fn max_id(&self, kind: RecordKind) -> i32 {
        fn max_of<T>(rows: &[T], id: impl Fn(&T) -> i32) -> i32 {
            rows.iter().map(id).max().unwrap_or(0)
        }

        match kind {
            RecordKind::Location => max_of(&self.locations, |r| r.location_id),
            RecordKind::UserMark => max_of(&self.user_marks, |r| r.user_mark_id),
            RecordKind::BlockRange => max_of(&self.block_ranges, |r| r.block_range_id),
            RecordKind::Note => max_of(&self.notes, |r| r.note_id),
            RecordKind::Tag => max_of(&self.tags, |r| r.tag_id),
            RecordKind::TagMap => max_of(&self.tag_maps, |r| r.tag_map_id),
            RecordKind::Bookmark => max_of(&self.bookmarks, |r| r.bookmark_id),
            RecordKind::IndependentMedia => {
                max_of(&self.independent_medias, |r| r.independent_media_id)
            }
            RecordKind::PlaylistItem => max_of(&self.playlist_items, |r| r.playlist_item_id),
            RecordKind::PlaylistItemMarker => {
                max_of(&self.playlist_item_markers, |r| r.playlist_item_marker_id)
            }
            RecordKind::InputField
            | RecordKind::PlaylistItemIndependentMediaMap
            | RecordKind::PlaylistItemLocationMap
            | RecordKind::PlaylistItemMarkerBibleVerseMap
            | RecordKind::PlaylistItemMarkerParagraphMap => 0,
        }
    }

    /// Highest id per table, for the tables that carry a numeric id
    pub fn max_ids(&self) -> HashMap<RecordKind, i32> {
        RecordKind::ALL
            .iter()
            .filter(|kind| has_numeric_id(**kind))
            .map(|kind| (*kind, self.max_id(*kind)))
            .collect()
    }

    // ---- lookups ----

    pub fn find_location(&self, location_id: i32) -> Option<&Location> {
        let position = self.indexes.locations_by_id.lookup(&location_id, || {
            build_unique(&self.locations, |l| Some(l.location_id))
        })?;
        self.locations.get(position)
    }

    /// Find a location with the same identity as `location`
    pub fn find_location_by_values(&self, location: &Location) -> Option<&Location> {
        let key = location.identity_key()?;
        let position = self
            .indexes
            .locations_by_value
            .lookup(&key, || build_unique(&self.locations, Location::identity_key))?;
        self.locations.get(position)
    }

    pub fn find_location_by_bible_chapter(
        &self,
        key_symbol: &str,
        book_number: i32,
        chapter_number: i32,
    ) -> Option<&Location> {
        let key = BibleChapterKey::new(key_symbol, book_number, chapter_number);
        let position = self
            .indexes
            .locations_by_bible_chapter
            .lookup(&key, || build_unique(&self.locations, BibleChapterKey::of))?;
        self.locations.get(position)
    }

    pub fn find_user_mark(&self, user_mark_id: i32) -> Option<&UserMark> {
        let position = self.indexes.user_marks_by_id.lookup(&user_mark_id, || {
            build_unique(&self.user_marks, |m| Some(m.user_mark_id))
        })?;
        self.user_marks.get(position)
    }

    /// Find a user mark by guid; a malformed guid finds nothing
    pub fn find_user_mark_by_guid(&self, guid: &str) -> Option<&UserMark> {
        let guid = Uuid::parse_str(guid).ok()?;
        let position = self
            .indexes
            .user_marks_by_guid
            .lookup(&guid, || build_unique(&self.user_marks, UserMark::identity_key))?;
        self.user_marks.get(position)
    }

    pub fn find_user_marks_by_location(&self, location_id: i32) -> Vec<&UserMark> {
        let positions = self.indexes.user_marks_by_location.lookup_all(&location_id, || {
            build_grouped(&self.user_marks, |m| Some(m.location_id))
        });
        positions.iter().filter_map(|p| self.user_marks.get(*p)).collect()
    }

    /// Block ranges of a user mark, in collection order
    pub fn find_block_ranges(&self, user_mark_id: i32) -> Vec<&BlockRange> {
        let positions = self.indexes.block_ranges_by_user_mark.lookup_all(&user_mark_id, || {
            build_grouped(&self.block_ranges, |r| Some(r.user_mark_id))
        });
        positions.iter().filter_map(|p| self.block_ranges.get(*p)).collect()
    }

    pub fn find_note(&self, note_id: i32) -> Option<&Note> {
        let position = self
            .indexes
            .notes_by_id
            .lookup(&note_id, || build_unique(&self.notes, |n| Some(n.note_id)))?;
        self.notes.get(position)
    }

    pub fn find_note_by_guid(&self, guid: &str) -> Option<&Note> {
        let position = self.note_position_by_guid(guid)?;
        self.notes.get(position)
    }

    /// Mutable access to a note found by guid.
    ///
    /// Only the note's text and stamps may be changed through this; its
    /// guid, id and location are indexed.
    pub fn find_note_by_guid_mut(&mut self, guid: &str) -> Option<&mut Note> {
        let position = self.note_position_by_guid(guid)?;
        self.notes.get_mut(position)
    }

    fn note_position_by_guid(&self, guid: &str) -> Option<usize> {
        let guid = Uuid::parse_str(guid).ok()?;
        self.indexes
            .notes_by_guid
            .lookup(&guid, || build_unique(&self.notes, Note::identity_key))
    }

    /// Notes attached to a Bible verse
    pub fn find_notes_by_verse(&self, verse: &BibleBookChapterAndVerse) -> Vec<&Note> {
        let positions = self
            .indexes
            .notes_by_verse
            .lookup_all(verse, || build_grouped(&self.notes, |n| self.verse_of(n)));
        positions.iter().filter_map(|p| self.notes.get(*p)).collect()
    }

    fn verse_of(&self, note: &Note) -> Option<BibleBookChapterAndVerse> {
        if !note.is_bible_verse_note() {
            return None;
        }
        let location = self.find_location(note.location_id?)?;
        Some(BibleBookChapterAndVerse::new(
            location.book_number?,
            location.chapter_number?,
            note.block_identifier?,
        ))
    }

    /// Find an input field; the text tag compares case-insensitively
    pub fn find_input_field(&self, location_id: i32, text_tag: &str) -> Option<&InputField> {
        let key = InputFieldKey::new(location_id, text_tag);
        let position = self
            .indexes
            .input_fields_by_key
            .lookup(&key, || build_unique(&self.input_fields, InputField::identity_key))?;
        self.input_fields.get(position)
    }

    pub fn find_tag(&self, tag_id: i32) -> Option<&Tag> {
        let position = self
            .indexes
            .tags_by_id
            .lookup(&tag_id, || build_unique(&self.tags, |t| Some(t.tag_id)))?;
        self.tags.get(position)
    }

    pub fn find_tag_by_name(&self, tag_type: i32, name: &str) -> Option<&Tag> {
        let key = TagTypeAndName::new(tag_type, name);
        let position = self
            .indexes
            .tags_by_name
            .lookup(&key, || build_unique(&self.tags, Tag::identity_key))?;
        self.tags.get(position)
    }

    /// Find the map assigning `tag_id` to `target`
    pub fn find_tag_map(&self, tag_id: i32, target: TagMapTarget) -> Option<&TagMap> {
        let position = self
            .indexes
            .tag_maps_by_target
            .lookup(&(tag_id, target), || build_unique(&self.tag_maps, TagMap::identity_key))?;
        self.tag_maps.get(position)
    }

    pub fn find_bookmark(&self, location_id: i32, publication_location_id: i32) -> Option<&Bookmark> {
        let position = self
            .indexes
            .bookmarks_by_locations
            .lookup(&(location_id, publication_location_id), || {
                build_unique(&self.bookmarks, Bookmark::identity_key)
            })?;
        self.bookmarks.get(position)
    }

    pub fn find_independent_media(&self, independent_media_id: i32) -> Option<&IndependentMedia> {
        let position = self.indexes.media_by_id.lookup(&independent_media_id, || {
            build_unique(&self.independent_medias, |m| Some(m.independent_media_id))
        })?;
        self.independent_medias.get(position)
    }

    /// Find media by file path, ignoring surrounding whitespace
    pub fn find_independent_media_by_path(&self, file_path: &str) -> Option<&IndependentMedia> {
        let position = self.indexes.media_by_path.lookup(file_path.trim(), || {
            build_unique(&self.independent_medias, IndependentMedia::identity_key)
        })?;
        self.independent_medias.get(position)
    }

    /// Find media by content hash, ignoring surrounding whitespace
    /// Blank hashes never match
    pub fn find_independent_media_by_hash(&self, hash: &str) -> Option<&IndependentMedia> {
        let hash = hash.trim();
        if hash.is_empty() {
            return None;
        }
        let position = self.indexes.media_by_hash.lookup(hash, || {
            build_unique(&self.independent_medias, |m| media_hash_key(&m.hash))
        })?;
        self.independent_medias.get(position)
    }

    pub fn find_playlist_item(&self, playlist_item_id: i32) -> Option<&PlaylistItem> {
        let position = self.indexes.playlist_items_by_id.lookup(&playlist_item_id, || {
            build_unique(&self.playlist_items, |p| Some(p.playlist_item_id))
        })?;
        self.playlist_items.get(position)
    }

    /// Find a playlist item with the same label and thumbnail
    pub fn find_playlist_item_by_values(&self, item: &PlaylistItem) -> Option<&PlaylistItem> {
        let key = item.identity_key()?;
        let position = self
            .indexes
            .playlist_items_by_value
            .lookup(&key, || build_unique(&self.playlist_items, PlaylistItem::identity_key))?;
        self.playlist_items.get(position)
    }

    pub fn find_playlist_item_independent_media_map(
        &self,
        playlist_item_id: i32,
        independent_media_id: i32,
    ) -> Option<&PlaylistItemIndependentMediaMap> {
        let position = self
            .indexes
            .media_maps_by_value
            .lookup(&(playlist_item_id, independent_media_id), || {
                build_unique(
                    &self.playlist_item_independent_media_maps,
                    PlaylistItemIndependentMediaMap::identity_key,
                )
            })?;
        self.playlist_item_independent_media_maps.get(position)
    }

    /// Find the playlist location map of a location
    pub fn find_playlist_item_location_map(&self, location_id: i32) -> Option<&PlaylistItemLocationMap> {
        let position = self.indexes.location_maps_by_location.lookup(&location_id, || {
            build_unique(
                &self.playlist_item_location_maps,
                PlaylistItemLocationMap::identity_key,
            )
        })?;
        self.playlist_item_location_maps.get(position)
    }

    pub fn find_playlist_item_marker(&self, playlist_item_marker_id: i32) -> Option<&PlaylistItemMarker> {
        let position = self.indexes.markers_by_id.lookup(&playlist_item_marker_id, || {
            build_unique(&self.playlist_item_markers, |m| {
                Some(m.playlist_item_marker_id)
            })
        })?;
        self.playlist_item_markers.get(position)
    }

    /// Find a marker with the same playlist item, label and timing
    pub fn find_playlist_item_marker_by_values(
        &self,
        marker: &PlaylistItemMarker,
    ) -> Option<&PlaylistItemMarker> {
        let key = marker.identity_key()?;
        let position = self.indexes.markers_by_value.lookup(&key, || {
            build_unique(&self.playlist_item_markers, PlaylistItemMarker::identity_key)
        })?;
        self.playlist_item_markers.get(position)
    }

    pub fn find_playlist_item_marker_bible_verse_maps(
        &self,
        playlist_item_marker_id: i32,
    ) -> Vec<&PlaylistItemMarkerBibleVerseMap> {
        let positions = self
            .indexes
            .verse_maps_by_marker
            .lookup_all(&playlist_item_marker_id, || {
                build_grouped(&self.playlist_item_marker_bible_verse_maps, |m| {
                    Some(m.playlist_item_marker_id)
                })
            });
        positions
            .iter()
            .filter_map(|p| self.playlist_item_marker_bible_verse_maps.get(*p))
            .collect()
    }

    pub fn find_playlist_item_marker_paragraph_maps(
        &self,
        playlist_item_marker_id: i32,
    ) -> Vec<&PlaylistItemMarkerParagraphMap> {
        let positions = self
            .indexes
            .paragraph_maps_by_marker
            .lookup_all(&playlist_item_marker_id, || {
                build_grouped(&self.playlist_item_marker_paragraph_maps, |m| {
                    Some(m.playlist_item_marker_id)
                })
            });
        positions
            .iter()
            .filter_map(|p| self.playlist_item_marker_paragraph_maps.get(*p))
            .collect()
    }

    // ---- inserts that keep materialized indexes current ----

    pub fn add_location_and_update_index(&mut self, location: Location) -> Result<()> {
        require_positive(RecordKind::Location, "LocationId", location.location_id)?;

        let position = self.locations.len();
        let indexes = &mut self.indexes;
        indexes
            .locations_by_id
            .note_insert(|| Some(location.location_id), position);
        indexes
            .locations_by_value
            .note_insert(|| location.identity_key(), position);
        indexes
            .locations_by_bible_chapter
            .note_insert(|| BibleChapterKey::of(&location), position);
        indexes.notes_by_verse.invalidate();

        self.locations.push(location);
        Ok(())
    }

    pub fn add_user_mark_and_update_index(&mut self, user_mark: UserMark) -> Result<()> {
        require_positive(RecordKind::UserMark, "UserMarkId", user_mark.user_mark_id)?;
        require_positive(RecordKind::UserMark, "LocationId", user_mark.location_id)?;
        require_guid(RecordKind::UserMark, &user_mark.user_mark_guid)?;

        let position = self.user_marks.len();
        let indexes = &mut self.indexes;
        indexes
            .user_marks_by_guid
            .note_insert(|| user_mark.identity_key(), position);
        indexes
            .user_marks_by_id
            .note_insert(|| Some(user_mark.user_mark_id), position);
        indexes
            .user_marks_by_location
            .note_insert(|| Some(user_mark.location_id), position);

        self.user_marks.push(user_mark);
        Ok(())
    }

    pub fn add_block_range_and_update_index(&mut self, range: BlockRange) -> Result<()> {
        require_positive(RecordKind::BlockRange, "BlockRangeId", range.block_range_id)?;
        require_positive(RecordKind::BlockRange, "UserMarkId", range.user_mark_id)?;

        let position = self.block_ranges.len();
        self.indexes
            .block_ranges_by_user_mark
            .note_insert(|| Some(range.user_mark_id), position);

        self.block_ranges.push(range);
        Ok(())
    }

    pub fn add_note_and_update_index(&mut self, note: Note) -> Result<()> {
        Self::validate_note(&note)?;
        let verse = if self.indexes.notes_by_verse.is_materialized() {
            self.verse_of(&note)
        } else {
            None
        };
        self.push_note(note, verse);
        Ok(())
    }

    /// Add a note attached to `verse`, plus an optional tag map for it
    pub fn add_bible_note_and_update_index(
        &mut self,
        verse: BibleBookChapterAndVerse,
        note: Note,
        tag_map: Option<TagMap>,
    ) -> Result<()> {
        Self::validate_note(&note)?;
        if let Some(map) = &tag_map {
            Self::validate_tag_map(map)?;
        }

        self.push_note(note, Some(verse));
        if let Some(map) = tag_map {
            self.push_tag_map(map);
        }
        Ok(())
    }

    fn validate_note(note: &Note) -> Result<()> {
        require_positive(RecordKind::Note, "NoteId", note.note_id)?;
        require_guid(RecordKind::Note, &note.guid)
    }

    fn push_note(&mut self, note: Note, verse: Option<BibleBookChapterAndVerse>) {
        let position = self.notes.len();
        let indexes = &mut self.indexes;
        indexes
            .notes_by_guid
            .note_insert(|| note.identity_key(), position);
        indexes.notes_by_id.note_insert(|| Some(note.note_id), position);
        indexes.notes_by_verse.note_insert(|| verse, position);

        self.notes.push(note);
    }

    pub fn add_input_field_and_update_index(&mut self, field: InputField) -> Result<()> {
        require_positive(RecordKind::InputField, "LocationId", field.location_id)?;

        let position = self.input_fields.len();
        self.indexes
            .input_fields_by_key
            .note_insert(|| field.identity_key(), position);

        self.input_fields.push(field);
        Ok(())
    }

    pub fn add_tag_and_update_index(&mut self, tag: Tag) -> Result<()> {
        require_positive(RecordKind::Tag, "TagId", tag.tag_id)?;

        let position = self.tags.len();
        let indexes = &mut self.indexes;
        indexes.tags_by_name.note_insert(|| tag.identity_key(), position);
        indexes.tags_by_id.note_insert(|| Some(tag.tag_id), position);

        self.tags.push(tag);
        Ok(())
    }

    pub fn add_tag_map_and_update_index(&mut self, tag_map: TagMap) -> Result<()> {
        Self::validate_tag_map(&tag_map)?;
        self.push_tag_map(tag_map);
        Ok(())
    }

    fn validate_tag_map(tag_map: &TagMap) -> Result<()> {
        require_positive(RecordKind::TagMap, "TagMapId", tag_map.tag_map_id)?;
        require_positive(RecordKind::TagMap, "TagId", tag_map.tag_id)?;
        if tag_map.target_count() != 1 {
            return Err(MergeError::InvalidArgument(format!(
                "TagMap {} must reference exactly one target",
                tag_map.tag_map_id
            )));
        }
        match tag_map.target() {
            Some(TagMapTarget::Location(id)) => require_positive(RecordKind::TagMap, "LocationId", id),
            Some(TagMapTarget::Note(id)) => require_positive(RecordKind::TagMap, "NoteId", id),
            Some(TagMapTarget::PlaylistItem(id)) => {
                require_positive(RecordKind::TagMap, "PlaylistItemId", id)
            }
            None => Ok(()),
        }
    }

    fn push_tag_map(&mut self, tag_map: TagMap) {
        let position = self.tag_maps.len();
        self.indexes
            .tag_maps_by_target
            .note_insert(|| tag_map.identity_key(), position);
        self.tag_maps.push(tag_map);
    }

    pub fn add_bookmark_and_update_index(&mut self, bookmark: Bookmark) -> Result<()> {
        require_positive(RecordKind::Bookmark, "BookmarkId", bookmark.bookmark_id)?;
        require_positive(RecordKind::Bookmark, "LocationId", bookmark.location_id)?;
        require_positive(
            RecordKind::Bookmark,
            "PublicationLocationId",
            bookmark.publication_location_id,
        )?;

        let position = self.bookmarks.len();
        self.indexes
            .bookmarks_by_locations
            .note_insert(|| bookmark.identity_key(), position);

        self.bookmarks.push(bookmark);
        Ok(())
    }

    pub fn add_independent_media_and_update_index(&mut self, media: IndependentMedia) -> Result<()> {
        require_positive(
            RecordKind::IndependentMedia,
            "IndependentMediaId",
            media.independent_media_id,
        )?;

        let position = self.independent_medias.len();
        let indexes = &mut self.indexes;
        indexes.media_by_path.note_insert(|| media.identity_key(), position);
        indexes
            .media_by_hash
            .note_insert(|| media_hash_key(&media.hash), position);
        indexes
            .media_by_id
            .note_insert(|| Some(media.independent_media_id), position);

        self.independent_medias.push(media);
        Ok(())
    }

    pub fn add_playlist_item_and_update_index(&mut self, item: PlaylistItem) -> Result<()> {
        require_positive(RecordKind::PlaylistItem, "PlaylistItemId", item.playlist_item_id)?;

        let position = self.playlist_items.len();
        let indexes = &mut self.indexes;
        indexes
            .playlist_items_by_id
            .note_insert(|| Some(item.playlist_item_id), position);
        indexes
            .playlist_items_by_value
            .note_insert(|| item.identity_key(), position);

        self.playlist_items.push(item);
        Ok(())
    }

    pub fn add_playlist_item_independent_media_map_and_update_index(
        &mut self,
        map: PlaylistItemIndependentMediaMap,
    ) -> Result<()> {
        let kind = RecordKind::PlaylistItemIndependentMediaMap;
        require_positive(kind, "PlaylistItemId", map.playlist_item_id)?;
        require_positive(kind, "IndependentMediaId", map.independent_media_id)?;

        let position = self.playlist_item_independent_media_maps.len();
        self.indexes
            .media_maps_by_value
            .note_insert(|| map.identity_key(), position);

        self.playlist_item_independent_media_maps.push(map);
        Ok(())
    }

    pub fn add_playlist_item_location_map_and_update_index(
        &mut self,
        map: PlaylistItemLocationMap,
    ) -> Result<()> {
        let kind = RecordKind::PlaylistItemLocationMap;
        require_positive(kind, "PlaylistItemId", map.playlist_item_id)?;
        require_positive(kind, "LocationId", map.location_id)?;

        let position = self.playlist_item_location_maps.len();
        self.indexes
            .location_maps_by_location
            .note_insert(|| map.identity_key(), position);

        self.playlist_item_location_maps.push(map);
        Ok(())
    }

    pub fn add_playlist_item_marker_and_update_index(
        &mut self,
        marker: PlaylistItemMarker,
    ) -> Result<()> {
        let kind = RecordKind::PlaylistItemMarker;
        require_positive(kind, "PlaylistItemMarkerId", marker.playlist_item_marker_id)?;
        require_positive(kind, "PlaylistItemId", marker.playlist_item_id)?;

        let position = self.playlist_item_markers.len();
        let indexes = &mut self.indexes;
        indexes
            .markers_by_id
            .note_insert(|| Some(marker.playlist_item_marker_id), position);
        indexes
            .markers_by_value
            .note_insert(|| marker.identity_key(), position);

        self.playlist_item_markers.push(marker);
        Ok(())
    }

    pub fn add_playlist_item_marker_bible_verse_map_and_update_index(
        &mut self,
        map: PlaylistItemMarkerBibleVerseMap,
    ) -> Result<()> {
        require_positive(
            RecordKind::PlaylistItemMarkerBibleVerseMap,
            "PlaylistItemMarkerId",
            map.playlist_item_marker_id,
        )?;

        let position = self.playlist_item_marker_bible_verse_maps.len();
        self.indexes
            .verse_maps_by_marker
            .note_insert(|| Some(map.playlist_item_marker_id), position);

        self.playlist_item_marker_bible_verse_maps.push(map);
        Ok(())
    }

    pub fn add_playlist_item_marker_paragraph_map_and_update_index(
        &mut self,
        map: PlaylistItemMarkerParagraphMap,
    ) -> Result<()> {
        require_positive(
            RecordKind::PlaylistItemMarkerParagraphMap,
            "PlaylistItemMarkerId",
            map.playlist_item_marker_id,
        )?;

        let position = self.playlist_item_marker_paragraph_maps.len();
        self.indexes
            .paragraph_maps_by_marker
            .note_insert(|| Some(map.playlist_item_marker_id), position);

        self.playlist_item_marker_paragraph_maps.push(map);
        Ok(())
    }

    /// Remove a playlist item and every row that depends on it.
    ///
    /// Returns the number of rows removed, the item included.
    pub fn remove_playlist_item(&mut self, playlist_item_id: i32) -> usize {
        let markers: HashSet<i32> = self
            .playlist_item_markers
            .iter()
            .filter(|m| m.playlist_item_id == playlist_item_id)
            .map(|m| m.playlist_item_marker_id)
            .collect();

        let mut removed = retain_counting(self.playlist_items_mut(), |p| {
            p.playlist_item_id != playlist_item_id
        });
        removed += retain_counting(self.playlist_item_independent_media_maps_mut(), |m| {
            m.playlist_item_id != playlist_item_id
        });
        removed += retain_counting(self.playlist_item_location_maps_mut(), |m| {
            m.playlist_item_id != playlist_item_id
        });
        if !markers.is_empty() {
            removed += retain_counting(self.playlist_item_markers_mut(), |m| {
                m.playlist_item_id != playlist_item_id
            });
            removed += retain_counting(self.playlist_item_marker_bible_verse_maps_mut(), |m| {
                !markers.contains(&m.playlist_item_marker_id)
            });
            removed += retain_counting(self.playlist_item_marker_paragraph_maps_mut(), |m| {
                !markers.contains(&m.playlist_item_marker_id)
            });
        }
        removed += retain_counting(self.tag_maps_mut(), |m| {
            m.playlist_item_id != Some(playlist_item_id)
        });

        debug!(playlist_item_id, removed, "Removed playlist item and its dependents");
        removed
    }
}

fn media_hash_key(hash: &str) -> Option<String> {
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn has_numeric_id(kind: RecordKind) -> bool {
    !matches!(
        kind,
        RecordKind::InputField
            | RecordKind::PlaylistItemIndependentMediaMap
            | RecordKind::PlaylistItemLocationMap
            | RecordKind::PlaylistItemMarkerBibleVerseMap
            | RecordKind::PlaylistItemMarkerParagraphMap
    )
}

/// `Vec::retain` that reports how many rows went away
pub(crate) fn retain_counting<T>(rows: &mut Vec<T>, keep: impl FnMut(&T) -> bool) -> usize {
    let before = rows.len();
    rows.retain(keep);
    before - rows.len()
}

/// Remove the rows at the given positions; returns the number removed
pub(crate) fn remove_positions<T>(rows: &mut Vec<T>, positions: &HashSet<usize>) -> usize {
    if positions.is_empty() {
        return 0;
    }
    let before = rows.len();
    let mut position = 0;
    rows.retain(|_| {
        let keep = !positions.contains(&position);
        position += 1;
        keep
    });
    before - rows.len()
}

/// Scan `rows` from last to first and remove every row `should_remove`
/// selects. The predicate sees rows in reverse collection order, which
/// matters when it keeps state (for example "seen this key already").
pub(crate) fn remove_where_reverse<T>(rows: &mut Vec<T>, mut should_remove: impl FnMut(&T) -> bool) -> usize {
    let doomed: HashSet<usize> = rows
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, row)| should_remove(*row))
        .map(|(position, _)| position)
        .collect();
    remove_positions(rows, &doomed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID_A: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
    const GUID_B: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn store_with_location() -> Database {
        let mut db = Database::new();
        db.add_location_and_update_index(Location::bible_chapter(1, "nwtsty", 40, 5))
            .unwrap();
        db
    }

    #[test]
    fn test_find_missing_returns_none() {
        let db = Database::new();
        assert!(db.find_location(1).is_none());
        assert!(db.find_user_mark_by_guid(GUID_A).is_none());
        assert!(db.find_note_by_guid("garbage").is_none());
        assert!(db.find_block_ranges(3).is_empty());
    }

    #[test]
    fn test_incremental_update_after_materialization() {
        let mut db = store_with_location();
        assert!(db.find_user_mark_by_guid(GUID_A).is_none());
        assert!(db.indexes.user_marks_by_guid.is_materialized());

        db.add_user_mark_and_update_index(UserMark::new(1, 1, 2).with_guid(GUID_A))
            .unwrap();
        assert_eq!(db.find_user_mark_by_guid(GUID_A).map(|m| m.user_mark_id), Some(1));
    }

    #[test]
    fn test_add_leaves_unbuilt_index_unbuilt() {
        let mut db = store_with_location();
        db.add_user_mark_and_update_index(UserMark::new(1, 1, 2).with_guid(GUID_A))
            .unwrap();
        assert!(!db.indexes.user_marks_by_guid.is_materialized());
        assert!(db.find_user_mark_by_guid(GUID_A).is_some());
    }

    #[test]
    fn test_mut_accessor_invalidates() {
        let mut db = store_with_location();
        assert!(db.find_location(1).is_some());
        db.locations_mut().clear();
        assert!(!db.indexes.locations_by_id.is_materialized());
        assert!(db.find_location(1).is_none());
    }

    #[test]
    fn test_add_rejects_non_positive_ids() {
        let mut db = Database::new();
        let err = db
            .add_location_and_update_index(Location::document(0, "w", 1))
            .unwrap_err();
        assert!(matches!(err, MergeError::InvalidArgument(_)));
        assert!(db.locations().is_empty());
    }

    #[test]
    fn test_add_rejects_malformed_guid() {
        let mut db = store_with_location();
        let result = db.add_user_mark_and_update_index(UserMark::new(1, 1, 0).with_guid("nope"));
        assert!(result.is_err());
        assert!(db.user_marks().is_empty());
    }

    #[test]
    fn test_tag_map_needs_exactly_one_target() {
        let mut db = Database::new();
        let mut map = TagMap::new(1, 1, TagMapTarget::Note(1), 0);
        map.location_id = Some(2);
        assert!(db.add_tag_map_and_update_index(map).is_err());
        assert!(db.add_tag_map_and_update_index(TagMap::default()).is_err());
    }

    #[test]
    fn test_next_bookmark_slot_per_publication() {
        let mut db = Database::new();
        assert_eq!(db.next_bookmark_slot(5), 0);
        assert_eq!(db.next_bookmark_slot(5), 1);
        assert_eq!(db.next_bookmark_slot(6), 0);
        assert_eq!(db.next_bookmark_slot(5), 2);
    }

    #[test]
    fn test_find_notes_by_verse() {
        let mut db = store_with_location();
        let mut note = Note::new(1, "t", "c").with_guid(GUID_A);
        note.location_id = Some(1);
        note.block_type = annomerge_domain::BIBLE_VERSE_BLOCK_TYPE;
        note.block_identifier = Some(3);
        db.add_note_and_update_index(note).unwrap();

        let verse = BibleBookChapterAndVerse::new(40, 5, 3);
        assert_eq!(db.find_notes_by_verse(&verse).len(), 1);

        let extra = Note::new(2, "t2", "c2").with_guid(GUID_B);
        let map = TagMap::new(1, 1, TagMapTarget::Note(2), 0);
        db.add_bible_note_and_update_index(verse, extra, Some(map)).unwrap();
        assert_eq!(db.find_notes_by_verse(&verse).len(), 2);
        assert!(db.find_tag_map(1, TagMapTarget::Note(2)).is_some());
    }

    #[test]
    fn test_bible_note_with_bad_tag_map_leaves_store_unchanged() {
        let mut db = store_with_location();
        let verse = BibleBookChapterAndVerse::new(40, 5, 3);
        let note = Note::new(1, "t", "c").with_guid(GUID_A);
        assert!(db
            .add_bible_note_and_update_index(verse, note, Some(TagMap::default()))
            .is_err());
        assert!(db.notes().is_empty());
    }

    #[test]
    fn test_find_location_by_bible_chapter() {
        let db = store_with_location();
        assert!(db.find_location_by_bible_chapter("nwtsty", 40, 5).is_some());
        assert!(db.find_location_by_bible_chapter("nwtsty", 40, 6).is_none());
    }

    #[test]
    fn test_media_lookups_trim() {
        let mut db = Database::new();
        db.add_independent_media_and_update_index(IndependentMedia::new(1, " a.jpg ", "h1 "))
            .unwrap();
        assert!(db.find_independent_media_by_path("a.jpg").is_some());
        assert!(db.find_independent_media_by_hash("h1").is_some());
        assert!(db.find_independent_media(1).is_some());
    }

    #[test]
    fn test_blank_media_hash_never_matches() {
        let mut db = Database::new();
        db.add_independent_media_and_update_index(IndependentMedia::new(1, "a.jpg", "  "))
            .unwrap();
        assert!(db.find_independent_media_by_hash("").is_none());
        assert!(db.find_independent_media_by_hash(" ").is_none());

        // also once the index exists and grows incrementally
        db.add_independent_media_and_update_index(IndependentMedia::new(2, "b.jpg", ""))
            .unwrap();
        assert!(db.find_independent_media_by_hash("").is_none());
    }

    #[test]
    fn test_init_blank_clears_and_stamps() {
        let mut db = store_with_location();
        db.init_blank();
        assert_eq!(db.total_records(), 0);
        assert!(db.last_modified().last_modified.is_some());
    }

    #[test]
    fn test_max_ids() {
        let mut db = store_with_location();
        db.add_location_and_update_index(Location::document(7, "w", 3)).unwrap();
        assert_eq!(db.max_id(RecordKind::Location), 7);
        assert_eq!(db.max_id(RecordKind::Note), 0);
        let ids = db.max_ids();
        assert_eq!(ids.get(&RecordKind::Location), Some(&7));
        assert!(!ids.contains_key(&RecordKind::InputField));
    }

    #[test]
    fn test_remove_playlist_item_cascades() {
        let mut db = Database::new();
        db.add_playlist_item_and_update_index(PlaylistItem::new(1, "Clip", None))
            .unwrap();
        db.add_playlist_item_marker_and_update_index(PlaylistItemMarker {
            playlist_item_marker_id: 1,
            playlist_item_id: 1,
            ..Default::default()
        })
        .unwrap();
        db.add_playlist_item_marker_bible_verse_map_and_update_index(
            PlaylistItemMarkerBibleVerseMap {
                playlist_item_marker_id: 1,
                verse_id: 9,
            },
        )
        .unwrap();
        db.add_tag_map_and_update_index(TagMap::new(1, 1, TagMapTarget::PlaylistItem(1), 0))
            .unwrap();

        assert_eq!(db.remove_playlist_item(1), 4);
        assert_eq!(db.total_records(), 0);
    }

    #[test]
    fn test_remove_where_reverse_sees_rows_backwards() {
        let mut rows = vec![1, 2, 1, 3];
        let mut seen = HashSet::new();
        // keeps the last occurrence of each value
        let removed = remove_where_reverse(&mut rows, |r| !seen.insert(*r));
        assert_eq!(removed, 1);
        assert_eq!(rows, vec![2, 1, 3]);
    }

    #[test]
    fn test_serde_skips_indexes() {
        let db = store_with_location();
        assert!(db.find_location(1).is_some());
        let json = serde_json::to_string(&db).unwrap();
        assert!(json.contains("\"Locations\""));
        let back: Database = serde_json::from_str(&json).unwrap();
        assert!(!back.indexes.locations_by_id.is_materialized());
        assert_eq!(back.find_location(1).map(|l| l.book_number), Some(Some(40)));
    }
}
