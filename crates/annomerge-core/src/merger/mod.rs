//! Multi-snapshot merge
//!
//! Sources are merged one after another into a fresh destination. Each
//! source is first filtered and repaired, then copied table by table in
//! dependency order so every foreign key a pass needs has already been
//! translated by an earlier pass:
//!
//! user marks, notes, input fields, independent media, playlist items,
//! playlist media maps, playlist location maps, markers, marker verse maps,
//! marker paragraph maps, tags, tag maps, block ranges, bookmarks.
//!
//! Rows whose required parent cannot be translated are dropped with a log
//! line. The only hard failure is the integrity check run on the finished
//! destination.

mod playlists;
mod tags;

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use annomerge_domain::{BlockRange, Bookmark, InputField, Location, Note, RecordKind, UserMark};

use crate::config::MergeConfig;
use crate::database::Database;
use crate::error::Result;
use crate::filters::apply_exclusions;
use crate::translator::IdTranslator;

/// Observer for human-readable phase labels
pub type ProgressCallback = Box<dyn FnMut(&str) + Send>;

/// Merges annotation snapshots.
pub struct Merger {
    config: MergeConfig,
    progress: Option<ProgressCallback>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Merger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Merger")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Merger {
    /// Create a merger with the default configuration
    pub fn new() -> Self {
        Self::with_config(MergeConfig::default())
    }

    pub fn with_config(config: MergeConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Register an observer for phase labels.
    ///
    /// Labels are advisory; they never influence the merge.
    pub fn on_progress<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// Merge `sources`, in order, into a new store.
    ///
    /// Sources are modified in place: exclusion filters and anomaly repair
    /// run on them before they are copied. Id counters start afresh on
    /// every call.
    pub fn merge<'a, I>(&mut self, sources: I) -> Result<Database>
    where
        I: IntoIterator<Item = &'a mut Database>,
    {
        self.config.validate()?;

        let Merger { config, progress } = self;
        let mut report = |message: &str| {
            info!("{}", message);
            if let Some(callback) = progress.as_mut() {
                callback(message);
            }
        };

        let mut destination = Database::new();
        destination.init_blank();
        let mut session = MergeSession::new(config.clone(), &destination);

        let mut merged = 0;
        for (n, source) in sources.into_iter().enumerate() {
            report(&format!("MERGING DATABASE {}:", n + 1));
            session.merge_source(source, &mut destination, &mut report)?;
            merged += 1;
        }

        report("Playlist cleanup");
        let removed = session.cleanup_playlist_items(&mut destination);
        debug!(removed, "Cleaned up playlist items");

        report("Checking validity");
        destination.check_validity()?;

        info!(
            sources = merged,
            records = destination.total_records(),
            "Merge complete"
        );
        Ok(destination)
    }
}

/// Highest id handed out per table in the destination.
///
/// Survives across sources within one merge.
#[derive(Debug, Default)]
struct IdCounters {
    location: i32,
    user_mark: i32,
    block_range: i32,
    note: i32,
    tag: i32,
    tag_map: i32,
    bookmark: i32,
    independent_media: i32,
    playlist_item: i32,
    playlist_item_marker: i32,
}

impl IdCounters {
    fn seeded_from(destination: &Database) -> Self {
        Self {
            location: destination.max_id(RecordKind::Location),
            user_mark: destination.max_id(RecordKind::UserMark),
            block_range: destination.max_id(RecordKind::BlockRange),
            note: destination.max_id(RecordKind::Note),
            tag: destination.max_id(RecordKind::Tag),
            tag_map: destination.max_id(RecordKind::TagMap),
            bookmark: destination.max_id(RecordKind::Bookmark),
            independent_media: destination.max_id(RecordKind::IndependentMedia),
            playlist_item: destination.max_id(RecordKind::PlaylistItem),
            playlist_item_marker: destination.max_id(RecordKind::PlaylistItemMarker),
        }
    }
}

/// Pre-increment a counter
fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// Id translations for the source currently being merged.
#[derive(Debug, Default)]
struct Translators {
    locations: IdTranslator,
    user_marks: IdTranslator,
    notes: IdTranslator,
    tags: IdTranslator,
    independent_medias: IdTranslator,
    playlist_items: IdTranslator,
    playlist_item_markers: IdTranslator,
    /// Source media path to the path of the media it was de-duplicated into
    media_file_paths: HashMap<String, String>,
}

impl Translators {
    fn clear(&mut self) {
        self.locations.clear();
        self.user_marks.clear();
        self.notes.clear();
        self.tags.clear();
        self.independent_medias.clear();
        self.playlist_items.clear();
        self.playlist_item_markers.clear();
        self.media_file_paths.clear();
    }
}

/// State of one `Merger::merge` call.
struct MergeSession {
    config: MergeConfig,
    ids: IdCounters,
    translators: Translators,
}

impl MergeSession {
    fn new(config: MergeConfig, destination: &Database) -> Self {
        Self {
            config,
            ids: IdCounters::seeded_from(destination),
            translators: Translators::default(),
        }
    }

    fn merge_source(
        &mut self,
        source: &mut Database,
        destination: &mut Database,
        report: &mut dyn FnMut(&str),
    ) -> Result<()> {
        self.translators.clear();

        if self.config.parameters.any_excludes() {
            let removed = apply_exclusions(source, &self.config.parameters);
            debug!(removed, "Excluded rows from source");
        }

        let repairs = source.fixup_anomalies();
        if !repairs.is_empty() {
            warn!("Repaired {} anomalies in source before merging", repairs.count());
        }

        let source: &Database = source;

        report("User marks");
        self.merge_user_marks(source, destination)?;
        report("Notes");
        self.merge_notes(source, destination)?;
        report("Input fields");
        self.merge_input_fields(source, destination)?;
        report("Independent media");
        self.merge_independent_medias(source, destination)?;
        report("Playlist items");
        self.merge_playlist_items(source, destination)?;
        report("Playlist item independent media maps");
        self.merge_playlist_item_independent_media_maps(source, destination)?;
        report("Playlist item location maps");
        self.merge_playlist_item_location_maps(source, destination)?;
        report("Playlist item markers");
        self.merge_playlist_item_markers(source, destination)?;
        report("Playlist item marker Bible verse maps");
        self.merge_playlist_item_marker_bible_verse_maps(source, destination)?;
        report("Playlist item marker paragraph maps");
        self.merge_playlist_item_marker_paragraph_maps(source, destination)?;
        report("Tags");
        self.merge_tags(source, destination)?;
        report("Tag maps");
        self.merge_tag_maps(source, destination)?;
        report("Block ranges");
        self.merge_block_ranges(source, destination)?;
        report("Bookmarks");
        self.merge_bookmarks(source, destination)?;

        Ok(())
    }

    /// Destination id of `location`, inserting a copy if no location with the
    /// same identity exists yet
    fn insert_location(&mut self, location: &Location, destination: &mut Database) -> Result<i32> {
        let translated = self.translators.locations.get(location.location_id);
        if translated != 0 {
            return Ok(translated);
        }

        let location_id = match destination.find_location_by_values(location) {
            Some(existing) => existing.location_id,
            None => {
                let mut copy = location.clone();
                copy.location_id = next_id(&mut self.ids.location);
                let id = copy.location_id;
                destination.add_location_and_update_index(copy)?;
                id
            }
        };
        self.translators.locations.add(location.location_id, location_id);
        Ok(location_id)
    }

    /// Destination id for a source location id; 0 if the source lacks it
    fn ensure_location(
        &mut self,
        source: &Database,
        location_id: i32,
        destination: &mut Database,
    ) -> Result<i32> {
        let translated = self.translators.locations.get(location_id);
        if translated != 0 {
            return Ok(translated);
        }
        match source.find_location(location_id) {
            Some(location) => self.insert_location(location, destination),
            None => Ok(0),
        }
    }

    fn merge_user_marks(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for mark in source.user_marks() {
            if let Some(existing) = destination.find_user_mark_by_guid(&mark.user_mark_guid) {
                self.translators
                    .user_marks
                    .add(mark.user_mark_id, existing.user_mark_id);
                continue;
            }
            if mark.guid().is_none() {
                warn!(
                    user_mark_id = mark.user_mark_id,
                    "Skipping user mark with malformed guid"
                );
                continue;
            }

            let location_id = self.ensure_location(source, mark.location_id, destination)?;
            if location_id == 0 {
                error!(
                    user_mark_id = mark.user_mark_id,
                    location_id = mark.location_id,
                    "Could not find location for user mark"
                );
                continue;
            }

            let copy = UserMark {
                user_mark_id: next_id(&mut self.ids.user_mark),
                location_id,
                ..mark.clone()
            };
            let id = copy.user_mark_id;
            destination.add_user_mark_and_update_index(copy)?;
            self.translators.user_marks.add(mark.user_mark_id, id);
        }
        Ok(())
    }

    /// Notes are matched by guid; an existing note takes the text of a
    /// strictly newer incoming one
    fn merge_notes(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for note in source.notes() {
            if let Some(existing) = destination.find_note_by_guid_mut(&note.guid) {
                if existing.last_modified_at() < note.last_modified_at() {
                    debug!(note_id = existing.note_id, "Updating note from newer copy");
                    existing.title = note.title.clone();
                    existing.content = note.content.clone();
                    existing.last_modified = note.last_modified.clone();
                }
                let id = existing.note_id;
                self.translators.notes.add(note.note_id, id);
                continue;
            }
            if note.guid().is_none() {
                warn!(note_id = note.note_id, "Skipping note with malformed guid");
                continue;
            }

            let user_mark_id = self.translators.user_marks.translate(note.user_mark_id);
            if note.user_mark_id.is_some() && user_mark_id.is_none() {
                warn!(note_id = note.note_id, "Note loses its user mark reference");
            }
            let location_id = match note.location_id {
                Some(id) => Some(self.ensure_location(source, id, destination)?).filter(|id| *id != 0),
                None => None,
            };

            let copy = Note {
                note_id: next_id(&mut self.ids.note),
                user_mark_id,
                location_id,
                ..note.clone()
            };
            let id = copy.note_id;
            destination.add_note_and_update_index(copy)?;
            self.translators.notes.add(note.note_id, id);
        }
        Ok(())
    }

    fn merge_input_fields(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for field in source.input_fields() {
            let location_id = self.ensure_location(source, field.location_id, destination)?;
            if location_id == 0 {
                error!(
                    location_id = field.location_id,
                    text_tag = %field.text_tag,
                    "Could not find location for input field"
                );
                continue;
            }
            if destination.find_input_field(location_id, &field.text_tag).is_some() {
                continue;
            }

            destination.add_input_field_and_update_index(InputField {
                location_id,
                ..field.clone()
            })?;
        }
        Ok(())
    }

    /// A range joins only if its mark was translated and it does not overlap
    /// a range already on that mark
    fn merge_block_ranges(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for range in source.block_ranges() {
            let user_mark_id = self.translators.user_marks.get(range.user_mark_id);
            if user_mark_id == 0 {
                debug!(
                    block_range_id = range.block_range_id,
                    "Skipping range of untranslated user mark"
                );
                continue;
            }

            let overlaps = destination
                .find_block_ranges(user_mark_id)
                .into_iter()
                .any(|existing| block_ranges_overlap(existing, range));
            if overlaps {
                continue;
            }

            destination.add_block_range_and_update_index(BlockRange {
                block_range_id: next_id(&mut self.ids.block_range),
                user_mark_id,
                ..range.clone()
            })?;
        }
        Ok(())
    }

    /// Bookmarks get a fresh slot in the destination publication
    fn merge_bookmarks(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for bookmark in source.bookmarks() {
            let (Some(location), Some(publication)) = (
                source.find_location(bookmark.location_id),
                source.find_location(bookmark.publication_location_id),
            ) else {
                error!(
                    bookmark_id = bookmark.bookmark_id,
                    "Could not find location for bookmark"
                );
                continue;
            };

            let location_id = self.insert_location(location, destination)?;
            let publication_location_id = self.insert_location(publication, destination)?;
            if destination
                .find_bookmark(location_id, publication_location_id)
                .is_some()
            {
                continue;
            }

            let slot = destination.next_bookmark_slot(publication_location_id);
            if slot >= self.config.max_bookmark_slots {
                warn!(
                    bookmark_id = bookmark.bookmark_id,
                    publication_location_id, "No free bookmark slot; bookmark dropped"
                );
                continue;
            }

            destination.add_bookmark_and_update_index(Bookmark {
                bookmark_id: next_id(&mut self.ids.bookmark),
                location_id,
                publication_location_id,
                slot,
                ..bookmark.clone()
            })?;
        }
        Ok(())
    }
}

/// Whether two ranges of the same mark describe the same highlight.
///
/// Identical bounds always overlap. Otherwise both ranges must be fully
/// bounded and their half-open token intervals must intersect.
pub fn block_ranges_overlap(a: &BlockRange, b: &BlockRange) -> bool {
    if a.start_token == b.start_token && a.end_token == b.end_token {
        return true;
    }
    match (a.start_token, a.end_token, b.start_token, b.end_token) {
        (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
            b_start < a_end && b_end > a_start
        }
        _ => false,
    }
}
