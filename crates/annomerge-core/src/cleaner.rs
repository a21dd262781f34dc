//! Removal of unreferenced rows
//!
//! Tables are processed from the most dependent toward the least dependent,
//! so a single pass reaches a fixed point: nothing removed later can strand
//! a row that was kept earlier. Each table is scanned in reverse order.

use std::collections::HashSet;

use tracing::debug;

use annomerge_domain::RecordKind;

use crate::database::{remove_where_reverse, Database};

/// Garbage collector for a single store.
pub struct Cleaner<'a> {
    database: &'a mut Database,
}

impl<'a> Cleaner<'a> {
    pub fn new(database: &'a mut Database) -> Self {
        Self { database }
    }

    /// Remove every unreferenced or dangling row; returns the number removed
    pub fn clean(&mut self) -> usize {
        let removed = self.clean_block_ranges()
            + self.clean_tag_maps()
            + self.clean_playlist_item_independent_media_maps()
            + self.clean_playlist_item_location_maps()
            + self.clean_playlist_item_markers()
            + self.clean_playlist_item_marker_bible_verse_maps()
            + self.clean_playlist_item_marker_paragraph_maps()
            + self.clean_playlist_items()
            + self.clean_independent_medias()
            + self.clean_locations();

        if removed > 0 {
            debug!(removed, "Cleaned store");
        }
        removed
    }

    /// Ranges of missing marks, and every range but the last of each mark
    fn clean_block_ranges(&mut self) -> usize {
        let user_marks: HashSet<i32> = self
            .database
            .user_marks()
            .iter()
            .map(|m| m.user_mark_id)
            .collect();
        let mut seen = HashSet::new();

        let removed = remove_where_reverse(self.database.block_ranges_mut(), |range| {
            if !user_marks.contains(&range.user_mark_id) {
                debug!(block_range_id = range.block_range_id, "Removing orphaned range");
                true
            } else if !seen.insert(range.user_mark_id) {
                debug!(
                    block_range_id = range.block_range_id,
                    user_mark_id = range.user_mark_id,
                    "Removing duplicate range for user mark"
                );
                true
            } else {
                false
            }
        });
        log_removed(RecordKind::BlockRange, removed)
    }

    fn clean_tag_maps(&mut self) -> usize {
        let db = &*self.database;
        let tags: HashSet<i32> = db.tags().iter().map(|t| t.tag_id).collect();
        let notes: HashSet<i32> = db.notes().iter().map(|n| n.note_id).collect();
        let locations = location_ids(db);
        let playlist_items: HashSet<i32> = db
            .playlist_items()
            .iter()
            .map(|p| p.playlist_item_id)
            .collect();

        let removed = remove_where_reverse(self.database.tag_maps_mut(), |map| {
            !tags.contains(&map.tag_id)
                || map.note_id.is_some_and(|id| !notes.contains(&id))
                || map.location_id.is_some_and(|id| !locations.contains(&id))
                || map
                    .playlist_item_id
                    .is_some_and(|id| !playlist_items.contains(&id))
        });
        log_removed(RecordKind::TagMap, removed)
    }

    fn clean_playlist_item_independent_media_maps(&mut self) -> usize {
        let playlist_items = playlist_item_ids(self.database);
        let medias: HashSet<i32> = self
            .database
            .independent_medias()
            .iter()
            .map(|m| m.independent_media_id)
            .collect();

        let removed = remove_where_reverse(
            self.database.playlist_item_independent_media_maps_mut(),
            |map| {
                !playlist_items.contains(&map.playlist_item_id)
                    || !medias.contains(&map.independent_media_id)
            },
        );
        log_removed(RecordKind::PlaylistItemIndependentMediaMap, removed)
    }

    fn clean_playlist_item_location_maps(&mut self) -> usize {
        let playlist_items = playlist_item_ids(self.database);
        let locations = location_ids(self.database);

        let removed = remove_where_reverse(self.database.playlist_item_location_maps_mut(), |map| {
            !playlist_items.contains(&map.playlist_item_id) || !locations.contains(&map.location_id)
        });
        log_removed(RecordKind::PlaylistItemLocationMap, removed)
    }

    fn clean_playlist_item_markers(&mut self) -> usize {
        let playlist_items = playlist_item_ids(self.database);

        let removed = remove_where_reverse(self.database.playlist_item_markers_mut(), |marker| {
            !playlist_items.contains(&marker.playlist_item_id)
        });
        log_removed(RecordKind::PlaylistItemMarker, removed)
    }

    fn clean_playlist_item_marker_bible_verse_maps(&mut self) -> usize {
        let markers = marker_ids(self.database);

        let removed = remove_where_reverse(
            self.database.playlist_item_marker_bible_verse_maps_mut(),
            |map| !markers.contains(&map.playlist_item_marker_id),
        );
        log_removed(RecordKind::PlaylistItemMarkerBibleVerseMap, removed)
    }

    fn clean_playlist_item_marker_paragraph_maps(&mut self) -> usize {
        let markers = marker_ids(self.database);

        let removed = remove_where_reverse(
            self.database.playlist_item_marker_paragraph_maps_mut(),
            |map| !markers.contains(&map.playlist_item_marker_id),
        );
        log_removed(RecordKind::PlaylistItemMarkerParagraphMap, removed)
    }

    /// Items nothing points at
    fn clean_playlist_items(&mut self) -> usize {
        let db = &*self.database;
        let in_use: HashSet<i32> = db
            .playlist_item_independent_media_maps()
            .iter()
            .map(|m| m.playlist_item_id)
            .chain(db.playlist_item_location_maps().iter().map(|m| m.playlist_item_id))
            .chain(db.playlist_item_markers().iter().map(|m| m.playlist_item_id))
            .chain(db.tag_maps().iter().filter_map(|m| m.playlist_item_id))
            .collect();
        debug!("Found {} playlist item ids in use", in_use.len());

        let removed = remove_where_reverse(self.database.playlist_items_mut(), |item| {
            !in_use.contains(&item.playlist_item_id)
        });
        log_removed(RecordKind::PlaylistItem, removed)
    }

    /// Media that is neither mapped nor used as a thumbnail
    fn clean_independent_medias(&mut self) -> usize {
        let db = &*self.database;
        let mut in_use: HashSet<i32> = db
            .playlist_item_independent_media_maps()
            .iter()
            .map(|m| m.independent_media_id)
            .collect();
        for thumbnail in db.playlist_items().iter().filter_map(|p| p.thumbnail()) {
            if let Some(media) = db.find_independent_media_by_path(thumbnail) {
                in_use.insert(media.independent_media_id);
            }
        }
        debug!("Found {} independent media ids in use", in_use.len());

        let removed = remove_where_reverse(self.database.independent_medias_mut(), |media| {
            !in_use.contains(&media.independent_media_id)
        });
        log_removed(RecordKind::IndependentMedia, removed)
    }

    fn clean_locations(&mut self) -> usize {
        let db = &*self.database;
        let mut in_use = HashSet::new();
        for bookmark in db.bookmarks() {
            in_use.insert(bookmark.location_id);
            in_use.insert(bookmark.publication_location_id);
        }
        in_use.extend(db.notes().iter().filter_map(|n| n.location_id));
        in_use.extend(db.user_marks().iter().map(|m| m.location_id));
        in_use.extend(db.tag_maps().iter().filter_map(|m| m.location_id));
        in_use.extend(db.input_fields().iter().map(|f| f.location_id));
        in_use.extend(db.playlist_item_location_maps().iter().map(|m| m.location_id));
        debug!("Found {} location ids in use", in_use.len());

        let removed = remove_where_reverse(self.database.locations_mut(), |location| {
            !in_use.contains(&location.location_id)
        });
        log_removed(RecordKind::Location, removed)
    }
}

fn location_ids(db: &Database) -> HashSet<i32> {
    db.locations().iter().map(|l| l.location_id).collect()
}

fn playlist_item_ids(db: &Database) -> HashSet<i32> {
    db.playlist_items().iter().map(|p| p.playlist_item_id).collect()
}

fn marker_ids(db: &Database) -> HashSet<i32> {
    db.playlist_item_markers()
        .iter()
        .map(|m| m.playlist_item_marker_id)
        .collect()
}

fn log_removed(kind: RecordKind, removed: usize) -> usize {
    if removed > 0 {
        debug!("Removed {} {} rows", removed, kind);
    }
    removed
}
