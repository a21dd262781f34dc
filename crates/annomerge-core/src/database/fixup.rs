//! Self-consistency repair of a single snapshot
//!
//! Run on each source before it is merged. The passes run in a fixed order
//! because later ones depend on rows removed by earlier ones.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use tracing::error;

use annomerge_domain::RecordKind;

use super::keys::DocumentTrackKey;
use super::{remove_positions, Database};

/// What a repair did to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    Removed,
    ClearedUserMark,
    ClearedLocation,
}

/// One repaired row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub record: RecordKind,
    pub record_id: i32,
    pub action: RepairAction,
    pub reason: &'static str,
}

impl Display for Repair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let verb = match self.action {
            RepairAction::Removed => "removed",
            RepairAction::ClearedUserMark => "cleared user mark of",
            RepairAction::ClearedLocation => "cleared location of",
        };
        write!(f, "{} {} {} ({})", verb, self.record, self.record_id, self.reason)
    }
}

/// Everything a repair run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    repairs: Vec<Repair>,
}

impl RepairReport {
    pub fn count(&self) -> usize {
        self.repairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repairs.is_empty()
    }

    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }

    /// Number of repairs touching one table
    pub fn count_for(&self, record: RecordKind) -> usize {
        self.repairs.iter().filter(|r| r.record == record).count()
    }

    fn record(&mut self, record: RecordKind, record_id: i32, action: RepairAction, reason: &'static str) {
        let repair = Repair {
            record,
            record_id,
            action,
            reason,
        };
        error!("Repaired anomaly: {}", repair);
        self.repairs.push(repair);
    }
}

impl Database {
    /// Remove or detach rows that contradict the rest of the snapshot.
    ///
    /// Indexes are rebuilt if anything changed.
    pub fn fixup_anomalies(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        self.fixup_duplicate_locations(&mut report);
        self.fixup_block_ranges(&mut report);
        self.fixup_bookmarks(&mut report);
        self.fixup_notes(&mut report);
        self.fixup_tag_maps(&mut report);
        self.fixup_user_marks(&mut report);

        if !report.is_empty() {
            self.reinitialize_indexes();
        }
        report
    }

    /// Media locations sharing symbol, issue, language, document, track and
    /// type: the first one stays.
    fn fixup_duplicate_locations(&mut self, report: &mut RepairReport) {
        let mut seen = HashSet::new();
        let mut doomed = HashSet::new();
        for (position, location) in self.locations().iter().enumerate() {
            if let Some(key) = DocumentTrackKey::of(location) {
                if !seen.insert(key) {
                    report.record(
                        RecordKind::Location,
                        location.location_id,
                        RepairAction::Removed,
                        "duplicate document and track",
                    );
                    doomed.insert(position);
                }
            }
        }
        if !doomed.is_empty() {
            remove_positions(self.locations_mut(), &doomed);
        }
    }

    fn fixup_block_ranges(&mut self, report: &mut RepairReport) {
        let mut doomed = HashSet::new();
        for (position, range) in self.block_ranges().iter().enumerate().rev() {
            if self.find_user_mark(range.user_mark_id).is_none() {
                report.record(
                    RecordKind::BlockRange,
                    range.block_range_id,
                    RepairAction::Removed,
                    "missing user mark",
                );
                doomed.insert(position);
            }
        }
        if !doomed.is_empty() {
            remove_positions(self.block_ranges_mut(), &doomed);
        }
    }

    fn fixup_bookmarks(&mut self, report: &mut RepairReport) {
        let mut doomed = HashSet::new();
        for (position, bookmark) in self.bookmarks().iter().enumerate().rev() {
            if self.find_location(bookmark.location_id).is_none()
                || self.find_location(bookmark.publication_location_id).is_none()
            {
                report.record(
                    RecordKind::Bookmark,
                    bookmark.bookmark_id,
                    RepairAction::Removed,
                    "missing location",
                );
                doomed.insert(position);
            }
        }
        if !doomed.is_empty() {
            remove_positions(self.bookmarks_mut(), &doomed);
        }
    }

    /// Notes survive with the dangling reference cleared
    fn fixup_notes(&mut self, report: &mut RepairReport) {
        let mut clear_user_mark = HashSet::new();
        let mut clear_location = HashSet::new();
        for (position, note) in self.notes().iter().enumerate().rev() {
            if let Some(id) = note.user_mark_id {
                if self.find_user_mark(id).is_none() {
                    report.record(
                        RecordKind::Note,
                        note.note_id,
                        RepairAction::ClearedUserMark,
                        "missing user mark",
                    );
                    clear_user_mark.insert(position);
                }
            }
            if let Some(id) = note.location_id {
                if self.find_location(id).is_none() {
                    report.record(
                        RecordKind::Note,
                        note.note_id,
                        RepairAction::ClearedLocation,
                        "missing location",
                    );
                    clear_location.insert(position);
                }
            }
        }

        if clear_user_mark.is_empty() && clear_location.is_empty() {
            return;
        }
        for (position, note) in self.notes_mut().iter_mut().enumerate() {
            if clear_user_mark.contains(&position) {
                note.user_mark_id = None;
            }
            if clear_location.contains(&position) {
                note.location_id = None;
            }
        }
    }

    fn fixup_tag_maps(&mut self, report: &mut RepairReport) {
        let mut doomed = HashSet::new();
        for (position, map) in self.tag_maps().iter().enumerate().rev() {
            let reason = if self.find_tag(map.tag_id).is_none() {
                Some("missing tag")
            } else if map.note_id.is_some_and(|id| self.find_note(id).is_none()) {
                Some("missing note")
            } else if map.location_id.is_some_and(|id| self.find_location(id).is_none()) {
                Some("missing location")
            } else if map
                .playlist_item_id
                .is_some_and(|id| self.find_playlist_item(id).is_none())
            {
                Some("missing playlist item")
            } else {
                None
            };

            if let Some(reason) = reason {
                report.record(RecordKind::TagMap, map.tag_map_id, RepairAction::Removed, reason);
                doomed.insert(position);
            }
        }
        if !doomed.is_empty() {
            remove_positions(self.tag_maps_mut(), &doomed);
        }
    }

    fn fixup_user_marks(&mut self, report: &mut RepairReport) {
        let mut doomed = HashSet::new();
        for (position, mark) in self.user_marks().iter().enumerate().rev() {
            if self.find_location(mark.location_id).is_none() {
                report.record(
                    RecordKind::UserMark,
                    mark.user_mark_id,
                    RepairAction::Removed,
                    "missing location",
                );
                doomed.insert(position);
            }
        }
        if !doomed.is_empty() {
            remove_positions(self.user_marks_mut(), &doomed);
        }
    }
}

#[cfg(test)]
mod tests {
    use annomerge_domain::{BlockRange, Bookmark, Location, Note, Tag, TagMap, TagMapTarget, UserMark};

    use super::*;

    fn base() -> Database {
        let mut db = Database::new();
        db.add_location_and_update_index(Location::bible_chapter(1, "nwtsty", 1, 1))
            .unwrap();
        db.add_user_mark_and_update_index(UserMark::new(1, 1, 1)).unwrap();
        db.add_tag_and_update_index(Tag::new(1, 1, "study")).unwrap();
        db
    }

    #[test]
    fn test_clean_store_reports_nothing() {
        let mut db = base();
        db.add_block_range_and_update_index(BlockRange::new(1, 1, 1, Some(0), Some(5))).unwrap();
        assert!(db.fixup_anomalies().is_empty());
    }

    #[test]
    fn test_duplicate_media_locations_keep_first() {
        let mut db = base();
        for id in [2, 3] {
            db.add_location_and_update_index(Location::document(id, "w", 55).with_track(1))
                .unwrap();
        }
        // same document without a track is not a duplicate
        db.add_location_and_update_index(Location::document(4, "w", 55)).unwrap();

        let report = db.fixup_anomalies();
        assert_eq!(report.count_for(RecordKind::Location), 1);
        assert_eq!(report.repairs()[0].record_id, 3);
        let ids: Vec<i32> = db.locations().iter().map(|l| l.location_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn test_orphaned_block_range_removed() {
        let mut db = base();
        db.add_block_range_and_update_index(BlockRange::new(1, 99, 1, Some(0), Some(5))).unwrap();
        let report = db.fixup_anomalies();
        assert_eq!(report.count(), 1);
        assert!(db.block_ranges().is_empty());
    }

    #[test]
    fn test_bookmark_with_missing_publication_removed() {
        let mut db = base();
        db.add_bookmark_and_update_index(Bookmark::new(1, 1, 42, 0)).unwrap();
        db.fixup_anomalies();
        assert!(db.bookmarks().is_empty());
    }

    #[test]
    fn test_note_references_cleared_not_removed() {
        let mut db = base();
        let mut note = Note::new(1, "kept", "body");
        note.user_mark_id = Some(50);
        note.location_id = Some(60);
        db.add_note_and_update_index(note).unwrap();

        let report = db.fixup_anomalies();
        assert_eq!(report.count(), 2);
        let note = &db.notes()[0];
        assert_eq!(note.user_mark_id, None);
        assert_eq!(note.location_id, None);
        assert_eq!(note.title.as_deref(), Some("kept"));
    }

    #[test]
    fn test_tag_maps_with_missing_targets_removed() {
        let mut db = base();
        db.add_tag_map_and_update_index(TagMap::new(1, 1, TagMapTarget::Location(1), 0))
            .unwrap();
        db.add_tag_map_and_update_index(TagMap::new(2, 7, TagMapTarget::Location(1), 1))
            .unwrap();
        db.add_tag_map_and_update_index(TagMap::new(3, 1, TagMapTarget::Note(8), 2))
            .unwrap();
        db.add_tag_map_and_update_index(TagMap::new(4, 1, TagMapTarget::PlaylistItem(8), 3))
            .unwrap();

        let report = db.fixup_anomalies();
        assert_eq!(report.count_for(RecordKind::TagMap), 3);
        assert_eq!(db.tag_maps().len(), 1);
        assert_eq!(db.tag_maps()[0].tag_map_id, 1);
    }

    #[test]
    fn test_user_mark_with_missing_location_removed_after_ranges() {
        let mut db = base();
        db.add_user_mark_and_update_index(UserMark::new(2, 77, 1)).unwrap();
        db.add_block_range_and_update_index(BlockRange::new(1, 2, 1, Some(0), Some(5))).unwrap();

        let report = db.fixup_anomalies();
        // the range still had its mark when ranges were checked
        assert_eq!(report.count_for(RecordKind::BlockRange), 0);
        assert_eq!(report.count_for(RecordKind::UserMark), 1);
        assert_eq!(db.user_marks().len(), 1);
    }
}
