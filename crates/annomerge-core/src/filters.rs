//! Exclusion filters applied to a source before it is merged
//!
//! - [`MergeParameters`] selects which kinds of annotation a source contributes
//! - [`apply_exclusions`] strips the rest
//! - [`remove_underlining_by_colour`] drops highlights of chosen colours

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::{retain_counting, Database};

/// Which kinds of annotation a source contributes to a merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeParameters {
    pub include_bookmarks: bool,
    pub include_notes: bool,
    pub include_underlining: bool,
    pub include_tags: bool,
    pub include_input_fields: bool,
}

impl Default for MergeParameters {
    fn default() -> Self {
        Self {
            include_bookmarks: true,
            include_notes: true,
            include_underlining: true,
            include_tags: true,
            include_input_fields: true,
        }
    }
}

impl MergeParameters {
    /// Whether the source contributes anything at all
    pub fn any_includes(&self) -> bool {
        self.include_bookmarks
            || self.include_notes
            || self.include_underlining
            || self.include_tags
            || self.include_input_fields
    }

    /// Whether anything has to be stripped
    pub fn any_excludes(&self) -> bool {
        !(self.include_bookmarks
            && self.include_notes
            && self.include_underlining
            && self.include_tags
            && self.include_input_fields)
    }
}

/// Strip everything `parameters` excludes, then clean the store.
///
/// Returns the number of rows removed, cleaned rows included.
pub fn apply_exclusions(db: &mut Database, parameters: &MergeParameters) -> usize {
    if !parameters.any_excludes() {
        return 0;
    }

    let mut removed = 0;

    if !parameters.include_bookmarks {
        removed += retain_counting(db.bookmarks_mut(), |_| false);
    }

    if !parameters.include_input_fields {
        removed += retain_counting(db.input_fields_mut(), |_| false);
    }

    if !parameters.include_tags {
        removed += retain_counting(db.tag_maps_mut(), |_| false);
        removed += retain_counting(db.tags_mut(), |_| false);
    }

    if !parameters.include_notes {
        let notes: HashSet<i32> = db.notes().iter().map(|n| n.note_id).collect();
        removed += retain_counting(db.notes_mut(), |_| false);
        removed += retain_counting(db.tag_maps_mut(), |m| {
            !m.note_id.is_some_and(|id| notes.contains(&id))
        });
    }

    if !parameters.include_underlining {
        removed += retain_counting(db.block_ranges_mut(), |_| false);
        removed += retain_counting(db.user_marks_mut(), |_| false);
        // notes keep their text but lose the highlight they hung off
        for note in db.notes_mut().iter_mut() {
            note.user_mark_id = None;
        }
    }

    removed += db.clean();
    info!(removed, "Applied merge exclusions");
    removed
}

/// Remove underlining in any of `colours`.
///
/// Notes attached to the removed marks are deleted (with their tag maps)
/// when `remove_associated_notes` is set; otherwise they only lose the mark
/// reference. The store is cleaned afterwards and the returned count
/// includes the cleaned rows.
pub fn remove_underlining_by_colour(
    db: &mut Database,
    colours: &[i32],
    remove_associated_notes: bool,
) -> usize {
    let marks: HashSet<i32> = db
        .user_marks()
        .iter()
        .filter(|m| colours.contains(&m.color_index))
        .map(|m| m.user_mark_id)
        .collect();
    if marks.is_empty() {
        return 0;
    }

    let mut removed = retain_counting(db.block_ranges_mut(), |r| !marks.contains(&r.user_mark_id));
    removed += retain_counting(db.user_marks_mut(), |m| !marks.contains(&m.user_mark_id));

    let attached = |user_mark_id: Option<i32>| user_mark_id.is_some_and(|id| marks.contains(&id));
    if remove_associated_notes {
        let notes: HashSet<i32> = db
            .notes()
            .iter()
            .filter(|n| attached(n.user_mark_id))
            .map(|n| n.note_id)
            .collect();
        removed += retain_counting(db.notes_mut(), |n| !notes.contains(&n.note_id));
        removed += retain_counting(db.tag_maps_mut(), |m| {
            !m.note_id.is_some_and(|id| notes.contains(&id))
        });
    } else {
        for note in db.notes_mut().iter_mut() {
            if attached(note.user_mark_id) {
                note.user_mark_id = None;
            }
        }
    }

    removed += db.clean();
    info!(removed, colours = ?colours, "Removed underlining by colour");
    removed
}
