//! Property-based tests for merge invariants
//!
//! Stores are generated from a small pool of chapters and guids so that
//! sources overlap often.

use annomerge_core::domain::{BlockRange, Location, Note, RecordKind, UserMark};
use annomerge_core::{Database, Merger};
use proptest::prelude::*;

const GUIDS: [&str; 6] = [
    "3f2504e0-4f89-41d3-9a0c-0305e82c3301",
    "7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "16fd2706-8baf-433b-82eb-8c7fada847da",
    "886313e1-3b8a-4372-9b90-0c9aee199e5d",
    "c56a4180-65aa-42ec-a945-5fd21dec0538",
    "a8098c1a-f86e-11da-bd1a-00112444be1e",
];

#[derive(Debug, Clone)]
struct MarkRow {
    book: i32,
    chapter: i32,
    colour: i32,
    guid: usize,
    start: i32,
    len: i32,
    note: bool,
    /// Note refers to a mark id the store does not have
    dangling_note: bool,
}

fn mark_row() -> impl Strategy<Value = MarkRow> {
    (
        1..=4i32,
        1..=3i32,
        1..=6i32,
        0..GUIDS.len(),
        0..20i32,
        1..8i32,
        any::<bool>(),
        prop::bool::weighted(0.1),
    )
        .prop_map(
            |(book, chapter, colour, guid, start, len, note, dangling_note)| MarkRow {
                book,
                chapter,
                colour,
                guid,
                start,
                len,
                note,
                dangling_note,
            },
        )
}

fn store() -> impl Strategy<Value = Vec<MarkRow>> {
    prop::collection::vec(mark_row(), 0..12)
}

fn build_store(rows: &[MarkRow]) -> Database {
    let mut db = Database::new();
    for (i, row) in rows.iter().enumerate() {
        let id = i as i32 + 1;
        db.add_location_and_update_index(Location::bible_chapter(id, "nwtsty", row.book, row.chapter))
            .unwrap();
        db.add_user_mark_and_update_index(UserMark::new(id, id, row.colour).with_guid(GUIDS[row.guid]))
            .unwrap();
        db.add_block_range_and_update_index(BlockRange::new(
            id,
            id,
            1,
            Some(row.start),
            Some(row.start + row.len),
        ))
        .unwrap();
        if row.note {
            let mut note = Note::new(id, "title", "content");
            note.user_mark_id = Some(if row.dangling_note { id + 100 } else { id });
            note.location_id = Some(id);
            db.add_note_and_update_index(note).unwrap();
        }
    }
    db
}

fn counts(db: &Database) -> Vec<usize> {
    RecordKind::ALL.iter().map(|kind| db.record_count(*kind)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bookmark_slots_count_up(publication in 1..1000i32, n in 0..20usize) {
        let mut db = Database::new();
        let slots: Vec<i32> = (0..n).map(|_| db.next_bookmark_slot(publication)).collect();
        let expected: Vec<i32> = (0..n as i32).collect();
        prop_assert_eq!(slots, expected);
    }

    #[test]
    fn prop_merge_output_is_valid(sources in prop::collection::vec(store(), 1..4)) {
        let mut stores: Vec<Database> = sources.iter().map(|rows| build_store(rows)).collect();

        let mut merged = Merger::new().merge(stores.iter_mut()).unwrap();

        prop_assert!(merged.check_validity().is_ok());
        let distinct_guids: std::collections::HashSet<usize> =
            sources.iter().flatten().map(|row| row.guid).collect();
        prop_assert_eq!(merged.user_marks().len(), distinct_guids.len());
    }

    #[test]
    fn prop_merge_is_idempotent(rows in store()) {
        let original = build_store(&rows);

        let mut first = original.clone();
        let mut once = Merger::new().merge([&mut first]).unwrap();
        let expected = counts(&once);

        let mut second = original.clone();
        let twice = Merger::new().merge([&mut once, &mut second]).unwrap();

        prop_assert_eq!(counts(&twice), expected);
    }

    #[test]
    fn prop_clean_reaches_fixed_point(rows in store(), drop_marks in prop::collection::vec(any::<bool>(), 12)) {
        let mut db = build_store(&rows);
        // strand some ranges and notes
        let doomed: Vec<i32> = db
            .user_marks()
            .iter()
            .zip(&drop_marks)
            .filter(|(_, drop)| **drop)
            .map(|(mark, _)| mark.user_mark_id)
            .collect();
        db.user_marks_mut().retain(|mark| !doomed.contains(&mark.user_mark_id));

        db.clean();

        prop_assert_eq!(db.clean(), 0);
    }
}
