//! Mock snapshot builders shared by the integration tests

use annomerge_core::domain::{
    BlockRange, Bookmark, IndependentMedia, Location, Note, PlaylistItem,
    PlaylistItemIndependentMediaMap, PlaylistItemLocationMap, PlaylistItemMarker, Tag, TagMap,
    TagMapTarget, UserMark,
};
use annomerge_core::Database;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; `RUST_LOG` selects the level
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A snapshot with `records` Bible chapter locations, each carrying one
/// user mark, one block range and one note.
///
/// Every mark and note has a fresh guid. `store_index` shifts the chapters
/// so different stores use different locations.
#[allow(dead_code)]
pub fn mock_store(store_index: i32, records: i32) -> Database {
    let mut db = Database::new();
    for i in 1..=records {
        let n = store_index * records + i - 1;
        let book = n % 66 + 1;
        let chapter = n / 66 + 1;
        db.add_location_and_update_index(Location::bible_chapter(i, "nwtsty", book, chapter).with_language(0))
            .unwrap();

        db.add_user_mark_and_update_index(UserMark::new(i, i, i % 6 + 1))
            .unwrap();
        db.add_block_range_and_update_index(BlockRange::new(i, i, 1, Some(0), Some(10)))
            .unwrap();

        let mut note = Note::new(i, &format!("Note {}", i), "Content");
        note.user_mark_id = Some(i);
        note.location_id = Some(i);
        db.add_note_and_update_index(note).unwrap();
    }
    db
}

/// A snapshot holding one Bible chapter location (id 1) and one mark on
/// it with the given guid, colour and token range.
#[allow(dead_code)]
pub fn marked_store(guid: &str, colour: i32, start: i32, end: i32) -> Database {
    let mut db = Database::new();
    db.add_location_and_update_index(Location::bible_chapter(1, "nwtsty", 43, 3))
        .unwrap();
    db.add_user_mark_and_update_index(UserMark::new(1, 1, colour).with_guid(guid))
        .unwrap();
    db.add_block_range_and_update_index(BlockRange::new(1, 1, 16, Some(start), Some(end)))
        .unwrap();
    db
}

/// A snapshot with bookmarks on consecutive chapters of one publication.
///
/// Location 1 is the publication; bookmark `i` points at location `i + 1`.
#[allow(dead_code)]
pub fn bookmark_store(count: i32, first_chapter: i32) -> Database {
    let mut db = Database::new();
    db.add_location_and_update_index(Location::document(1, "nwtsty", 0)).unwrap();
    for i in 1..=count {
        db.add_location_and_update_index(Location::bible_chapter(i + 1, "nwtsty", 1, first_chapter + i))
            .unwrap();
        db.add_bookmark_and_update_index(Bookmark::new(i, i + 1, 1, (i - 1) % 10))
            .unwrap();
    }
    db
}

/// A snapshot with one tag whose maps point at `labels.len()` notes, in order.
#[allow(dead_code)]
pub fn tagged_notes_store(tag_name: &str, labels: &[&str]) -> Database {
    let mut db = Database::new();
    db.add_tag_and_update_index(Tag::new(1, 1, tag_name)).unwrap();
    for (i, label) in labels.iter().enumerate() {
        let id = i as i32 + 1;
        db.add_note_and_update_index(Note::new(id, label, "body")).unwrap();
        db.add_tag_map_and_update_index(TagMap::new(id, 1, TagMapTarget::Note(id), i as i32))
            .unwrap();
    }
    db
}

/// A snapshot with a single playlist item "Clip" that plays `media_path`
/// and is tagged with a "Favourites" playlist tag.
#[allow(dead_code)]
pub fn playlist_store(media_path: &str, hash: &str) -> Database {
    let mut db = Database::new();
    db.add_independent_media_and_update_index(IndependentMedia::new(1, media_path, hash))
        .unwrap();
    db.add_playlist_item_and_update_index(PlaylistItem::new(1, "Clip", Some(media_path)))
        .unwrap();
    db.add_playlist_item_independent_media_map_and_update_index(PlaylistItemIndependentMediaMap {
        playlist_item_id: 1,
        independent_media_id: 1,
        duration_ticks: 50_000_000,
    })
    .unwrap();
    db.add_tag_and_update_index(Tag::new(1, 2, "Favourites")).unwrap();
    db.add_tag_map_and_update_index(TagMap::new(1, 1, TagMapTarget::PlaylistItem(1), 0))
        .unwrap();
    db
}

/// A playlist item pointing at a publication location, with one marker
#[allow(dead_code)]
pub fn location_playlist_store(label: &str) -> Database {
    let mut db = Database::new();
    db.add_location_and_update_index(Location::document(1, "w", 2024201).with_track(3))
        .unwrap();
    db.add_playlist_item_and_update_index(PlaylistItem::new(1, label, None))
        .unwrap();
    db.add_playlist_item_location_map_and_update_index(PlaylistItemLocationMap {
        playlist_item_id: 1,
        location_id: 1,
        major_multimedia_type: 2,
        base_duration_ticks: None,
    })
    .unwrap();
    db.add_playlist_item_marker_and_update_index(PlaylistItemMarker {
        playlist_item_marker_id: 1,
        playlist_item_id: 1,
        label: "Intro".to_string(),
        start_time_ticks: 0,
        duration_ticks: 10_000_000,
        end_transition_duration_ticks: 0,
    })
    .unwrap();
    db
}
