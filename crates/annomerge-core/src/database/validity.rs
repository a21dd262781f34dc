//! Foreign-key verification
//!
//! A read-only pass proving that every reference in a store resolves. It
//! never repairs: the first dangling reference is returned as an error.

use annomerge_domain::RecordKind;

use super::Database;
use crate::error::{IntegrityViolation, Result};

fn require(
    present: bool,
    record: RecordKind,
    record_id: i32,
    reference: &'static str,
    missing_id: i32,
) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(IntegrityViolation {
            record,
            record_id,
            reference,
            missing_id: Some(missing_id),
        }
        .into())
    }
}

pub(crate) fn check_foreign_keys(db: &Database) -> Result<()> {
    for mark in db.user_marks() {
        require(
            db.find_location(mark.location_id).is_some(),
            RecordKind::UserMark,
            mark.user_mark_id,
            "LocationId",
            mark.location_id,
        )?;
    }

    for range in db.block_ranges() {
        require(
            db.find_user_mark(range.user_mark_id).is_some(),
            RecordKind::BlockRange,
            range.block_range_id,
            "UserMarkId",
            range.user_mark_id,
        )?;
    }

    for note in db.notes() {
        if let Some(id) = note.user_mark_id {
            require(
                db.find_user_mark(id).is_some(),
                RecordKind::Note,
                note.note_id,
                "UserMarkId",
                id,
            )?;
        }
        if let Some(id) = note.location_id {
            require(
                db.find_location(id).is_some(),
                RecordKind::Note,
                note.note_id,
                "LocationId",
                id,
            )?;
        }
    }

    for field in db.input_fields() {
        require(
            db.find_location(field.location_id).is_some(),
            RecordKind::InputField,
            field.location_id,
            "LocationId",
            field.location_id,
        )?;
    }

    for map in db.tag_maps() {
        require(
            db.find_tag(map.tag_id).is_some(),
            RecordKind::TagMap,
            map.tag_map_id,
            "TagId",
            map.tag_id,
        )?;
        if map.target_count() != 1 {
            return Err(IntegrityViolation {
                record: RecordKind::TagMap,
                record_id: map.tag_map_id,
                reference: "target",
                missing_id: None,
            }
            .into());
        }
        if let Some(id) = map.location_id {
            require(
                db.find_location(id).is_some(),
                RecordKind::TagMap,
                map.tag_map_id,
                "LocationId",
                id,
            )?;
        }
        if let Some(id) = map.note_id {
            require(db.find_note(id).is_some(), RecordKind::TagMap, map.tag_map_id, "NoteId", id)?;
        }
        if let Some(id) = map.playlist_item_id {
            require(
                db.find_playlist_item(id).is_some(),
                RecordKind::TagMap,
                map.tag_map_id,
                "PlaylistItemId",
                id,
            )?;
        }
    }

    for bookmark in db.bookmarks() {
        require(
            db.find_location(bookmark.location_id).is_some(),
            RecordKind::Bookmark,
            bookmark.bookmark_id,
            "LocationId",
            bookmark.location_id,
        )?;
        require(
            db.find_location(bookmark.publication_location_id).is_some(),
            RecordKind::Bookmark,
            bookmark.bookmark_id,
            "PublicationLocationId",
            bookmark.publication_location_id,
        )?;
    }

    for map in db.playlist_item_independent_media_maps() {
        require(
            db.find_playlist_item(map.playlist_item_id).is_some(),
            RecordKind::PlaylistItemIndependentMediaMap,
            map.playlist_item_id,
            "PlaylistItemId",
            map.playlist_item_id,
        )?;
        require(
            db.find_independent_media(map.independent_media_id).is_some(),
            RecordKind::PlaylistItemIndependentMediaMap,
            map.playlist_item_id,
            "IndependentMediaId",
            map.independent_media_id,
        )?;
    }

    for map in db.playlist_item_location_maps() {
        require(
            db.find_playlist_item(map.playlist_item_id).is_some(),
            RecordKind::PlaylistItemLocationMap,
            map.playlist_item_id,
            "PlaylistItemId",
            map.playlist_item_id,
        )?;
        require(
            db.find_location(map.location_id).is_some(),
            RecordKind::PlaylistItemLocationMap,
            map.playlist_item_id,
            "LocationId",
            map.location_id,
        )?;
    }

    for marker in db.playlist_item_markers() {
        require(
            db.find_playlist_item(marker.playlist_item_id).is_some(),
            RecordKind::PlaylistItemMarker,
            marker.playlist_item_marker_id,
            "PlaylistItemId",
            marker.playlist_item_id,
        )?;
    }

    for map in db.playlist_item_marker_bible_verse_maps() {
        require(
            db.find_playlist_item_marker(map.playlist_item_marker_id).is_some(),
            RecordKind::PlaylistItemMarkerBibleVerseMap,
            map.playlist_item_marker_id,
            "PlaylistItemMarkerId",
            map.playlist_item_marker_id,
        )?;
    }

    for map in db.playlist_item_marker_paragraph_maps() {
        require(
            db.find_playlist_item_marker(map.playlist_item_marker_id).is_some(),
            RecordKind::PlaylistItemMarkerParagraphMap,
            map.playlist_item_marker_id,
            "PlaylistItemMarkerId",
            map.playlist_item_marker_id,
        )?;
    }

    // media referenced by a thumbnail path is resolved by path, not id
    Ok(())
}

#[cfg(test)]
mod tests {
    use annomerge_domain::{
        Bookmark, Location, Note, PlaylistItemMarker, PlaylistItemMarkerParagraphMap, Tag, TagMap,
        TagMapTarget, UserMark,
    };

    use crate::error::MergeError;

    use super::*;

    fn valid_store() -> Database {
        let mut db = Database::new();
        db.add_location_and_update_index(Location::bible_chapter(1, "nwtsty", 1, 1))
            .unwrap();
        db.add_user_mark_and_update_index(UserMark::new(1, 1, 1)).unwrap();
        let mut note = Note::new(1, "t", "c");
        note.user_mark_id = Some(1);
        db.add_note_and_update_index(note).unwrap();
        db.add_tag_and_update_index(Tag::new(1, 1, "t")).unwrap();
        db.add_tag_map_and_update_index(TagMap::new(1, 1, TagMapTarget::Note(1), 0))
            .unwrap();
        db.add_bookmark_and_update_index(Bookmark::new(1, 1, 1, 0)).unwrap();
        db
    }

    fn violation(db: &mut Database) -> IntegrityViolation {
        match db.check_validity() {
            Err(MergeError::IntegrityViolation(v)) => v,
            other => panic!("expected an integrity violation, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_store_passes() {
        assert!(valid_store().check_validity().is_ok());
        assert!(Database::new().check_validity().is_ok());
    }

    #[test]
    fn test_dangling_note_user_mark() {
        let mut db = valid_store();
        db.notes_mut()[0].user_mark_id = Some(5);
        let v = violation(&mut db);
        assert_eq!(v.record, RecordKind::Note);
        assert_eq!(v.reference, "UserMarkId");
        assert_eq!(v.missing_id, Some(5));
    }

    #[test]
    fn test_tag_map_without_target() {
        let mut db = valid_store();
        db.tag_maps_mut()[0].set_target(None);
        let v = violation(&mut db);
        assert_eq!(v.record, RecordKind::TagMap);
        assert_eq!(v.missing_id, None);
    }

    #[test]
    fn test_bookmark_publication_checked() {
        let mut db = valid_store();
        db.bookmarks_mut()[0].publication_location_id = 3;
        assert_eq!(violation(&mut db).reference, "PublicationLocationId");
    }

    #[test]
    fn test_marker_maps_checked() {
        let mut db = valid_store();
        db.playlist_item_marker_paragraph_maps_mut()
            .push(PlaylistItemMarkerParagraphMap {
                playlist_item_marker_id: 4,
                ..Default::default()
            });
        assert_eq!(violation(&mut db).record, RecordKind::PlaylistItemMarkerParagraphMap);

        let mut db = valid_store();
        db.playlist_item_markers_mut().push(PlaylistItemMarker {
            playlist_item_marker_id: 1,
            playlist_item_id: 2,
            ..Default::default()
        });
        assert_eq!(violation(&mut db).record, RecordKind::PlaylistItemMarker);
    }
}
