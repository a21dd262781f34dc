//! Tags and their ordered assignments

use serde::{Deserialize, Serialize};

/// A tag, identified across snapshots by `(tag_type, name)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub tag_id: i32,
    #[serde(rename = "Type")]
    pub tag_type: i32,
    pub name: String,
}

impl Tag {
    /// Create a tag
    pub fn new(tag_id: i32, tag_type: i32, name: &str) -> Self {
        Self {
            tag_id,
            tag_type,
            name: name.to_string(),
        }
    }
}

/// What a tag map points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagMapTarget {
    Location(i32),
    Note(i32),
    PlaylistItem(i32),
}

/// Assignment of a tag to exactly one location, note or playlist item.
///
/// `position` orders the items within one tag.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TagMap {
    pub tag_map_id: i32,
    pub playlist_item_id: Option<i32>,
    pub location_id: Option<i32>,
    pub note_id: Option<i32>,
    pub tag_id: i32,
    pub position: i32,
}

impl TagMap {
    /// Create a tag map for the given target
    pub fn new(tag_map_id: i32, tag_id: i32, target: TagMapTarget, position: i32) -> Self {
        let mut map = Self {
            tag_map_id,
            tag_id,
            position,
            ..Default::default()
        };
        map.set_target(Some(target));
        map
    }

    /// The single target of this map.
    ///
    /// Location wins over note, note over playlist item, mirroring the
    /// order in which the columns are consulted when more than one is set.
    pub fn target(&self) -> Option<TagMapTarget> {
        if let Some(id) = self.location_id {
            Some(TagMapTarget::Location(id))
        } else if let Some(id) = self.note_id {
            Some(TagMapTarget::Note(id))
        } else {
            self.playlist_item_id.map(TagMapTarget::PlaylistItem)
        }
    }

    /// Replace the target, clearing the other two columns
    pub fn set_target(&mut self, target: Option<TagMapTarget>) {
        self.location_id = None;
        self.note_id = None;
        self.playlist_item_id = None;
        match target {
            Some(TagMapTarget::Location(id)) => self.location_id = Some(id),
            Some(TagMapTarget::Note(id)) => self.note_id = Some(id),
            Some(TagMapTarget::PlaylistItem(id)) => self.playlist_item_id = Some(id),
            None => {}
        }
    }

    /// Number of target columns that are set
    pub fn target_count(&self) -> usize {
        [self.location_id, self.note_id, self.playlist_item_id]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }
}
