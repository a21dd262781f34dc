//! The record tables of a snapshot

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// One record table of the backup schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordKind {
    Location,
    UserMark,
    BlockRange,
    Note,
    InputField,
    Tag,
    TagMap,
    Bookmark,
    IndependentMedia,
    PlaylistItem,
    PlaylistItemIndependentMediaMap,
    PlaylistItemLocationMap,
    PlaylistItemMarker,
    PlaylistItemMarkerBibleVerseMap,
    PlaylistItemMarkerParagraphMap,
}

impl RecordKind {
    /// Every table, parents before the tables that reference them
    pub const ALL: [RecordKind; 15] = [
        Self::Location,
        Self::UserMark,
        Self::BlockRange,
        Self::Note,
        Self::InputField,
        Self::Tag,
        Self::TagMap,
        Self::Bookmark,
        Self::IndependentMedia,
        Self::PlaylistItem,
        Self::PlaylistItemIndependentMediaMap,
        Self::PlaylistItemLocationMap,
        Self::PlaylistItemMarker,
        Self::PlaylistItemMarkerBibleVerseMap,
        Self::PlaylistItemMarkerParagraphMap,
    ];

    /// Table name in the backup schema
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::UserMark => "UserMark",
            Self::BlockRange => "BlockRange",
            Self::Note => "Note",
            Self::InputField => "InputField",
            Self::Tag => "Tag",
            Self::TagMap => "TagMap",
            Self::Bookmark => "Bookmark",
            Self::IndependentMedia => "IndependentMedia",
            Self::PlaylistItem => "PlaylistItem",
            Self::PlaylistItemIndependentMediaMap => "PlaylistItemIndependentMediaMap",
            Self::PlaylistItemLocationMap => "PlaylistItemLocationMap",
            Self::PlaylistItemMarker => "PlaylistItemMarker",
            Self::PlaylistItemMarkerBibleVerseMap => "PlaylistItemMarkerBibleVerseMap",
            Self::PlaylistItemMarkerParagraphMap => "PlaylistItemMarkerParagraphMap",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
