//! Record types of an annotation backup snapshot
//!
//! This crate provides the plain data rows that make up one snapshot:
//! - Location: a publication position (symbol, issue, language, book/chapter/document/track)
//! - UserMark, BlockRange: underlining and the token ranges it covers
//! - Note, InputField: user text attached to marks or locations
//! - Tag, TagMap: tag names and their ordered assignments
//! - Bookmark: numbered publication bookmarks
//! - IndependentMedia, PlaylistItem and the playlist maps/markers
//!
//! Field names serialize in the column casing of the backup schema so an
//! external loader can hand rows over as JSON.

pub mod bookmark;
pub mod last_modified;
pub mod location;
pub mod note;
pub mod playlist;
pub mod record_kind;
pub mod tag;
pub mod user_mark;
pub mod verse;

pub use bookmark::*;
pub use last_modified::*;
pub use location::*;
pub use note::*;
pub use playlist::*;
pub use record_kind::*;
pub use tag::*;
pub use user_mark::*;
pub use verse::*;
