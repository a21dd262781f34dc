//! Independent media and playlist passes

use std::collections::HashSet;

use tracing::{debug, error, warn};

use annomerge_domain::{
    IndependentMedia, PlaylistItemIndependentMediaMap, PlaylistItemLocationMap,
    PlaylistItemMarker, PlaylistItemMarkerBibleVerseMap, PlaylistItemMarkerParagraphMap,
};

use super::{next_id, MergeSession};
use crate::database::Database;
use crate::error::Result;

impl MergeSession {
    /// Media is matched by file path, then by content hash. A hash match
    /// also records the path translation so thumbnails can follow it.
    /// Media without a hash only matches by path.
    pub(super) fn merge_independent_medias(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for media in source.independent_medias() {
            if let Some(existing) = destination.find_independent_media_by_path(&media.file_path) {
                self.translators
                    .independent_medias
                    .add(media.independent_media_id, existing.independent_media_id);
                continue;
            }

            let hashed = if media.hash.trim().is_empty() {
                None
            } else {
                destination.find_independent_media_by_hash(&media.hash)
            };
            if let Some(existing) = hashed {
                debug!(
                    file_path = %media.file_path,
                    existing = %existing.file_path,
                    "Media already present under another path"
                );
                self.translators
                    .independent_medias
                    .add(media.independent_media_id, existing.independent_media_id);
                self.translators.media_file_paths.insert(
                    media.file_path.trim().to_string(),
                    existing.file_path.trim().to_string(),
                );
                continue;
            }

            let copy = IndependentMedia {
                independent_media_id: next_id(&mut self.ids.independent_media),
                ..media.clone()
            };
            let id = copy.independent_media_id;
            destination.add_independent_media_and_update_index(copy)?;
            self.translators
                .independent_medias
                .add(media.independent_media_id, id);
        }
        Ok(())
    }

    pub(super) fn merge_playlist_items(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for item in source.playlist_items() {
            let mut candidate = item.clone();
            if let Some(thumbnail) = item.thumbnail() {
                if let Some(path) = self.translators.media_file_paths.get(thumbnail.trim()) {
                    candidate.thumbnail_file_path = Some(path.clone());
                }
            }

            if let Some(existing) = destination.find_playlist_item_by_values(&candidate) {
                self.translators
                    .playlist_items
                    .add(item.playlist_item_id, existing.playlist_item_id);
                continue;
            }

            candidate.playlist_item_id = next_id(&mut self.ids.playlist_item);
            let id = candidate.playlist_item_id;
            destination.add_playlist_item_and_update_index(candidate)?;
            self.translators.playlist_items.add(item.playlist_item_id, id);
        }
        Ok(())
    }

    pub(super) fn merge_playlist_item_independent_media_maps(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for map in source.playlist_item_independent_media_maps() {
            let playlist_item_id = self.translators.playlist_items.get(map.playlist_item_id);
            let independent_media_id = self
                .translators
                .independent_medias
                .get(map.independent_media_id);
            if playlist_item_id == 0 || independent_media_id == 0 {
                warn!(
                    playlist_item_id = map.playlist_item_id,
                    independent_media_id = map.independent_media_id,
                    "Skipping media map with untranslated reference"
                );
                continue;
            }
            if destination
                .find_playlist_item_independent_media_map(playlist_item_id, independent_media_id)
                .is_some()
            {
                continue;
            }

            destination.add_playlist_item_independent_media_map_and_update_index(
                PlaylistItemIndependentMediaMap {
                    playlist_item_id,
                    independent_media_id,
                    ..map.clone()
                },
            )?;
        }

        if self.config.synthesize_thumbnail_media_maps {
            self.add_missing_thumbnail_maps(destination)?;
        }
        Ok(())
    }

    /// Items whose thumbnail is a known media file but which have no media
    /// map get one
    fn add_missing_thumbnail_maps(&mut self, destination: &mut Database) -> Result<()> {
        let mapped: HashSet<i32> = destination
            .playlist_item_independent_media_maps()
            .iter()
            .map(|m| m.playlist_item_id)
            .collect();

        let missing: Vec<(i32, i32)> = destination
            .playlist_items()
            .iter()
            .filter(|item| !mapped.contains(&item.playlist_item_id))
            .filter_map(|item| {
                let media = destination.find_independent_media_by_path(item.thumbnail()?)?;
                Some((item.playlist_item_id, media.independent_media_id))
            })
            .collect();

        for (playlist_item_id, independent_media_id) in missing {
            debug!(playlist_item_id, "Adding thumbnail media map");
            destination.add_playlist_item_independent_media_map_and_update_index(
                PlaylistItemIndependentMediaMap {
                    playlist_item_id,
                    independent_media_id,
                    duration_ticks: self.config.thumbnail_media_duration_ticks,
                },
            )?;
        }
        Ok(())
    }

    pub(super) fn merge_playlist_item_location_maps(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for map in source.playlist_item_location_maps() {
            let location_id = self.ensure_location(source, map.location_id, destination)?;
            if location_id == 0 {
                error!(
                    location_id = map.location_id,
                    playlist_item_id = map.playlist_item_id,
                    "Could not find location for playlist item"
                );
                continue;
            }
            let playlist_item_id = self.translators.playlist_items.get(map.playlist_item_id);
            if playlist_item_id == 0 {
                continue;
            }
            if destination.find_playlist_item_location_map(location_id).is_some() {
                continue;
            }

            destination.add_playlist_item_location_map_and_update_index(PlaylistItemLocationMap {
                playlist_item_id,
                location_id,
                ..map.clone()
            })?;
        }
        Ok(())
    }

    /// Markers are matched by content within their translated playlist item
    pub(super) fn merge_playlist_item_markers(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for marker in source.playlist_item_markers() {
            if self
                .translators
                .playlist_item_markers
                .get(marker.playlist_item_marker_id)
                != 0
            {
                continue;
            }
            let playlist_item_id = self.translators.playlist_items.get(marker.playlist_item_id);
            if playlist_item_id == 0 {
                continue;
            }

            let mut candidate = PlaylistItemMarker {
                playlist_item_id,
                ..marker.clone()
            };
            if let Some(existing) = destination.find_playlist_item_marker_by_values(&candidate) {
                self.translators
                    .playlist_item_markers
                    .add(marker.playlist_item_marker_id, existing.playlist_item_marker_id);
                continue;
            }

            candidate.playlist_item_marker_id = next_id(&mut self.ids.playlist_item_marker);
            let id = candidate.playlist_item_marker_id;
            destination.add_playlist_item_marker_and_update_index(candidate)?;
            self.translators
                .playlist_item_markers
                .add(marker.playlist_item_marker_id, id);
        }
        Ok(())
    }

    pub(super) fn merge_playlist_item_marker_bible_verse_maps(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for map in source.playlist_item_marker_bible_verse_maps() {
            let marker_id = self
                .translators
                .playlist_item_markers
                .get(map.playlist_item_marker_id);
            if marker_id == 0 {
                continue;
            }
            let exists = destination
                .find_playlist_item_marker_bible_verse_maps(marker_id)
                .iter()
                .any(|existing| existing.verse_id == map.verse_id);
            if exists {
                continue;
            }

            destination.add_playlist_item_marker_bible_verse_map_and_update_index(
                PlaylistItemMarkerBibleVerseMap {
                    playlist_item_marker_id: marker_id,
                    verse_id: map.verse_id,
                },
            )?;
        }
        Ok(())
    }

    pub(super) fn merge_playlist_item_marker_paragraph_maps(
        &mut self,
        source: &Database,
        destination: &mut Database,
    ) -> Result<()> {
        for map in source.playlist_item_marker_paragraph_maps() {
            let marker_id = self
                .translators
                .playlist_item_markers
                .get(map.playlist_item_marker_id);
            if marker_id == 0 {
                continue;
            }
            let copy = PlaylistItemMarkerParagraphMap {
                playlist_item_marker_id: marker_id,
                ..map.clone()
            };
            let exists = destination
                .find_playlist_item_marker_paragraph_maps(marker_id)
                .iter()
                .any(|existing| **existing == copy);
            if exists {
                continue;
            }

            destination.add_playlist_item_marker_paragraph_map_and_update_index(copy)?;
        }
        Ok(())
    }

    /// Drop playlist items that ended up with no media map, no location map
    /// and no marker, together with their tag maps. Returns rows removed.
    pub(super) fn cleanup_playlist_items(&mut self, destination: &mut Database) -> usize {
        let referenced: HashSet<i32> = destination
            .playlist_item_independent_media_maps()
            .iter()
            .map(|m| m.playlist_item_id)
            .chain(
                destination
                    .playlist_item_location_maps()
                    .iter()
                    .map(|m| m.playlist_item_id),
            )
            .chain(
                destination
                    .playlist_item_markers()
                    .iter()
                    .map(|m| m.playlist_item_id),
            )
            .collect();
        let orphans: Vec<(i32, String)> = destination
            .playlist_items()
            .iter()
            .filter(|item| !referenced.contains(&item.playlist_item_id))
            .map(|item| (item.playlist_item_id, item.label.clone()))
            .collect();
        if orphans.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for (playlist_item_id, label) in &orphans {
            warn!(playlist_item_id, label = %label, "Removing orphaned playlist item");
            removed += destination.remove_playlist_item(*playlist_item_id);
        }

        super::tags::normalise_tag_maps(destination);
        self.ids.tag_map = destination.tag_maps().len() as i32;
        removed
    }
}
