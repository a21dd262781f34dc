//! Tag and tag map passes

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use annomerge_domain::{Tag, TagMap, TagMapTarget};

use super::{next_id, MergeSession};
use crate::database::Database;
use crate::error::Result;

impl MergeSession {
    pub(super) fn merge_tags(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for tag in source.tags() {
            if let Some(existing) = destination.find_tag_by_name(tag.tag_type, &tag.name) {
                self.translators.tags.add(tag.tag_id, existing.tag_id);
                continue;
            }

            let copy = Tag {
                tag_id: next_id(&mut self.ids.tag),
                ..tag.clone()
            };
            let id = copy.tag_id;
            destination.add_tag_and_update_index(copy)?;
            self.translators.tags.add(tag.tag_id, id);
        }
        Ok(())
    }

    /// Copy tag maps, then make positions dense per tag and renumber ids
    pub(super) fn merge_tag_maps(&mut self, source: &Database, destination: &mut Database) -> Result<()> {
        for tag_map in source.tag_maps() {
            let tag_id = self.translators.tags.get(tag_map.tag_id);
            if tag_id == 0 {
                warn!(tag_map_id = tag_map.tag_map_id, "Skipping tag map of untranslated tag");
                continue;
            }

            let target = match tag_map.target() {
                Some(TagMapTarget::Location(id)) => {
                    TagMapTarget::Location(self.ensure_location(source, id, destination)?)
                }
                Some(TagMapTarget::Note(id)) => TagMapTarget::Note(self.translators.notes.get(id)),
                Some(TagMapTarget::PlaylistItem(id)) => {
                    TagMapTarget::PlaylistItem(self.translators.playlist_items.get(id))
                }
                None => continue,
            };
            if target_id(target) == 0 {
                debug!(tag_map_id = tag_map.tag_map_id, "Skipping tag map of untranslated target");
                continue;
            }
            if destination.find_tag_map(tag_id, target).is_some() {
                continue;
            }

            // items already collapse by label and thumbnail in the playlist
            // item pass, so this only fires on a destination built otherwise
            if let TagMapTarget::PlaylistItem(playlist_item_id) = target {
                if is_duplicate_playlist_item(destination, tag_id, playlist_item_id) {
                    self.drop_duplicate_playlist_item(tag_map, playlist_item_id, destination);
                    continue;
                }
            }

            let mut copy = TagMap {
                tag_map_id: next_id(&mut self.ids.tag_map),
                tag_id,
                ..tag_map.clone()
            };
            copy.set_target(Some(target));
            destination.add_tag_map_and_update_index(copy)?;
        }

        normalise_tag_maps(destination);
        self.ids.tag_map = destination.tag_maps().len() as i32;
        Ok(())
    }

    /// The item this tag map would point at duplicates another item already
    /// carrying the tag: forget the translation and remove the item.
    fn drop_duplicate_playlist_item(
        &mut self,
        tag_map: &TagMap,
        playlist_item_id: i32,
        destination: &mut Database,
    ) {
        warn!(
            playlist_item_id,
            tag_id = tag_map.tag_id,
            "Removing duplicate playlist item"
        );
        if let Some(source_id) = tag_map.playlist_item_id {
            self.translators.playlist_items.remove(source_id);
        }
        destination.remove_playlist_item(playlist_item_id);
    }
}

fn target_id(target: TagMapTarget) -> i32 {
    match target {
        TagMapTarget::Location(id) | TagMapTarget::Note(id) | TagMapTarget::PlaylistItem(id) => id,
    }
}

/// Whether another playlist item with the same label and thumbnail already
/// carries `tag_id`
fn is_duplicate_playlist_item(destination: &Database, tag_id: i32, playlist_item_id: i32) -> bool {
    let Some(current) = destination.find_playlist_item(playlist_item_id) else {
        return false;
    };
    let tagged: HashSet<i32> = destination
        .tag_maps()
        .iter()
        .filter(|m| m.tag_id == tag_id)
        .filter_map(|m| m.playlist_item_id)
        .collect();

    destination.playlist_items().iter().any(|other| {
        other.playlist_item_id != playlist_item_id
            && tagged.contains(&other.playlist_item_id)
            && other.label == current.label
            && other.thumbnail() == current.thumbnail()
    })
}

/// Make positions 0..n within each tag, keeping their relative order (ties
/// keep collection order), then number every map 1..n
pub(super) fn normalise_tag_maps(destination: &mut Database) {
    let maps = destination.tag_maps_mut();

    let mut by_tag: HashMap<i32, Vec<usize>> = HashMap::new();
    for (index, map) in maps.iter().enumerate() {
        by_tag.entry(map.tag_id).or_default().push(index);
    }
    for indices in by_tag.values_mut() {
        indices.sort_by_key(|index| maps[*index].position);
        for (position, index) in indices.iter().enumerate() {
            maps[*index].position = position as i32;
        }
    }

    for (index, map) in maps.iter_mut().enumerate() {
        map.tag_map_id = index as i32 + 1;
    }
}
