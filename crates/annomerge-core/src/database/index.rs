//! Lazily materialized lookup indexes
//!
//! An index maps a key to row positions in one of the store's collections.
//! It is built on the first lookup and from then on either updated
//! incrementally by the `add_*_and_update_index` calls or dropped as a whole
//! when the collection is mutated directly.

use std::borrow::Borrow;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::hash::Hash;

/// A derived map that is only built when someone asks for it.
#[derive(Debug, Clone)]
pub(crate) struct LazyIndex<K, V> {
    cell: OnceCell<HashMap<K, V>>,
}

impl<K, V> Default for LazyIndex<K, V> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<K: Eq + Hash, V> LazyIndex<K, V> {
    /// The materialized map, building it with `build` if needed
    pub(crate) fn get_or_build(&self, build: impl FnOnce() -> HashMap<K, V>) -> &HashMap<K, V> {
        self.cell.get_or_init(build)
    }

    pub(crate) fn is_materialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Mutable access, only when the map has already been built
    pub(crate) fn materialized_mut(&mut self) -> Option<&mut HashMap<K, V>> {
        self.cell.get_mut()
    }

    /// Drop the map; the next lookup rebuilds it
    pub(crate) fn invalidate(&mut self) {
        self.cell.take();
    }
}

/// Index holding one row per key (the first row seen wins).
pub(crate) type UniqueIndex<K> = LazyIndex<K, usize>;

/// Index holding every row for a key, in collection order.
pub(crate) type GroupIndex<K> = LazyIndex<K, Vec<usize>>;

impl<K: Eq + Hash> LazyIndex<K, usize> {
    pub(crate) fn lookup<Q>(&self, key: &Q, build: impl FnOnce() -> HashMap<K, usize>) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.get_or_build(build).get(key).copied()
    }

    /// Record a row appended at `position`, if the index exists
    pub(crate) fn note_insert(&mut self, key: impl FnOnce() -> Option<K>, position: usize) {
        if let Some(map) = self.materialized_mut() {
            if let Some(key) = key() {
                map.entry(key).or_insert(position);
            }
        }
    }
}

impl<K: Eq + Hash> LazyIndex<K, Vec<usize>> {
    pub(crate) fn lookup_all<Q>(&self, key: &Q, build: impl FnOnce() -> HashMap<K, Vec<usize>>) -> &[usize]
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.get_or_build(build)
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record a row appended at `position`, if the index exists
    pub(crate) fn note_insert(&mut self, key: impl FnOnce() -> Option<K>, position: usize) {
        if let Some(map) = self.materialized_mut() {
            if let Some(key) = key() {
                map.entry(key).or_default().push(position);
            }
        }
    }
}

/// Build a unique index over `rows`; rows without a key are skipped
pub(crate) fn build_unique<T, K: Eq + Hash>(rows: &[T], key: impl Fn(&T) -> Option<K>) -> HashMap<K, usize> {
    let mut map = HashMap::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        if let Some(k) = key(row) {
            map.entry(k).or_insert(position);
        }
    }
    map
}

/// Build a grouping index over `rows`; rows without a key are skipped
pub(crate) fn build_grouped<T, K: Eq + Hash>(
    rows: &[T],
    key: impl Fn(&T) -> Option<K>,
) -> HashMap<K, Vec<usize>> {
    let mut map: HashMap<K, Vec<usize>> = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(k) = key(row) {
            map.entry(k).or_default().push(position);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_on_first_lookup_only() {
        let rows = vec![10, 20, 10];
        let index: UniqueIndex<i32> = LazyIndex::default();
        assert!(!index.is_materialized());

        assert_eq!(index.lookup(&10, || build_unique(&rows, |r| Some(*r))), Some(0));
        assert!(index.is_materialized());

        // The build closure is not consulted again once materialized.
        assert_eq!(index.lookup(&20, HashMap::new), Some(1));
    }

    #[test]
    fn test_note_insert_skips_unbuilt_index() {
        let mut index: UniqueIndex<i32> = LazyIndex::default();
        index.note_insert(|| Some(5), 0);
        assert!(!index.is_materialized());
    }

    #[test]
    fn test_note_insert_updates_built_index() {
        let rows = vec![1, 2];
        let mut index: GroupIndex<i32> = LazyIndex::default();
        assert_eq!(index.lookup_all(&1, || build_grouped(&rows, |r| Some(*r))), &[0]);

        index.note_insert(|| Some(1), 2);
        assert_eq!(index.lookup_all(&1, HashMap::new), &[0, 2]);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let mut index: UniqueIndex<i32> = LazyIndex::default();
        index.lookup(&1, || build_unique(&[1], |r| Some(*r)));
        index.invalidate();
        assert!(!index.is_materialized());
        assert_eq!(index.lookup(&1, HashMap::new), None);
    }
}
