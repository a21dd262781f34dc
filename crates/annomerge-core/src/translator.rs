//! Source id to destination id translation

use std::collections::HashMap;

/// Maps one record type's ids in a source store to the ids the same rows
/// carry in the merge destination.
///
/// `get` returns 0 for an id that was never translated; 0 is never a valid
/// record id, so callers treat it as "do not reference".
#[derive(Debug, Clone, Default)]
pub struct IdTranslator {
    ids: HashMap<i32, i32>,
}

impl IdTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination id for `old_id`, or 0
    pub fn get(&self, old_id: i32) -> i32 {
        self.ids.get(&old_id).copied().unwrap_or(0)
    }

    /// Destination id for an optional reference; `None` when absent or
    /// untranslated
    pub fn translate(&self, old_id: Option<i32>) -> Option<i32> {
        old_id.map(|id| self.get(id)).filter(|id| *id != 0)
    }

    pub fn add(&mut self, old_id: i32, new_id: i32) {
        self.ids.insert(old_id, new_id);
    }

    pub fn remove(&mut self, old_id: i32) {
        self.ids.remove(&old_id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untranslated_is_zero() {
        let translator = IdTranslator::new();
        assert_eq!(translator.get(17), 0);
        assert_eq!(translator.translate(Some(17)), None);
        assert_eq!(translator.translate(None), None);
    }

    #[test]
    fn test_add_remove_clear() {
        let mut translator = IdTranslator::new();
        translator.add(3, 10);
        translator.add(4, 11);
        assert_eq!(translator.get(3), 10);
        assert_eq!(translator.translate(Some(4)), Some(11));

        translator.remove(3);
        assert_eq!(translator.get(3), 0);
        assert_eq!(translator.len(), 1);

        translator.clear();
        assert!(translator.is_empty());
    }

    #[test]
    fn test_later_add_overwrites() {
        let mut translator = IdTranslator::new();
        translator.add(1, 5);
        translator.add(1, 6);
        assert_eq!(translator.get(1), 6);
    }
}
