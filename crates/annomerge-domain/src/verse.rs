//! Bible verse references

use serde::{Deserialize, Serialize};

/// Book, chapter and verse numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BibleBookChapterAndVerse {
    pub book_number: i32,
    pub chapter_number: i32,
    pub verse_number: i32,
}

impl BibleBookChapterAndVerse {
    pub fn new(book_number: i32, chapter_number: i32, verse_number: i32) -> Self {
        Self {
            book_number,
            chapter_number,
            verse_number,
        }
    }
}
