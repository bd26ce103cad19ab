//! Bookmark service
//!
//! Bookmarks are a set keyed by post id. Adding an existing post refreshes
//! its snapshot; removing a post that is not bookmarked is a no-op.

use std::path::PathBuf;

use chrono::Utc;

use crate::error::{MoltError, Result};
use crate::store::RecordStore;
use crate::types::Bookmark;

pub struct BookmarkService {
    store: RecordStore<String, Bookmark>,
}

impl BookmarkService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: RecordStore::new(path),
        }
    }

    /// Bookmark a post, overwriting any previous snapshot
    pub fn add(&self, post_id: &str, title: &str, author: &str) -> Result<Bookmark> {
        let post_id = post_id.trim();
        if post_id.is_empty() {
            return Err(MoltError::InvalidInput(
                "Post id cannot be empty".to_string(),
            ));
        }

        let mut data = self.store.load()?;
        let bookmark = Bookmark {
            post_id: post_id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            saved_at: Utc::now(),
        };
        data.records.insert(bookmark.post_id.clone(), bookmark.clone());
        self.store.save(&data)?;
        Ok(bookmark)
    }

    /// Remove a bookmark, returning whether one existed
    pub fn remove(&self, post_id: &str) -> Result<bool> {
        let mut data = self.store.load()?;
        if data.records.remove(post_id.trim()).is_none() {
            return Ok(false);
        }
        self.store.save(&data)?;
        Ok(true)
    }

    pub fn contains(&self, post_id: &str) -> Result<bool> {
        Ok(self.store.load()?.records.contains_key(post_id))
    }

    /// All bookmarks, most recently saved first
    pub fn list(&self) -> Result<Vec<Bookmark>> {
        let mut bookmarks: Vec<Bookmark> = self.store.load()?.records.into_values().collect();
        bookmarks.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        Ok(bookmarks)
    }

    /// Remove every bookmark, returning how many there were
    pub fn clear(&self) -> Result<usize> {
        let mut data = self.store.load()?;
        let count = data.records.len();
        data.records.clear();
        self.store.save(&data)?;
        Ok(count)
    }
}
