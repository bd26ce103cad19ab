//! Draft service for managing unpublished posts
//!
//! This module provides CRUD operations for drafts and publishing through an
//! injected [`Poster`].

use std::path::PathBuf;

use chrono::Utc;

use super::{normalize_submolt, validate_post};
use crate::api::Poster;
use crate::error::{MoltError, Result};
use crate::store::RecordStore;
use crate::types::{Draft, NewPost};

/// Draft service
///
/// Ids are sequential and never reused, even after the newest draft is
/// deleted or published.
pub struct DraftService {
    store: RecordStore<u64, Draft>,
}

impl DraftService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: RecordStore::new(path),
        }
    }

    /// Create a new draft
    ///
    /// # Errors
    ///
    /// Returns an error if the title or content is empty, or the store
    /// cannot be read or written.
    pub fn create(&self, title: &str, content: &str, submolt: Option<&str>) -> Result<Draft> {
        validate_post(title, content)?;

        let mut data = self.store.load()?;
        let draft = Draft {
            id: data.next_record_id(),
            title: title.to_string(),
            content: content.to_string(),
            submolt: normalize_submolt(submolt),
            created_at: Utc::now(),
        };
        data.records.insert(draft.id, draft.clone());
        self.store.save(&data)?;

        tracing::debug!(draft_id = draft.id, "created draft");
        Ok(draft)
    }

    /// Get a single draft by id
    pub fn get(&self, id: u64) -> Result<Draft> {
        self.store
            .load()?
            .records
            .remove(&id)
            .ok_or_else(|| MoltError::not_found("Draft", id))
    }

    /// List all drafts, newest first
    pub fn list(&self) -> Result<Vec<Draft>> {
        let mut drafts: Vec<Draft> = self.store.load()?.records.into_values().collect();
        drafts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(drafts)
    }

    /// Delete a draft
    ///
    /// # Errors
    ///
    /// Returns `MoltError::NotFound` if no draft has this id.
    pub fn delete(&self, id: u64) -> Result<Draft> {
        let mut data = self.store.load()?;
        let removed = data
            .records
            .remove(&id)
            .ok_or_else(|| MoltError::not_found("Draft", id))?;
        self.store.save(&data)?;
        Ok(removed)
    }

    /// Publish a draft
    ///
    /// The draft is removed only after the poster reports success. On
    /// failure the store is left exactly as it was and the error is
    /// returned.
    pub async fn publish(&self, id: u64, poster: &dyn Poster) -> Result<String> {
        let mut data = self.store.load()?;
        let draft = data
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| MoltError::not_found("Draft", id))?;

        let remote_id = poster.create_post(&NewPost::from(&draft)).await?;

        data.records.remove(&id);
        self.store.save(&data)?;
        tracing::info!(draft_id = id, %remote_id, "published draft");
        Ok(remote_id)
    }
}
