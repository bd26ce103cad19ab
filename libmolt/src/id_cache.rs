//! Short identifier cache
//!
//! Listing commands register every remote id they print and show the user a
//! short key instead (the first eight characters of the id, lengthened one
//! character at a time if that prefix already belongs to a different id).
//! Commands that take a post reference resolve the key back to the full id.
//!
//! The resolver is explicit state: open it once per invocation, pass it to
//! whatever needs it, and [`IdResolver::flush`] it at the end.

use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{MoltError, Result};
use crate::store::{RecordStore, StoreFile};
use crate::types::ShortIdEntry;

/// Length of a freshly derived short key
pub const SHORT_KEY_LEN: usize = 8;

/// Default bound on the number of cached ids
pub const DEFAULT_MAX_ENTRIES: usize = 5000;

pub struct IdResolver {
    store: RecordStore<String, ShortIdEntry>,
    data: StoreFile<String, ShortIdEntry>,
    max_entries: usize,
    dirty: bool,
}

impl IdResolver {
    /// Load the cache from `path`
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let store = RecordStore::new(path);
        let data = store.load()?;
        Ok(Self {
            store,
            data,
            max_entries: max_entries.max(1),
            dirty: false,
        })
    }

    /// Register a full id and return its short key
    ///
    /// Re-registering an id refreshes its label and recency but keeps the
    /// key it was first given.
    pub fn register(&mut self, full_id: &str, label: &str) -> Result<String> {
        let full_id = full_id.trim();
        if full_id.is_empty() {
            return Err(MoltError::InvalidInput(
                "Cannot register an empty identifier".to_string(),
            ));
        }

        let seq = self.data.allocate_id();
        self.dirty = true;

        if let Some(entry) = self
            .data
            .records
            .values_mut()
            .find(|entry| entry.full_id == full_id)
        {
            entry.label = label.to_string();
            entry.seq = seq;
            return Ok(entry.short_key.clone());
        }

        let short_key = self.derive_key(full_id)?;
        self.data.records.insert(
            short_key.clone(),
            ShortIdEntry {
                short_key: short_key.clone(),
                full_id: full_id.to_string(),
                label: label.to_string(),
                seq,
            },
        );
        Ok(short_key)
    }

    /// Resolve a short key or full id to a full id
    ///
    /// Tokens that match no cached entry but look like a full identifier are
    /// passed through unchanged, so ids copied from elsewhere keep working.
    pub fn resolve(&self, token: &str) -> Result<String> {
        let token = token.trim();

        if let Some(entry) = self.data.records.get(token) {
            return Ok(entry.full_id.clone());
        }

        if let Some(entry) = self.find_by_full_id(token) {
            return Ok(entry.full_id.clone());
        }

        if Uuid::parse_str(token).is_ok() {
            return Ok(token.to_string());
        }

        Err(MoltError::UnknownIdentifier(token.to_string()))
    }

    /// Look up the cached entry for a short key
    pub fn get(&self, short_key: &str) -> Option<&ShortIdEntry> {
        self.data.records.get(short_key)
    }

    /// Short key previously assigned to `full_id`, if any
    pub fn short_key_for(&self, full_id: &str) -> Option<&str> {
        self.find_by_full_id(full_id)
            .map(|entry| entry.short_key.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.records.is_empty()
    }

    /// Drop all but the `max_entries` most recently registered ids
    pub fn prune(&mut self) -> usize {
        let excess = self.data.records.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(u64, String)> = self
            .data
            .records
            .values()
            .map(|entry| (entry.seq, entry.short_key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(excess) {
            self.data.records.remove(&key);
        }
        self.dirty = true;
        tracing::debug!(removed = excess, "pruned id cache");
        excess
    }

    /// Prune and persist if anything changed since the cache was opened
    pub fn flush(&mut self) -> Result<()> {
        self.prune();
        if self.dirty {
            self.store.save(&self.data)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn find_by_full_id(&self, full_id: &str) -> Option<&ShortIdEntry> {
        self.data
            .records
            .values()
            .find(|entry| entry.full_id == full_id)
    }

    fn derive_key(&self, full_id: &str) -> Result<String> {
        let total = full_id.chars().count();
        let mut len = SHORT_KEY_LEN.min(total);

        loop {
            let candidate: String = full_id.chars().take(len).collect();
            match self.data.records.get(&candidate) {
                None => return Ok(candidate),
                Some(existing) if existing.full_id == full_id => return Ok(candidate),
                Some(_) if len < total => len += 1,
                Some(existing) => {
                    return Err(MoltError::InvalidInput(format!(
                        "Cannot derive a unique short key for '{}': '{}' is taken by '{}'",
                        full_id, candidate, existing.full_id
                    )))
                }
            }
        }
    }
}
