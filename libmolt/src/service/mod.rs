//! Service layer for molt
//!
//! The local state lives behind three services, each owning one store file:
//!
//! - `DraftService`: unpublished posts keyed by sequential id
//! - `BookmarkService`: remembered posts keyed by remote id
//! - `ScheduleService`: posts waiting for a publish time
//!
//! `MoltService` builds all three from a [`Config`]. Publishing goes through
//! an injected [`crate::api::Poster`], so none of the services know about
//! HTTP.
//!
//! # Example
//!
//! ```no_run
//! use libmolt::api::mock::MockPoster;
//! use libmolt::service::MoltService;
//! use libmolt::Config;
//!
//! # async fn example() -> libmolt::Result<()> {
//! let service = MoltService::from_config(&Config::load()?)?;
//!
//! let draft = service.draft().create("Hello", "First post", None)?;
//! let remote_id = service.draft().publish(draft.id, &MockPoster::success()).await?;
//! println!("Published draft {} as {}", draft.id, remote_id);
//! # Ok(())
//! # }
//! ```

pub mod bookmark;
pub mod draft;
pub mod schedule;

use self::bookmark::BookmarkService;
use self::draft::DraftService;
use self::schedule::ScheduleService;
use crate::config::StorePaths;
use crate::error::{MoltError, Result};
use crate::Config;

/// Facade over the local stores
pub struct MoltService {
    draft: DraftService,
    bookmark: BookmarkService,
    schedule: ScheduleService,
}

impl MoltService {
    /// Create services for the data directory named by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::from_paths(&config.store_paths()?))
    }

    pub fn from_paths(paths: &StorePaths) -> Self {
        Self {
            draft: DraftService::new(&paths.drafts),
            bookmark: BookmarkService::new(&paths.bookmarks),
            schedule: ScheduleService::new(&paths.scheduled),
        }
    }

    pub fn draft(&self) -> &DraftService {
        &self.draft
    }

    pub fn bookmark(&self) -> &BookmarkService {
        &self.bookmark
    }

    pub fn schedule(&self) -> &ScheduleService {
        &self.schedule
    }
}

/// Reject posts the remote service would refuse outright
pub(crate) fn validate_post(title: &str, content: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(MoltError::InvalidInput("Title cannot be empty".to_string()));
    }
    if content.trim().is_empty() {
        return Err(MoltError::InvalidInput(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Treat blank submolt names as "use the default"
pub(crate) fn normalize_submolt(submolt: Option<&str>) -> Option<String> {
    submolt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
