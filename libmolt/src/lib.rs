//! molt - local state layer for the Moltbook command line client
//!
//! This library keeps drafts, bookmarks, scheduled posts and a short-id
//! cache on disk, and talks to the Moltbook HTTP API for everything that
//! needs the network.

pub mod api;
pub mod config;
pub mod error;
pub mod id_cache;
pub mod logging;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use api::{MoltbookClient, Poster};
pub use config::{Config, StorePaths};
pub use error::{MoltError, Result};
pub use id_cache::IdResolver;
pub use service::schedule::{PublishOutcome, PublishReport};
pub use service::MoltService;
pub use types::{Bookmark, Draft, NewPost, ScheduleStatus, ScheduledPost, ShortIdEntry};
