//! Core types for molt
//!
//! Local records persisted by the stores, and the response shapes returned
//! by the Moltbook API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Local records
// ============================================================================

/// Mapping from a short, typeable key to a full remote identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortIdEntry {
    pub short_key: String,
    pub full_id: String,
    /// Display snapshot (title or author) captured when the id was listed
    pub label: String,
    /// Registration recency; higher is more recent
    pub seq: u64,
}

/// Unpublished post content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub submolt: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A remembered post with a snapshot of its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub post_id: String,
    pub title: String,
    pub author: String,
    pub saved_at: DateTime<Utc>,
}

/// A post waiting for its publish time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub submolt: Option<String>,
    pub publish_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    /// Remote id assigned on successful publication
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Reason of the last failed publication attempt
    #[serde(default)]
    pub error: Option<String>,
}

impl ScheduledPost {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Pending && self.publish_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Published,
    Failed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStatus::Pending => write!(f, "pending"),
            ScheduleStatus::Published => write!(f, "published"),
            ScheduleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Content handed to the remote service when creating a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub submolt: Option<String>,
}

impl From<&Draft> for NewPost {
    fn from(draft: &Draft) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            submolt: draft.submolt.clone(),
        }
    }
}

impl From<&ScheduledPost> for NewPost {
    fn from(post: &ScheduledPost) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            submolt: post.submolt.clone(),
        }
    }
}

// ============================================================================
// Remote response models
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
}

/// A post as returned by the Moltbook API
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RemotePost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub submolt: Option<serde_json::Value>,
}

impl RemotePost {
    pub fn author_name(&self) -> &str {
        if self.author.name.is_empty() {
            "?"
        } else {
            &self.author.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AgentStats {
    #[serde(default)]
    pub posts: i64,
    #[serde(default)]
    pub comments: i64,
}

/// The authenticated agent's profile
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Agent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub karma: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stats: AgentStats,
}

/// Sort order accepted by the feed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    New,
    Hot,
    Top,
}

impl FeedSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSort::New => "new",
            FeedSort::Hot => "hot",
            FeedSort::Top => "top",
        }
    }
}

impl std::str::FromStr for FeedSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(FeedSort::New),
            "hot" => Ok(FeedSort::Hot),
            "top" => Ok(FeedSort::Top),
            _ => Err(format!(
                "Invalid sort: '{}'. Valid options: new, hot, top",
                s
            )),
        }
    }
}
