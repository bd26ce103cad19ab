//! Mock poster implementation for testing
//!
//! Simulates the remote post-creation call so that draft and schedule
//! publishing can be exercised without network access. Failures can be
//! forced for every call or for specific titles.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::Poster;
use crate::error::{RemoteError, Result};
use crate::types::NewPost;

/// Configuration for mock poster behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Whether posting succeeds unless the title is listed in `failing_titles`
    pub post_succeeds: bool,

    /// Titles that always fail
    pub failing_titles: HashSet<String>,

    /// Error returned on failure
    pub error: RemoteError,

    /// Posts that have been accepted (for verification)
    pub posted: Arc<Mutex<Vec<NewPost>>>,

    /// Number of times create_post has been called
    pub call_count: Arc<Mutex<usize>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            post_succeeds: true,
            failing_titles: HashSet::new(),
            error: RemoteError::new(Some(500), "Mock posting failed"),
            posted: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }
}

/// Mock poster for testing
pub struct MockPoster {
    config: MockConfig,
}

impl MockPoster {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A poster that accepts everything
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A poster that rejects everything with `reason`
    pub fn failure(reason: &str) -> Self {
        Self::new(MockConfig {
            post_succeeds: false,
            error: RemoteError::new(Some(500), reason),
            ..Default::default()
        })
    }

    /// A poster that rejects only the given titles
    pub fn failing_titles(titles: &[&str]) -> Self {
        Self::new(MockConfig {
            failing_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        })
    }

    /// Get the number of times create_post was called
    pub fn call_count(&self) -> usize {
        *self.config.call_count.lock().unwrap()
    }

    /// Get all posts that were accepted
    pub fn posted(&self) -> Vec<NewPost> {
        self.config.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Poster for MockPoster {
    async fn create_post(&self, post: &NewPost) -> Result<String> {
        *self.config.call_count.lock().unwrap() += 1;

        if !self.config.post_succeeds || self.config.failing_titles.contains(&post.title) {
            return Err(self.config.error.clone().into());
        }

        self.config.posted.lock().unwrap().push(post.clone());
        Ok(format!("mock-{}", uuid::Uuid::new_v4()))
    }
}
