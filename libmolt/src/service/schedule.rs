//! Schedule service
//!
//! Scheduled posts carry a resolved publish time. A due-check publishes
//! every pending entry whose time has passed, earliest first. Each entry
//! succeeds or fails on its own and its new status is saved before the next
//! entry is attempted, so a crash mid-batch never causes a re-publish.
//!
//! Published entries are kept with status `published` for audit. Failed
//! entries are kept with status `failed` and their reason; they are not
//! retried by the due-check, only by an explicit [`ScheduleService::publish_now`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::{normalize_submolt, validate_post};
use crate::api::Poster;
use crate::error::{MoltError, Result};
use crate::scheduling::parse_time_expression_at;
use crate::store::{RecordStore, StoreFile};
use crate::types::{NewPost, ScheduleStatus, ScheduledPost};

/// Result of one publication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { remote_id: String },
    Failed { reason: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub id: u64,
    pub title: String,
    pub outcome: PublishOutcome,
}

pub struct ScheduleService {
    store: RecordStore<u64, ScheduledPost>,
}

impl ScheduleService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: RecordStore::new(path),
        }
    }

    /// Schedule a post for the time described by `time_expression`
    ///
    /// # Errors
    ///
    /// Returns `MoltError::InvalidTimeExpression` if the expression does not
    /// parse or resolves to a time in the past.
    pub fn schedule(
        &self,
        title: &str,
        content: &str,
        submolt: Option<&str>,
        time_expression: &str,
    ) -> Result<ScheduledPost> {
        self.schedule_at(title, content, submolt, time_expression, Utc::now())
    }

    /// Same as [`ScheduleService::schedule`] with an explicit clock reading
    pub fn schedule_at(
        &self,
        title: &str,
        content: &str,
        submolt: Option<&str>,
        time_expression: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledPost> {
        validate_post(title, content)?;

        let publish_at = parse_time_expression_at(time_expression, now)?;
        if publish_at < now {
            return Err(MoltError::invalid_time(
                time_expression,
                format!("{} is in the past", publish_at.to_rfc3339()),
            ));
        }

        let mut data = self.store.load()?;
        let post = ScheduledPost {
            id: data.next_record_id(),
            title: title.to_string(),
            content: content.to_string(),
            submolt: normalize_submolt(submolt),
            publish_at,
            created_at: now,
            status: ScheduleStatus::Pending,
            remote_id: None,
            error: None,
        };
        data.records.insert(post.id, post.clone());
        self.store.save(&data)?;

        tracing::debug!(schedule_id = post.id, publish_at = %post.publish_at, "scheduled post");
        Ok(post)
    }

    pub fn get(&self, id: u64) -> Result<ScheduledPost> {
        self.store
            .load()?
            .records
            .remove(&id)
            .ok_or_else(|| MoltError::not_found("Scheduled post", id))
    }

    /// Every scheduled post, earliest publish time first
    pub fn list(&self) -> Result<Vec<ScheduledPost>> {
        let mut posts: Vec<ScheduledPost> = self.store.load()?.records.into_values().collect();
        sort_by_publish_time(&mut posts);
        Ok(posts)
    }

    /// Pending posts whose publish time has passed
    pub fn due(&self) -> Result<Vec<ScheduledPost>> {
        self.due_at(Utc::now())
    }

    pub fn due_at(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        Ok(due_entries(&self.store.load()?, now))
    }

    /// Publish every due post
    ///
    /// Failures are recorded per entry and reported in the returned list;
    /// they do not stop the batch. Only store errors abort it.
    pub async fn publish_due(&self, poster: &dyn Poster) -> Result<Vec<PublishReport>> {
        self.publish_due_at(poster, Utc::now()).await
    }

    pub async fn publish_due_at(
        &self,
        poster: &dyn Poster,
        now: DateTime<Utc>,
    ) -> Result<Vec<PublishReport>> {
        let mut data = self.store.load()?;
        let due = due_entries(&data, now);
        let mut reports = Vec::with_capacity(due.len());

        for entry in due {
            let result = poster.create_post(&NewPost::from(&entry)).await;
            let outcome = self.record_attempt(&mut data, entry.id, &result)?;
            reports.push(PublishReport {
                id: entry.id,
                title: entry.title,
                outcome,
            });
        }

        Ok(reports)
    }

    /// Publish one entry now, regardless of its publish time
    ///
    /// # Errors
    ///
    /// Returns `MoltError::NotFound` for unknown ids, `MoltError::InvalidInput`
    /// if the entry was already published, and the poster's error if
    /// publication fails (after recording the entry as failed).
    pub async fn publish_now(&self, id: u64, poster: &dyn Poster) -> Result<String> {
        let mut data = self.store.load()?;
        let entry = data
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| MoltError::not_found("Scheduled post", id))?;

        if entry.status == ScheduleStatus::Published {
            return Err(MoltError::InvalidInput(format!(
                "Scheduled post {} was already published",
                id
            )));
        }

        let result = poster.create_post(&NewPost::from(&entry)).await;
        self.record_attempt(&mut data, id, &result)?;
        result
    }

    pub fn delete(&self, id: u64) -> Result<ScheduledPost> {
        let mut data = self.store.load()?;
        let removed = data
            .records
            .remove(&id)
            .ok_or_else(|| MoltError::not_found("Scheduled post", id))?;
        self.store.save(&data)?;
        Ok(removed)
    }

    /// Remove every scheduled post, returning how many there were
    pub fn clear(&self) -> Result<usize> {
        let mut data = self.store.load()?;
        let count = data.records.len();
        data.records.clear();
        self.store.save(&data)?;
        Ok(count)
    }

    /// Apply the outcome of one attempt to `data` and persist it
    fn record_attempt(
        &self,
        data: &mut StoreFile<u64, ScheduledPost>,
        id: u64,
        result: &Result<String>,
    ) -> Result<PublishOutcome> {
        let entry = data
            .records
            .get_mut(&id)
            .ok_or_else(|| MoltError::not_found("Scheduled post", id))?;

        let outcome = match result {
            Ok(remote_id) => {
                let remote_id = remote_id.clone();
                entry.status = ScheduleStatus::Published;
                entry.remote_id = Some(remote_id.clone());
                entry.error = None;
                tracing::info!(schedule_id = id, %remote_id, "published scheduled post");
                PublishOutcome::Published { remote_id }
            }
            Err(e) => {
                let reason = e.to_string();
                entry.status = ScheduleStatus::Failed;
                entry.error = Some(reason.clone());
                tracing::warn!(schedule_id = id, error = %reason, "scheduled post failed");
                PublishOutcome::Failed { reason }
            }
        };

        self.store.save(data)?;
        Ok(outcome)
    }
}

fn due_entries(data: &StoreFile<u64, ScheduledPost>, now: DateTime<Utc>) -> Vec<ScheduledPost> {
    let mut due: Vec<ScheduledPost> = data
        .records
        .values()
        .filter(|post| post.is_due(now))
        .cloned()
        .collect();
    sort_by_publish_time(&mut due);
    due
}

fn sort_by_publish_time(posts: &mut [ScheduledPost]) {
    posts.sort_by(|a, b| a.publish_at.cmp(&b.publish_at).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockPoster;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ScheduleService {
        ScheduleService::new(dir.path().join("scheduled.json"))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap()
    }

    /// Three posts due at T-10m, T+5m and T+20m, created half an hour before T
    fn seed_three(schedule: &ScheduleService) -> Vec<ScheduledPost> {
        let created = t0() - Duration::minutes(30);
        // Inserted out of order to check sorting
        let late = schedule
            .schedule_at("late", "c", None, "+50m", created)
            .unwrap();
        let early = schedule
            .schedule_at("early", "a", None, "+20m", created)
            .unwrap();
        let middle = schedule
            .schedule_at("middle", "b", None, "+35m", created)
            .unwrap();
        vec![early, middle, late]
    }

    #[test]
    fn test_schedule_resolves_relative_time() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);

        let post = schedule.schedule_at("t", "c", None, "+1h", t0()).unwrap();
        assert_eq!(post.publish_at, t0() + Duration::hours(1));
        assert_eq!(post.status, ScheduleStatus::Pending);
        assert_eq!(post.created_at, t0());
    }

    #[test]
    fn test_schedule_with_current_clock() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);

        let before = Utc::now();
        let post = schedule.schedule("t", "c", None, "+30m").unwrap();
        let after = Utc::now();

        assert!(post.publish_at >= before + Duration::minutes(30));
        assert!(post.publish_at <= after + Duration::minutes(30));
    }

    #[test]
    fn test_schedule_rejects_bad_expression() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);

        let err = schedule
            .schedule("t", "c", None, "not-a-time")
            .unwrap_err();
        assert!(matches!(err, MoltError::InvalidTimeExpression { .. }));
        assert!(schedule.list().unwrap().is_empty());
    }

    #[test]
    fn test_schedule_rejects_past_time() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);

        let err = schedule
            .schedule("t", "c", None, "2001-01-01 10:00")
            .unwrap_err();
        assert!(matches!(err, MoltError::InvalidTimeExpression { .. }));
        assert!(err.to_string().contains("in the past"));
    }

    #[test]
    fn test_due_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let seeded = seed_three(&schedule);

        let due_now: Vec<u64> = schedule
            .due_at(t0())
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(due_now, vec![seeded[0].id]);

        let due_later: Vec<String> = schedule
            .due_at(t0() + Duration::minutes(21))
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(due_later, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_list_orders_by_publish_time() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        seed_three(&schedule);

        let titles: Vec<String> = schedule.list().unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_publish_due_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let seeded = seed_three(&schedule);
        let poster = MockPoster::failing_titles(&["middle"]);

        let reports = schedule
            .publish_due_at(&poster, t0() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].id, seeded[0].id);
        assert!(reports[0].outcome.is_success());
        assert!(matches!(reports[1].outcome, PublishOutcome::Failed { .. }));
        assert!(reports[2].outcome.is_success());

        let early = schedule.get(seeded[0].id).unwrap();
        let middle = schedule.get(seeded[1].id).unwrap();
        let late = schedule.get(seeded[2].id).unwrap();
        assert_eq!(early.status, ScheduleStatus::Published);
        assert!(early.remote_id.is_some());
        assert_eq!(middle.status, ScheduleStatus::Failed);
        assert!(middle.error.as_deref().unwrap().contains("Mock posting failed"));
        assert_eq!(late.status, ScheduleStatus::Published);
    }

    #[tokio::test]
    async fn test_publish_due_never_republishes() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        seed_three(&schedule);
        let poster = MockPoster::success();
        let later = t0() + Duration::hours(1);

        assert_eq!(schedule.publish_due_at(&poster, later).await.unwrap().len(), 3);
        assert!(schedule.publish_due_at(&poster, later).await.unwrap().is_empty());
        assert_eq!(poster.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_entries_are_not_retried_by_due_check() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        seed_three(&schedule);
        let later = t0() + Duration::hours(1);

        schedule
            .publish_due_at(&MockPoster::failure("down"), later)
            .await
            .unwrap();
        assert!(schedule.due_at(later).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_now_ignores_publish_time() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let post = schedule.schedule("t", "c", None, "+2d").unwrap();
        let poster = MockPoster::success();

        let remote_id = schedule.publish_now(post.id, &poster).await.unwrap();

        let stored = schedule.get(post.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Published);
        assert_eq!(stored.remote_id, Some(remote_id));
    }

    #[tokio::test]
    async fn test_publish_now_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let post = schedule.schedule("t", "c", None, "+1h").unwrap();
        let poster = MockPoster::success();

        schedule.publish_now(post.id, &poster).await.unwrap();
        let err = schedule.publish_now(post.id, &poster).await.unwrap_err();

        assert!(matches!(err, MoltError::InvalidInput(_)));
        assert_eq!(poster.call_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_now_failure_marks_failed_and_surfaces_error() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let post = schedule.schedule("t", "c", None, "+1h").unwrap();

        let err = schedule
            .publish_now(post.id, &MockPoster::failure("rate limited"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));

        let stored = schedule.get(post.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);

        // A failed entry can be retried explicitly
        schedule
            .publish_now(post.id, &MockPoster::success())
            .await
            .unwrap();
        let stored = schedule.get(post.id).unwrap();
        assert_eq!(stored.status, ScheduleStatus::Published);
        assert_eq!(stored.error, None);
    }

    #[tokio::test]
    async fn test_publish_now_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);

        assert!(matches!(
            schedule.publish_now(1, &MockPoster::success()).await,
            Err(MoltError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_and_clear() {
        let dir = TempDir::new().unwrap();
        let schedule = service(&dir);
        let seeded = seed_three(&schedule);

        schedule.delete(seeded[1].id).unwrap();
        assert!(matches!(
            schedule.delete(seeded[1].id),
            Err(MoltError::NotFound { .. })
        ));
        assert_eq!(schedule.list().unwrap().len(), 2);

        assert_eq!(schedule.clear().unwrap(), 2);
        assert!(schedule.list().unwrap().is_empty());

        // Ids keep counting after a clear
        let next = schedule.schedule("n", "c", None, "+1h").unwrap();
        assert_eq!(next.id, 4);
    }
}
