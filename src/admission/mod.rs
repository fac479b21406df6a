//! Admission control for registrations and task submissions.
//!
//! A submission passes through three steps:
//! 1. the client must be registered, otherwise it is rejected and nothing is
//!    queued
//! 2. one point is charged against the client's quota
//! 3. the task is enqueued
//!
//! The quota only shapes the response. A throttled submission is still
//! enqueued and reported as [`Admission::ThrottledButQueued`]; it is not
//! load shedding. A limiter failure other than a throttle aborts the
//! submission before anything is queued.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::{POINTS_PER_SUBMISSION, QUEUE_NAME};
use crate::error_handling::{
    AdmissionError, ErrorType, InfoType, ProcessingStats, RegistrationError,
};
use crate::queue::{TaskItem, TaskQueue};
use crate::rate_limiter::{Consumption, RateLimiter};
use crate::registry::{Client, ClientRegistry};

/// Body of a registration request. Every field is optional at this layer.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// Body of a task submission.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    pub user_id: Option<String>,
}

/// How an admitted submission was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted { id: i64 },
    /// Over quota, but the item is in the queue.
    ThrottledButQueued { id: i64, retry_after: Duration },
}

/// Composes the registry, the rate limiter and the queue.
#[derive(Clone)]
pub struct AdmissionController {
    registry: Arc<dyn ClientRegistry>,
    limiter: Arc<dyn RateLimiter>,
    queue: Arc<dyn TaskQueue>,
    stats: Arc<ProcessingStats>,
}

impl AdmissionController {
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        limiter: Arc<dyn RateLimiter>,
        queue: Arc<dyn TaskQueue>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        AdmissionController {
            registry,
            limiter,
            queue,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<dyn ClientRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.queue
    }

    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    /// Registers a new client.
    ///
    /// # Errors
    ///
    /// `BadRequest` if a field is missing or empty, `AlreadyRegistered` if
    /// the `user_id` exists (the stored username is left unchanged).
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Client, RegistrationError> {
        let client = Client::new(request.user_id.as_deref(), request.username.as_deref())?;
        let inserted = self.registry.insert(&client).await.map_err(|e| {
            error!("Failed to register {}: {e}", client.user_id);
            self.stats.increment_error(ErrorType::RegistryError);
            e
        })?;
        if !inserted {
            return Err(RegistrationError::AlreadyRegistered);
        }
        info!("Registered client {} ({})", client.user_id, client.username);
        self.stats.increment_info(InfoType::ClientRegistered);
        Ok(client)
    }

    /// Admits one task submission.
    pub async fn submit(&self, request: &TaskRequest) -> Result<Admission, AdmissionError> {
        let user_id = request.user_id.as_deref().unwrap_or_default();
        if user_id.is_empty() {
            info!("Rejected task without a user_id");
            self.stats.increment_info(InfoType::SubmissionUnauthorized);
            return Err(AdmissionError::Unauthorized(String::new()));
        }

        let registered = self.registry.exists(user_id).await.map_err(|e| {
            error!("Registration lookup for {user_id} failed: {e}");
            self.stats.increment_error(ErrorType::RegistryError);
            AdmissionError::RegistryUnavailable(e)
        })?;
        if !registered {
            info!("Rejected task from unregistered client {user_id}");
            self.stats.increment_info(InfoType::SubmissionUnauthorized);
            return Err(AdmissionError::Unauthorized(user_id.to_string()));
        }

        let consumption = self
            .limiter
            .consume(user_id, POINTS_PER_SUBMISSION)
            .await
            .map_err(|e| {
                error!("Rate limiter failed for {user_id}: {e}");
                self.stats.increment_error(ErrorType::LimiterError);
                AdmissionError::from(e)
            })?;

        let id = self.enqueue(user_id).await?;
        match consumption {
            Consumption::Allowed { .. } => {
                self.stats.increment_info(InfoType::SubmissionAccepted);
                Ok(Admission::Accepted { id })
            }
            Consumption::Throttled { retry_after } => {
                warn!(
                    "Rate limit exceeded for {user_id}, task {id} queued anyway (retry after {}ms)",
                    retry_after.as_millis()
                );
                self.stats.increment_info(InfoType::SubmissionThrottled);
                Ok(Admission::ThrottledButQueued { id, retry_after })
            }
        }
    }

    async fn enqueue(&self, user_id: &str) -> Result<i64, AdmissionError> {
        self.queue
            .enqueue(&TaskItem::new(user_id))
            .await
            .map_err(|e| {
                error!("Queue {QUEUE_NAME}: failed to enqueue task for {user_id}: {e}");
                self.stats.increment_error(ErrorType::EnqueueError);
                AdmissionError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{DatabaseError, RateLimitError};
    use crate::queue::MemoryTaskQueue;
    use crate::rate_limiter::{MemoryRateLimiter, QuotaPolicy};
    use crate::registry::MemoryClientRegistry;
    use async_trait::async_trait;

    struct Fixture {
        controller: AdmissionController,
        queue: Arc<MemoryTaskQueue>,
        stats: Arc<ProcessingStats>,
    }

    fn fixture_with_limiter(limiter: Arc<dyn RateLimiter>) -> Fixture {
        let queue = Arc::new(MemoryTaskQueue::new());
        let stats = Arc::new(ProcessingStats::new());
        let controller = AdmissionController::new(
            Arc::new(MemoryClientRegistry::new()),
            limiter,
            queue.clone(),
            Arc::clone(&stats),
        );
        Fixture {
            controller,
            queue,
            stats,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_limiter(Arc::new(MemoryRateLimiter::new(QuotaPolicy::new(
            20,
            Duration::from_secs(60),
            Duration::ZERO,
        ))))
    }

    fn registration(user_id: &str, username: &str) -> RegistrationRequest {
        RegistrationRequest {
            user_id: Some(user_id.to_string()),
            username: Some(username.to_string()),
        }
    }

    fn task(user_id: &str) -> TaskRequest {
        TaskRequest {
            user_id: Some(user_id.to_string()),
        }
    }

    struct BrokenLimiter;

    #[async_trait]
    impl RateLimiter for BrokenLimiter {
        async fn consume(&self, _key: &str, _points: u32) -> Result<Consumption, RateLimitError> {
            Err(RateLimitError::Storage(DatabaseError::FileCreationError(
                "disk gone".to_string(),
            )))
        }
    }

    #[tokio::test]
    async fn test_register_then_duplicate_keeps_first_username() {
        let f = fixture();
        f.controller.register(&registration("u1", "alice")).await.unwrap();
        let err = f
            .controller
            .register(&registration("u1", "mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyRegistered));
        assert_eq!(
            f.controller.registry.username("u1").await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(f.stats.get_info_count(InfoType::ClientRegistered), 1);
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let f = fixture();
        let missing_name = RegistrationRequest {
            user_id: Some("u1".to_string()),
            username: None,
        };
        let empty_id = registration("", "alice");
        for request in [missing_name, empty_id, RegistrationRequest::default()] {
            assert!(matches!(
                f.controller.register(&request).await,
                Err(RegistrationError::BadRequest)
            ));
        }
    }

    #[tokio::test]
    async fn test_unregistered_submission_is_not_queued() {
        let f = fixture();
        let err = f.controller.submit(&task("ghost")).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Unauthorized(ref id) if id == "ghost"));
        assert_eq!(f.queue.depth().await.unwrap(), 0);
        assert_eq!(f.stats.get_info_count(InfoType::SubmissionUnauthorized), 1);
    }

    #[tokio::test]
    async fn test_missing_or_empty_user_id_is_unauthorized() {
        let f = fixture();
        for request in [TaskRequest::default(), task("")] {
            let err = f.controller.submit(&request).await.unwrap_err();
            assert!(matches!(err, AdmissionError::Unauthorized(ref id) if id.is_empty()));
        }
        assert_eq!(f.queue.depth().await.unwrap(), 0);
        assert_eq!(f.stats.get_info_count(InfoType::SubmissionUnauthorized), 2);
    }

    #[tokio::test]
    async fn test_twenty_first_submission_is_throttled_but_queued() {
        let f = fixture();
        f.controller.register(&registration("u1", "alice")).await.unwrap();

        for i in 0..20 {
            let admission = f.controller.submit(&task("u1")).await.unwrap();
            assert!(
                matches!(admission, Admission::Accepted { .. }),
                "submission {i} should be accepted"
            );
            assert_eq!(f.queue.depth().await.unwrap(), i + 1);
        }

        let admission = f.controller.submit(&task("u1")).await.unwrap();
        match admission {
            Admission::ThrottledButQueued { retry_after, .. } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected throttle, got {other:?}"),
        }
        assert_eq!(f.queue.depth().await.unwrap(), 21);
        assert_eq!(f.stats.get_info_count(InfoType::SubmissionAccepted), 20);
        assert_eq!(f.stats.get_info_count(InfoType::SubmissionThrottled), 1);
    }

    #[tokio::test]
    async fn test_quotas_are_per_client() {
        let f = fixture();
        f.controller.register(&registration("u1", "alice")).await.unwrap();
        f.controller.register(&registration("u2", "bob")).await.unwrap();
        for _ in 0..20 {
            f.controller.submit(&task("u1")).await.unwrap();
        }
        assert!(matches!(
            f.controller.submit(&task("u2")).await.unwrap(),
            Admission::Accepted { .. }
        ));
    }

    #[tokio::test]
    async fn test_queue_failure_is_server_error_and_nothing_queued() {
        let f = fixture();
        f.controller.register(&registration("u1", "alice")).await.unwrap();
        f.queue.close();

        let err = f.controller.submit(&task("u1")).await.unwrap_err();
        assert!(matches!(err, AdmissionError::QueueUnavailable(_)));
        assert_eq!(f.queue.depth().await.unwrap(), 0);
        assert_eq!(f.stats.get_error_count(ErrorType::EnqueueError), 1);
    }

    #[tokio::test]
    async fn test_limiter_failure_is_server_error_without_enqueue() {
        let f = fixture_with_limiter(Arc::new(BrokenLimiter));
        f.controller.register(&registration("u1", "alice")).await.unwrap();

        let err = f.controller.submit(&task("u1")).await.unwrap_err();
        assert!(matches!(err, AdmissionError::LimiterFailure(_)));
        assert_eq!(f.queue.depth().await.unwrap(), 0);
        assert_eq!(f.stats.get_error_count(ErrorType::LimiterError), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_never_exceed_quota() {
        let f = fixture();
        f.controller.register(&registration("u1", "alice")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let controller = f.controller.clone();
            handles.push(tokio::spawn(async move {
                controller.submit(&task("u1")).await.unwrap()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Admission::Accepted { .. }) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 20);
        assert_eq!(f.queue.depth().await.unwrap(), 40);
    }
}
