//! Mock backend for testing
//!
//! Replies come from a scripted responder closure. Every call is counted and
//! recorded so tests can assert on how many model calls were made and what
//! was sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::TaskType;
use crate::error::{Error, Result};

use super::types::CompletionRequest;
use super::LlmBackend;

type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Mock LLM backend
#[derive(Clone)]
pub struct MockBackend {
    responder: Responder,
    delay: Option<Duration>,
    /// Whether health_check should return true
    pub healthy: bool,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockBackend {
    /// Mock with canned per-task replies
    ///
    /// Classification gets an empty result list (everything falls back),
    /// analytics gets the default triple and recommendation gets no codes.
    pub fn new() -> Self {
        Self::with_responder(|req| {
            Ok(match req.task {
                TaskType::Classification => r#"{"results": []}"#.to_string(),
                TaskType::Analytics => r#"{"results": [1, 3, 7]}"#.to_string(),
                TaskType::Recommendation => String::new(),
            })
        })
    }

    /// Mock that answers every call with the same text
    pub fn with_reply(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::with_responder(move |_| Ok(reply.clone()))
    }

    /// Mock driven by a closure
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: None,
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock whose every call fails at the transport level
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_responder(move |_| Err(Error::Provider(message.clone())))
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completed or in-progress calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("healthy", &self.healthy)
            .field("calls", &self.call_count())
            .finish()
    }
}

/// Decrements the in-flight counter even if the call future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(request)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(task: TaskType) -> CompletionRequest {
        CompletionRequest::new(task, "test-model").user("hello")
    }

    #[tokio::test]
    async fn test_default_replies_per_task() {
        let mock = MockBackend::new();
        assert_eq!(
            mock.complete(&req(TaskType::Classification)).await.unwrap(),
            r#"{"results": []}"#
        );
        assert!(mock
            .complete(&req(TaskType::Analytics))
            .await
            .unwrap()
            .contains("[1, 3, 7]"));
        assert_eq!(mock.complete(&req(TaskType::Recommendation)).await.unwrap(), "");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let mock = MockBackend::failing("boom");
        let err = mock.complete(&req(TaskType::Analytics)).await.unwrap_err();
        assert!(err.is_provider_failure());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_records_requests_across_clones() {
        let mock = MockBackend::with_reply("ok");
        let clone = mock.clone();
        clone.complete(&req(TaskType::Classification)).await.unwrap();

        assert_eq!(mock.call_count(), 1);
        let seen = mock.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].user_text(), "hello");
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }

    #[tokio::test]
    async fn test_peak_concurrency_tracks_overlap() {
        let mock = MockBackend::with_reply("ok").with_delay(Duration::from_millis(20));
        let a = mock.clone();
        let b = mock.clone();
        let r1 = req(TaskType::Classification);
        let r2 = req(TaskType::Classification);
        let (x, y) = tokio::join!(a.complete(&r1), b.complete(&r2));
        x.unwrap();
        y.unwrap();
        assert_eq!(mock.peak_concurrency(), 2);
    }
}
