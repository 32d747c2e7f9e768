//! URL-driven fetch state machine.
//!
//! A [`Fetcher`] holds at most one in-flight request. Changing the URL aborts
//! the previous request, and every request carries the generation it was
//! spawned under; a completion whose generation is no longer current is
//! dropped without touching the published state.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::{sync::watch, task::JoinHandle};
use url::Url;

/// Something that can turn a URL into a `T`.
#[async_trait]
pub trait Fetch<T>: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> Result<T, String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Success(T),
    Failure(String),
}

impl<T> FetchState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            FetchState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failure(msg) => Some(msg),
            _ => None,
        }
    }
}

struct Shared<T> {
    generation: Mutex<u64>,
    tx: watch::Sender<FetchState<T>>,
}

impl<T> Shared<T> {
    /// Publish `state` if `generation` is still current.
    fn publish(&self, generation: u64, state: FetchState<T>) -> bool {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            return false;
        }
        self.tx.send_replace(state);
        true
    }

    /// Start a new generation and publish its initial state atomically.
    fn advance(&self, state: FetchState<T>) -> u64 {
        let mut current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        self.tx.send_replace(state);
        *current
    }

    fn invalidate(&self) {
        let mut current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
    }
}

pub struct Fetcher<T> {
    source: Arc<dyn Fetch<T>>,
    shared: Arc<Shared<T>>,
    url: Option<Url>,
    task: Option<JoinHandle<()>>,
}

impl<T> Fetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn Fetch<T>>) -> Self {
        let (tx, _rx) = watch::channel(FetchState::Idle);
        Self {
            source,
            shared: Arc::new(Shared { generation: Mutex::new(0), tx }),
            url: None,
            task: None,
        }
    }

    /// Drive the machine with a new input. Returns `true` when a state
    /// transition happened, `false` when `url` equals the current one.
    ///
    /// Must be called from within a tokio runtime when `url` is `Some`.
    pub fn set_url(&mut self, url: Option<Url>) -> bool {
        if url == self.url {
            return false;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.url = url.clone();

        let Some(url) = url else {
            self.shared.advance(FetchState::Idle);
            return true;
        };

        let generation = self.shared.advance(FetchState::Loading);
        let source = Arc::clone(&self.source);
        let shared = Arc::clone(&self.shared);

        tracing::debug!(generation, path = url.path(), "fetch started");
        self.task = Some(tokio::spawn(async move {
            let state = match source.fetch(&url).await {
                Ok(data) => FetchState::Success(data),
                Err(msg) => FetchState::Failure(msg),
            };

            if !shared.publish(generation, state) {
                tracing::debug!(generation, path = url.path(), "discarding stale response");
            }
        }));

        true
    }

    pub fn state(&self) -> FetchState<T> {
        self.shared.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.tx.subscribe()
    }

    /// Wait until the current request, if any, has resolved.
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // The sender lives in `self.shared`, so it cannot be gone here.
            Err(_) => self.state(),
        }
    }
}

impl<T> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.shared.invalidate();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    /// Replies with the URL path after a per-path delay.
    #[derive(Default)]
    struct FakeSource {
        delays: HashMap<String, u64>,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl FakeSource {
        fn with_delay(mut self, path: &str, millis: u64) -> Self {
            self.delays.insert(path.to_string(), millis);
            self
        }
    }

    #[async_trait]
    impl Fetch<String> for FakeSource {
        async fn fetch(&self, url: &Url) -> Result<String, String> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.get(url.path()).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);

            if url.path().starts_with("/fail") {
                Err(format!("failed {}", url.path()))
            } else {
                Ok(url.path().to_string())
            }
        }
    }

    fn url(path: &str) -> Url {
        Url::parse("http://example.test").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn starts_idle_and_none_stays_idle() {
        let mut fetcher: Fetcher<String> = Fetcher::new(Arc::new(FakeSource::default()));
        assert_eq!(fetcher.state(), FetchState::Idle);

        assert!(!fetcher.set_url(None));
        assert_eq!(fetcher.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn success_then_failure() {
        let mut fetcher: Fetcher<String> = Fetcher::new(Arc::new(FakeSource::default()));

        fetcher.set_url(Some(url("/a")));
        assert!(fetcher.state().is_loading());
        assert_eq!(fetcher.settled().await, FetchState::Success("/a".into()));

        fetcher.set_url(Some(url("/fail")));
        let state = fetcher.settled().await;
        assert_eq!(state.error(), Some("failed /fail"));
        assert!(state.data().is_none());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn identical_url_does_not_refetch() {
        let source = Arc::new(FakeSource::default().with_delay("/a", 20));
        let mut fetcher: Fetcher<String> = Fetcher::new(source.clone());

        assert!(fetcher.set_url(Some(url("/a"))));
        assert!(!fetcher.set_url(Some(url("/a"))));
        fetcher.settled().await;
        assert!(!fetcher.set_url(Some(url("/a"))));

        assert_eq!(source.started.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.state(), FetchState::Success("/a".into()));
    }

    #[tokio::test]
    async fn slow_earlier_response_never_overwrites_newer() {
        let source = Arc::new(FakeSource::default().with_delay("/slow", 150).with_delay("/fast", 10));
        let mut fetcher: Fetcher<String> = Fetcher::new(source.clone());

        fetcher.set_url(Some(url("/slow")));
        tokio::task::yield_now().await;
        fetcher.set_url(Some(url("/fast")));

        assert_eq!(fetcher.settled().await, FetchState::Success("/fast".into()));

        // Give the superseded request more than enough time to have landed.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fetcher.state(), FetchState::Success("/fast".into()));
    }

    #[tokio::test]
    async fn stale_generation_is_rejected_by_publish() {
        let (tx, _rx) = watch::channel(FetchState::Idle);
        let shared = Shared { generation: Mutex::new(0), tx };

        let first = shared.advance(FetchState::Loading);
        let second = shared.advance(FetchState::Loading);

        assert!(shared.publish(second, FetchState::Success("B".to_string())));
        assert!(!shared.publish(first, FetchState::Success("A".to_string())));
        assert_eq!(*shared.tx.borrow(), FetchState::Success("B".to_string()));
    }

    #[tokio::test]
    async fn clearing_url_returns_to_idle_and_drops_in_flight() {
        let source = Arc::new(FakeSource::default().with_delay("/a", 50));
        let mut fetcher: Fetcher<String> = Fetcher::new(source.clone());

        fetcher.set_url(Some(url("/a")));
        assert!(fetcher.set_url(None));
        assert_eq!(fetcher.state(), FetchState::Idle);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fetcher.state(), FetchState::Idle);
    }

    #[tokio::test]
    async fn drop_discards_in_flight_result() {
        let source = Arc::new(FakeSource::default().with_delay("/a", 50));
        let mut fetcher: Fetcher<String> = Fetcher::new(source.clone());

        fetcher.set_url(Some(url("/a")));
        let rx = fetcher.subscribe();
        drop(fetcher);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(rx.borrow().is_loading());
        assert_eq!(source.finished.load(Ordering::SeqCst), 0);
    }
}
