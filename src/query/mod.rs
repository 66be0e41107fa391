//! Keyed query cache shared by the dashboard panes.
//!
//! Each key holds the last good value, its fetch function, the subscriber
//! count and the optional poll task. At most one fetch per key is in flight;
//! later requests attach to it. A failed fetch records the error but keeps
//! the previous value visible.

mod invalidation;

pub use invalidation::{invalidation_channel, Invalidator};

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{AppError, Result, TransportError};

pub mod keys {
    pub const RUNS: &str = "runs";
    pub const DRAFT: &str = "draft";
    pub const TOPICS: &str = "topics";
}

type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchOutcome = std::result::Result<AnyValue, TransportError>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchOutcome> + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

struct Entry {
    value: Option<AnyValue>,
    fetcher: Fetcher,
    stale: bool,
    refetch_queued: bool,
    in_flight: Option<InFlight>,
    error: Option<TransportError>,
    updated_at: Option<Instant>,
    subscribers: usize,
    // requested interval -> number of subscribers asking for it
    poll_intervals: BTreeMap<Duration, usize>,
    poller: Option<(Duration, JoinHandle<()>)>,
}

impl Entry {
    fn new(fetcher: Fetcher) -> Self {
        Self {
            value: None,
            fetcher,
            stale: false,
            refetch_queued: false,
            in_flight: None,
            error: None,
            updated_at: None,
            subscribers: 0,
            poll_intervals: BTreeMap::new(),
            poller: None,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start a fetch for `key` unless one is already running.
fn start_fetch(inner: &Arc<Inner>, key: &str, entry: &mut Entry) -> InFlight {
    if let Some(in_flight) = &entry.in_flight {
        return in_flight.clone();
    }

    tracing::debug!(key, "fetch started");
    let fetch = (entry.fetcher)();
    let weak = Arc::downgrade(inner);
    let owned_key = key.to_string();
    let handle = tokio::spawn(async move {
        let outcome = fetch.await;
        if let Some(inner) = weak.upgrade() {
            complete_fetch(&inner, &owned_key, &outcome);
        }
        outcome
    });

    let shared = async move {
        handle
            .await
            .unwrap_or_else(|e| Err(TransportError::network(format!("Fetch task failed: {}", e))))
    }
    .boxed()
    .shared();
    entry.in_flight = Some(shared.clone());
    shared
}

fn complete_fetch(inner: &Arc<Inner>, key: &str, outcome: &FetchOutcome) {
    let mut entries = inner.entries();
    let Some(entry) = entries.get_mut(key) else {
        return;
    };
    entry.in_flight = None;

    if entry.subscribers == 0 {
        tracing::debug!(key, "no subscribers left, discarding fetch result");
        entry.refetch_queued = false;
        return;
    }

    match outcome {
        Ok(value) => {
            entry.value = Some(Arc::clone(value));
            entry.error = None;
            entry.stale = false;
            entry.updated_at = Some(Instant::now());
            tracing::debug!(key, "fetch succeeded");
        }
        Err(err) => {
            tracing::warn!(key, "fetch failed: {}", err);
            entry.error = Some(err.clone());
        }
    }

    if entry.refetch_queued {
        entry.refetch_queued = false;
        start_fetch(inner, key, entry);
    }
}

/// Bring the poll task in line with the current subscribers.
fn sync_poller(inner: &Arc<Inner>, key: &str, entry: &mut Entry) {
    let desired = if entry.subscribers > 0 {
        entry.poll_intervals.keys().next().copied()
    } else {
        None
    };

    if entry.poller.as_ref().map(|(period, _)| *period) == desired {
        return;
    }

    if let Some((_, handle)) = entry.poller.take() {
        handle.abort();
        tracing::debug!(key, "poller stopped");
    }

    if let Some(period) = desired {
        let weak = Arc::downgrade(inner);
        let owned_key = key.to_string();
        let handle = tokio::spawn(poll_loop(weak, owned_key, period));
        entry.poller = Some((period, handle));
        tracing::debug!(key, ?period, "poller started");
    }
}

async fn poll_loop(inner: Weak<Inner>, key: String, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let mut entries = inner.entries();
        if let Some(entry) = entries.get_mut(&key) {
            if entry.subscribers > 0 {
                start_fetch(&inner, &key, entry);
            }
        }
    }
}

/// Snapshot of one cache key for rendering.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub error: Option<TransportError>,
    pub updated_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_fetching: false,
            is_stale: false,
            error: None,
            updated_at: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`.
    ///
    /// Fetches right away when nothing (or only stale data) is cached. With a
    /// poll interval the key is refetched at that period until the returned
    /// handle and every other polling handle are dropped. The first fetch
    /// function registered for a key is the one used.
    pub fn subscribe<T, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        poll_interval: Option<Duration>,
    ) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, TransportError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let fut = fetch();
            async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        });

        let mut entries = self.inner.entries();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(fetcher));
        entry.subscribers += 1;
        if let Some(period) = poll_interval {
            *entry.poll_intervals.entry(period).or_default() += 1;
        }
        if entry.value.is_none() || entry.stale {
            start_fetch(&self.inner, key, entry);
        }
        sync_poller(&self.inner, key, entry);

        Subscription {
            client: self.clone(),
            key: key.to_string(),
            poll_interval,
            _marker: PhantomData,
        }
    }

    fn unsubscribe(&self, key: &str, poll_interval: Option<Duration>) {
        let mut entries = self.inner.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if let Some(period) = poll_interval {
            if let Some(count) = entry.poll_intervals.get_mut(&period) {
                *count -= 1;
                if *count == 0 {
                    entry.poll_intervals.remove(&period);
                }
            }
        }
        sync_poller(&self.inner, key, entry);
    }

    /// Mark `key` stale. Refetches now if anyone is subscribed, otherwise on
    /// the next subscription. A fetch already in flight is followed by one
    /// more so the post-mutation state is picked up.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.inner.entries();
        let Some(entry) = entries.get_mut(key) else {
            tracing::debug!(key, "invalidated before first subscription");
            return;
        };
        entry.stale = true;
        if entry.subscribers == 0 {
            return;
        }
        if entry.in_flight.is_some() {
            entry.refetch_queued = true;
        } else {
            start_fetch(&self.inner, key, entry);
        }
    }

    /// Refetch `key`, joining the in-flight fetch if there is one.
    pub async fn refetch<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>> {
        let in_flight = {
            let mut entries = self.inner.entries();
            let entry = entries
                .get_mut(key)
                .ok_or_else(|| AppError::UnknownQuery(key.to_string()))?;
            start_fetch(&self.inner, key, entry)
        };
        let value = in_flight.await?;
        downcast(key, value)
    }

    pub fn state<T: Send + Sync + 'static>(&self, key: &str) -> QueryState<T> {
        let entries = self.inner.entries();
        let Some(entry) = entries.get(key) else {
            return QueryState::default();
        };
        QueryState {
            data: entry
                .value
                .clone()
                .and_then(|value| downcast(key, value).ok()),
            is_fetching: entry.in_flight.is_some(),
            is_stale: entry.stale,
            error: entry.error.clone(),
            updated_at: entry.updated_at,
        }
    }

    /// Feed keys received on `rx` into [`QueryClient::invalidate`].
    pub fn listen(&self, mut rx: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(key) = rx.recv().await {
                client.invalidate(&key);
            }
        })
    }

    /// Stop every poller. In-flight fetches finish but nothing new is scheduled.
    pub fn shutdown(&self) {
        let mut entries = self.inner.entries();
        for (key, entry) in entries.iter_mut() {
            entry.subscribers = 0;
            entry.poll_intervals.clear();
            if let Some((_, handle)) = entry.poller.take() {
                handle.abort();
                tracing::debug!(key = key.as_str(), "poller stopped on shutdown");
            }
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &str, value: AnyValue) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        AppError::Other(anyhow::anyhow!(
            "Query '{}' holds a value of a different type",
            key
        ))
    })
}

/// Live interest in one key. Dropping it unsubscribes.
pub struct Subscription<T> {
    client: QueryClient,
    key: String,
    poll_interval: Option<Duration>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn state(&self) -> QueryState<T> {
        self.client.state(&self.key)
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state().data
    }

    pub async fn refetch(&self) -> Result<Arc<T>> {
        self.client.refetch(&self.key).await
    }

    /// Kick off a coalesced refetch without waiting for it.
    pub fn refresh(&self) {
        let client = self.client.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            if let Err(e) = client.refetch::<T>(&key).await {
                tracing::debug!(key = key.as_str(), "manual refresh failed: {}", e);
            }
        });
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.client.unsubscribe(&self.key, self.poll_interval);
    }
}
