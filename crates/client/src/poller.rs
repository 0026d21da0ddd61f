//! Status poller: coalesced, interval-driven reads of executor resources.
//!
//! Every distinct key (an executor path) gets exactly one background task
//! that fetches on a fixed cadence and publishes a [`PollState`] through a
//! [`tokio::sync::watch`] channel. Subscribing to a key that already has a
//! loop joins it instead of starting another; the loop stops when the last
//! [`Subscription`] is dropped.
//!
//! Fetches for one key run strictly one after another inside its task, so
//! results are published in start order. Ticks that come due while a fetch
//! is still outstanding are skipped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::fetch::{FetchError, Fetcher};

// ---------------------------------------------------------------------------
// Options and published state
// ---------------------------------------------------------------------------

/// Shapes a raw fetch result into the value subscribers see.
pub type Transform<R, T> = Arc<dyn Fn(R) -> T + Send + Sync>;

/// Per-key loop settings. Only the first subscriber's options take effect.
pub struct PollOptions<R, T> {
    pub interval: Duration,
    pub transform: Transform<R, T>,
}

impl<T: 'static> PollOptions<T, T> {
    /// Publish fetched values unchanged.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            transform: Arc::new(|raw| raw),
        }
    }
}

impl<T: 'static> Default for PollOptions<T, T> {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl<R, T> PollOptions<R, T> {
    pub fn with_transform(
        interval: Duration,
        transform: impl Fn(R) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            interval,
            transform: Arc::new(transform),
        }
    }
}

/// What every subscriber of a key observes.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    /// Latest successfully fetched value. Survives later failures.
    pub value: Option<T>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<FetchError>,
    /// A fetch is in flight and no value has arrived yet.
    pub loading: bool,
    /// A fetch is in flight.
    pub validating: bool,
    /// Number of completed fetches, successful or not.
    pub revision: u64,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            loading: false,
            validating: false,
            revision: 0,
        }
    }
}

impl<T> PollState<T> {
    fn begin(&mut self) {
        self.validating = true;
        self.loading = self.value.is_none();
    }

    fn succeed(&mut self, value: T) {
        self.value = Some(value);
        self.error = None;
        self.finish();
    }

    fn fail(&mut self, error: FetchError) {
        self.error = Some(error);
        self.finish();
    }

    fn finish(&mut self) {
        self.loading = false;
        self.validating = false;
        self.revision += 1;
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

struct Slot<T> {
    id: u64,
    tx: watch::Sender<PollState<T>>,
    subscribers: usize,
    cancel: CancellationToken,
}

type Registry<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

fn lock<T>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
    // The map is only mutated in short, panic-free sections.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalescing poller for one value type.
///
/// Cheap to clone; clones share the same loops and cache.
pub struct StatusPoller<T> {
    registry: Registry<T>,
    next_id: Arc<AtomicU64>,
    root: CancellationToken,
}

impl<T> Clone for StatusPoller<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            next_id: Arc::clone(&self.next_id),
            root: self.root.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for StatusPoller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> StatusPoller<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            root: CancellationToken::new(),
        }
    }

    /// Subscribe to `key`, starting its poll loop if none is running.
    ///
    /// Must be called from within a tokio runtime. When the key is already
    /// polled, `fetcher` and `options` are dropped and the subscriber joins
    /// the existing loop and cache.
    pub fn subscribe<R, F>(
        &self,
        key: impl Into<String>,
        fetcher: F,
        options: PollOptions<R, T>,
    ) -> Subscription<T>
    where
        R: Send + 'static,
        F: Fetcher<R>,
    {
        let key = key.into();
        let mut slots = lock(&self.registry);

        if let Some(slot) = slots.get_mut(&key) {
            slot.subscribers += 1;
            tracing::debug!(key = %key, subscribers = slot.subscribers, "Joined existing poll loop");
            return Subscription {
                rx: slot.tx.subscribe(),
                slot_id: slot.id,
                key,
                registry: Arc::clone(&self.registry),
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(PollState::default());
        let cancel = self.root.child_token();

        tokio::spawn(poll_loop(
            key.clone(),
            fetcher,
            options,
            tx.clone(),
            cancel.clone(),
        ));

        slots.insert(
            key.clone(),
            Slot {
                id,
                tx,
                subscribers: 1,
                cancel,
            },
        );

        Subscription {
            rx,
            slot_id: id,
            key,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Keys that currently have a running loop.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock(&self.registry).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Stop every loop. Existing subscriptions keep their last state and
    /// [`Subscription::changed`] returns `None` once the loop has exited.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down status poller");
        self.root.cancel();
        lock(&self.registry).clear();
    }
}

/// One consumer's handle on a polled key. Dropping it unsubscribes.
pub struct Subscription<T> {
    rx: watch::Receiver<PollState<T>>,
    slot_id: u64,
    key: String,
    registry: Registry<T>,
}

impl<T: Clone> Subscription<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn snapshot(&self) -> PollState<T> {
        self.rx.borrow().clone()
    }

    pub fn value(&self) -> Option<T> {
        self.rx.borrow().value.clone()
    }

    /// Wait for the next state change of any kind (fetch start or finish).
    ///
    /// Returns `None` once the loop has stopped.
    pub async fn changed(&mut self) -> Option<PollState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait for the next completed fetch after the current one.
    pub async fn next_result(&mut self) -> Option<PollState<T>> {
        let seen = self.rx.borrow().revision;
        self.result_after(seen).await
    }

    /// Wait for a completed fetch newer than `revision`, returning at once
    /// if one has already been published.
    pub async fn result_after(&mut self, revision: u64) -> Option<PollState<T>> {
        let state = self.rx.wait_for(|s| s.revision > revision).await.ok()?;
        Some(state.clone())
    }

    /// Wait until the published value satisfies `predicate`, checking the
    /// current value first.
    pub async fn wait_until(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let state = self
            .rx
            .wait_for(|s| s.value.as_ref().is_some_and(&predicate))
            .await
            .ok()?;
        state.value.clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut slots = lock(&self.registry);
        let Some(slot) = slots.get_mut(&self.key) else {
            return;
        };
        if slot.id != self.slot_id {
            return;
        }
        slot.subscribers = slot.subscribers.saturating_sub(1);
        if slot.subscribers == 0 {
            if let Some(slot) = slots.remove(&self.key) {
                slot.cancel.cancel();
                tracing::debug!(key = %self.key, "Last subscriber left, stopping poll loop");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Index of the first tick strictly after `elapsed`.
fn next_tick(elapsed: Duration, interval: Duration) -> u32 {
    let ticks = elapsed.as_nanos() / interval.as_nanos().max(1) + 1;
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

async fn poll_loop<R, T, F>(
    key: String,
    fetcher: F,
    options: PollOptions<R, T>,
    tx: watch::Sender<PollState<T>>,
    cancel: CancellationToken,
) where
    F: Fetcher<R>,
{
    let interval = options.interval;
    let start = Instant::now();
    let mut tick: u32 = 0;

    tracing::debug!(key = %key, interval_ms = interval.as_millis() as u64, "Poll loop started");

    loop {
        let deadline = start + interval.saturating_mul(tick);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(deadline) => {}
        }

        tx.send_modify(PollState::begin);
        let result = fetcher.fetch(&key).await;

        if cancel.is_cancelled() {
            tracing::debug!(key = %key, "Discarding response for stopped poll loop");
            break;
        }

        match result {
            Ok(raw) => {
                let value = (options.transform)(raw);
                tx.send_modify(|state| state.succeed(value));
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Poll failed, keeping last value");
                tx.send_modify(|state| state.fail(e));
            }
        }

        let next = next_tick(start.elapsed(), interval);
        if next > tick + 1 {
            tracing::debug!(key = %key, skipped = next - tick - 1, "Skipped ticks while fetch was in flight");
        }
        tick = next;
    }

    tracing::debug!(key = %key, "Poll loop stopped");
}
