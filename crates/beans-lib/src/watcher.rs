//! Filesystem watcher with debounced reconciliation and pub/sub fan-out.
//!
//! A background thread collects raw `notify` events, waits for the debounce
//! window to pass quietly, asks the store to reconcile the touched paths and
//! broadcasts the resulting batch. Each subscriber owns a bounded queue; when
//! it is full the oldest batch is discarded and counted.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::Bean;
use crate::store::BeanStore;

/// How often an idle worker checks for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(100);
/// A batch is flushed after this many debounce windows even if events keep
/// arriving.
const MAX_DELAY_FACTOR: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One reconciled change. `bean` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bean: Option<Bean>,
}

/// Immutable batch shared by every subscriber.
pub type ChangeBatch = Arc<[ChangeEvent]>;

// ============================================================================
// Subscriptions
// ============================================================================

struct Slot {
    sender: Sender<ChangeBatch>,
    /// Second handle on the queue so the hub can evict the oldest batch.
    evict: Receiver<ChangeBatch>,
    dropped: Arc<AtomicU64>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    slots: HashMap<u64, Slot>,
}

/// Fan-out of change batches to bounded subscriber queues.
pub struct SubscriberHub {
    capacity: usize,
    inner: Mutex<HubInner>,
}

impl SubscriberHub {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            inner: Mutex::new(HubInner::default()),
        })
    }

    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<Subscription> {
        let (sender, receiver) = crossbeam_channel::bounded(self.capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        let mut inner = self.inner.lock()?;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.slots.insert(
            id,
            Slot {
                sender,
                evict: receiver.clone(),
                dropped: Arc::clone(&dropped),
            },
        );
        debug!(subscriber = id, "subscribed");

        Ok(Subscription {
            id,
            receiver,
            dropped,
            hub: Arc::downgrade(self),
        })
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.slots.remove(&id).is_some() {
            debug!(subscriber = id, "unsubscribed");
        }
    }

    /// Deliver `batch` to every subscriber without blocking.
    pub(crate) fn broadcast(&self, batch: &ChangeBatch) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.slots.retain(|id, slot| {
            let mut pending = Arc::clone(batch);
            loop {
                match slot.sender.try_send(pending) {
                    Ok(()) => return true,
                    Err(TrySendError::Full(returned)) => {
                        if slot.evict.try_recv().is_ok() {
                            slot.dropped.fetch_add(1, Ordering::Relaxed);
                            debug!(subscriber = id, "queue full, dropped oldest batch");
                        }
                        pending = returned;
                    }
                    Err(TrySendError::Disconnected(_)) => return false,
                }
            }
        });
    }

    /// Close every subscriber queue. Queued batches stay readable.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let count = inner.slots.len();
        inner.slots.clear();
        if count > 0 {
            debug!(count, "closed subscriber queues");
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.slots.len())
            .unwrap_or_default()
    }
}

/// Handle on one subscriber queue. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeBatch>,
    dropped: Arc<AtomicU64>,
    hub: Weak<SubscriberHub>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The underlying queue; disconnects once the subscription is closed.
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<ChangeBatch> {
        &self.receiver
    }

    /// Block until a batch arrives or the queue is closed.
    #[must_use]
    pub fn recv(&self) -> Option<ChangeBatch> {
        self.receiver.recv().ok()
    }

    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeBatch> {
        self.receiver.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeBatch> {
        self.receiver.try_recv().ok()
    }

    /// Batches discarded because this queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("queued", &self.receiver.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

// ============================================================================
// Watcher
// ============================================================================

struct ActiveWatch {
    fs_watcher: RecommendedWatcher,
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// `Idle -> Watching -> Idle` state machine owned by the store.
pub(crate) struct StoreWatcher {
    hub: Arc<SubscriberHub>,
    active: Mutex<Option<ActiveWatch>>,
}

impl StoreWatcher {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            hub: SubscriberHub::new(capacity),
            active: Mutex::new(None),
        }
    }

    pub(crate) const fn hub(&self) -> &Arc<SubscriberHub> {
        &self.hub
    }

    pub(crate) fn is_running(&self) -> bool {
        self.active
            .lock()
            .map(|active| active.is_some())
            .unwrap_or(false)
    }

    /// Start watching `root`. A second call while running is a no-op.
    pub(crate) fn start(&self, store: Weak<BeanStore>, root: &Path, debounce: Duration) -> Result<()> {
        let mut active = self.active.lock()?;
        if active.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
        let mut fs_watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        fs_watcher.watch(root, RecursiveMode::Recursive)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = {
            let hub = Arc::clone(&self.hub);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("beans-watcher".to_string())
                .spawn(move || run_worker(&rx, &store, &hub, debounce, &shutdown))?
        };

        debug!(root = %root.display(), debounce_ms = debounce.as_millis(), "watching");
        *active = Some(ActiveWatch {
            fs_watcher,
            shutdown,
            worker,
        });
        Ok(())
    }

    /// Stop watching. Idempotent.
    pub(crate) fn stop(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(ActiveWatch {
            fs_watcher,
            shutdown,
            worker,
        }) = active
        else {
            return;
        };

        shutdown.store(true, Ordering::SeqCst);
        drop(fs_watcher);
        // The last store handle can be released by the worker itself.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            warn!("watcher worker panicked");
        }
        debug!("stopped watching");
    }
}

impl Drop for StoreWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

const fn is_relevant(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

fn run_worker(
    events: &mpsc::Receiver<notify::Result<notify::Event>>,
    store: &Weak<BeanStore>,
    hub: &SubscriberHub,
    debounce: Duration,
    shutdown: &AtomicBool,
) {
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    let mut batch_started: Option<Instant> = None;
    let max_delay = debounce * MAX_DELAY_FACTOR;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let wait = if pending.is_empty() { IDLE_POLL } else { debounce };

        let flush_now = match events.recv_timeout(wait) {
            Ok(Ok(event)) => {
                if is_relevant(&event.kind) && !event.paths.is_empty() {
                    pending.extend(event.paths);
                    batch_started.get_or_insert_with(Instant::now);
                }
                batch_started.is_some_and(|started| started.elapsed() >= max_delay)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "filesystem watcher error");
                false
            }
            Err(RecvTimeoutError::Timeout) => !pending.is_empty(),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if flush_now {
            batch_started = None;
            let paths = std::mem::take(&mut pending);
            let Some(store) = store.upgrade() else { break };
            match store.reconcile(&paths) {
                Ok(changes) if !changes.is_empty() => {
                    debug!(count = changes.len(), "broadcasting changes");
                    hub.broadcast(&Arc::from(changes));
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to reconcile changes"),
            }
        }
    }
    debug!("watcher worker exiting");
}
