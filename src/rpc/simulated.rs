//! In-memory location service.
//!
//! Behaves like a well-mannered GeoClue2 daemon: clients are handed out on
//! request, started clients receive [`LocationUpdated`] signals for every
//! published reading, and every call can be made to fail. Calls are logged
//! so tests can assert on lifecycle side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ClientProxy, LocationProvider, LocationReading, LocationUpdated, ObjectPath};
use crate::error::GeoclueError;
use crate::position::AccuracyLevel;
use crate::Result;

const CLIENT_PREFIX: &str = "/org/freedesktop/GeoClue2/Client/";
const LOCATION_PREFIX: &str = "/org/freedesktop/GeoClue2/Location/";

/// Capacity of each client's signal channel.
const SIGNAL_CAPACITY: usize = 32;

/// Record of calls made against a [`SimulatedProvider`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub created: usize,
    pub started: usize,
    pub stopped: usize,
    pub desktop_ids: Vec<String>,
    pub time_thresholds: Vec<u32>,
    pub accuracy_levels: Vec<AccuracyLevel>,
}

#[derive(Debug)]
struct Behavior {
    fail_create: bool,
    fail_start: bool,
    fail_stop: bool,
    available_accuracy: Option<AccuracyLevel>,
    call_delay: Duration,
    initial_location: Option<ObjectPath>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            fail_create: false,
            fail_start: false,
            fail_stop: false,
            available_accuracy: Some(AccuracyLevel::Exact),
            call_delay: Duration::ZERO,
            initial_location: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    behavior: Mutex<Behavior>,
    calls: Mutex<CallLog>,
    locations: Mutex<HashMap<ObjectPath, LocationReading>>,
    clients: Mutex<Vec<Weak<SimulatedClient>>>,
    next_client: AtomicU64,
    next_location: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    async fn delay(&self) {
        let delay = lock(&self.behavior).call_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Clients still held by someone.
    fn live_clients(&self) -> Vec<Arc<SimulatedClient>> {
        lock(&self.clients).iter().filter_map(Weak::upgrade).collect()
    }

    fn register(&self, reading: LocationReading) -> ObjectPath {
        let id = self.next_location.fetch_add(1, Ordering::Relaxed) + 1;
        let path = ObjectPath::new(format!("{}{}", LOCATION_PREFIX, id));
        lock(&self.locations).insert(path.clone(), reading);
        path
    }
}

/// In-memory [`LocationProvider`]. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProvider {
    inner: Arc<Inner>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_client` fail.
    pub fn fail_create(&self, fail: bool) {
        lock(&self.inner.behavior).fail_create = fail;
    }

    /// Make `start` fail.
    pub fn fail_start(&self, fail: bool) {
        lock(&self.inner.behavior).fail_start = fail;
    }

    /// Make `stop` fail.
    pub fn fail_stop(&self, fail: bool) {
        lock(&self.inner.behavior).fail_stop = fail;
    }

    /// Set the reported accuracy level; `None` makes the property unreadable.
    pub fn set_available_accuracy(&self, level: Option<AccuracyLevel>) {
        lock(&self.inner.behavior).available_accuracy = level;
    }

    /// Delay applied to every create/start/stop call.
    pub fn set_call_delay(&self, delay: Duration) {
        lock(&self.inner.behavior).call_delay = delay;
    }

    /// Location reported by clients at start time.
    pub fn set_initial_location(&self, reading: LocationReading) {
        let path = self.inner.register(reading);
        lock(&self.inner.behavior).initial_location = Some(path);
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> CallLog {
        lock(&self.inner.calls).clone()
    }

    /// Number of clients currently started.
    pub fn active_clients(&self) -> usize {
        self.inner
            .live_clients()
            .iter()
            .filter(|client| client.is_started())
            .count()
    }

    /// Publish a new reading to every started client.
    ///
    /// Returns the number of clients signalled.
    pub fn publish(&self, reading: LocationReading) -> usize {
        let path = self.inner.register(reading);
        self.signal(path)
    }

    /// Signal a location object that cannot be resolved.
    pub fn publish_unresolvable(&self) -> usize {
        let id = self.inner.next_location.fetch_add(1, Ordering::Relaxed) + 1;
        self.signal(ObjectPath::new(format!("{}{}", LOCATION_PREFIX, id)))
    }

    fn signal(&self, path: ObjectPath) -> usize {
        self.inner
            .live_clients()
            .iter()
            .filter(|client| client.is_started())
            .filter(|client| client.update_location(path.clone()))
            .count()
    }
}

#[async_trait]
impl LocationProvider for SimulatedProvider {
    async fn create_client(&self) -> Result<Arc<dyn ClientProxy>> {
        self.inner.delay().await;
        if lock(&self.inner.behavior).fail_create {
            return Err(GeoclueError::rpc(
                "org.freedesktop.DBus.Error.AccessDenied",
                "client creation refused",
            ));
        }

        let id = self.inner.next_client.fetch_add(1, Ordering::Relaxed) + 1;
        let client = Arc::new(SimulatedClient::new(
            ObjectPath::new(format!("{}{}", CLIENT_PREFIX, id)),
            Arc::clone(&self.inner),
        ));
        lock(&self.inner.calls).created += 1;

        let mut clients = lock(&self.inner.clients);
        clients.retain(|c| c.strong_count() > 0);
        clients.push(Arc::downgrade(&client));

        Ok(client)
    }

    async fn location(&self, path: &ObjectPath) -> Result<LocationReading> {
        lock(&self.inner.locations)
            .get(path)
            .copied()
            .ok_or_else(|| GeoclueError::InvalidObject(path.to_string()))
    }

    async fn available_accuracy_level(&self) -> Result<AccuracyLevel> {
        lock(&self.inner.behavior)
            .available_accuracy
            .ok_or_else(|| GeoclueError::Property("AvailableAccuracyLevel".into()))
    }
}

struct SimulatedClient {
    path: ObjectPath,
    inner: Arc<Inner>,
    started: Mutex<bool>,
    location: Mutex<ObjectPath>,
    signals: broadcast::Sender<LocationUpdated>,
}

impl std::fmt::Debug for SimulatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClient")
            .field("path", &self.path)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl SimulatedClient {
    fn new(path: ObjectPath, inner: Arc<Inner>) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            path,
            inner,
            started: Mutex::new(false),
            location: Mutex::new(ObjectPath::default()),
            signals,
        }
    }

    fn is_started(&self) -> bool {
        *lock(&self.started)
    }

    fn update_location(&self, new: ObjectPath) -> bool {
        let old = std::mem::replace(&mut *lock(&self.location), new.clone());
        self.signals.send(LocationUpdated { old, new }).is_ok()
    }
}

#[async_trait]
impl ClientProxy for SimulatedClient {
    fn path(&self) -> &ObjectPath {
        &self.path
    }

    async fn start(&self) -> Result<()> {
        self.inner.delay().await;
        let initial = {
            let behavior = lock(&self.inner.behavior);
            if behavior.fail_start {
                return Err(GeoclueError::rpc(
                    "org.freedesktop.DBus.Error.AccessDenied",
                    "start refused",
                ));
            }
            behavior.initial_location.clone()
        };

        if let Some(path) = initial {
            let mut location = lock(&self.location);
            if location.is_unset() {
                *location = path;
            }
        }
        *lock(&self.started) = true;
        lock(&self.inner.calls).started += 1;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.inner.delay().await;
        *lock(&self.started) = false;
        lock(&self.inner.calls).stopped += 1;
        if lock(&self.inner.behavior).fail_stop {
            return Err(GeoclueError::rpc(
                "org.freedesktop.DBus.Error.NoReply",
                "stop failed",
            ));
        }
        Ok(())
    }

    async fn set_desktop_id(&self, desktop_id: &str) -> Result<()> {
        lock(&self.inner.calls)
            .desktop_ids
            .push(desktop_id.to_string());
        Ok(())
    }

    async fn set_time_threshold(&self, seconds: u32) -> Result<()> {
        lock(&self.inner.calls).time_thresholds.push(seconds);
        Ok(())
    }

    async fn set_requested_accuracy_level(&self, level: AccuracyLevel) -> Result<()> {
        lock(&self.inner.calls).accuracy_levels.push(level);
        Ok(())
    }

    async fn current_location(&self) -> Result<ObjectPath> {
        Ok(lock(&self.location).clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<LocationUpdated> {
        self.signals.subscribe()
    }
}
