//! Consumer-facing position source.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::driver::{ClientDriver, Command, DriverContext};
use super::session::ClientSettings;
use super::{ClientState, SourceEvent, SourceSnapshot, EVENT_CAPACITY, MINIMUM_UPDATE_INTERVAL_MS};
use crate::error::SourceErrorKind;
use crate::identity::ApplicationIdentity;
use crate::position::{LastFixStore, PositionFix, PositioningMethods};
use crate::rpc::LocationProvider;

/// Everything a [`PositionSource`] needs besides the provider.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub identity: ApplicationIdentity,
    pub settings: ClientSettings,
    /// Where the last fix is restored from and saved to; `None` disables it.
    pub store: Option<LastFixStore>,
}

impl SourceOptions {
    pub fn new(identity: ApplicationIdentity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_store(mut self, store: LastFixStore) -> Self {
        self.store = Some(store);
        self
    }
}

/// A positioning source fed by a remote location service.
///
/// Continuous updates (`start_updates`) and single-shot requests
/// (`request_update`) share one remote client, which exists exactly while
/// either of them wants updates. Results arrive as [`SourceEvent`]s on
/// [`subscribe`](Self::subscribe).
///
/// Must be created inside a tokio runtime. Calls never wait for the
/// service; they queue work for the driver task and return.
///
/// # Example
///
/// ```no_run
/// use geoclue_position::{ApplicationIdentity, PositionSource, SimulatedProvider, SourceOptions};
///
/// # async fn demo() {
/// let provider = SimulatedProvider::new();
/// let source = PositionSource::new(
///     provider,
///     SourceOptions::new(ApplicationIdentity::new("org.example.Maps")),
/// );
/// let mut events = source.subscribe();
/// source.request_update(0);
/// let event = events.recv().await;
/// # }
/// ```
pub struct PositionSource {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SourceEvent>,
    snapshot: watch::Receiver<SourceSnapshot>,
    provider: Arc<dyn LocationProvider>,
    settings: ClientSettings,
    driver: Option<JoinHandle<()>>,
}

impl PositionSource {
    /// Create the source and spawn its driver.
    ///
    /// The last fix is restored from the store, if there is one.
    pub fn new<P>(provider: P, options: SourceOptions) -> Self
    where
        P: LocationProvider + 'static,
    {
        Self::with_provider(Arc::new(provider), options)
    }

    /// Like [`new`](Self::new) for an already shared provider.
    pub fn with_provider(provider: Arc<dyn LocationProvider>, options: SourceOptions) -> Self {
        let SourceOptions {
            identity,
            settings,
            store,
        } = options;

        let last_fix = store.as_ref().and_then(LastFixStore::load);
        if let Some(fix) = &last_fix {
            debug!("Restored last position: {:?}", fix);
        }

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(SourceSnapshot {
            last_fix: last_fix.clone(),
            ..SourceSnapshot::default()
        });

        let context = DriverContext {
            identity,
            settings,
            store,
            last_fix,
            events: events.clone(),
            snapshot: snapshot_tx,
        };
        let driver = tokio::spawn(ClientDriver::run(
            Arc::clone(&provider),
            context,
            command_rx,
        ));

        Self {
            commands,
            events,
            snapshot,
            provider,
            settings,
            driver: Some(driver),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Position source driver is gone");
        }
    }

    /// Start continuous updates. The last known fix, if any, is delivered
    /// again shortly after.
    pub fn start_updates(&self) {
        self.send(Command::StartUpdates);
    }

    /// Stop continuous updates.
    pub fn stop_updates(&self) {
        self.send(Command::StopUpdates);
    }

    /// Request a single fix within `timeout_ms`, or within the cold-start
    /// timeout when `timeout_ms` is 0. Ignored while a request is pending.
    pub fn request_update(&self, timeout_ms: u32) {
        self.send(Command::RequestUpdate { timeout_ms });
    }

    /// Last fix received or restored.
    ///
    /// The provider does not report where a fix came from, so
    /// `_from_satellite_methods_only` has no effect.
    pub fn last_known_position(&self, _from_satellite_methods_only: bool) -> Option<PositionFix> {
        self.snapshot.borrow().last_fix.clone()
    }

    /// Capabilities the service currently offers.
    ///
    /// An unreadable property yields no capability and raises an access error.
    pub async fn supported_positioning_methods(&self) -> PositioningMethods {
        match self.provider.available_accuracy_level().await {
            Ok(level) => PositioningMethods::from_available(level),
            Err(e) => {
                warn!("Unable to read the available accuracy level: {}", e);
                self.send(Command::ReportError(SourceErrorKind::Access));
                PositioningMethods::None
            }
        }
    }

    pub fn minimum_update_interval(&self) -> u32 {
        MINIMUM_UPDATE_INTERVAL_MS
    }

    pub fn update_interval(&self) -> u32 {
        self.settings.update_interval_ms
    }

    /// Set the update interval in milliseconds and push it to a live client.
    pub fn set_update_interval(&mut self, msec: u32) {
        self.settings = self.settings.with_interval(msec);
        self.send(Command::Configure(self.settings));
    }

    pub fn preferred_positioning_methods(&self) -> PositioningMethods {
        self.settings.preferred_methods
    }

    /// Set the preferred methods and push the implied accuracy to a live client.
    pub fn set_preferred_positioning_methods(&mut self, methods: PositioningMethods) {
        self.settings = self.settings.with_methods(methods);
        self.send(Command::Configure(self.settings));
    }

    /// Last reported error.
    pub fn error(&self) -> SourceErrorKind {
        self.snapshot.borrow().error
    }

    /// Current lifecycle state of the remote client.
    pub fn state(&self) -> ClientState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> SourceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every snapshot change.
    pub fn watch(&self) -> watch::Receiver<SourceSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to position updates and errors.
    pub fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }

    /// Stop the driver and save the last fix.
    ///
    /// Dropping the source has the same effect, without waiting for it.
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                warn!("Position source driver failed: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for PositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSource")
            .field("settings", &self.settings)
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{LocationReading, SimulatedProvider};
    use std::time::Duration;

    fn source(provider: &SimulatedProvider) -> PositionSource {
        PositionSource::new(
            provider.clone(),
            SourceOptions::new(ApplicationIdentity::new("org.example.Test")),
        )
    }

    async fn wait_state(source: &PositionSource, state: ClientState) -> SourceSnapshot {
        source
            .watch()
            .wait_for(|s| s.state == state)
            .await
            .map(|s| s.clone())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_getters_and_setters() {
        let provider = SimulatedProvider::new();
        let mut source = source(&provider);

        assert_eq!(source.minimum_update_interval(), 1000);
        assert_eq!(source.update_interval(), 0);
        assert_eq!(source.preferred_positioning_methods(), PositioningMethods::All);

        source.set_update_interval(250);
        assert_eq!(source.update_interval(), 1000);

        source.set_preferred_positioning_methods(PositioningMethods::Satellite);
        assert_eq!(
            source.preferred_positioning_methods(),
            PositioningMethods::Satellite
        );
        assert_eq!(source.error(), SourceErrorKind::NoError);
        assert_eq!(source.state(), ClientState::NoSession);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_pushed_to_live_client() {
        let provider = SimulatedProvider::new();
        let mut source = source(&provider);

        source.start_updates();
        wait_state(&source, ClientState::Started).await;
        let applied = provider.calls().time_thresholds.len();

        source.set_update_interval(30_000);
        source.set_preferred_positioning_methods(PositioningMethods::NonSatellite);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let calls = provider.calls();
        assert_eq!(calls.time_thresholds.last(), Some(&30));
        assert!(calls.time_thresholds.len() > applied);
        assert_eq!(
            calls.accuracy_levels.last(),
            Some(&crate::position::AccuracyLevel::Street)
        );
        assert_eq!(calls.created, 1);
        assert_eq!(calls.started, 1);
        assert_eq!(calls.stopped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_satellite_filter_is_ignored() {
        let provider = SimulatedProvider::new();
        let source = source(&provider);
        let mut events = source.subscribe();

        source.start_updates();
        wait_state(&source, ClientState::Started).await;
        provider.publish(LocationReading::new(10.0, 20.0));
        events.recv().await.unwrap();

        assert_eq!(
            source.last_known_position(true),
            source.last_known_position(false)
        );
        assert!(source.last_known_position(true).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supported_methods() {
        let provider = SimulatedProvider::new();
        let source = source(&provider);

        provider.set_available_accuracy(Some(crate::position::AccuracyLevel::City));
        assert_eq!(
            source.supported_positioning_methods().await,
            PositioningMethods::NonSatellite
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_completes() {
        let provider = SimulatedProvider::new();
        let source = source(&provider);
        source.start_updates();
        wait_state(&source, ClientState::Started).await;

        tokio::time::timeout(Duration::from_secs(1), source.shutdown())
            .await
            .unwrap();
    }
}
