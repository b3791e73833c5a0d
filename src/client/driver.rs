//! The client lifecycle driver.
//!
//! One task owns the client session and every piece of mutable state.
//! Public calls arrive as [`Command`]s; each remote call runs in its own
//! task and posts its outcome back as an [`Event`]. Handlers never assume
//! that the state which motivated a call is still current: they re-check
//! the state, the session id and the demand gate before acting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, warn};

use super::id::SessionId;
use super::session::{ClientSettings, SessionHandle};
use super::state::{ClientState, Demand};
use super::timer::DeadlineTimer;
use super::{SourceEvent, SourceSnapshot, MINIMUM_UPDATE_INTERVAL_MS, UPDATE_TIMEOUT_COLD_START};
use crate::error::SourceErrorKind;
use crate::identity::ApplicationIdentity;
use crate::position::{LastFixStore, PositionFix};
use crate::rpc::{ClientProxy, LocationProvider, LocationReading, ObjectPath};
use crate::Result;

/// Requests from the public handle.
#[derive(Debug)]
pub(crate) enum Command {
    StartUpdates,
    StopUpdates,
    RequestUpdate { timeout_ms: u32 },
    Configure(ClientSettings),
    ReportError(SourceErrorKind),
    Shutdown,
}

/// A location signal together with the resolved reading.
#[derive(Debug)]
struct Notification {
    old: ObjectPath,
    new: ObjectPath,
    reading: Result<LocationReading>,
}

/// Completions of remote calls and signals from the live client.
enum Event {
    Created(Result<Arc<dyn ClientProxy>>),
    Started {
        id: SessionId,
        result: Result<Option<Notification>>,
    },
    Location {
        id: SessionId,
        notification: Notification,
    },
    Stopped {
        id: SessionId,
        result: Result<()>,
    },
    Redeliver(PositionFix),
}

/// Everything the driver starts with besides the provider and its inbox.
pub(crate) struct DriverContext {
    pub(crate) identity: ApplicationIdentity,
    pub(crate) settings: ClientSettings,
    pub(crate) store: Option<LastFixStore>,
    /// Fix restored from the store, if any.
    pub(crate) last_fix: Option<PositionFix>,
    pub(crate) events: broadcast::Sender<SourceEvent>,
    pub(crate) snapshot: watch::Sender<SourceSnapshot>,
}

pub(crate) struct ClientDriver {
    provider: Arc<dyn LocationProvider>,
    identity: ApplicationIdentity,
    settings: ClientSettings,
    store: Option<LastFixStore>,
    state: ClientState,
    session: Option<SessionHandle>,
    continuous: bool,
    deadline: DeadlineTimer,
    last_fix: Option<PositionFix>,
    error: SourceErrorKind,
    events: broadcast::Sender<SourceEvent>,
    snapshot: watch::Sender<SourceSnapshot>,
    completions: mpsc::UnboundedSender<Event>,
}

impl ClientDriver {
    fn new(
        provider: Arc<dyn LocationProvider>,
        context: DriverContext,
        completions: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let DriverContext {
            identity,
            settings,
            store,
            last_fix,
            events,
            snapshot,
        } = context;

        Self {
            provider,
            identity,
            settings,
            store,
            state: ClientState::NoSession,
            session: None,
            continuous: false,
            deadline: DeadlineTimer::new(),
            last_fix,
            error: SourceErrorKind::NoError,
            events,
            snapshot,
            completions,
        }
    }

    /// Run the driver until the command channel closes or `Shutdown` arrives.
    ///
    /// The last valid fix is saved to the store on the way out.
    pub(crate) async fn run(
        provider: Arc<dyn LocationProvider>,
        context: DriverContext,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (completions, mut completion_rx) = mpsc::unbounded_channel();
        let mut driver = Self::new(provider, context, completions);
        driver.publish();

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => driver.handle_command(command),
                },
                Some(event) = completion_rx.recv() => driver.handle_event(event),
                () = driver.deadline.expired() => driver.on_deadline_expired(),
            }
            driver.publish();
        }

        driver.shutdown();
    }

    fn demand(&self) -> Demand {
        Demand {
            continuous: self.continuous,
            deadline: self.deadline.is_active(),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartUpdates => self.start_updates(),
            Command::StopUpdates => self.stop_updates(),
            Command::RequestUpdate { timeout_ms } => self.request_update(timeout_ms),
            Command::Configure(settings) => {
                self.settings = settings;
                self.reconfigure();
            }
            Command::ReportError(kind) => self.set_error(kind),
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Created(result) => self.on_created(result),
            Event::Started { id, result } => self.on_started(id, result),
            Event::Location { id, notification } => self.on_location(id, notification),
            Event::Stopped { id, result } => self.on_stopped(id, result),
            Event::Redeliver(fix) => {
                let _ = self.events.send(SourceEvent::PositionUpdated(fix));
            }
        }
    }

    fn start_updates(&mut self) {
        if self.continuous {
            debug!("Already running");
            return;
        }

        debug!("Starting updates");
        self.error = SourceErrorKind::NoError;
        self.continuous = true;
        self.start_client();

        if let Some(fix) = self.last_fix.clone().filter(PositionFix::is_valid) {
            let _ = self.completions.send(Event::Redeliver(fix));
        }
    }

    fn stop_updates(&mut self) {
        if !self.continuous {
            debug!("Already stopped");
            return;
        }

        debug!("Stopping updates");
        self.continuous = false;
        self.stop_client();
    }

    fn request_update(&mut self, timeout_ms: u32) {
        if self.deadline.is_active() {
            debug!("Request timer was active, ignoring request");
            return;
        }

        self.error = SourceErrorKind::NoError;

        if timeout_ms != 0 && timeout_ms < MINIMUM_UPDATE_INTERVAL_MS {
            self.set_error(SourceErrorKind::UnknownSource);
            return;
        }

        let timeout = if timeout_ms == 0 {
            UPDATE_TIMEOUT_COLD_START
        } else {
            Duration::from_millis(u64::from(timeout_ms))
        };
        self.deadline.start(timeout);
        self.start_client();
    }

    fn on_deadline_expired(&mut self) {
        debug!("Request update timeout occurred");
        self.set_error(SourceErrorKind::UnknownSource);
        self.stop_client();
    }

    fn set_error(&mut self, kind: SourceErrorKind) {
        self.error = kind;
        if kind != SourceErrorKind::NoError {
            self.publish();
            let _ = self.events.send(SourceEvent::ErrorOccurred(kind));
        }
    }

    fn transition(&mut self, target: ClientState) {
        if let Err(e) = self.state.transition_to(target) {
            error!("{}", e);
        }
    }

    /// Create the client if demand is active and none exists.
    fn start_client(&mut self) {
        if !self.demand().is_active() {
            return;
        }

        match self.state {
            ClientState::NoSession => self.create_client(),
            state => debug!("Client already {:?}", state),
        }
    }

    fn create_client(&mut self) {
        self.transition(ClientState::CreatingSession);

        let provider = Arc::clone(&self.provider);
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = provider.create_client().await;
            let _ = tx.send(Event::Created(result));
        });
    }

    fn on_created(&mut self, result: Result<Arc<dyn ClientProxy>>) {
        if self.state != ClientState::CreatingSession {
            warn!("Ignoring unexpected client creation in state {:?}", self.state);
            return;
        }

        let client = match result {
            Ok(client) => client,
            Err(e) => {
                warn!("Unable to obtain the client: {}", e);
                self.transition(ClientState::NoSession);
                self.set_error(SourceErrorKind::Access);
                return;
            }
        };
        debug!("Client path is: {}", client.path());

        let configuration = match self.settings.configuration(&self.identity) {
            Ok(configuration) => configuration,
            Err(e) => {
                error!(
                    "Unable to configure the client: {}; set {} or an application name",
                    e,
                    crate::identity::DESKTOP_ID_ENV
                );
                self.transition(ClientState::NoSession);
                self.set_error(SourceErrorKind::Access);
                return;
            }
        };

        let mut session = SessionHandle::new(client, configuration.clone());
        session.set_listener(self.spawn_listener(&session));
        let id = session.id();
        let client = session.client();
        self.session = Some(session);
        self.transition(ClientState::Starting);

        let provider = Arc::clone(&self.provider);
        let tx = self.completions.clone();
        tokio::spawn(async move {
            configuration.apply(client.as_ref()).await;
            let result = match client.start().await {
                Ok(()) => Ok(initial_notification(provider.as_ref(), client.as_ref()).await),
                Err(e) => Err(e),
            };
            let _ = tx.send(Event::Started { id, result });
        });
    }

    /// Forward the client's signals, with their readings resolved.
    fn spawn_listener(&self, session: &SessionHandle) -> tokio::task::JoinHandle<()> {
        let id = session.id();
        let mut updates = session.client().subscribe();
        let provider = Arc::clone(&self.provider);
        let tx = self.completions.clone();

        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => {
                        let reading = provider.location(&update.new).await;
                        let notification = Notification {
                            old: update.old,
                            new: update.new,
                            reading,
                        };
                        if tx.send(Event::Location { id, notification }).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} location updates from {}", skipped, id);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn is_live(&self, id: SessionId) -> bool {
        self.session.as_ref().map(SessionHandle::id) == Some(id)
    }

    fn on_started(&mut self, id: SessionId, result: Result<Option<Notification>>) {
        if self.state != ClientState::Starting || !self.is_live(id) {
            debug!("Ignoring start completion of stale client {}", id);
            return;
        }

        match result {
            Ok(initial) => {
                debug!("Client successfully started");
                self.transition(ClientState::Started);
                // Settings changed while starting are pushed now.
                self.reconfigure();
                match initial {
                    Some(notification) => self.on_location(id, notification),
                    None => self.stop_client(),
                }
            }
            Err(e) => {
                error!("Unable to start the client: {}", e);
                self.session = None;
                self.transition(ClientState::NoSession);
                self.set_error(SourceErrorKind::Access);
            }
        }
    }

    fn on_location(&mut self, id: SessionId, notification: Notification) {
        if !self.is_live(id) {
            debug!("Ignoring location update for stale client {}", id);
            return;
        }

        self.deadline.cancel();

        debug!("Old location object path: {}", notification.old);
        debug!("New location object path: {}", notification.new);

        match notification.reading {
            Ok(reading) => {
                let fix = PositionFix::from_reading(&reading, Utc::now());
                self.last_fix = Some(fix.clone());
                self.publish();
                let _ = self.events.send(SourceEvent::PositionUpdated(fix.clone()));
                debug!("New position: {:?}", fix);
            }
            Err(e) => {
                error!(
                    "Unable to create the location object {}: {}",
                    notification.new, e
                );
            }
        }

        self.stop_client();
    }

    /// Stop the client if nobody wants updates any more.
    ///
    /// Only a started client is stopped here; a pending create or start
    /// runs this check itself once it completes.
    fn stop_client(&mut self) {
        if self.demand().is_active() || self.state != ClientState::Started {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let id = session.id();
        let client = session.client();
        self.transition(ClientState::Stopping);

        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = client.stop().await;
            let _ = tx.send(Event::Stopped { id, result });
        });
    }

    fn on_stopped(&mut self, id: SessionId, result: Result<()>) {
        if self.state != ClientState::Stopping || !self.is_live(id) {
            debug!("Ignoring stop completion of stale client {}", id);
            return;
        }

        match result {
            Ok(()) => debug!("Client successfully stopped"),
            Err(e) => {
                error!("Unable to stop the client: {}", e);
                self.set_error(SourceErrorKind::Access);
            }
        }

        self.session = None;
        self.transition(ClientState::NoSession);

        // Demand that arrived while stopping gets a fresh client.
        self.start_client();
    }

    /// Push changed settings to the live client without restarting it.
    ///
    /// A starting client still receives its initial configuration; the
    /// start completion calls this again.
    fn reconfigure(&mut self) {
        if self.state != ClientState::Started {
            if self.state == ClientState::Starting {
                debug!("Client is starting, deferring configuration");
            }
            return;
        }

        match self.settings.configuration(&self.identity) {
            Ok(configuration) => {
                if let Some(session) = self.session.as_mut() {
                    if session.push(configuration) {
                        debug!("Queued new configuration for {}", session.id());
                    }
                }
            }
            Err(e) => {
                error!("Unable to configure the client: {}", e);
                self.set_error(SourceErrorKind::Access);
            }
        }
    }

    fn publish(&self) {
        debug_assert_eq!(self.state.has_session(), self.session.is_some());
        let next = SourceSnapshot {
            state: self.state,
            demand: self.demand(),
            last_fix: self.last_fix.clone(),
            error: self.error,
        };
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn shutdown(&mut self) {
        self.deadline.cancel();
        self.session = None;

        let (Some(store), Some(fix)) = (self.store.as_ref(), self.last_fix.as_ref()) else {
            return;
        };
        if let Err(e) = store.save(fix) {
            warn!("Unable to save the last position: {}", e);
        }
    }
}

/// Location the client already knows right after starting, if any.
async fn initial_notification(
    provider: &dyn LocationProvider,
    client: &dyn ClientProxy,
) -> Option<Notification> {
    match client.current_location().await {
        Ok(path) if !path.is_unset() => {
            let reading = provider.location(&path).await;
            Some(Notification {
                old: ObjectPath::default(),
                new: path,
                reading,
            })
        }
        Ok(_) => None,
        Err(e) => {
            debug!("No current location on {}: {}", client.path(), e);
            None
        }
    }
}
