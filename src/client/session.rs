//! The live client object and its configuration.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::id::SessionId;
use super::MINIMUM_UPDATE_INTERVAL_MS;
use crate::identity::ApplicationIdentity;
use crate::position::{AccuracyLevel, PositioningMethods};
use crate::rpc::ClientProxy;
use crate::Result;

/// Consumer-adjustable settings that shape the client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientSettings {
    /// Requested update interval in milliseconds; 0 means "as fast as possible".
    pub update_interval_ms: u32,
    pub preferred_methods: PositioningMethods,
}

impl ClientSettings {
    /// Settings with the interval normalized: nonzero values below the
    /// minimum update interval are raised to it.
    pub fn with_interval(mut self, update_interval_ms: u32) -> Self {
        self.update_interval_ms = if update_interval_ms == 0 {
            0
        } else {
            update_interval_ms.max(MINIMUM_UPDATE_INTERVAL_MS)
        };
        self
    }

    pub fn with_methods(mut self, methods: PositioningMethods) -> Self {
        self.preferred_methods = methods;
        self
    }

    /// Resolve the properties to push to a client.
    pub fn configuration(&self, identity: &ApplicationIdentity) -> Result<ClientConfiguration> {
        Ok(ClientConfiguration {
            desktop_id: identity.desktop_id()?,
            time_threshold_secs: self.update_interval_ms / 1000,
            accuracy: self.preferred_methods.requested_accuracy(),
        })
    }
}

/// Properties set on a client before it is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    pub desktop_id: String,
    pub time_threshold_secs: u32,
    pub accuracy: AccuracyLevel,
}

impl ClientConfiguration {
    /// Push every property. Failed setters are logged and skipped.
    pub async fn apply(&self, client: &dyn ClientProxy) {
        if let Err(e) = client.set_desktop_id(&self.desktop_id).await {
            warn!("Unable to set the desktop id on {}: {}", client.path(), e);
        }
        if let Err(e) = client.set_time_threshold(self.time_threshold_secs).await {
            warn!("Unable to set the time threshold on {}: {}", client.path(), e);
        }
        if let Err(e) = client.set_requested_accuracy_level(self.accuracy).await {
            warn!("Unable to set the accuracy level on {}: {}", client.path(), e);
        }
        debug!(
            "Configured {}: desktop id {}, threshold {}s, accuracy {:?}",
            client.path(),
            self.desktop_id,
            self.time_threshold_secs,
            self.accuracy
        );
    }
}

/// The one client object owned by the driver.
///
/// Configuration pushed after start goes through a per-session queue so
/// that the last setting requested is the last one applied. Dropping the
/// handle stops forwarding signals and drops queued configuration.
pub(crate) struct SessionHandle {
    id: SessionId,
    client: Arc<dyn ClientProxy>,
    applied: ClientConfiguration,
    listener: Option<JoinHandle<()>>,
    configurator: Option<(mpsc::UnboundedSender<ClientConfiguration>, JoinHandle<()>)>,
}

impl SessionHandle {
    /// Handle for a client that is being set up with `applied`.
    pub(crate) fn new(client: Arc<dyn ClientProxy>, applied: ClientConfiguration) -> Self {
        Self {
            id: SessionId::new(),
            client,
            applied,
            listener: None,
            configurator: None,
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn client(&self) -> Arc<dyn ClientProxy> {
        Arc::clone(&self.client)
    }

    pub(crate) fn set_listener(&mut self, listener: JoinHandle<()>) {
        if let Some(previous) = self.listener.replace(listener) {
            previous.abort();
        }
    }

    /// Queue `configuration` unless it is what the client already has.
    ///
    /// Returns whether anything was queued.
    pub(crate) fn push(&mut self, configuration: ClientConfiguration) -> bool {
        if configuration == self.applied {
            return false;
        }
        self.applied = configuration.clone();

        let client = Arc::clone(&self.client);
        let (queue, _) = self.configurator.get_or_insert_with(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<ClientConfiguration>();
            let task = tokio::spawn(async move {
                while let Some(configuration) = rx.recv().await {
                    configuration.apply(client.as_ref()).await;
                }
            });
            (tx, task)
        });
        queue.send(configuration).is_ok()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some((_, task)) = self.configurator.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("path", self.client.path())
            .field("applied", &self.applied)
            .finish()
    }
}
