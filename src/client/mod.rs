//! Client lifecycle management and the public position source.
//!
//! [`PositionSource`] is the consumer-facing handle. It forwards calls to a
//! driver task that owns the remote client and runs the lifecycle state
//! machine described by [`ClientState`].

mod driver;
mod id;
mod session;
mod source;
mod state;
mod timer;

pub use id::SessionId;
pub use session::{ClientConfiguration, ClientSettings};
pub use source::{PositionSource, SourceOptions};
pub use state::{ClientState, Demand};

use std::time::Duration;

use serde::Serialize;

use crate::error::SourceErrorKind;
use crate::position::PositionFix;

/// Smallest accepted update interval and explicit request timeout.
pub const MINIMUM_UPDATE_INTERVAL_MS: u32 = 1000;

/// Deadline for `request_update(0)`.
pub const UPDATE_TIMEOUT_COLD_START: Duration = Duration::from_millis(120_000);

/// Capacity of the consumer event channel.
const EVENT_CAPACITY: usize = 64;

/// Notification delivered to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SourceEvent {
    PositionUpdated(PositionFix),
    ErrorOccurred(SourceErrorKind),
}

/// Observable state of the driver, republished after every message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceSnapshot {
    pub state: ClientState,
    pub demand: Demand,
    pub last_fix: Option<PositionFix>,
    pub error: SourceErrorKind,
}

impl SourceSnapshot {
    /// The client is running exactly when demand is active and no call is
    /// outstanding.
    pub fn is_settled(&self) -> bool {
        !self.state.is_pending() && (self.state == ClientState::Started) == self.demand.is_active()
    }
}
