//! Single-shot deadline for `request_update`.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// Single-shot timer polled from the driver's select loop.
#[derive(Debug, Default)]
pub(crate) struct DeadlineTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl DeadlineTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the timer.
    pub(crate) fn start(&mut self, timeout: Duration) {
        self.sleep = Some(Box::pin(sleep(timeout)));
    }

    pub(crate) fn cancel(&mut self) {
        self.sleep = None;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves once when the armed timer fires, and never while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the timer armed.
    pub(crate) async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
