//! Application identity sent to the location service as the desktop id.

use crate::error::GeoclueError;
use crate::Result;

/// Environment variable that overrides the desktop id.
pub const DESKTOP_ID_ENV: &str = "GEOCLUE_APP_DESKTOP_ID";

/// Identity of the calling application.
///
/// The desktop id is looked up on every configuration pass, so changes to
/// the environment take effect on the next session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationIdentity {
    application_name: Option<String>,
}

impl ApplicationIdentity {
    /// Identity falling back to `application_name` when the override is unset.
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: Some(application_name.into()),
        }
    }

    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }

    /// Resolve the desktop id: environment override, then application name.
    pub fn desktop_id(&self) -> Result<String> {
        self.resolve(std::env::var(DESKTOP_ID_ENV).ok())
    }

    fn resolve(&self, env_override: Option<String>) -> Result<String> {
        env_override
            .filter(|id| !id.is_empty())
            .or_else(|| self.application_name.clone().filter(|n| !n.is_empty()))
            .ok_or(GeoclueError::MissingDesktopId)
    }
}
