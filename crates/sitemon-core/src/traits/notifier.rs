// # Notifier Trait
//
// Delivers a change set for one site to whatever sink the deployment uses.
// The engine treats every notifier failure as non-fatal: it is logged and
// the check cycle carries on.

use async_trait::async_trait;

use crate::model::ChangeSet;

/// Trait for notification implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `changes` detected for `site_url`
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Notification handled/sent
    /// - `Ok(false)`: Notifications are not configured
    /// - `Err(Error)`: Delivery failed
    async fn notify(&self, changes: &ChangeSet, site_url: &str) -> Result<bool, crate::Error>;

    /// Notifier name used in logs
    fn name(&self) -> &'static str;
}
