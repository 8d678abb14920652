//! Automation registry port — the durable key-value store of automation records.

use std::future::Future;

use homeflow_domain::automation::Automation;
use homeflow_domain::error::HomeflowError;
use homeflow_domain::id::AutomationId;

/// Key-value registry of [`Automation`] records, keyed by automation id.
///
/// The registry is shared with other services; records may be written by
/// anyone at any time. The engine only lists, reads, and writes back run
/// metadata.
pub trait AutomationRegistry {
    /// List every key currently stored.
    fn keys(&self) -> impl Future<Output = Result<Vec<AutomationId>, HomeflowError>> + Send;

    /// Read one record.
    ///
    /// Returns `Ok(None)` when the key does not exist and
    /// [`HomeflowError::Decode`] when the stored record is malformed.
    fn get(
        &self,
        id: &AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HomeflowError>> + Send;

    /// Create or replace one record.
    fn put(&self, automation: &Automation)
    -> impl Future<Output = Result<(), HomeflowError>> + Send;
}

impl<T: AutomationRegistry + Send + Sync> AutomationRegistry for std::sync::Arc<T> {
    fn keys(&self) -> impl Future<Output = Result<Vec<AutomationId>, HomeflowError>> + Send {
        (**self).keys()
    }

    fn get(
        &self,
        id: &AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HomeflowError>> + Send {
        (**self).get(id)
    }

    fn put(
        &self,
        automation: &Automation,
    ) -> impl Future<Output = Result<(), HomeflowError>> + Send {
        (**self).put(automation)
    }
}
