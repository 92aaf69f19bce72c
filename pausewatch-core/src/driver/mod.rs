pub mod container_service;
pub mod database;
pub mod instance;
pub mod instance_group;

use async_trait::async_trait;

use crate::cancel::Cancellation;
use crate::error::Error;
use crate::model::{OperationResult, Resource, ResourceKind};

/// The per-kind contract every resource family implements: enumerate what
/// exists, say whether a given resource is eligible for pause/resume right
/// now, and perform the mutation. `pause`/`resume` never return `Err` for a
/// resource-level failure — they fold it into a failed `OperationResult` so
/// one bad resource never aborts the batch it was scheduled in. `Err` is
/// reserved for `enumerate`, where a whole-kind/region failure is reported
/// to the caller as a discovery warning rather than a per-resource result.
#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn region(&self) -> &str;

    async fn enumerate(&self, cancel: &Cancellation) -> Result<Vec<Resource>, Error>;

    /// Whether `resource` currently satisfies this kind's pausability rule.
    /// Checked by the orchestrator before scheduling a pause; the driver's
    /// `pause` is never called when this returns `false`.
    fn pausable(&self, resource: &Resource) -> bool;

    /// Whether `resource` currently satisfies this kind's resumability rule.
    fn resumable(&self, resource: &Resource) -> bool;

    async fn pause(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult;

    async fn resume(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult;
}
