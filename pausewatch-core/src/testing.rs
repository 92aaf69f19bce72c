//! In-memory fakes used by the orchestrator's own test module. Not exported
//! outside `#[cfg(test)]` builds — there is no production use for a driver
//! that doesn't talk to AWS.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cancel::Cancellation;
use crate::driver::Driver;
use crate::error::Error;
use crate::model::{Operation, OperationResult, Resource, ResourceKind};
use crate::registry::DriverFactory;

/// A scripted resource family: `enumerate` returns a fixed set, `pause`/
/// `resume` flip `state` and always succeed unless the id is listed in
/// `fail_ids`.
pub struct FakeDriver {
    kind: ResourceKind,
    region: String,
    resources: Mutex<HashMap<String, Resource>>,
    fail_ids: Vec<String>,
}

impl FakeDriver {
    pub fn new(kind: ResourceKind, region: impl Into<String>, resources: Vec<Resource>) -> Self {
        let region = region.into();
        let resources = resources.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            kind,
            region,
            resources: Mutex::new(resources),
            fail_ids: Vec::new(),
        }
    }

    pub fn failing(mut self, id: impl Into<String>) -> Self {
        self.fail_ids.push(id.into());
        self
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn enumerate(&self, _cancel: &Cancellation) -> Result<Vec<Resource>, Error> {
        Ok(self.resources.lock().unwrap().values().cloned().collect())
    }

    fn pausable(&self, resource: &Resource) -> bool {
        resource.state == "running"
    }

    fn resumable(&self, resource: &Resource) -> bool {
        resource.state == "stopped"
    }

    async fn pause(&self, resource: &Resource, _cancel: &Cancellation) -> OperationResult {
        if self.fail_ids.contains(&resource.id) {
            return OperationResult::failed(resource.clone(), Operation::Pause, "scripted failure");
        }
        let mut updated = resource.clone();
        updated.state = "stopped".into();
        self.resources.lock().unwrap().insert(updated.id.clone(), updated.clone());
        OperationResult::ok(updated, Operation::Pause, "paused")
    }

    async fn resume(&self, resource: &Resource, _cancel: &Cancellation) -> OperationResult {
        if self.fail_ids.contains(&resource.id) {
            return OperationResult::failed(resource.clone(), Operation::Resume, "scripted failure");
        }
        let mut updated = resource.clone();
        updated.state = "running".into();
        self.resources.lock().unwrap().insert(updated.id.clone(), updated.clone());
        OperationResult::ok(updated, Operation::Resume, "resumed")
    }
}

/// Hands out pre-built `FakeDriver`s keyed by `(kind, region)`, mirroring
/// `AwsDriverFactory` without touching any AWS SDK type.
#[derive(Default)]
pub struct FakeDriverFactory {
    drivers: Mutex<HashMap<(ResourceKind, String), std::sync::Arc<FakeDriver>>>,
}

impl FakeDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, driver: FakeDriver) {
        let key = (driver.kind, driver.region.clone());
        self.drivers.lock().unwrap().insert(key, std::sync::Arc::new(driver));
    }
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn build(&self, kind: ResourceKind, region: &str) -> Result<std::sync::Arc<dyn Driver>, Error> {
        self.drivers
            .lock()
            .unwrap()
            .get(&(kind, region.to_string()))
            .cloned()
            .map(|d| d as std::sync::Arc<dyn Driver>)
            .ok_or_else(|| Error::Configuration(format!("no fake driver registered for {kind}/{region}")))
    }
}
