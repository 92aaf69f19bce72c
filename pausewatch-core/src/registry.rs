use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::driver::container_service::ContainerServiceDriver;
use crate::driver::database::DatabaseDriver;
use crate::driver::instance::InstanceDriver;
use crate::driver::instance_group::InstanceGroupDriver;
use crate::driver::Driver;
use crate::error::Error;
use crate::model::ResourceKind;
use crate::session::Session;

/// Builds a `Driver` for a given `(kind, region)` pair. Implemented once
/// against a real `Session` for production use, and once in the test
/// harness against in-memory fakes — the registry's cache behavior is the
/// same either way.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn build(&self, kind: ResourceKind, region: &str) -> Result<Arc<dyn Driver>, Error>;
}

/// Builds real AWS-backed drivers from a `Session`. `ResourceKind` is an
/// exhaustive four-variant enum, so there is no "unknown kind" failure mode
/// left to handle here — the type system rules it out before this runs.
pub struct AwsDriverFactory<S: Session> {
    session: Arc<S>,
}

impl<S: Session> AwsDriverFactory<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<S: Session> DriverFactory for AwsDriverFactory<S> {
    async fn build(&self, kind: ResourceKind, region: &str) -> Result<Arc<dyn Driver>, Error> {
        let driver: Arc<dyn Driver> = match kind {
            ResourceKind::Instance => Arc::new(InstanceDriver::new(self.session.ec2_client(region).await?, region)),
            ResourceKind::Database => Arc::new(DatabaseDriver::new(self.session.rds_client(region).await?, region)),
            ResourceKind::ContainerService => {
                Arc::new(ContainerServiceDriver::new(self.session.ecs_client(region).await?, region))
            }
            ResourceKind::InstanceGroup => Arc::new(InstanceGroupDriver::new(
                self.session.autoscaling_client(region).await?,
                region,
            )),
        };
        Ok(driver)
    }
}

/// Caches drivers by `(kind, region)` so the orchestrator never pays for
/// building a client twice in the same run.
pub struct Registry<F: DriverFactory> {
    factory: F,
    cache: Mutex<HashMap<(ResourceKind, String), Arc<dyn Driver>>>,
}

impl<F: DriverFactory> Registry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, kind: ResourceKind, region: &str) -> Result<Arc<dyn Driver>, Error> {
        let key = (kind, region.to_string());
        let mut cache = self.cache.lock().await;
        if let Some(driver) = cache.get(&key) {
            return Ok(driver.clone());
        }
        let driver = self.factory.build(kind, region).await?;
        cache.insert(key, driver.clone());
        Ok(driver)
    }
}
