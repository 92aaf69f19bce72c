use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cancel::Cancellation;
use crate::error::Error;
use crate::model::{Operation, OperationResult, Resource, ResourceKind};
use crate::registry::{DriverFactory, Registry};
use crate::snapshot::{OriginalState, Snapshot};

const DISCOVERY_CONCURRENCY: usize = 10;
const MUTATION_CONCURRENCY: usize = 5;

/// Result of a `DiscoverAll` call: the union of every `(kind, region)` pair
/// that succeeded, plus a warning per pair that failed. Only signals a hard
/// error when every scheduled pair failed — a handful of failing pairs is
/// reported, not propagated.
pub struct DiscoveryOutcome {
    pub resources: Vec<Resource>,
    pub warnings: Vec<String>,
}

pub struct Orchestrator<F: DriverFactory> {
    registry: Arc<Registry<F>>,
}

impl<F: DriverFactory + 'static> Orchestrator<F> {
    pub fn new(registry: Registry<F>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub async fn discover_all(
        &self,
        kinds: &[ResourceKind],
        regions: &[String],
        cancel: &Cancellation,
    ) -> Result<DiscoveryOutcome, Error> {
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(DISCOVERY_CONCURRENCY));
        let mut tasks = JoinSet::new();
        let mut scheduled = 0usize;

        'pairs: for &kind in kinds {
            for region in regions {
                if cancel.is_cancelled() {
                    break 'pairs;
                }
                scheduled += 1;
                let registry = self.registry.clone();
                let region = region.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    let driver = match registry.get(kind, &region).await {
                        Ok(d) => d,
                        Err(e) => return Err((kind, region, e)),
                    };
                    driver.enumerate(&cancel).await.map_err(|e| (kind, region, e))
                });
            }
        }

        let mut resources = Vec::new();
        let mut warnings = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(found)) => resources.extend(found),
                Ok(Err((kind, region, e))) => {
                    warn!(%kind, %region, error = %e, "discovery failed for kind/region pair");
                    warnings.push(format!("{kind}/{region}: {e}"));
                }
                Err(join_err) => {
                    warn!(error = %join_err, "discovery task panicked");
                    warnings.push(format!("discovery task panicked: {join_err}"));
                }
            }
            if cancel.is_cancelled() {
                break;
            }
        }

        if scheduled > 0 && warnings.len() == scheduled && resources.is_empty() {
            return Err(Error::State(format!(
                "all {scheduled} discovery pairs failed: {}",
                warnings.join("; ")
            )));
        }

        info!(
            %run_id,
            resources = resources.len(),
            warnings = warnings.len(),
            "discovery complete"
        );
        Ok(DiscoveryOutcome { resources, warnings })
    }

    /// Resolves a driver per resource and reports which of `resources`
    /// would actually be paused, splitting out anything that fails its
    /// pausability gate into the same "already ..." failed `OperationResult`
    /// the real pause path produces. Used by dry runs so they don't claim a
    /// pause would happen where `pause` would in fact skip the resource.
    pub async fn gate_pausable<'a>(&self, resources: &[&'a Resource]) -> (Vec<&'a Resource>, Vec<OperationResult>) {
        let mut pausable = Vec::new();
        let mut gated = Vec::new();

        for &resource in resources {
            let driver = match self.registry.get(resource.kind, &resource.region).await {
                Ok(d) => d,
                Err(e) => {
                    gated.push(OperationResult::failed(
                        resource.clone(),
                        Operation::Pause,
                        format!("no driver available for {}: {e}", resource.kind),
                    ));
                    continue;
                }
            };
            if driver.pausable(resource) {
                pausable.push(resource);
            } else {
                gated.push(OperationResult::failed(
                    resource.clone(),
                    Operation::Pause,
                    format!("{} {} is already {}", resource.kind, resource.id, resource.state),
                ));
            }
        }

        (pausable, gated)
    }

    /// Freezes `original_states` before any mutation, then fans pause calls
    /// out over a bounded pool. A resource failing the pausability gate
    /// never reaches a driver — it gets a failed result directly.
    pub async fn pause(&self, resources: &[Resource], cancel: &Cancellation) -> Snapshot {
        let run_id = Uuid::new_v4();
        info!(%run_id, resources = resources.len(), "pause run starting");

        let original_states: HashMap<String, OriginalState> = resources
            .iter()
            .map(|r| (r.composite_key(), OriginalState::from_resource(r)))
            .collect();

        let semaphore = Arc::new(Semaphore::new(MUTATION_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for resource in resources {
            if cancel.is_cancelled() {
                break;
            }
            let registry = self.registry.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let resource = resource.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let driver = match registry.get(resource.kind, &resource.region).await {
                    Ok(d) => d,
                    Err(e) => {
                        return OperationResult::failed(
                            resource.clone(),
                            Operation::Pause,
                            format!("no driver available for {}: {e}", resource.kind),
                        )
                    }
                };
                if !driver.pausable(&resource) {
                    return OperationResult::failed(
                        resource.clone(),
                        Operation::Pause,
                        format!("{} {} is already {}", resource.kind, resource.id, resource.state),
                    );
                }
                driver.pause(&resource, &cancel).await
            });
        }

        let mut operation_results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => operation_results.push(result),
                Err(join_err) => warn!(error = %join_err, "pause task panicked"),
            }
            if cancel.is_cancelled() {
                break;
            }
        }

        let estimated_monthly_savings: f64 = resources
            .iter()
            .filter_map(|r| r.cost_hint)
            .map(|hourly| hourly * 24.0 * 30.0)
            .sum();

        info!(%run_id, "pause run complete");
        Snapshot::new(resources.to_vec(), original_states, operation_results, estimated_monthly_savings)
    }

    /// Invokes resume on every resource in the snapshot unconditionally —
    /// there is no orchestrator-level resumability gate; each driver's own
    /// `resume` decides whether the resource it was captured as is
    /// currently eligible.
    pub async fn resume(&self, snapshot: &Snapshot, cancel: &Cancellation) -> Result<Vec<OperationResult>, Error> {
        snapshot.validate()?;
        let run_id = Uuid::new_v4();
        info!(%run_id, snapshot_id = %snapshot.id, "resume run starting");

        let semaphore = Arc::new(Semaphore::new(MUTATION_CONCURRENCY));
        let mut tasks = JoinSet::new();

        for resource in &snapshot.resources {
            if cancel.is_cancelled() {
                break;
            }
            let registry = self.registry.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let resource = resource.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let driver = match registry.get(resource.kind, &resource.region).await {
                    Ok(d) => d,
                    Err(e) => {
                        return OperationResult::failed(
                            resource.clone(),
                            Operation::Resume,
                            format!("no driver available for {}: {e}", resource.kind),
                        )
                    }
                };
                driver.resume(&resource, &cancel).await
            });
        }

        let mut operation_results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => operation_results.push(result),
                Err(join_err) => warn!(error = %join_err, "resume task panicked"),
            }
            if cancel.is_cancelled() {
                break;
            }
        }

        info!(%run_id, "resume run complete");
        Ok(operation_results)
    }
}

/// Counts, success ratio, per-kind breakdown and failure descriptors over a
/// result sequence. Pure function, no I/O.
#[derive(Debug, Clone)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub total_duration_seconds: f64,
    pub by_kind: HashMap<ResourceKind, usize>,
    pub failures: Vec<FailureDescriptor>,
}

#[derive(Debug, Clone)]
pub struct FailureDescriptor {
    pub kind: ResourceKind,
    pub id: String,
    pub region: String,
    pub message: String,
}

pub fn summarize(results: &[OperationResult]) -> Summary {
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = total - succeeded;
    let success_rate = if total == 0 { 0.0 } else { succeeded as f64 / total as f64 };
    let total_duration_seconds = results.iter().filter_map(|r| r.duration_seconds).sum();

    let mut by_kind: HashMap<ResourceKind, usize> = HashMap::new();
    for r in results {
        *by_kind.entry(r.resource.kind).or_insert(0) += 1;
    }

    let failures = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| FailureDescriptor {
            kind: r.resource.kind,
            id: r.resource.id.clone(),
            region: r.resource.region.clone(),
            message: r.message.clone(),
        })
        .collect();

    Summary {
        total,
        succeeded,
        failed,
        success_rate,
        total_duration_seconds,
        by_kind,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;
    use std::collections::BTreeMap;

    fn result(kind: ResourceKind, success: bool, duration: Option<f64>) -> OperationResult {
        let resource = Resource {
            kind,
            id: "r-1".into(),
            region: "us-east-1".into(),
            state: "running".into(),
            tags: BTreeMap::new(),
            metadata: serde_json::json!({}),
            cost_hint: None,
        };
        let mut r = if success {
            OperationResult::ok(resource, Operation::Pause, "ok")
        } else {
            OperationResult::failed(resource, Operation::Pause, "boom")
        };
        r.duration_seconds = duration;
        r
    }

    #[test]
    fn by_kind_breakdown_sums_to_total() {
        let results = vec![
            result(ResourceKind::Instance, true, Some(1.0)),
            result(ResourceKind::Instance, false, Some(2.0)),
            result(ResourceKind::Database, true, None),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.by_kind.values().sum::<usize>(), summary.total);
        assert!((summary.success_rate - (2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(summary.total_duration_seconds, 3.0);
        assert_eq!(summary.failures.len(), 1);
    }

    #[test]
    fn empty_results_give_zero_success_rate_not_nan() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
    }

    fn instance(id: &str, region: &str, state: &str) -> Resource {
        Resource {
            kind: ResourceKind::Instance,
            id: id.into(),
            region: region.into(),
            state: state.into(),
            tags: BTreeMap::new(),
            metadata: serde_json::json!({}),
            cost_hint: Some(0.5),
        }
    }

    fn fixture_orchestrator() -> Orchestrator<crate::testing::FakeDriverFactory> {
        let factory = crate::testing::FakeDriverFactory::new();
        factory.register(crate::testing::FakeDriver::new(
            ResourceKind::Instance,
            "us-east-1",
            vec![instance("i-1", "us-east-1", "running"), instance("i-2", "us-east-1", "stopped")],
        ));
        factory.register(crate::testing::FakeDriver::new(ResourceKind::Database, "us-east-1", Vec::new()));
        Orchestrator::new(Registry::new(factory))
    }

    #[tokio::test]
    async fn discover_all_enumerates_every_scheduled_pair() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let outcome = orchestrator
            .discover_all(&[ResourceKind::Instance, ResourceKind::Database], &["us-east-1".to_string()], &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.resources.len(), 2);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn discover_all_with_no_pairs_returns_empty_not_an_error() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let outcome = orchestrator.discover_all(&[], &[], &cancel).await.unwrap();
        assert!(outcome.resources.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn discover_all_fails_when_every_pair_errors() {
        let factory = crate::testing::FakeDriverFactory::new();
        let orchestrator = Orchestrator::new(Registry::new(factory));
        let cancel = Cancellation::new();
        let result = orchestrator
            .discover_all(&[ResourceKind::Instance], &["us-east-1".to_string()], &cancel)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pause_gates_non_pausable_resources_without_calling_the_driver() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let resources = vec![instance("i-1", "us-east-1", "running"), instance("i-2", "us-east-1", "stopped")];
        let snapshot = orchestrator.pause(&resources, &cancel).await;

        let results: HashMap<_, _> = snapshot
            .operation_results
            .iter()
            .map(|r| (r.resource.id.clone(), r))
            .collect();
        assert!(results["i-1"].success);
        assert!(!results["i-2"].success);
        assert!(results["i-2"].message.contains("already stopped"));
    }

    #[tokio::test]
    async fn pause_freezes_original_states_for_every_input_resource() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let resources = vec![instance("i-1", "us-east-1", "running"), instance("i-2", "us-east-1", "stopped")];
        let snapshot = orchestrator.pause(&resources, &cancel).await;

        assert_eq!(snapshot.original_states.len(), resources.len());
        for r in &resources {
            assert_eq!(snapshot.original_states[&r.composite_key()].state, r.state);
        }
        assert!((snapshot.estimated_monthly_savings - 2.0 * 0.5 * 24.0 * 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_through_a_snapshot() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let resources = vec![instance("i-1", "us-east-1", "running")];
        let snapshot = orchestrator.pause(&resources, &cancel).await;
        assert!(snapshot.operation_results[0].success);

        let results = orchestrator.resume(&snapshot, &cancel).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].resource.state, "running");
    }

    #[tokio::test]
    async fn resume_rejects_a_snapshot_with_no_original_states() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        let resource = instance("i-1", "us-east-1", "running");
        let snapshot = crate::snapshot::Snapshot::new(vec![resource], HashMap::new(), Vec::new(), 0.0);
        assert!(orchestrator.resume(&snapshot, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn gate_pausable_splits_pausable_from_already_stopped() {
        let orchestrator = fixture_orchestrator();
        let running = instance("i-1", "us-east-1", "running");
        let stopped = instance("i-2", "us-east-1", "stopped");
        let resources = vec![&running, &stopped];

        let (pausable, gated) = orchestrator.gate_pausable(&resources).await;
        assert_eq!(pausable.len(), 1);
        assert_eq!(pausable[0].id, "i-1");
        assert_eq!(gated.len(), 1);
        assert!(!gated[0].success);
        assert!(gated[0].message.contains("already stopped"));
    }

    #[tokio::test]
    async fn cancelling_before_pause_starts_skips_every_resource() {
        let orchestrator = fixture_orchestrator();
        let cancel = Cancellation::new();
        cancel.request_cancel();
        let resources = vec![instance("i-1", "us-east-1", "running"), instance("i-2", "us-east-1", "running")];
        let snapshot = orchestrator.pause(&resources, &cancel).await;
        assert!(snapshot.operation_results.is_empty());
    }
}
