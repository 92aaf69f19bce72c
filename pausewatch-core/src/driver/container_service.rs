use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::Driver;
use crate::cancel::Cancellation;
use crate::error::Error;
use crate::model::{Operation, OperationResult, Resource, ResourceKind};
use crate::wait::poll_until_converged;

const POLL_INTERVAL: Duration = Duration::from_secs(15);
const POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Drives ECS services. Pause/resume scale `desiredCount` and wait for the
/// service's running count to catch up; the cluster ARN the service lives
/// in is carried in `metadata.cluster_arn` since `update_service` needs it
/// alongside the service name.
pub struct ContainerServiceDriver {
    client: aws_sdk_ecs::Client,
    region: String,
}

impl ContainerServiceDriver {
    pub fn new(client: aws_sdk_ecs::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn derive_state(desired_count: i32, running_count: i32) -> &'static str {
        if desired_count == 0 {
            "stopped"
        } else if running_count == desired_count {
            "running"
        } else if running_count < desired_count {
            "scaling_up"
        } else {
            "scaling_down"
        }
    }

    fn cluster_arn(resource: &Resource) -> Option<String> {
        resource.metadata_field("cluster_arn").and_then(|v| v.as_str()).map(String::from)
    }

    async fn counts(&self, cluster_arn: &str, service: &str) -> Result<Option<(i32, i32)>, Error> {
        let resp = self
            .client
            .describe_services()
            .cluster(cluster_arn)
            .services(service)
            .send()
            .await
            .map_err(|e| Error::service("container-service", self.region.clone(), e.to_string()))?;
        Ok(resp
            .services()
            .first()
            .map(|s| (s.desired_count(), s.running_count())))
    }
}

#[async_trait]
impl Driver for ContainerServiceDriver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ContainerService
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn enumerate(&self, _cancel: &Cancellation) -> Result<Vec<Resource>, Error> {
        let cluster_arns: Vec<String> = self
            .client
            .list_clusters()
            .send()
            .await
            .map_err(|e| Error::service("container-service", self.region.clone(), e.to_string()))?
            .cluster_arns()
            .to_vec();

        if cluster_arns.is_empty() {
            return Ok(Vec::new());
        }

        let clusters = self
            .client
            .describe_clusters()
            .set_clusters(Some(cluster_arns))
            .send()
            .await
            .map_err(|e| Error::service("container-service", self.region.clone(), e.to_string()))?;

        let mut resources = Vec::new();

        for cluster in clusters.clusters() {
            if cluster.status() != Some("ACTIVE") {
                continue;
            }
            let cluster_name = cluster.cluster_name().unwrap_or_default().to_string();
            let cluster_arn = cluster.cluster_arn().unwrap_or_default().to_string();

            let service_arns: Vec<String> = self
                .client
                .list_services()
                .cluster(&cluster_arn)
                .send()
                .await
                .map_err(|e| Error::service("container-service", self.region.clone(), e.to_string()))?
                .service_arns()
                .to_vec();

            if service_arns.is_empty() {
                continue;
            }

            let services = self
                .client
                .describe_services()
                .cluster(&cluster_arn)
                .set_services(Some(service_arns))
                .send()
                .await
                .map_err(|e| Error::service("container-service", self.region.clone(), e.to_string()))?;

            for service in services.services() {
                if service.status() != Some("ACTIVE") {
                    continue;
                }

                let id = service.service_name().unwrap_or_default().to_string();
                if id.is_empty() || id.contains(':') {
                    continue;
                }

                let tags = self
                    .client
                    .list_tags_for_resource()
                    .resource_arn(service.service_arn().unwrap_or_default())
                    .send()
                    .await
                    .ok()
                    .map(|r| {
                        r.tags()
                            .iter()
                            .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                            .collect()
                    })
                    .unwrap_or_default();

                let desired_count = service.desired_count();
                let running_count = service.running_count();
                let state = Self::derive_state(desired_count, running_count);

                let network_configuration = service.network_configuration().and_then(|nc| nc.awsvpc_configuration()).map(|vpc| {
                    json!({
                        "subnets": vpc.subnets(),
                        "security_groups": vpc.security_groups(),
                        "assign_public_ip": vpc.assign_public_ip().map(|v| v.as_str()),
                    })
                });
                let load_balancers: Vec<_> = service
                    .load_balancers()
                    .iter()
                    .map(|lb| {
                        json!({
                            "target_group_arn": lb.target_group_arn(),
                            "load_balancer_name": lb.load_balancer_name(),
                            "container_name": lb.container_name(),
                            "container_port": lb.container_port(),
                        })
                    })
                    .collect();
                let service_registries: Vec<_> = service
                    .service_registries()
                    .iter()
                    .map(|sr| {
                        json!({
                            "registry_arn": sr.registry_arn(),
                            "port": sr.port(),
                            "container_name": sr.container_name(),
                            "container_port": sr.container_port(),
                        })
                    })
                    .collect();

                let metadata = json!({
                    "cluster_name": cluster_name,
                    "cluster_arn": cluster_arn,
                    "service_arn": service.service_arn(),
                    "task_definition": service.task_definition(),
                    "desired_count": desired_count,
                    "running_count": running_count,
                    "pending_count": service.pending_count(),
                    "launch_type": service.launch_type().map(|t| t.as_str()).unwrap_or("EC2"),
                    "network_configuration": network_configuration,
                    "load_balancers": load_balancers,
                    "service_registries": service_registries,
                });

                resources.push(Resource {
                    kind: ResourceKind::ContainerService,
                    id,
                    region: self.region.clone(),
                    state: state.to_string(),
                    tags,
                    metadata,
                    cost_hint: None,
                });
            }
        }

        Ok(resources)
    }

    fn pausable(&self, resource: &Resource) -> bool {
        matches!(resource.state.as_str(), "running" | "scaling_up" | "scaling_down")
    }

    fn resumable(&self, resource: &Resource) -> bool {
        let desired_count = resource.metadata_field("desired_count").and_then(|v| v.as_i64()).unwrap_or(0);
        !(resource.state == "running" && desired_count > 0)
    }

    async fn pause(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        if resource.state == "stopped" {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("ecs service {} is already stopped", resource.id),
            );
        }

        let Some(cluster_arn) = Self::cluster_arn(resource) else {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("ecs service {} has no recorded cluster", resource.id),
            );
        };

        if let Err(e) = self
            .client
            .update_service()
            .cluster(&cluster_arn)
            .service(resource.id.clone())
            .desired_count(0)
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("failed to scale ecs service {} to 0: {e}", resource.id),
            );
        }

        let id = resource.id.clone();
        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let id = id.clone();
            let cluster_arn = cluster_arn.clone();
            async move {
                let counts = self.counts(&cluster_arn, &id).await?;
                Ok(counts.map(|(_, running)| running == 0).unwrap_or(false))
            }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(
                resource.clone(),
                Operation::Pause,
                format!("scaled ecs service {} to 0 tasks", resource.id),
            )
            .with_duration(duration),
            Err(Error::Cancelled) => OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("cancelled while pausing ecs service {}", resource.id),
            )
            .with_duration(duration),
            Err(e) => OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("failed to pause ecs service {}: {e}", resource.id),
            )
            .with_duration(duration),
        }
    }

    async fn resume(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        let original_desired = resource
            .metadata_field("desired_count")
            .and_then(|v| v.as_i64())
            .unwrap_or(1) as i32;

        if resource.state == "running" && original_desired > 0 {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("ecs service {} is already running", resource.id),
            );
        }

        let Some(cluster_arn) = Self::cluster_arn(resource) else {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("ecs service {} has no recorded cluster", resource.id),
            );
        };

        if let Err(e) = self
            .client
            .update_service()
            .cluster(&cluster_arn)
            .service(resource.id.clone())
            .desired_count(original_desired)
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("failed to scale ecs service {} to {original_desired}: {e}", resource.id),
            );
        }

        let id = resource.id.clone();
        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let id = id.clone();
            let cluster_arn = cluster_arn.clone();
            async move {
                let counts = self.counts(&cluster_arn, &id).await?;
                Ok(counts.map(|(desired, running)| running == desired).unwrap_or(false))
            }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(
                resource.clone(),
                Operation::Resume,
                format!("scaled ecs service {} to {original_desired} tasks", resource.id),
            )
            .with_duration(duration),
            Err(Error::Cancelled) => OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("cancelled while resuming ecs service {}", resource.id),
            )
            .with_duration(duration),
            Err(e) => OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("failed to resume ecs service {}: {e}", resource.id),
            )
            .with_duration(duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_state_compares_desired_and_running_counts() {
        assert_eq!(ContainerServiceDriver::derive_state(0, 0), "stopped");
        assert_eq!(ContainerServiceDriver::derive_state(3, 3), "running");
        assert_eq!(ContainerServiceDriver::derive_state(3, 1), "scaling_up");
        assert_eq!(ContainerServiceDriver::derive_state(3, 5), "scaling_down");
    }
}
