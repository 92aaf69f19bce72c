use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::Driver;
use crate::cancel::Cancellation;
use crate::error::Error;
use crate::model::{Operation, OperationResult, Resource, ResourceKind};
use crate::wait::poll_until_converged;

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const SCALING_PROCESSES: [&str; 8] = [
    "Launch",
    "Terminate",
    "HealthCheck",
    "ReplaceUnhealthy",
    "AZRebalance",
    "AlarmNotification",
    "ScheduledActions",
    "AddToLoadBalancer",
];

/// Drives Auto Scaling Groups. Pausing suspends the eight scaling processes
/// and drains desired capacity to zero; resuming restores both, reading the
/// pre-pause desired capacity back out of `metadata.desired_capacity` since
/// the live ASG itself no longer remembers it once scaled to zero.
pub struct InstanceGroupDriver {
    client: aws_sdk_autoscaling::Client,
    region: String,
}

impl InstanceGroupDriver {
    pub fn new(client: aws_sdk_autoscaling::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn derive_state(desired_capacity: i32, suspended: bool) -> &'static str {
        match (suspended, desired_capacity) {
            (true, 0) => "paused",
            (true, _) => "suspended",
            (false, 0) => "stopped",
            (false, n) if n > 0 => "running",
            _ => "unknown",
        }
    }

    async fn in_service_count(&self, name: &str) -> Result<Option<usize>, Error> {
        let resp = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(|e| Error::service("instance-group", self.region.clone(), e.to_string()))?;

        let Some(group) = resp.auto_scaling_groups().first() else {
            return Ok(None);
        };
        Ok(Some(
            group
                .instances()
                .iter()
                .filter(|i| i.lifecycle_state().map(|s| s.as_str()) == Some("InService"))
                .count(),
        ))
    }
}

#[async_trait]
impl Driver for InstanceGroupDriver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::InstanceGroup
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn enumerate(&self, _cancel: &Cancellation) -> Result<Vec<Resource>, Error> {
        let mut resources = Vec::new();
        let mut paginator = self.client.describe_auto_scaling_groups().into_paginator().send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| Error::service("instance-group", self.region.clone(), e.to_string()))?;
            for asg in page.auto_scaling_groups() {
                let id = asg.auto_scaling_group_name().to_string();
                if id.is_empty() || id.contains(':') {
                    continue;
                }

                let tags = asg
                    .tags()
                    .iter()
                    .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                    .collect();

                let suspended_processes: Vec<String> = asg
                    .suspended_processes()
                    .iter()
                    .filter_map(|p| p.process_name())
                    .map(String::from)
                    .collect();
                let desired_capacity = asg.desired_capacity();
                let state = Self::derive_state(desired_capacity, !suspended_processes.is_empty());

                let instances: Vec<_> = asg
                    .instances()
                    .iter()
                    .map(|i| {
                        json!({
                            "instance_id": i.instance_id(),
                            "lifecycle_state": i.lifecycle_state().map(|s| s.as_str()),
                            "health_status": i.health_status(),
                        })
                    })
                    .collect();

                let launch_template = asg.launch_template().map(|lt| {
                    json!({
                        "launch_template_id": lt.launch_template_id(),
                        "launch_template_name": lt.launch_template_name(),
                        "version": lt.version(),
                    })
                });
                let mixed_instances_policy = asg.mixed_instances_policy().map(|p| {
                    json!({
                        "launch_template": p.launch_template().map(|lt| {
                            json!({
                                "launch_template_specification": lt.launch_template_specification().map(|s| {
                                    json!({
                                        "launch_template_id": s.launch_template_id(),
                                        "launch_template_name": s.launch_template_name(),
                                        "version": s.version(),
                                    })
                                }),
                            })
                        }),
                        "instances_distribution": p.instances_distribution().is_some(),
                    })
                });

                let metadata = json!({
                    "desired_capacity": desired_capacity,
                    "min_size": asg.min_size(),
                    "max_size": asg.max_size(),
                    "availability_zones": asg.availability_zones(),
                    "suspended_processes": suspended_processes,
                    "instances": instances,
                    "target_group_arns": asg.target_group_arns(),
                    "load_balancer_names": asg.load_balancer_names(),
                    "launch_configuration_name": asg.launch_configuration_name(),
                    "launch_template": launch_template,
                    "mixed_instances_policy": mixed_instances_policy,
                });

                resources.push(Resource {
                    kind: ResourceKind::InstanceGroup,
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
        matches!(resource.state.as_str(), "running" | "suspended")
    }

    fn resumable(&self, resource: &Resource) -> bool {
        matches!(resource.state.as_str(), "stopped" | "paused" | "suspended")
    }

    async fn pause(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();
        let name = resource.id.clone();

        if resource.state == "paused" {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("auto scaling group {name} is already paused"),
            );
        }

        if let Err(e) = self
            .client
            .suspend_processes()
            .auto_scaling_group_name(&name)
            .set_scaling_processes(Some(SCALING_PROCESSES.iter().map(|s| s.to_string()).collect()))
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("failed to suspend processes for {name}: {e}"),
            );
        }

        if let Err(e) = self
            .client
            .set_desired_capacity()
            .auto_scaling_group_name(&name)
            .desired_capacity(0)
            .honor_cooldown(false)
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("failed to drain capacity for {name}: {e}"),
            );
        }

        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let name = name.clone();
            async move { Ok(self.in_service_count(&name).await?.unwrap_or(0) == 0) }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(resource.clone(), Operation::Pause, format!("paused auto scaling group {name}"))
                .with_duration(duration),
            Err(Error::Cancelled) => {
                OperationResult::failed(resource.clone(), Operation::Pause, format!("cancelled while pausing {name}"))
                    .with_duration(duration)
            }
            Err(e) => {
                OperationResult::failed(resource.clone(), Operation::Pause, format!("failed to pause {name}: {e}"))
                    .with_duration(duration)
            }
        }
    }

    async fn resume(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();
        let name = resource.id.clone();

        if resource.state == "running" {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("auto scaling group {name} is already running"),
            );
        }

        let original_capacity = resource
            .metadata_field("desired_capacity")
            .and_then(|v| v.as_i64())
            .unwrap_or(1) as i32;

        if let Err(e) = self
            .client
            .resume_processes()
            .auto_scaling_group_name(&name)
            .set_scaling_processes(Some(SCALING_PROCESSES.iter().map(|s| s.to_string()).collect()))
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("failed to resume processes for {name}: {e}"),
            );
        }

        if let Err(e) = self
            .client
            .set_desired_capacity()
            .auto_scaling_group_name(&name)
            .desired_capacity(original_capacity)
            .honor_cooldown(false)
            .send()
            .await
        {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("failed to restore capacity for {name}: {e}"),
            );
        }

        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let name = name.clone();
            async move { Ok(self.in_service_count(&name).await?.unwrap_or(0) as i32 == original_capacity) }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(
                resource.clone(),
                Operation::Resume,
                format!("resumed auto scaling group {name} with {original_capacity} instances"),
            )
            .with_duration(duration),
            Err(Error::Cancelled) => {
                OperationResult::failed(resource.clone(), Operation::Resume, format!("cancelled while resuming {name}"))
                    .with_duration(duration)
            }
            Err(e) => {
                OperationResult::failed(resource.clone(), Operation::Resume, format!("failed to resume {name}: {e}"))
                    .with_duration(duration)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_state_combines_suspension_and_capacity() {
        assert_eq!(InstanceGroupDriver::derive_state(0, true), "paused");
        assert_eq!(InstanceGroupDriver::derive_state(3, true), "suspended");
        assert_eq!(InstanceGroupDriver::derive_state(0, false), "stopped");
        assert_eq!(InstanceGroupDriver::derive_state(3, false), "running");
    }
}
