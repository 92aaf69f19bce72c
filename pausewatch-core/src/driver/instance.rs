use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::Driver;
use crate::cancel::Cancellation;
use crate::error::Error;
use crate::model::{Operation, OperationResult, Resource, ResourceKind};
use crate::wait::retry_with_backoff;

const STOP_START_ATTEMPTS: u32 = 4;

/// Drives EC2 instances: start/stop, no convergence wait. Stop/start calls
/// return as soon as the API accepts them; `pause`/`resume` only do a best
/// effort state re-check afterward and treat a successful API call as
/// success even if the state hasn't visibly moved yet.
pub struct InstanceDriver {
    client: aws_sdk_ec2::Client,
    region: String,
}

impl InstanceDriver {
    pub fn new(client: aws_sdk_ec2::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl Driver for InstanceDriver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Instance
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn enumerate(&self, _cancel: &Cancellation) -> Result<Vec<Resource>, Error> {
        let mut resources = Vec::new();
        let mut paginator = self.client.describe_instances().into_paginator().send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| {
                Error::service("instance", self.region.clone(), e.to_string())
            })?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let state = instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default();
                    if state == "terminated" {
                        continue;
                    }

                    let id = instance.instance_id().unwrap_or_default().to_string();
                    if id.is_empty() || id.contains(':') || self.region.contains(':') {
                        continue;
                    }

                    let tags = instance
                        .tags()
                        .iter()
                        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                        .collect();

                    let metadata = json!({
                        "instance_type": instance.instance_type().map(|t| t.as_str()),
                        "launch_time": instance.launch_time().map(|t| t.to_string()),
                        "availability_zone": instance.placement().and_then(|p| p.availability_zone()),
                        "vpc_id": instance.vpc_id(),
                        "subnet_id": instance.subnet_id(),
                        "private_ip": instance.private_ip_address(),
                        "public_ip": instance.public_ip_address(),
                        "platform": instance.platform().map(|p| p.as_str()).unwrap_or("linux"),
                    });

                    resources.push(Resource {
                        kind: ResourceKind::Instance,
                        id,
                        region: self.region.clone(),
                        state,
                        tags,
                        metadata,
                        cost_hint: None,
                    });
                }
            }
        }

        Ok(resources)
    }

    fn pausable(&self, resource: &Resource) -> bool {
        resource.state == "running"
    }

    fn resumable(&self, resource: &Resource) -> bool {
        matches!(resource.state.as_str(), "stopped" | "stopping")
    }

    async fn pause(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        if resource.state != "running" {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!(
                    "instance {} is not running (current state: {})",
                    resource.id, resource.state
                ),
            );
        }

        let id = resource.id.clone();
        match retry_with_backoff(&cancel.token(), STOP_START_ATTEMPTS, || {
            let id = id.clone();
            async move {
                self.client
                    .stop_instances()
                    .instance_ids(id.clone())
                    .send()
                    .await
                    .map_err(|e| Error::service("instance", self.region.clone(), e.to_string()))
            }
        })
        .await
        {
            Ok(_) => {
                let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
                OperationResult::ok(
                    resource.clone(),
                    Operation::Pause,
                    format!("stopped instance {}", resource.id),
                )
                .with_duration(duration)
            }
            Err(e) => {
                let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
                OperationResult::failed(
                    resource.clone(),
                    Operation::Pause,
                    format!("failed to stop instance {}: {e}", resource.id),
                )
                .with_duration(duration)
            }
        }
    }

    async fn resume(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        if !self.resumable(resource) {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!(
                    "instance {} is not stopped (current state: {})",
                    resource.id, resource.state
                ),
            );
        }

        let id = resource.id.clone();
        match retry_with_backoff(&cancel.token(), STOP_START_ATTEMPTS, || {
            let id = id.clone();
            async move {
                self.client
                    .start_instances()
                    .instance_ids(id.clone())
                    .send()
                    .await
                    .map_err(|e| Error::service("instance", self.region.clone(), e.to_string()))
            }
        })
        .await
        {
            Ok(_) => {
                let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
                OperationResult::ok(
                    resource.clone(),
                    Operation::Resume,
                    format!("started instance {}", resource.id),
                )
                .with_duration(duration)
            }
            Err(e) => {
                let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
                OperationResult::failed(
                    resource.clone(),
                    Operation::Resume,
                    format!("failed to start instance {}: {e}", resource.id),
                )
                .with_duration(duration)
            }
        }
    }
}
