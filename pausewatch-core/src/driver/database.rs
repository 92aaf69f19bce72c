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
const POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbKind {
    Instance,
    Cluster,
}

/// Drives RDS instances and Aurora clusters. Both stop/start through the
/// same pause/resume contract but use distinct AWS calls; the resource's
/// `metadata.resource_type` field records which, set at enumeration time.
pub struct DatabaseDriver {
    client: aws_sdk_rds::Client,
    region: String,
}

impl DatabaseDriver {
    pub fn new(client: aws_sdk_rds::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn db_kind(resource: &Resource) -> Option<DbKind> {
        match resource.metadata_field("resource_type").and_then(|v| v.as_str()) {
            Some("db_instance") => Some(DbKind::Instance),
            Some("db_cluster") => Some(DbKind::Cluster),
            _ => None,
        }
    }

    async fn instance_status(&self, id: &str) -> Result<Option<String>, Error> {
        let resp = self
            .client
            .describe_db_instances()
            .db_instance_identifier(id)
            .send()
            .await
            .map_err(|e| Error::service("database", self.region.clone(), e.to_string()))?;
        Ok(resp
            .db_instances()
            .first()
            .and_then(|i| i.db_instance_status())
            .map(String::from))
    }

    async fn cluster_status(&self, id: &str) -> Result<Option<String>, Error> {
        let resp = self
            .client
            .describe_db_clusters()
            .db_cluster_identifier(id)
            .send()
            .await
            .map_err(|e| Error::service("database", self.region.clone(), e.to_string()))?;
        Ok(resp.db_clusters().first().and_then(|c| c.status()).map(String::from))
    }
}

#[async_trait]
impl Driver for DatabaseDriver {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn enumerate(&self, _cancel: &Cancellation) -> Result<Vec<Resource>, Error> {
        let mut resources = Vec::new();

        let instances = self
            .client
            .describe_db_instances()
            .send()
            .await
            .map_err(|e| Error::service("database", self.region.clone(), e.to_string()))?;

        for instance in instances.db_instances() {
            let status = instance.db_instance_status().unwrap_or_default().to_string();
            if status == "deleting" {
                continue;
            }
            let id = instance.db_instance_identifier().unwrap_or_default().to_string();
            if id.is_empty() || id.contains(':') {
                continue;
            }

            let tags = self
                .client
                .list_tags_for_resource()
                .resource_name(instance.db_instance_arn().unwrap_or_default())
                .send()
                .await
                .ok()
                .map(|r| {
                    r.tag_list()
                        .iter()
                        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let metadata = json!({
                "engine": instance.engine(),
                "engine_version": instance.engine_version(),
                "instance_class": instance.db_instance_class(),
                "allocated_storage": instance.allocated_storage(),
                "multi_az": instance.multi_az(),
                "availability_zone": instance.availability_zone(),
                "resource_type": "db_instance",
            });

            resources.push(Resource {
                kind: ResourceKind::Database,
                id,
                region: self.region.clone(),
                state: status,
                tags,
                metadata,
                cost_hint: None,
            });
        }

        let clusters = self
            .client
            .describe_db_clusters()
            .send()
            .await
            .map_err(|e| Error::service("database", self.region.clone(), e.to_string()))?;

        for cluster in clusters.db_clusters() {
            let status = cluster.status().unwrap_or_default().to_string();
            if status == "deleting" {
                continue;
            }
            let id = cluster.db_cluster_identifier().unwrap_or_default().to_string();
            if id.is_empty() || id.contains(':') {
                continue;
            }

            let tags = self
                .client
                .list_tags_for_resource()
                .resource_name(cluster.db_cluster_arn().unwrap_or_default())
                .send()
                .await
                .ok()
                .map(|r| {
                    r.tag_list()
                        .iter()
                        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                        .collect()
                })
                .unwrap_or_default();

            let metadata = json!({
                "engine": cluster.engine(),
                "engine_version": cluster.engine_version(),
                "cluster_members": cluster.db_cluster_members().iter().filter_map(|m| m.db_instance_identifier()).collect::<Vec<_>>(),
                "multi_az": cluster.multi_az(),
                "availability_zones": cluster.availability_zones(),
                "resource_type": "db_cluster",
            });

            resources.push(Resource {
                kind: ResourceKind::Database,
                id,
                region: self.region.clone(),
                state: status,
                tags,
                metadata,
                cost_hint: None,
            });
        }

        Ok(resources)
    }

    fn pausable(&self, resource: &Resource) -> bool {
        resource.state == "available"
    }

    fn resumable(&self, resource: &Resource) -> bool {
        resource.state == "stopped"
    }

    async fn pause(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        if !self.pausable(resource) {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!(
                    "database {} cannot be stopped (current state: {})",
                    resource.id, resource.state
                ),
            );
        }

        let Some(db_kind) = Self::db_kind(resource) else {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("unknown database resource type for {}", resource.id),
            );
        };

        let stop = match db_kind {
            DbKind::Instance => {
                self.client
                    .stop_db_instance()
                    .db_instance_identifier(resource.id.clone())
                    .send()
                    .await
                    .map(|_| ())
            }
            DbKind::Cluster => {
                self.client
                    .stop_db_cluster()
                    .db_cluster_identifier(resource.id.clone())
                    .send()
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = stop {
            return OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("failed to stop database {}: {e}", resource.id),
            );
        }

        let id = resource.id.clone();
        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let id = id.clone();
            async move {
                let status = match db_kind {
                    DbKind::Instance => self.instance_status(&id).await?,
                    DbKind::Cluster => self.cluster_status(&id).await?,
                };
                Ok(status.as_deref() == Some("stopped"))
            }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(
                resource.clone(),
                Operation::Pause,
                format!("stopped database {}", resource.id),
            )
            .with_duration(duration),
            Err(Error::Cancelled) => OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("cancelled while waiting for database {} to stop", resource.id),
            )
            .with_duration(duration),
            Err(e) => OperationResult::failed(
                resource.clone(),
                Operation::Pause,
                format!("database {} did not stop in time: {e}", resource.id),
            )
            .with_duration(duration),
        }
    }

    async fn resume(&self, resource: &Resource, cancel: &Cancellation) -> OperationResult {
        let start = Utc::now();

        if !self.resumable(resource) {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!(
                    "database {} cannot be started (current state: {})",
                    resource.id, resource.state
                ),
            );
        }

        let Some(db_kind) = Self::db_kind(resource) else {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("unknown database resource type for {}", resource.id),
            );
        };

        let start_call = match db_kind {
            DbKind::Instance => {
                self.client
                    .start_db_instance()
                    .db_instance_identifier(resource.id.clone())
                    .send()
                    .await
                    .map(|_| ())
            }
            DbKind::Cluster => {
                self.client
                    .start_db_cluster()
                    .db_cluster_identifier(resource.id.clone())
                    .send()
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = start_call {
            return OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("failed to start database {}: {e}", resource.id),
            );
        }

        let id = resource.id.clone();
        let wait = poll_until_converged(&cancel.token(), POLL_INTERVAL, POLL_TIMEOUT, || {
            let id = id.clone();
            async move {
                let status = match db_kind {
                    DbKind::Instance => self.instance_status(&id).await?,
                    DbKind::Cluster => self.cluster_status(&id).await?,
                };
                Ok(status.as_deref() == Some("available"))
            }
        })
        .await;

        let duration = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        match wait {
            Ok(()) => OperationResult::ok(
                resource.clone(),
                Operation::Resume,
                format!("started database {}", resource.id),
            )
            .with_duration(duration),
            Err(Error::Cancelled) => OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("cancelled while waiting for database {} to start", resource.id),
            )
            .with_duration(duration),
            Err(e) => OperationResult::failed(
                resource.clone(),
                Operation::Resume,
                format!("database {} did not start in time: {e}", resource.id),
            )
            .with_duration(duration),
        }
    }
}
