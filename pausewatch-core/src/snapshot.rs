use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::model::{OperationResult, Resource};

/// The state+metadata tuple captured before any pause mutation, keyed by
/// `kind:region:id` in `Snapshot::original_states`. The wire field is
/// `current_state` to distinguish it from a `Resource`'s own `state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalState {
    #[serde(rename = "current_state")]
    pub state: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl OriginalState {
    pub fn from_resource(resource: &Resource) -> Self {
        Self {
            state: resource.state.clone(),
            metadata: resource.metadata.clone(),
        }
    }
}

/// The authoritative pre-pause record: immutable once constructed, the
/// sole input Resume consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "snapshot_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub region: Option<String>,
    pub resources: Vec<Resource>,
    pub original_states: HashMap<String, OriginalState>,
    pub operation_results: Vec<OperationResult>,
    #[serde(rename = "total_estimated_savings")]
    pub estimated_monthly_savings: f64,
}

impl Snapshot {
    pub fn new(
        resources: Vec<Resource>,
        original_states: HashMap<String, OriginalState>,
        operation_results: Vec<OperationResult>,
        estimated_monthly_savings: f64,
    ) -> Self {
        let timestamp = Utc::now();
        let region = resources.first().map(|r| r.region.clone());
        Self {
            id: format!("pause-{}", timestamp.format("%Y%m%d-%H%M%S")),
            timestamp,
            region,
            resources,
            original_states,
            operation_results,
            estimated_monthly_savings,
        }
    }

    /// Non-empty `resources`, non-empty `original_states`, and every
    /// resource's composite key present in `original_states` — checked
    /// before Resume ever calls a driver.
    pub fn validate(&self) -> Result<(), Error> {
        if self.resources.is_empty() {
            return Err(Error::State(format!("snapshot {} has no resources", self.id)));
        }
        if self.original_states.is_empty() {
            return Err(Error::State(format!("snapshot {} has no original_states", self.id)));
        }
        for resource in &self.resources {
            let key = resource.composite_key();
            if !self.original_states.contains_key(&key) {
                return Err(Error::State(format!(
                    "snapshot {} is missing original_states entry for {key}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub region: Option<String>,
    pub resource_count: usize,
    pub estimated_monthly_savings: f64,
}

/// A directory of `<snapshot-id>.json` files. Writes go to a sibling
/// `.tmp` file and are atomically renamed into place; reads tolerate
/// unknown fields (forward compatibility) and report a corrupt file as a
/// `state` error rather than panicking.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Serialises to a `.tmp` sibling then renames over the target,
    /// returning the id actually used on disk (a timestamp collision
    /// appends a numeric suffix). On any failure the temp file is removed.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<String, Error> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut id = snapshot.id.clone();
        let mut attempt = 1;
        while tokio::fs::try_exists(self.path_for(&id)).await.unwrap_or(false) {
            attempt += 1;
            id = format!("{}-{attempt}", snapshot.id);
        }

        let final_path = self.path_for(&id);
        let tmp_path = self.dir.join(format!("{id}.json.tmp"));

        let mut to_write = snapshot.clone();
        to_write.id = id.clone();
        let body = serde_json::to_vec_pretty(&to_write)?;

        let write_result = tokio::fs::write(&tmp_path, &body).await;
        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::StateIo(e));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::StateIo(e));
        }

        Ok(id)
    }

    pub async fn load(&self, id: &str) -> Result<Option<Snapshot>, Error> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::State(format!("snapshot {id} is corrupt: {e}")))?;
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StateIo(e)),
        }
    }

    pub async fn load_latest(&self, region: Option<&str>) -> Result<Option<Snapshot>, Error> {
        let mut summaries = self.list().await?;
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        for summary in summaries {
            if let Some(region) = region {
                if summary.region.as_deref() != Some(region) {
                    continue;
                }
            }
            if let Some(snapshot) = self.load(&summary.id).await? {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    pub async fn list(&self) -> Result<Vec<SnapshotSummary>, Error> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_summary(&path).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot file"),
            }
        }
        Ok(summaries)
    }

    async fn read_summary(&self, path: &Path) -> Result<SnapshotSummary, Error> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| Error::State(format!("{}: {e}", path.display())))?;
        Ok(SnapshotSummary {
            id: snapshot.id,
            timestamp: snapshot.timestamp,
            region: snapshot.region,
            resource_count: snapshot.resources.len(),
            estimated_monthly_savings: snapshot.estimated_monthly_savings,
        })
    }

    pub async fn delete(&self, id: &str) -> Result<bool, Error> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::StateIo(e)),
        }
    }

    /// Keeps the `keep_n` most recent snapshots, deletes the rest, returns
    /// the count removed.
    pub async fn trim(&self, keep_n: usize) -> Result<usize, Error> {
        let mut summaries = self.list().await?;
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut removed = 0;
        for summary in summaries.into_iter().skip(keep_n) {
            if self.delete(&summary.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
