use std::collections::{BTreeMap, HashMap};

use pausewatch_core::{Error, Operation, OperationResult, OriginalState, Resource, ResourceKind, Snapshot, SnapshotStore};

fn sample_resource(id: &str, region: &str) -> Resource {
    Resource {
        kind: ResourceKind::Instance,
        id: id.into(),
        region: region.into(),
        state: "running".into(),
        tags: BTreeMap::new(),
        metadata: serde_json::json!({"instance_type": "t3.micro"}),
        cost_hint: Some(0.75),
    }
}

fn sample_snapshot(region: &str, resource_ids: &[&str]) -> Snapshot {
    let resources: Vec<Resource> = resource_ids.iter().map(|id| sample_resource(id, region)).collect();
    let original_states = resources
        .iter()
        .map(|r| (r.composite_key(), OriginalState::from_resource(r)))
        .collect();
    let results = resources
        .iter()
        .map(|r| OperationResult::ok(r.clone(), Operation::Pause, "paused"))
        .collect();
    Snapshot::new(resources, original_states, results, resource_ids.len() as f64 * 540.0)
}

#[tokio::test]
async fn save_then_load_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let snapshot = sample_snapshot("us-east-1", &["i-1", "i-2"]);

    let saved_id = store.save(&snapshot).await.unwrap();
    let loaded = store.load(&saved_id).await.unwrap().expect("snapshot should exist");

    assert_eq!(loaded.resources.len(), 2);
    assert_eq!(loaded.original_states.len(), 2);
    assert_eq!(loaded.region.as_deref(), Some("us-east-1"));
    assert_eq!(loaded.timestamp.timestamp(), snapshot.timestamp.timestamp());
    assert!((loaded.estimated_monthly_savings - snapshot.estimated_monthly_savings).abs() < 1e-9);

    let original = &loaded.original_states[&loaded.resources[0].composite_key()];
    assert_eq!(original.state, "running");
}

#[tokio::test]
async fn wire_format_uses_current_state_not_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let snapshot = sample_snapshot("us-east-1", &["i-1"]);
    let saved_id = store.save(&snapshot).await.unwrap();

    let raw = tokio::fs::read_to_string(dir.path().join(format!("{saved_id}.json"))).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let key = snapshot.resources[0].composite_key();
    assert!(value["original_states"][&key]["current_state"].is_string());
    assert!(value["original_states"][&key].get("state").is_none());
    assert!(value["snapshot_id"].is_string());
    assert!(value["total_estimated_savings"].is_number());
}

#[tokio::test]
async fn load_missing_id_returns_none_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    assert!(store.load("pause-does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_snapshot_file_is_reported_as_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    tokio::fs::write(dir.path().join("pause-bad.json"), b"{not valid json").await.unwrap();

    let result = store.load("pause-bad").await;
    assert!(matches!(result, Err(Error::State(_))));
}

#[tokio::test]
async fn list_skips_corrupt_files_and_reports_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&sample_snapshot("us-east-1", &["i-1"])).await.unwrap();
    tokio::fs::write(dir.path().join("pause-bad.json"), b"not json").await.unwrap();

    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
}

#[tokio::test]
async fn load_latest_filters_by_region() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&sample_snapshot("us-east-1", &["i-1"])).await.unwrap();
    store.save(&sample_snapshot("us-west-2", &["i-2"])).await.unwrap();

    let latest_west = store.load_latest(Some("us-west-2")).await.unwrap().unwrap();
    assert_eq!(latest_west.region.as_deref(), Some("us-west-2"));

    let latest_any = store.load_latest(None).await.unwrap().unwrap();
    assert!(latest_any.region.is_some());
}

#[tokio::test]
async fn trim_keeps_only_the_most_recent_n() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let mut ids = Vec::new();
    for i in 0..3 {
        let mut snapshot = sample_snapshot("us-east-1", &["i-1"]);
        snapshot.id = format!("{}-{i}", snapshot.id);
        ids.push(store.save(&snapshot).await.unwrap());
    }

    let removed = store.trim(1).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = store.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn delete_reports_whether_a_snapshot_existed() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let id = store.save(&sample_snapshot("us-east-1", &["i-1"])).await.unwrap();

    assert!(store.delete(&id).await.unwrap());
    assert!(!store.delete(&id).await.unwrap());
}

#[tokio::test]
async fn saving_two_snapshots_in_the_same_second_does_not_clobber_either() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let mut first = sample_snapshot("us-east-1", &["i-1"]);
    let mut second = sample_snapshot("us-east-1", &["i-2"]);
    second.id = first.id.clone();
    first.id = first.id.clone();

    let id_a = store.save(&first).await.unwrap();
    let id_b = store.save(&second).await.unwrap();
    assert_ne!(id_a, id_b);
    assert!(store.load(&id_a).await.unwrap().is_some());
    assert!(store.load(&id_b).await.unwrap().is_some());
}
