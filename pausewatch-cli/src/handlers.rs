use std::sync::Arc;

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use pausewatch_core::{
    dry_run_results, summarize, AwsDriverFactory, AwsSession, Cancellation, FilterSpec, Operation, Orchestrator,
    Registry, ResourceKind, SnapshotStore,
};
use tracing::info;

use crate::args::{DiscoverArgs, FilterArgs, PauseArgs, ResumeArgs, SnapshotsAction, SnapshotsArgs};
use crate::output::{print_resources, print_results, print_summary};

fn build_filter_spec(args: &FilterArgs) -> Result<FilterSpec> {
    let mut spec = FilterSpec::default();

    for kind in &args.kinds {
        spec.kinds.insert(kind.parse::<ResourceKind>().map_err(anyhow::Error::msg)?);
    }
    spec.ids.extend(args.ids.iter().cloned());
    spec.exclude_ids.extend(args.exclude_ids.iter().cloned());

    for pair in &args.tags {
        let (key, value) = split_tag(pair)?;
        spec.tags.insert(key, value);
    }
    for pair in &args.exclude_tags {
        let (key, value) = split_tag(pair)?;
        spec.exclude_tags.insert(key, value);
    }

    Ok(spec)
}

fn split_tag(pair: &str) -> Result<(String, String)> {
    let (key, value) = pair.split_once('=').with_context(|| format!("tag filter `{pair}` must be `key=value`"))?;
    Ok((key.to_string(), value.to_string()))
}

async fn build_orchestrator() -> Result<Orchestrator<AwsDriverFactory<AwsSession>>> {
    let session = Arc::new(AwsSession::from_env().await);
    let factory = AwsDriverFactory::new(session);
    Ok(Orchestrator::new(Registry::new(factory)))
}

pub async fn run_discover(args: DiscoverArgs, cancel: &Cancellation) -> Result<()> {
    let spec = build_filter_spec(&args.filter)?;
    let kinds = if spec.kinds.is_empty() { ResourceKind::ALL.to_vec() } else { spec.kinds.iter().copied().collect() };

    let orchestrator = build_orchestrator().await?;
    let outcome = orchestrator.discover_all(&kinds, &args.region.regions, cancel).await?;
    for warning in &outcome.warnings {
        eprintln!("{} {warning}", "warning:".yellow());
    }

    let matched = spec.apply(&outcome.resources);
    print_resources(&matched);
    Ok(())
}

pub async fn run_pause(args: PauseArgs, cancel: &Cancellation) -> Result<()> {
    let spec = build_filter_spec(&args.filter)?;
    let kinds = if spec.kinds.is_empty() { ResourceKind::ALL.to_vec() } else { spec.kinds.iter().copied().collect() };

    let orchestrator = build_orchestrator().await?;
    let outcome = orchestrator.discover_all(&kinds, &args.region.regions, cancel).await?;
    for warning in &outcome.warnings {
        eprintln!("{} {warning}", "warning:".yellow());
    }

    let matched = spec.apply(&outcome.resources);
    if matched.is_empty() {
        println!("no resources matched the given filters");
        return Ok(());
    }

    if args.dry_run {
        let (pausable, mut results) = orchestrator.gate_pausable(&matched).await;
        results.extend(dry_run_results(&pausable, Operation::Pause));
        print_results(&results);
        return Ok(());
    }

    if !args.yes {
        println!("about to pause {} resource(s) across {:?}", matched.len(), args.region.regions);
        println!("re-run with --yes to proceed");
        return Ok(());
    }

    let resources: Vec<_> = matched.into_iter().cloned().collect();
    let snapshot = orchestrator.pause(&resources, cancel).await;
    print_results(&snapshot.operation_results);

    let store = SnapshotStore::new(&args.snapshot_dir.snapshot_dir);
    let saved_id = store.save(&snapshot).await?;
    info!(snapshot_id = %saved_id, "snapshot saved");
    println!("snapshot saved as {}", saved_id.cyan());

    print_summary(&summarize(&snapshot.operation_results));
    Ok(())
}

pub async fn run_resume(args: ResumeArgs, cancel: &Cancellation) -> Result<()> {
    let store = SnapshotStore::new(&args.snapshot_dir.snapshot_dir);

    let snapshot = match (&args.snapshot_id, args.latest) {
        (Some(id), _) => store.load(id).await?.with_context(|| format!("no snapshot named {id}"))?,
        (None, true) => store
            .load_latest(args.region.as_deref())
            .await?
            .context("no snapshots found to resume")?,
        (None, false) => bail!("pass --snapshot-id <id> or --latest"),
    };

    if !args.yes {
        println!("about to resume {} resource(s) from snapshot {}", snapshot.resources.len(), snapshot.id);
        println!("re-run with --yes to proceed");
        return Ok(());
    }

    let orchestrator = build_orchestrator().await?;
    let results = orchestrator.resume(&snapshot, cancel).await?;
    print_results(&results);
    print_summary(&summarize(&results));
    Ok(())
}

pub async fn run_snapshots(args: SnapshotsArgs) -> Result<()> {
    match args.action {
        SnapshotsAction::List(dir) => {
            let store = SnapshotStore::new(&dir.snapshot_dir);
            let mut summaries = store.list().await?;
            summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            for s in &summaries {
                println!(
                    "{}  {}  {} resource(s)  ${:.2}/mo",
                    s.id.cyan(),
                    s.timestamp,
                    s.resource_count,
                    s.estimated_monthly_savings
                );
            }
            println!("{} snapshot(s)", summaries.len());
        }
        SnapshotsAction::Show { dir, snapshot_id } => {
            let store = SnapshotStore::new(&dir.snapshot_dir);
            let snapshot = store.load(&snapshot_id).await?.with_context(|| format!("no snapshot named {snapshot_id}"))?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        SnapshotsAction::Delete { dir, snapshot_id } => {
            let store = SnapshotStore::new(&dir.snapshot_dir);
            if store.delete(&snapshot_id).await? {
                println!("deleted {snapshot_id}");
            } else {
                println!("no snapshot named {snapshot_id}");
            }
        }
        SnapshotsAction::Trim { dir, keep } => {
            let store = SnapshotStore::new(&dir.snapshot_dir);
            let removed = store.trim(keep).await?;
            println!("removed {removed} snapshot(s), kept the {keep} most recent");
        }
    }
    Ok(())
}
