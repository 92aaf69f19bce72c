use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Enumerate resources across the configured regions and print what was found
    Discover(DiscoverArgs),

    /// Discover, filter, pause, and save a snapshot of the affected resources
    Pause(PauseArgs),

    /// Load a snapshot and resume every resource it captured
    Resume(ResumeArgs),

    /// Inspect and manage saved snapshots
    Snapshots(SnapshotsArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RegionArgs {
    /// AWS region to operate in; repeat for multiple regions
    #[arg(long = "region", env = "PAUSEWATCH_REGIONS", required = true, num_args = 1.., value_delimiter = ',')]
    pub regions: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct FilterArgs {
    /// Restrict to these resource kinds (instance, database, container-service, instance-group)
    #[arg(long = "kind", value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Restrict to resources tagged `key=value`; repeatable
    #[arg(long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Exclude resources tagged `key=value`; repeatable
    #[arg(long = "exclude-tag", value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Restrict to these resource ids
    #[arg(long = "id", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Exclude these resource ids
    #[arg(long = "exclude-id", value_delimiter = ',')]
    pub exclude_ids: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SnapshotDirArgs {
    /// Directory snapshots are read from and written to
    #[arg(long, env = "PAUSEWATCH_SNAPSHOT_DIR", default_value = "./pausewatch-snapshots")]
    pub snapshot_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub region: RegionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct PauseArgs {
    #[command(flatten)]
    pub region: RegionArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub snapshot_dir: SnapshotDirArgs,

    /// Resolve every resource and report what would happen without mutating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation that would otherwise be printed before mutating resources
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ResumeArgs {
    #[command(flatten)]
    pub snapshot_dir: SnapshotDirArgs,

    /// Snapshot id to resume; mutually exclusive with --latest
    #[arg(long, conflicts_with = "latest")]
    pub snapshot_id: Option<String>,

    /// Resume the most recently saved snapshot instead of naming one
    #[arg(long)]
    pub latest: bool,

    /// Only consider the latest snapshot for this region
    #[arg(long)]
    pub region: Option<String>,

    /// Skip the confirmation that would otherwise be printed before mutating resources
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct SnapshotsArgs {
    #[command(subcommand)]
    pub action: SnapshotsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SnapshotsAction {
    /// List every saved snapshot, most recent first
    List(SnapshotDirArgs),

    /// Print one snapshot's full contents as JSON
    Show {
        #[command(flatten)]
        dir: SnapshotDirArgs,
        snapshot_id: String,
    },

    /// Delete one saved snapshot
    Delete {
        #[command(flatten)]
        dir: SnapshotDirArgs,
        snapshot_id: String,
    },

    /// Keep only the N most recent snapshots, deleting the rest
    Trim {
        #[command(flatten)]
        dir: SnapshotDirArgs,

        #[arg(long, default_value_t = 10)]
        keep: usize,
    },
}
