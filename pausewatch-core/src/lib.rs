//! Discovery, snapshot, pause and resume orchestration for cloud compute
//! resources: EC2 instances, RDS databases, ECS services and Auto Scaling
//! Groups.

pub mod cancel;
pub mod driver;
pub mod error;
pub mod filter;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod wait;

#[cfg(test)]
pub mod testing;

pub use cancel::Cancellation;
pub use driver::Driver;
pub use error::Error;
pub use filter::{dry_run_results, FilterSpec};
pub use model::{Operation, OperationResult, Resource, ResourceKind};
pub use orchestrator::{summarize, DiscoveryOutcome, FailureDescriptor, Orchestrator, Summary};
pub use registry::{AwsDriverFactory, DriverFactory, Registry};
pub use session::{AwsSession, Session};
pub use snapshot::{OriginalState, Snapshot, SnapshotStore, SnapshotSummary};
