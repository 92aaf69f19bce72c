use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the four cloud resource families the orchestrator knows how to pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Instance,
    Database,
    ContainerService,
    InstanceGroup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Instance,
        ResourceKind::Database,
        ResourceKind::ContainerService,
        ResourceKind::InstanceGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::Database => "database",
            ResourceKind::ContainerService => "container-service",
            ResourceKind::InstanceGroup => "instance-group",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(ResourceKind::Instance),
            "database" => Ok(ResourceKind::Database),
            "container-service" => Ok(ResourceKind::ContainerService),
            "instance-group" => Ok(ResourceKind::InstanceGroup),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;
        impl Visitor<'_> for KindVisitor {
            type Value = ResourceKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("one of instance, database, container-service, instance-group")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ResourceKind, E> {
                v.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(KindVisitor)
    }
}

/// Immutable descriptor of one cloud resource as observed at enumeration time.
///
/// Never mutated after a driver's `enumerate` produces it; Pause/Resume build
/// new `Resource` values rather than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub id: String,
    pub region: String,
    pub state: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Kind-specific structured payload, opaque to the orchestrator.
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_hint: Option<f64>,
}

fn default_metadata() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Resource {
    /// `kind:region:id`, the composite key used throughout the snapshot's
    /// `original_states` map. Components never contain `:`, which enumerate
    /// implementations must enforce on any id/region they accept.
    pub fn composite_key(&self) -> String {
        composite_key(self.kind, &self.region, &self.id)
    }

    pub fn metadata_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }
}

pub fn composite_key(kind: ResourceKind, region: &str, id: &str) -> String {
    format!("{kind}:{region}:{id}")
}

/// What kind of mutation (or non-mutation) an `OperationResult` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Pause,
    Resume,
    Discover,
}

/// Outcome of one attempted mutation. Always constructed, even on failure —
/// drivers never let a cloud SDK error cross the orchestrator boundary as an
/// exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub resource: Resource,
    pub op: Operation,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl OperationResult {
    pub fn ok(resource: Resource, op: Operation, message: impl Into<String>) -> Self {
        Self {
            success: true,
            resource,
            op,
            message: message.into(),
            timestamp: Utc::now(),
            duration_seconds: None,
        }
    }

    pub fn failed(resource: Resource, op: Operation, message: impl Into<String>) -> Self {
        Self {
            success: false,
            resource,
            op,
            message: message.into(),
            timestamp: Utc::now(),
            duration_seconds: None,
        }
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }
}
