use std::collections::{HashMap, HashSet};

use crate::model::{Operation, OperationResult, Resource, ResourceKind};

/// A filter policy applied to a discovered resource set before a pause or
/// resume run. Every populated field narrows the set further — an empty
/// `kinds`/`regions`/`ids` means "no restriction on that axis", matching
/// the original's "omitted filter key means unrestricted" behavior.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub kinds: HashSet<ResourceKind>,
    pub regions: HashSet<String>,
    pub tags: HashMap<String, String>,
    pub exclude_tags: HashMap<String, String>,
    pub ids: HashSet<String>,
    pub exclude_ids: HashSet<String>,
}

impl FilterSpec {
    fn matches(&self, resource: &Resource) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&resource.kind) {
            return false;
        }
        if !self.regions.is_empty() && !self.regions.contains(&resource.region) {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&resource.id) {
            return false;
        }
        if self.exclude_ids.contains(&resource.id) {
            return false;
        }
        for (key, value) in &self.tags {
            if resource.tags.get(key) != Some(value) {
                return false;
            }
        }
        for (key, value) in &self.exclude_tags {
            if resource.tags.get(key) == Some(value) {
                return false;
            }
        }
        true
    }

    /// Applies every populated axis as an AND; monotone in each axis taken
    /// alone — adding a restriction to an already-applied spec can only
    /// shrink the result, never grow it.
    pub fn apply<'a>(&self, resources: &'a [Resource]) -> Vec<&'a Resource> {
        resources.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Builds the synthetic `OperationResult`s a dry run reports in place of a
/// real mutation — no driver call, no snapshot entry, message prefixed
/// `[DRY RUN]` so it's unmistakable in logs and summaries.
pub fn dry_run_results(resources: &[&Resource], op: Operation) -> Vec<OperationResult> {
    let verb = match op {
        Operation::Pause => "pause",
        Operation::Resume => "resume",
        Operation::Discover => "discover",
    };
    resources
        .iter()
        .map(|r| {
            OperationResult::ok(
                (*r).clone(),
                op,
                format!("[DRY RUN] Would {verb} {} {}", r.kind, r.id),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn resource(kind: ResourceKind, region: &str, id: &str, tags: &[(&str, &str)]) -> Resource {
        Resource {
            kind,
            id: id.into(),
            region: region.into(),
            state: "running".into(),
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>(),
            metadata: serde_json::json!({}),
            cost_hint: None,
        }
    }

    #[test]
    fn empty_spec_matches_everything() {
        let resources = vec![resource(ResourceKind::Instance, "us-east-1", "i-1", &[])];
        let spec = FilterSpec::default();
        assert_eq!(spec.apply(&resources).len(), 1);
    }

    #[test]
    fn kind_and_region_narrow_independently() {
        let resources = vec![
            resource(ResourceKind::Instance, "us-east-1", "i-1", &[]),
            resource(ResourceKind::Database, "us-east-1", "db-1", &[]),
            resource(ResourceKind::Instance, "us-west-2", "i-2", &[]),
        ];
        let mut spec = FilterSpec::default();
        spec.kinds.insert(ResourceKind::Instance);
        assert_eq!(spec.apply(&resources).len(), 2);
        spec.regions.insert("us-east-1".into());
        assert_eq!(spec.apply(&resources).len(), 1);
    }

    #[test]
    fn required_tag_must_match_exactly() {
        let resources = vec![
            resource(ResourceKind::Instance, "us-east-1", "i-1", &[("env", "prod")]),
            resource(ResourceKind::Instance, "us-east-1", "i-2", &[("env", "dev")]),
        ];
        let mut spec = FilterSpec::default();
        spec.tags.insert("env".into(), "prod".into());
        let matched = spec.apply(&resources);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "i-1");
    }

    #[test]
    fn exclude_tag_removes_a_match() {
        let resources = vec![resource(ResourceKind::Instance, "us-east-1", "i-1", &[("keep", "no")])];
        let mut spec = FilterSpec::default();
        spec.exclude_tags.insert("keep".into(), "no".into());
        assert!(spec.apply(&resources).is_empty());
    }

    #[test]
    fn adding_a_restriction_never_grows_the_result() {
        let resources = vec![
            resource(ResourceKind::Instance, "us-east-1", "i-1", &[]),
            resource(ResourceKind::Database, "us-east-1", "db-1", &[]),
        ];
        let unrestricted = FilterSpec::default().apply(&resources).len();
        let mut narrowed = FilterSpec::default();
        narrowed.kinds.insert(ResourceKind::Instance);
        assert!(narrowed.apply(&resources).len() <= unrestricted);
    }

    #[test]
    fn dry_run_messages_are_prefixed_and_produce_no_mutation() {
        let r = resource(ResourceKind::Instance, "us-east-1", "i-1", &[]);
        let results = dry_run_results(&[&r], Operation::Pause);
        assert_eq!(results.len(), 1);
        assert!(results[0].message.starts_with("[DRY RUN]"));
        assert!(results[0].success);
    }
}
