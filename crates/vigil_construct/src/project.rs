//! Project: the root aggregate owning every construct of one run.

use crate::construct::{Construct, Entry};
use crate::kind::{ResourceKind, SYNTHESIS_ORDER};
use crate::synth::LoadedFiles;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use vigil_core::{CoreError, CoreResult, LogicalId, PhysicalId};

/// Project metadata emitted ahead of the resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    /// Project logical id
    pub logical_id: String,
    /// Display name
    pub name: String,
    /// Source repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// One synthesized resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePayload {
    /// Logical id
    pub logical_id: String,
    /// Kind tag
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Remote id, for references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_id: Option<PhysicalId>,
    /// Whether the project owns the resource
    pub member: bool,
    /// Construct-specific record
    pub payload: Value,
}

/// Synthesized project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectPayload {
    /// Project metadata
    pub project: ProjectMeta,
    /// Resources in emission order
    pub resources: Vec<ResourcePayload>,
}

/// Buckets of constructs keyed by kind, then logical id
///
/// Insertion order is preserved within a bucket.
#[derive(Debug, Clone)]
pub struct Project {
    logical_id: LogicalId,
    name: String,
    repo_url: Option<String>,
    data: IndexMap<ResourceKind, IndexMap<String, Entry>>,
}

impl Project {
    /// Create an empty project
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is invalid or `name` is empty
    pub fn new(logical_id: &str, name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::MissingProjectMetadata {
                field: "projectName".to_string(),
            });
        }
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            name,
            repo_url: None,
            data: SYNTHESIS_ORDER
                .into_iter()
                .map(|kind| (kind, IndexMap::new()))
                .collect(),
        })
    }

    /// Attach the source repository
    #[must_use]
    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = Some(repo_url.into());
        self
    }

    /// Project logical id
    #[must_use]
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an entry to its bucket
    ///
    /// A reference may replace another reference in place; every other
    /// collision is rejected.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the slot is taken
    pub fn add(&mut self, entry: Entry) -> CoreResult<()> {
        let kind = entry.kind();
        let id = entry.logical_id().as_str().to_string();
        let bucket = self.data.entry(kind).or_default();

        match (bucket.get(&id), &entry) {
            (Some(Entry::Reference(_)), Entry::Reference(_)) => {
                debug!(kind = %kind, id = %id, "replacing reference");
            }
            (Some(_), _) => {
                return Err(CoreError::AlreadyExists {
                    kind: kind.to_string(),
                    id,
                });
            }
            (None, _) => {
                debug!(kind = %kind, id = %id, "registered construct");
            }
        }

        bucket.insert(id, entry);
        Ok(())
    }

    /// Entry in a slot
    #[must_use]
    pub fn get(&self, kind: ResourceKind, logical_id: &str) -> Option<&Entry> {
        self.data.get(&kind).and_then(|bucket| bucket.get(logical_id))
    }

    /// Whether a slot is taken
    #[must_use]
    pub fn contains(&self, kind: ResourceKind, logical_id: &str) -> bool {
        self.get(kind, logical_id).is_some()
    }

    /// Entries of one kind, in registration order
    pub fn resources(&self, kind: ResourceKind) -> impl Iterator<Item = &Entry> {
        self.data.get(&kind).into_iter().flat_map(|bucket| bucket.values())
    }

    /// Every entry, in synthesis order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        SYNTHESIS_ORDER
            .into_iter()
            .flat_map(move |kind| self.resources(kind))
    }

    /// Entries emitted by [`Project::synthesize`]
    ///
    /// Test-only filtering applies to the check bucket only.
    pub fn synthesizable(&self, add_test_only: bool) -> impl Iterator<Item = &Entry> {
        self.entries()
            .filter(move |entry| add_test_only || entry.kind() != ResourceKind::Check || !entry.is_test_only())
    }

    /// First managed construct of `kind` carrying display name `name`
    #[must_use]
    pub fn find_by_name(&self, kind: ResourceKind, name: &str) -> Option<&Entry> {
        self.resources(kind)
            .find(|entry| entry.as_resource().and_then(|r| r.name()) == Some(name))
    }

    /// Total number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.values().map(IndexMap::len).sum()
    }

    /// Whether the project holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the buckets in synthesis order and emit one record per entry
    ///
    /// # Errors
    ///
    /// Returns error if a construct cannot be synthesized
    pub fn synthesize(&self, add_test_only: bool, files: &LoadedFiles) -> CoreResult<ProjectPayload> {
        let resources = self
            .synthesizable(add_test_only)
            .map(|entry| {
                Ok(ResourcePayload {
                    logical_id: entry.logical_id().as_str().to_string(),
                    kind: entry.kind(),
                    physical_id: entry.physical_id().cloned(),
                    member: entry.is_member(),
                    payload: entry.synthesize(files)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        debug!(project = %self.logical_id, resources = resources.len(), "synthesized project");

        Ok(ProjectPayload {
            project: ProjectMeta {
                logical_id: self.logical_id.as_str().to_string(),
                name: self.name.clone(),
                repo_url: self.repo_url.clone(),
            },
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{ApiCheckSpec, ApiRequest, Check, CheckProps};
    use crate::check_group::{CheckGroup, CheckGroupProps};
    use crate::construct::ReferenceConstruct;
    use crate::session::Session;
    use crate::status_page::StatusPageService;
    use vigil_core::SanitizedIdTracker;

    fn group(id: &str) -> Entry {
        let props = CheckGroupProps {
            name: id.to_string(),
            ..Default::default()
        };
        Entry::Managed(CheckGroup::new(id, props).unwrap().into())
    }

    fn reference(kind: ResourceKind, id: i64) -> Entry {
        Entry::Reference(ReferenceConstruct::new(kind, id, &mut SanitizedIdTracker::new()).unwrap())
    }

    #[test]
    fn test_duplicate_managed_already_exists() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(group("g")).unwrap();
        let err = project.add(group("g")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(project.len(), 1);
    }

    #[test]
    fn test_same_id_different_kind_is_allowed() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(group("shared")).unwrap();
        project
            .add(Entry::Managed(StatusPageService::new("shared", "Shared").unwrap().into()))
            .unwrap();
        assert_eq!(project.len(), 2);
    }

    #[test]
    fn test_reference_replaces_reference() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(reference(ResourceKind::CheckGroup, 7)).unwrap();
        project.add(reference(ResourceKind::CheckGroup, 7)).unwrap();
        assert_eq!(project.len(), 1);
    }

    #[test]
    fn test_reference_cannot_replace_managed() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(group("check-group-7")).unwrap();
        assert!(project.add(reference(ResourceKind::CheckGroup, 7)).is_err());
    }

    #[test]
    fn test_entries_follow_synthesis_order_then_insertion() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(group("b")).unwrap();
        project.add(group("a")).unwrap();
        project
            .add(Entry::Managed(StatusPageService::new("svc", "Service").unwrap().into()))
            .unwrap();
        let ids: Vec<&str> = project.entries().map(|e| e.logical_id().as_str()).collect();
        assert_eq!(ids, vec!["svc", "b", "a"]);
    }

    #[test]
    fn test_synthesize_filters_test_only_checks() {
        let mut session = Session::new();
        session.set_project(Project::new("demo", "Demo").unwrap().with_repo_url("https://git.example.com/demo")).unwrap();
        let spec = || ApiCheckSpec::new(ApiRequest::get("https://example.com"));
        let regular = Check::new(&session, "regular", CheckProps::named("Regular"), spec()).unwrap();
        session.register(regular).unwrap();
        let props = CheckProps {
            test_only: Some(true),
            ..CheckProps::named("Smoke")
        };
        let smoke = Check::new(&session, "smoke", props, spec()).unwrap();
        session.register(smoke).unwrap();
        CheckGroup::from_id(&mut session, 42_i64).unwrap();

        let project = session.project().unwrap();
        let files = LoadedFiles::default();

        let deployed = project.synthesize(false, &files).unwrap();
        let ids: Vec<&str> = deployed.resources.iter().map(|r| r.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["regular", "check-group-42"]);
        assert_eq!(deployed.project.repo_url.as_deref(), Some("https://git.example.com/demo"));

        let tested = project.synthesize(true, &files).unwrap();
        assert_eq!(tested.resources.len(), 3);

        let reference = &tested.resources[2];
        assert!(!reference.member);
        assert_eq!(reference.physical_id, Some(PhysicalId::Number(42)));
        assert_eq!(reference.payload, Value::Null);

        let json = serde_json::to_value(&tested).unwrap();
        assert_eq!(json["resources"][0]["type"], "check");
        assert!(json["resources"][0].get("physicalId").is_none());
    }

    #[test]
    fn test_find_by_name() {
        let mut project = Project::new("demo", "Demo").unwrap();
        project.add(group("a")).unwrap();
        assert!(project.find_by_name(ResourceKind::CheckGroup, "a").is_some());
        assert!(project.find_by_name(ResourceKind::CheckGroup, "z").is_none());
    }

    #[test]
    fn test_project_requires_name() {
        let err = Project::new("demo", " ").unwrap_err();
        assert!(matches!(err, CoreError::MissingProjectMetadata { .. }));
    }
}
