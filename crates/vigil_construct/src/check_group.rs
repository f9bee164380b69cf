//! Check groups.

use crate::alert_channel::AlertChannelSubscription;
use crate::check::{EnvironmentVariable, PrivateLocationTarget};
use crate::construct::{Construct, ValidationContext};
use crate::defaults::DefaultsScope;
use crate::kind::ResourceKind;
use crate::private_location::PrivateLocationGroupAssignment;
use crate::resource::Resource;
use crate::retry::{retry_fields, validate_retry_settings, RetryStrategy};
use crate::session::Session;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{CoreResult, Diagnostic, DiagnosticSink, LogicalId, PhysicalId, Ref};

/// Declared group properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckGroupProps {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Whether member checks run
    #[serde(default)]
    pub activated: Option<bool>,
    /// Whether member alerts are muted
    #[serde(default)]
    pub muted: Option<bool>,
    /// Member checks run at most this many at once
    #[serde(default)]
    pub concurrency: Option<u32>,
    /// Public locations
    #[serde(default)]
    pub locations: Vec<String>,
    /// Private locations
    #[serde(default)]
    pub private_locations: Vec<PrivateLocationTarget>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Environment variables shared by members
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
    /// Alert channels to subscribe
    #[serde(default)]
    pub alert_channels: Vec<Ref>,
    /// Group-level retry strategy
    #[serde(default)]
    pub retry_strategy: Option<RetryStrategy>,
    /// Deprecated; superseded by retry strategies
    #[serde(default)]
    pub double_check: Option<bool>,
    /// Run members in all locations at once
    #[serde(default)]
    pub run_parallel: Option<bool>,
    /// Defaults inherited by member checks
    #[serde(flatten)]
    pub defaults: DefaultsScope,
}

/// A group of checks sharing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckGroup {
    logical_id: LogicalId,
    props: CheckGroupProps,
    legacy: bool,
}

impl CheckGroup {
    /// Create a group
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: CheckGroupProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
            legacy: false,
        })
    }

    /// Create a first-generation group; flagged as deprecated on validation
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn legacy(logical_id: &str, props: CheckGroupProps) -> CoreResult<Self> {
        Ok(Self {
            legacy: true,
            ..Self::new(logical_id, props)?
        })
    }

    /// Reference an existing group by its numeric id
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot accept constructs
    pub fn from_id(session: &mut Session, physical_id: impl Into<PhysicalId>) -> CoreResult<Ref> {
        session.register_reference(ResourceKind::CheckGroup, physical_id)
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.props.name
    }

    /// Defaults inherited by member checks
    #[must_use]
    pub fn defaults(&self) -> &DefaultsScope {
        &self.props.defaults
    }

    /// Whether this is a first-generation group
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Subscriptions and private location assignments this group implies
    ///
    /// # Errors
    ///
    /// Returns error if a derived logical id is invalid
    pub fn derived(&self) -> CoreResult<Vec<Resource>> {
        let mut derived = Vec::new();
        for channel in &self.props.alert_channels {
            derived.push(AlertChannelSubscription::for_group(&self.logical_id, channel)?.into());
        }
        for target in &self.props.private_locations {
            if let PrivateLocationTarget::Construct(location) = target {
                derived.push(PrivateLocationGroupAssignment::new(&self.logical_id, location)?.into());
            }
        }
        Ok(derived)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckGroupPayload<'a> {
    name: &'a str,
    activated: bool,
    muted: bool,
    concurrency: u32,
    locations: &'a [String],
    private_locations: Vec<&'a str>,
    tags: &'a [String],
    environment_variables: &'a [EnvironmentVariable],
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_strategy: Option<Option<&'a RetryStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    double_check: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_parallel: Option<bool>,
}

#[async_trait]
impl Construct for CheckGroup {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CheckGroup
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    fn before_validate(&self, diagnostics: &mut dyn DiagnosticSink) {
        if self.legacy {
            diagnostics.add(Diagnostic::deprecated_construct(
                "CheckGroupV1",
                "Declare the group as a current-generation check group instead.",
            ));
        }
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if self.props.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        } else if let Some(other) = ctx
            .project
            .find_by_name(ResourceKind::CheckGroup, &self.props.name)
            .filter(|other| other.logical_id() != &self.logical_id)
        {
            diagnostics.add(Diagnostic::warning(
                "Duplicate check group name",
                format!(
                    "Check group \"{}\" shares its name with \"{}\".",
                    self.logical_id,
                    other.logical_id()
                ),
            ));
        }

        if self.props.concurrency == Some(0) {
            diagnostics.add(Diagnostic::invalid_property_value(
                "concurrency",
                "concurrency must be at least 1.",
            ));
        }
        validate_retry_settings(self.props.retry_strategy.as_ref(), self.props.double_check, diagnostics);

        for channel in &self.props.alert_channels {
            ctx.require_ref("alertChannels", ResourceKind::AlertChannel, channel, diagnostics);
        }
        for target in &self.props.private_locations {
            if let PrivateLocationTarget::Construct(location) = target {
                ctx.require_ref("privateLocations", ResourceKind::PrivateLocation, location, diagnostics);
            }
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        let props = &self.props;
        let (retry_strategy, double_check) = retry_fields(props.retry_strategy.as_ref(), props.double_check);
        let payload = CheckGroupPayload {
            name: &props.name,
            activated: props.activated.unwrap_or(true),
            muted: props.muted.unwrap_or(false),
            concurrency: props.concurrency.unwrap_or(1),
            locations: &props.locations,
            private_locations: props
                .private_locations
                .iter()
                .filter_map(|target| match target {
                    PrivateLocationTarget::Slug(slug) => Some(slug.as_str()),
                    PrivateLocationTarget::Construct(_) => None,
                })
                .collect(),
            tags: &props.tags,
            environment_variables: &props.environment_variables,
            retry_strategy,
            double_check,
            run_parallel: props.run_parallel,
        };
        Ok(serde_json::to_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use vigil_core::{Diagnostics, Severity};

    fn named(name: &str) -> CheckGroupProps {
        CheckGroupProps {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_legacy_group_warns_before_validate() {
        let group = CheckGroup::legacy("old", named("Old")).unwrap();
        let mut diagnostics = Diagnostics::new();
        group.before_validate(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.observations()[0].severity(), Severity::Warning);

        let current = CheckGroup::new("new", named("New")).unwrap();
        let mut diagnostics = Diagnostics::new();
        current.before_validate(&mut diagnostics);
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_group_rules() {
        let mut session = Session::new();
        session.set_project(Project::new("demo", "Demo").unwrap()).unwrap();
        session.register(CheckGroup::new("a", named("Shared")).unwrap()).unwrap();
        let props = CheckGroupProps {
            concurrency: Some(0),
            ..named("Shared")
        };
        session.register(CheckGroup::new("b", props).unwrap()).unwrap();

        let ctx = session.validation_context().unwrap();
        let entry = ctx.project.get(ResourceKind::CheckGroup, "b").unwrap();
        let mut diagnostics = Diagnostics::new();
        entry.validate(&ctx, &mut diagnostics).await;
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_group_defaults_deserialize_flat() {
        let props: CheckGroupProps = serde_json::from_str(
            r#"{"name": "G", "checks": {"frequency": 5}, "browserChecks": {"frequency": 1}}"#,
        )
        .unwrap();
        assert_eq!(props.defaults.checks.unwrap().frequency, Some(5));
        assert_eq!(props.defaults.browser_checks.unwrap().frequency, Some(1));
    }

    #[test]
    fn test_payload_defaults() {
        let group = CheckGroup::new("g", named("G")).unwrap();
        let payload = group.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["concurrency"], 1);
        assert_eq!(payload["activated"], true);
        assert!(payload.get("retryStrategy").is_none());
    }
}
