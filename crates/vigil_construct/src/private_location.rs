//! Private locations and their assignments.

use crate::construct::{Construct, ValidationContext};
use crate::kind::ResourceKind;
use crate::session::Session;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vigil_core::{CoreResult, Diagnostic, DiagnosticSink, LogicalId, PhysicalId, Ref};

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]{1,30}$").expect("valid regex"));

// Public region names are reserved.
static REGION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(us|eu|ap|sa|ca|me|af|il|mx)-(east|west|north|south|central|northeast|southeast|northwest|southwest)-\d$")
        .expect("valid regex")
});

/// Declared private location properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLocationProps {
    /// Display name
    pub name: String,
    /// Slug checks use to select the location
    pub slug_name: String,
    /// Icon name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Outbound proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

/// A self-hosted execution location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateLocation {
    logical_id: LogicalId,
    props: PrivateLocationProps,
}

impl PrivateLocation {
    /// Create a private location
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: PrivateLocationProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
        })
    }

    /// Reference an existing location by its UUID
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot accept constructs
    pub fn from_id(session: &mut Session, physical_id: impl Into<PhysicalId>) -> CoreResult<Ref> {
        session.register_reference(ResourceKind::PrivateLocation, physical_id)
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.props.name
    }

    /// Selection slug
    #[must_use]
    pub fn slug_name(&self) -> &str {
        &self.props.slug_name
    }
}

#[async_trait]
impl Construct for PrivateLocation {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PrivateLocation
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if self.props.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        }
        let slug = &self.props.slug_name;
        if !SLUG_PATTERN.is_match(slug) {
            diagnostics.add(Diagnostic::invalid_property_value(
                "slugName",
                format!(
                    "\"{}\" must be 1 to 30 lowercase letters, digits or dashes.",
                    slug
                ),
            ));
        } else if REGION_PATTERN.is_match(slug) {
            diagnostics.add(Diagnostic::invalid_property_value(
                "slugName",
                format!("\"{}\" is reserved for a public location.", slug),
            ));
        }
        if let Some(proxy) = &self.props.proxy_url {
            if !proxy.starts_with("http://") && !proxy.starts_with("https://") {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "proxyUrl",
                    format!("\"{}\" is not an http(s) URL.", proxy),
                ));
            }
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(serde_json::to_value(&self.props)?)
    }
}

/// Run a check on a private location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateLocationCheckAssignment {
    logical_id: LogicalId,
    private_location: Ref,
    check: Ref,
}

impl PrivateLocationCheckAssignment {
    /// Assign `check` to `location`
    ///
    /// # Errors
    ///
    /// Returns error if the derived logical id is invalid
    pub fn new(check: &LogicalId, location: &Ref) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(format!(
                "private-location-check-assignment#{}#{}",
                check,
                location.logical_id()
            ))?,
            private_location: location.clone(),
            check: check.to_ref(),
        })
    }
}

#[async_trait]
impl Construct for PrivateLocationCheckAssignment {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PrivateLocationCheckAssignment
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        ctx.require_ref("privateLocationId", ResourceKind::PrivateLocation, &self.private_location, diagnostics);
        ctx.require_ref("checkId", ResourceKind::Check, &self.check, diagnostics);
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(json!({
            "privateLocationId": self.private_location,
            "checkId": self.check,
        }))
    }
}

/// Run every check of a group on a private location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateLocationGroupAssignment {
    logical_id: LogicalId,
    private_location: Ref,
    group: Ref,
}

impl PrivateLocationGroupAssignment {
    /// Assign `group` to `location`
    ///
    /// # Errors
    ///
    /// Returns error if the derived logical id is invalid
    pub fn new(group: &LogicalId, location: &Ref) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(format!(
                "private-location-group-assignment#{}#{}",
                group,
                location.logical_id()
            ))?,
            private_location: location.clone(),
            group: group.to_ref(),
        })
    }
}

#[async_trait]
impl Construct for PrivateLocationGroupAssignment {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PrivateLocationGroupAssignment
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        ctx.require_ref("privateLocationId", ResourceKind::PrivateLocation, &self.private_location, diagnostics);
        ctx.require_ref("groupId", ResourceKind::CheckGroup, &self.group, diagnostics);
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(json!({
            "privateLocationId": self.private_location,
            "groupId": self.group,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use vigil_bundle::builtin_runtimes;
    use vigil_core::Diagnostics;

    async fn validate_slug(slug: &str) -> Diagnostics {
        let project = Project::new("demo", "Demo").unwrap();
        let runtimes = builtin_runtimes();
        let ctx = ValidationContext::new(&project, &runtimes, std::path::Path::new("."));
        let location = PrivateLocation::new(
            "dc",
            PrivateLocationProps {
                name: "Datacenter".to_string(),
                slug_name: slug.to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let mut diagnostics = Diagnostics::new();
        location.validate(&ctx, &mut diagnostics).await;
        diagnostics
    }

    #[tokio::test]
    async fn test_slug_rules() {
        assert!(validate_slug("berlin-dc-1").await.is_empty());
        assert!(validate_slug("Berlin").await.is_fatal());
        assert!(validate_slug("").await.is_fatal());
        assert!(validate_slug(&"a".repeat(31)).await.is_fatal());
        assert!(validate_slug("eu-central-1").await.is_fatal());
    }

    #[test]
    fn test_assignment_payload() {
        let check = LogicalId::new("home").unwrap();
        let assignment = PrivateLocationCheckAssignment::new(&check, &Ref::from("dc")).unwrap();
        let payload = assignment.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["privateLocationId"], json!({ "ref": "dc" }));
        assert_eq!(payload["checkId"], json!({ "ref": "home" }));
    }
}
