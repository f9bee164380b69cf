//! Status pages and the services shown on them.

use crate::construct::{Construct, ValidationContext};
use crate::kind::ResourceKind;
use crate::session::Session;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vigil_core::{CoreResult, Diagnostic, DiagnosticSink, LogicalId, PhysicalId, Ref};

/// A service whose health a status page reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPageService {
    logical_id: LogicalId,
    name: String,
}

impl StatusPageService {
    /// Create a service
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, name: impl Into<String>) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            name: name.into(),
        })
    }

    /// Reference an existing service by its UUID
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot accept constructs
    pub fn from_id(session: &mut Session, physical_id: impl Into<PhysicalId>) -> CoreResult<Ref> {
        session.register_reference(ResourceKind::StatusPageService, physical_id)
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Construct for StatusPageService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StatusPageService
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if self.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(json!({ "name": self.name }))
    }
}

/// Color theme of a status page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusPageTheme {
    /// Follow the visitor's preference
    #[default]
    Auto,
    /// Dark
    Dark,
    /// Light
    Light,
}

/// A group of services on a status page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPageCard {
    /// Card title
    pub name: String,
    /// Services on the card
    #[serde(default)]
    pub services: Vec<Ref>,
}

/// Declared status page properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPageProps {
    /// Page title
    pub name: String,
    /// Subdomain on the vendor domain
    pub url: String,
    /// Own domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    /// Logo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Logo link target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    /// Favicon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Color theme
    #[serde(default)]
    pub default_theme: StatusPageTheme,
    /// Cards in display order
    #[serde(default)]
    pub cards: Vec<StatusPageCard>,
}

/// A public status page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPage {
    logical_id: LogicalId,
    props: StatusPageProps,
}

impl StatusPage {
    /// Create a status page
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: StatusPageProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
        })
    }

    /// Page title
    #[must_use]
    pub fn name(&self) -> &str {
        &self.props.name
    }
}

#[async_trait]
impl Construct for StatusPage {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StatusPage
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if self.props.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        }
        if self.props.url.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("url", "A url is required."));
        }
        for card in &self.props.cards {
            for service in &card.services {
                ctx.require_ref("cards", ResourceKind::StatusPageService, service, diagnostics);
            }
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        Ok(serde_json::to_value(&self.props)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use vigil_core::Diagnostics;

    #[tokio::test]
    async fn test_cards_resolve_services() {
        let mut session = Session::new();
        session.set_project(Project::new("demo", "Demo").unwrap()).unwrap();
        let api = session.register(StatusPageService::new("api", "API").unwrap()).unwrap();

        let page = StatusPage::new(
            "status",
            StatusPageProps {
                name: "Acme status".to_string(),
                url: "acme".to_string(),
                cards: vec![StatusPageCard {
                    name: "Core".to_string(),
                    services: vec![api, Ref::from("missing")],
                }],
                ..Default::default()
            },
        )
        .unwrap();

        let ctx = session.validation_context().unwrap();
        let mut diagnostics = Diagnostics::new();
        page.validate(&ctx, &mut diagnostics).await;
        assert_eq!(diagnostics.errors().count(), 1);
        assert!(diagnostics.observations()[0].message().contains("missing"));

        let payload = page.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["cards"][0]["services"][0], json!({ "ref": "api" }));
        assert_eq!(payload["defaultTheme"], "AUTO");
    }

    #[test]
    fn test_service_from_id_is_repeatable() {
        let mut session = Session::new();
        session.set_project(Project::new("demo", "Demo").unwrap()).unwrap();
        let id = "0b9f6c3e-6d0a-4a8e-8a59-0f3c3b1f6a11";
        let first = StatusPageService::from_id(&mut session, id).unwrap();
        let second = StatusPageService::from_id(&mut session, id).unwrap();
        assert_eq!(first, second);
    }
}
