//! Maintenance windows.

use crate::construct::{Construct, ValidationContext};
use crate::kind::ResourceKind;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{CoreResult, Diagnostic, DiagnosticSink, LogicalId};

/// Repeat period of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatUnit {
    /// Daily
    Day,
    /// Weekly
    Week,
    /// Monthly
    Month,
}

/// Declared maintenance window properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindowProps {
    /// Display name
    pub name: String,
    /// Checks carrying any of these tags are muted
    #[serde(default)]
    pub tags: Vec<String>,
    /// Start of the first window
    pub starts_at: DateTime<Utc>,
    /// End of the first window
    pub ends_at: DateTime<Utc>,
    /// Repeat period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_unit: Option<RepeatUnit>,
    /// Repeat every this many units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<u32>,
    /// Stop repeating after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_ends_at: Option<DateTime<Utc>>,
}

/// A scheduled mute window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceWindow {
    logical_id: LogicalId,
    props: MaintenanceWindowProps,
}

impl MaintenanceWindow {
    /// Create a maintenance window
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: MaintenanceWindowProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
        })
    }
}

#[async_trait]
impl Construct for MaintenanceWindow {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MaintenanceWindow
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        let props = &self.props;
        if props.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        }
        if props.ends_at <= props.starts_at {
            diagnostics.add(Diagnostic::conflicting_properties(
                "startsAt",
                "endsAt",
                "endsAt must be after startsAt.",
            ));
        }
        if props.repeat_unit.is_some() && props.repeat_interval.unwrap_or(0) < 1 {
            diagnostics.add(Diagnostic::invalid_property_value(
                "repeatInterval",
                "A repeating window needs a repeatInterval of at least 1.",
            ));
        }
        if let Some(repeat_ends_at) = props.repeat_ends_at {
            if repeat_ends_at <= props.starts_at {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "repeatEndsAt",
                    "repeatEndsAt must be after startsAt.",
                ));
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
    use chrono::TimeZone;
    use vigil_bundle::builtin_runtimes;
    use vigil_core::Diagnostics;

    fn props() -> MaintenanceWindowProps {
        MaintenanceWindowProps {
            name: "Deploys".to_string(),
            tags: vec!["prod".to_string()],
            starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 2, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap(),
            repeat_unit: None,
            repeat_interval: None,
            repeat_ends_at: None,
        }
    }

    async fn validate(window: &MaintenanceWindow) -> Diagnostics {
        let project = Project::new("demo", "Demo").unwrap();
        let runtimes = builtin_runtimes();
        let ctx = ValidationContext::new(&project, &runtimes, std::path::Path::new("."));
        let mut diagnostics = Diagnostics::new();
        window.validate(&ctx, &mut diagnostics).await;
        diagnostics
    }

    #[tokio::test]
    async fn test_window_rules() {
        let window = MaintenanceWindow::new("deploys", props()).unwrap();
        assert!(validate(&window).await.is_empty());

        let inverted = MaintenanceWindowProps {
            ends_at: Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap(),
            repeat_unit: Some(RepeatUnit::Week),
            ..props()
        };
        let window = MaintenanceWindow::new("inverted", inverted).unwrap();
        assert_eq!(validate(&window).await.errors().count(), 2);
    }

    #[test]
    fn test_payload_timestamps() {
        let window = MaintenanceWindow::new("deploys", props()).unwrap();
        let payload = window.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["startsAt"], "2025-01-01T02:00:00Z");
        assert!(payload.get("repeatUnit").is_none());
    }
}
