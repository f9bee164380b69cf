//! Closed set of managed construct kinds.

use crate::alert_channel::{AlertChannel, AlertChannelSubscription};
use crate::check::Check;
use crate::check_group::CheckGroup;
use crate::construct::{Construct, ValidationContext};
use crate::dashboard::Dashboard;
use crate::kind::ResourceKind;
use crate::maintenance_window::MaintenanceWindow;
use crate::private_location::{
    PrivateLocation, PrivateLocationCheckAssignment, PrivateLocationGroupAssignment,
};
use crate::status_page::{StatusPage, StatusPageService};
use crate::synth::{FileInput, LoadedFiles};
use async_trait::async_trait;
use serde_json::Value;
use vigil_core::{CoreResult, DiagnosticSink, LogicalId};

/// A construct owned by the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Check or monitor
    Check(Check),
    /// Check group
    CheckGroup(CheckGroup),
    /// Alert channel
    AlertChannel(AlertChannel),
    /// Alert channel subscription
    AlertChannelSubscription(AlertChannelSubscription),
    /// Maintenance window
    MaintenanceWindow(MaintenanceWindow),
    /// Private location
    PrivateLocation(PrivateLocation),
    /// Check to private location assignment
    PrivateLocationCheckAssignment(PrivateLocationCheckAssignment),
    /// Group to private location assignment
    PrivateLocationGroupAssignment(PrivateLocationGroupAssignment),
    /// Dashboard
    Dashboard(Dashboard),
    /// Status page
    StatusPage(StatusPage),
    /// Status page service
    StatusPageService(StatusPageService),
}

macro_rules! each_resource {
    ($resource:expr, $inner:ident => $body:expr) => {
        match $resource {
            Resource::Check($inner) => $body,
            Resource::CheckGroup($inner) => $body,
            Resource::AlertChannel($inner) => $body,
            Resource::AlertChannelSubscription($inner) => $body,
            Resource::MaintenanceWindow($inner) => $body,
            Resource::PrivateLocation($inner) => $body,
            Resource::PrivateLocationCheckAssignment($inner) => $body,
            Resource::PrivateLocationGroupAssignment($inner) => $body,
            Resource::Dashboard($inner) => $body,
            Resource::StatusPage($inner) => $body,
            Resource::StatusPageService($inner) => $body,
        }
    };
}

macro_rules! impl_from_construct {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(construct: $variant) -> Self {
                    Self::$variant(construct)
                }
            }
        )*
    };
}

impl_from_construct!(
    Check,
    CheckGroup,
    AlertChannel,
    AlertChannelSubscription,
    MaintenanceWindow,
    PrivateLocation,
    PrivateLocationCheckAssignment,
    PrivateLocationGroupAssignment,
    Dashboard,
    StatusPage,
    StatusPageService,
);

impl Resource {
    /// Display name, for kinds that have one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Check(check) => Some(check.name()),
            Self::CheckGroup(group) => Some(group.name()),
            Self::PrivateLocation(location) => Some(location.name()),
            Self::StatusPage(page) => Some(page.name()),
            Self::StatusPageService(service) => Some(service.name()),
            _ => None,
        }
    }

    /// Only deployed for test runs
    #[must_use]
    pub fn is_test_only(&self) -> bool {
        matches!(self, Self::Check(check) if check.is_test_only())
    }

    /// Resources implied by this one, registered alongside it
    ///
    /// # Errors
    ///
    /// Returns error if a derived logical id is invalid
    pub fn derived(&self) -> CoreResult<Vec<Resource>> {
        match self {
            Self::Check(check) => check.derived(),
            Self::CheckGroup(group) => group.derived(),
            _ => Ok(Vec::new()),
        }
    }

    /// Files that must be loaded before synthesis
    #[must_use]
    pub fn file_inputs(&self) -> Vec<FileInput> {
        match self {
            Self::Check(check) => check.file_inputs(),
            Self::Dashboard(dashboard) => dashboard.file_inputs(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Construct for Resource {
    fn kind(&self) -> ResourceKind {
        each_resource!(self, inner => inner.kind())
    }

    fn logical_id(&self) -> &LogicalId {
        each_resource!(self, inner => inner.logical_id())
    }

    fn before_validate(&self, diagnostics: &mut dyn DiagnosticSink) {
        each_resource!(self, inner => inner.before_validate(diagnostics))
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        each_resource!(self, inner => inner.validate(ctx, diagnostics).await)
    }

    fn synthesize(&self, files: &LoadedFiles) -> CoreResult<Value> {
        each_resource!(self, inner => inner.synthesize(files))
    }
}
