//! Resource kinds and their synthesis order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag of a construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Service shown on a status page
    StatusPageService,
    /// Public status page
    StatusPage,
    /// Any check or monitor
    Check,
    /// Group of checks sharing settings
    CheckGroup,
    /// Alert destination
    AlertChannel,
    /// Link between an alert channel and a check or group
    AlertChannelSubscription,
    /// Scheduled mute window
    MaintenanceWindow,
    /// Self-hosted execution location
    PrivateLocation,
    /// Link between a private location and a check
    PrivateLocationCheckAssignment,
    /// Link between a private location and a group
    PrivateLocationGroupAssignment,
    /// Public dashboard
    Dashboard,
}

/// Emission order: referenced kinds come before their referrers
pub const SYNTHESIS_ORDER: [ResourceKind; 11] = [
    ResourceKind::StatusPageService,
    ResourceKind::StatusPage,
    ResourceKind::Check,
    ResourceKind::CheckGroup,
    ResourceKind::AlertChannel,
    ResourceKind::AlertChannelSubscription,
    ResourceKind::MaintenanceWindow,
    ResourceKind::PrivateLocation,
    ResourceKind::PrivateLocationCheckAssignment,
    ResourceKind::PrivateLocationGroupAssignment,
    ResourceKind::Dashboard,
];

impl ResourceKind {
    /// Wire tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusPageService => "status-page-service",
            Self::StatusPage => "status-page",
            Self::Check => "check",
            Self::CheckGroup => "check-group",
            Self::AlertChannel => "alert-channel",
            Self::AlertChannelSubscription => "alert-channel-subscription",
            Self::MaintenanceWindow => "maintenance-window",
            Self::PrivateLocation => "private-location",
            Self::PrivateLocationCheckAssignment => "private-location-check-assignment",
            Self::PrivateLocationGroupAssignment => "private-location-group-assignment",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags_match_serde() {
        for kind in SYNTHESIS_ORDER {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_order_places_referenced_kinds_first() {
        let pos = |k: ResourceKind| SYNTHESIS_ORDER.iter().position(|x| *x == k).unwrap();
        assert!(pos(ResourceKind::StatusPageService) < pos(ResourceKind::Check));
        assert!(pos(ResourceKind::Check) < pos(ResourceKind::CheckGroup));
        assert!(pos(ResourceKind::AlertChannel) < pos(ResourceKind::AlertChannelSubscription));
        assert!(pos(ResourceKind::PrivateLocation) < pos(ResourceKind::PrivateLocationCheckAssignment));
        assert_eq!(SYNTHESIS_ORDER.last(), Some(&ResourceKind::Dashboard));
    }
}
