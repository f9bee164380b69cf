//! Alert channels and their subscriptions.

use crate::construct::{Construct, ValidationContext};
use crate::kind::ResourceKind;
use crate::session::Session;
use crate::synth::LoadedFiles;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::{CoreResult, Diagnostic, DiagnosticSink, LogicalId, PhysicalId, Ref};

const MAX_SSL_EXPIRY_THRESHOLD: u32 = 30;

/// Destination of an alert channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertChannelConfig {
    /// Email
    Email {
        /// Recipient address
        address: String,
    },
    /// Generic HTTP webhook
    Webhook {
        /// Display name
        name: String,
        /// Target URL
        url: String,
        /// HTTP method
        #[serde(default = "default_webhook_method")]
        method: String,
        /// Body template
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    /// Slack incoming webhook
    Slack {
        /// Incoming webhook URL
        url: String,
        /// Channel override
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    /// Text message
    Sms {
        /// Display name
        name: String,
        /// Phone number
        number: String,
    },
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

/// Declared alert channel properties
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannelProps {
    /// Destination
    pub channel: AlertChannelConfig,
    /// Alert on recovery
    #[serde(default)]
    pub send_recovery: Option<bool>,
    /// Alert on failure
    #[serde(default)]
    pub send_failure: Option<bool>,
    /// Alert on degradation
    #[serde(default)]
    pub send_degraded: Option<bool>,
    /// Alert on expiring certificates
    #[serde(default)]
    pub ssl_expiry: Option<bool>,
    /// Days before expiry to alert
    #[serde(default)]
    pub ssl_expiry_threshold: Option<u32>,
}

impl AlertChannelProps {
    /// Props for `channel` with default alert settings
    #[must_use]
    pub fn new(channel: AlertChannelConfig) -> Self {
        Self {
            channel,
            send_recovery: None,
            send_failure: None,
            send_degraded: None,
            ssl_expiry: None,
            ssl_expiry_threshold: None,
        }
    }
}

/// An alert destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertChannel {
    logical_id: LogicalId,
    props: AlertChannelProps,
}

impl AlertChannel {
    /// Create an alert channel
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: AlertChannelProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
        })
    }

    /// Reference an existing channel by its numeric id
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot accept constructs
    pub fn from_id(session: &mut Session, physical_id: impl Into<PhysicalId>) -> CoreResult<Ref> {
        session.register_reference(ResourceKind::AlertChannel, physical_id)
    }

    /// Destination
    #[must_use]
    pub fn config(&self) -> &AlertChannelConfig {
        &self.props.channel
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[async_trait]
impl Construct for AlertChannel {
    fn kind(&self) -> ResourceKind {
        ResourceKind::AlertChannel
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        match &self.props.channel {
            AlertChannelConfig::Email { address } if !address.contains('@') => {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "address",
                    format!("\"{}\" is not an email address.", address),
                ));
            }
            AlertChannelConfig::Webhook { url, .. } | AlertChannelConfig::Slack { url, .. } if !is_http_url(url) => {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "url",
                    format!("\"{}\" is not an http(s) URL.", url),
                ));
            }
            AlertChannelConfig::Sms { number, .. } if number.trim().is_empty() => {
                diagnostics.add(Diagnostic::invalid_property_value("number", "A phone number is required."));
            }
            _ => {}
        }

        if let Some(threshold) = self.props.ssl_expiry_threshold {
            if !(1..=MAX_SSL_EXPIRY_THRESHOLD).contains(&threshold) {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "sslExpiryThreshold",
                    format!(
                        "sslExpiryThreshold must be between 1 and {}, got {}.",
                        MAX_SSL_EXPIRY_THRESHOLD, threshold
                    ),
                ));
            }
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        let props = &self.props;
        let mut payload = match serde_json::to_value(&props.channel)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("sendRecovery".into(), props.send_recovery.unwrap_or(true).into());
        payload.insert("sendFailure".into(), props.send_failure.unwrap_or(true).into());
        payload.insert("sendDegraded".into(), props.send_degraded.unwrap_or(false).into());
        payload.insert("sslExpiry".into(), props.ssl_expiry.unwrap_or(false).into());
        payload.insert(
            "sslExpiryThreshold".into(),
            props.ssl_expiry_threshold.unwrap_or(MAX_SSL_EXPIRY_THRESHOLD).into(),
        );
        Ok(Value::Object(payload))
    }
}

/// What a subscription attaches an alert channel to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
    /// A single check
    Check(Ref),
    /// Every check of a group
    Group(Ref),
}

/// Link between an alert channel and a check or group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertChannelSubscription {
    logical_id: LogicalId,
    alert_channel: Ref,
    target: SubscriptionTarget,
    activated: bool,
}

impl AlertChannelSubscription {
    /// Subscribe `check` to `channel`
    ///
    /// # Errors
    ///
    /// Returns error if the derived logical id is invalid
    pub fn for_check(check: &LogicalId, channel: &Ref) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(format!(
                "check-alert-channel-subscription#{}#{}",
                check,
                channel.logical_id()
            ))?,
            alert_channel: channel.clone(),
            target: SubscriptionTarget::Check(check.to_ref()),
            activated: true,
        })
    }

    /// Subscribe every check of `group` to `channel`
    ///
    /// # Errors
    ///
    /// Returns error if the derived logical id is invalid
    pub fn for_group(group: &LogicalId, channel: &Ref) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(format!(
                "check-group-alert-channel-subscription#{}#{}",
                group,
                channel.logical_id()
            ))?,
            alert_channel: channel.clone(),
            target: SubscriptionTarget::Group(group.to_ref()),
            activated: true,
        })
    }

    /// Subscribed target
    #[must_use]
    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }
}

#[async_trait]
impl Construct for AlertChannelSubscription {
    fn kind(&self) -> ResourceKind {
        ResourceKind::AlertChannelSubscription
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        ctx.require_ref("alertChannelId", ResourceKind::AlertChannel, &self.alert_channel, diagnostics);
        match &self.target {
            SubscriptionTarget::Check(check) => {
                ctx.require_ref("checkId", ResourceKind::Check, check, diagnostics);
            }
            SubscriptionTarget::Group(group) => {
                ctx.require_ref("groupId", ResourceKind::CheckGroup, group, diagnostics);
            }
        }
    }

    fn synthesize(&self, _files: &LoadedFiles) -> CoreResult<Value> {
        let mut payload = Map::new();
        payload.insert("alertChannelId".into(), serde_json::to_value(&self.alert_channel)?);
        match &self.target {
            SubscriptionTarget::Check(check) => {
                payload.insert("checkId".into(), serde_json::to_value(check)?);
            }
            SubscriptionTarget::Group(group) => {
                payload.insert("groupId".into(), serde_json::to_value(group)?);
            }
        }
        payload.insert("activated".into(), self.activated.into());
        Ok(Value::Object(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use serde_json::json;
    use vigil_bundle::builtin_runtimes;
    use vigil_core::Diagnostics;

    fn email(address: &str) -> AlertChannel {
        AlertChannel::new(
            "email",
            AlertChannelProps::new(AlertChannelConfig::Email {
                address: address.to_string(),
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_channel_rules() {
        let project = Project::new("demo", "Demo").unwrap();
        let runtimes = builtin_runtimes();
        let ctx = ValidationContext::new(&project, &runtimes, std::path::Path::new("."));

        let mut diagnostics = Diagnostics::new();
        email("ops@example.com").validate(&ctx, &mut diagnostics).await;
        assert!(diagnostics.is_empty());

        let mut diagnostics = Diagnostics::new();
        email("ops").validate(&ctx, &mut diagnostics).await;
        assert!(diagnostics.is_fatal());

        let slack = AlertChannelProps {
            ssl_expiry_threshold: Some(31),
            ..AlertChannelProps::new(AlertChannelConfig::Slack {
                url: "ftp://hooks".to_string(),
                channel: None,
            })
        };
        let mut diagnostics = Diagnostics::new();
        AlertChannel::new("slack", slack)
            .unwrap()
            .validate(&ctx, &mut diagnostics)
            .await;
        assert_eq!(diagnostics.errors().count(), 2);
    }

    #[test]
    fn test_channel_payload() {
        let payload = email("ops@example.com").synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["type"], "EMAIL");
        assert_eq!(payload["config"], json!({ "address": "ops@example.com" }));
        assert_eq!(payload["sendRecovery"], true);
        assert_eq!(payload["sslExpiryThreshold"], 30);
    }

    #[test]
    fn test_channel_config_deserialize() {
        let props: AlertChannelProps = serde_json::from_str(
            r#"{"channel": {"type": "WEBHOOK", "config": {"name": "hook", "url": "https://example.com"}}, "sendDegraded": true}"#,
        )
        .unwrap();
        match props.channel {
            AlertChannelConfig::Webhook { method, .. } => assert_eq!(method, "POST"),
            other => panic!("unexpected channel {:?}", other),
        }
        assert_eq!(props.send_degraded, Some(true));
    }

    #[test]
    fn test_subscription_payload() {
        let check = LogicalId::new("home").unwrap();
        let subscription = AlertChannelSubscription::for_check(&check, &Ref::from("email")).unwrap();
        assert_eq!(
            subscription.logical_id().as_str(),
            "check-alert-channel-subscription#home#email"
        );
        let payload = subscription.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(
            payload,
            json!({
                "alertChannelId": { "ref": "email" },
                "checkId": { "ref": "home" },
                "activated": true,
            })
        );
    }
}
