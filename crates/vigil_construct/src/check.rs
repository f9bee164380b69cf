//! Checks and monitors.
//!
//! Every check kind shares [`CheckProps`]; the kind-specific part lives in
//! [`CheckSpec`]. Defaults are cascaded once, in [`Check::new`].

use crate::alert_channel::AlertChannelSubscription;
use crate::construct::{Construct, ContentSource, ValidationContext};
use crate::defaults::DefaultsCascade;
use crate::kind::ResourceKind;
use crate::private_location::PrivateLocationCheckAssignment;
use crate::resource::Resource;
use crate::retry::{retry_fields, validate_retry_settings, RetryStrategy};
use crate::session::Session;
use crate::synth::{FileInput, LoadedFile, LoadedFiles};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use vigil_core::{CoreError, CoreResult, Diagnostic, DiagnosticSink, LogicalId, Ref};

/// Allowed run frequencies in minutes
pub const ALLOWED_FREQUENCIES: [u32; 13] = [0, 1, 2, 5, 10, 15, 30, 60, 120, 180, 360, 720, 1440];

/// Allowed offsets in seconds for sub-minute frequencies
pub const ALLOWED_FREQUENCY_OFFSETS: [u32; 3] = [10, 20, 30];

const DEFAULT_FREQUENCY: u32 = 10;
const MAX_API_RESPONSE_TIME: u32 = 30_000;
const MAX_SOCKET_RESPONSE_TIME: u32 = 5_000;

/// Check kind tag, as emitted in payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    /// HTTP request with assertions
    Api,
    /// Single-page browser script
    Browser,
    /// Multi-step script
    MultiStep,
    /// Inbound ping monitor
    Heartbeat,
    /// TCP connect monitor
    Tcp,
    /// DNS query monitor
    Dns,
}

impl CheckType {
    /// Whether the check runs a script on a runtime
    #[must_use]
    pub const fn uses_runtime(self) -> bool {
        matches!(self, Self::Api | Self::Browser | Self::MultiStep)
    }

    /// Whether sub-minute scheduling (frequency 0) is supported
    #[must_use]
    pub const fn supports_high_frequency(self) -> bool {
        matches!(self, Self::Api | Self::Tcp | Self::Dns)
    }
}

/// Environment variable passed to check runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    /// Name
    pub key: String,
    /// Value
    pub value: String,
    /// Hidden in the UI
    #[serde(default)]
    pub locked: bool,
    /// Write-only secret
    #[serde(default)]
    pub secret: bool,
}

impl EnvironmentVariable {
    /// Plain variable
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            locked: false,
            secret: false,
        }
    }
}

/// Where a check runs privately: a slug or a managed private location
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PrivateLocationTarget {
    /// Slug of a location managed elsewhere
    Slug(String),
    /// Private location construct of this project
    Construct(Ref),
}

/// Severity of an incident opened by a failing check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    /// Minor
    Minor,
    /// Medium
    Medium,
    /// Major
    Major,
    /// Critical
    Critical,
}

/// Open an incident on a status-page service when the check fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentTrigger {
    /// Affected status-page service
    #[serde(rename = "serviceId", alias = "service")]
    pub service: Ref,
    /// Incident severity
    pub severity: IncidentSeverity,
    /// Incident title
    pub name: String,
    /// Incident body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Notify status page subscribers
    #[serde(default)]
    pub notify_subscribers: bool,
}

/// Properties shared by every check kind, as declared
///
/// `None` means "inherit"; see [`DefaultsCascade`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckProps {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Whether the check runs
    #[serde(default)]
    pub activated: Option<bool>,
    /// Whether alerts are muted
    #[serde(default)]
    pub muted: Option<bool>,
    /// Invert pass/fail
    #[serde(default)]
    pub should_fail: Option<bool>,
    /// Deprecated; superseded by retry strategies
    #[serde(default)]
    pub double_check: Option<bool>,
    /// Run in all locations at once
    #[serde(default)]
    pub run_parallel: Option<bool>,
    /// Runtime id
    #[serde(default)]
    pub runtime_id: Option<String>,
    /// Public locations
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    /// Private locations
    #[serde(default)]
    pub private_locations: Option<Vec<PrivateLocationTarget>>,
    /// Tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Minutes between runs
    #[serde(default)]
    pub frequency: Option<u32>,
    /// Seconds between runs when frequency is 0
    #[serde(default)]
    pub frequency_offset: Option<u32>,
    /// Environment variables
    #[serde(default)]
    pub environment_variables: Option<Vec<EnvironmentVariable>>,
    /// Owning group
    #[serde(default)]
    pub group: Option<Ref>,
    /// Alert channels to subscribe
    #[serde(default)]
    pub alert_channels: Option<Vec<Ref>>,
    /// Only deployed for test runs
    #[serde(default)]
    pub test_only: Option<bool>,
    /// Retry strategy
    #[serde(default)]
    pub retry_strategy: Option<RetryStrategy>,
    /// Incident automation
    #[serde(default)]
    pub trigger_incident: Option<IncidentTrigger>,
}

impl CheckProps {
    /// Props with just a display name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Key/value pair of an HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Key
    pub key: String,
    /// Value
    pub value: String,
}

/// One assertion on an API response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    /// What is inspected (STATUS_CODE, JSON_BODY, HEADERS, ...)
    pub source: String,
    /// Sub-property (JSON path, header name)
    #[serde(default)]
    pub property: String,
    /// Comparison operator
    pub comparison: String,
    /// Expected value
    pub target: String,
}

/// HTTP request of an API check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    /// Target URL
    pub url: String,
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    /// Query parameters
    #[serde(default)]
    pub query_parameters: Vec<KeyValue>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Follow redirects
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    /// Skip TLS verification
    #[serde(default)]
    pub skip_ssl: bool,
    /// Response assertions
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_true() -> bool {
    true
}

impl ApiRequest {
    /// GET request to `url`
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: Vec::new(),
            query_parameters: Vec::new(),
            body: None,
            follow_redirects: true,
            skip_ssl: false,
            assertions: Vec::new(),
        }
    }
}

/// API check details
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCheckSpec {
    /// Request to send
    pub request: ApiRequest,
    /// Degraded above this many milliseconds
    #[serde(default)]
    pub degraded_response_time: Option<u32>,
    /// Failed above this many milliseconds
    #[serde(default)]
    pub max_response_time: Option<u32>,
    /// Script run before the request
    #[serde(default)]
    pub setup_script: Option<ContentSource>,
    /// Script run after the request
    #[serde(default)]
    pub tear_down_script: Option<ContentSource>,
}

impl ApiCheckSpec {
    /// Spec for `request` with no thresholds or scripts
    #[must_use]
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            degraded_response_time: None,
            max_response_time: None,
            setup_script: None,
            tear_down_script: None,
        }
    }
}

/// Browser or multi-step check details
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCheckSpec {
    /// Script to bundle
    pub code: ContentSource,
}

/// Unit of a heartbeat period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// Convert `value` of this unit to seconds
    #[must_use]
    pub const fn to_seconds(self, value: u64) -> u64 {
        match self {
            Self::Seconds => value,
            Self::Minutes => value * 60,
            Self::Hours => value * 3_600,
            Self::Days => value * 86_400,
        }
    }
}

/// Heartbeat monitor details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSpec {
    /// Expected ping interval
    pub period: u32,
    /// Unit of `period`
    pub period_unit: TimeUnit,
    /// Tolerated lateness
    pub grace: u32,
    /// Unit of `grace`
    pub grace_unit: TimeUnit,
}

const MIN_HEARTBEAT_SECONDS: u64 = 30;
const MAX_HEARTBEAT_SECONDS: u64 = 365 * 86_400;

/// TCP monitor details
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpSpec {
    /// Host to connect to
    pub hostname: String,
    /// Port to connect to
    pub port: u32,
    /// Payload written after connecting
    #[serde(default)]
    pub data: Option<String>,
    /// Degraded above this many milliseconds
    #[serde(default)]
    pub degraded_response_time: Option<u32>,
    /// Failed above this many milliseconds
    #[serde(default)]
    pub max_response_time: Option<u32>,
}

/// DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsRecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Mail exchange
    Mx,
    /// Name server
    Ns,
    /// Text
    Txt,
    /// Start of authority
    Soa,
}

/// DNS monitor details
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSpec {
    /// Name to resolve
    pub query: String,
    /// Record type
    pub record_type: DnsRecordType,
    /// Resolver to ask
    #[serde(default)]
    pub name_server: Option<String>,
    /// Resolver port
    #[serde(default)]
    pub port: Option<u32>,
    /// Degraded above this many milliseconds
    #[serde(default)]
    pub degraded_response_time: Option<u32>,
    /// Failed above this many milliseconds
    #[serde(default)]
    pub max_response_time: Option<u32>,
}

/// Kind-specific part of a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSpec {
    /// HTTP request
    Api(ApiCheckSpec),
    /// Browser script
    Browser(ScriptCheckSpec),
    /// Multi-step script
    MultiStep(ScriptCheckSpec),
    /// Heartbeat
    Heartbeat(HeartbeatSpec),
    /// TCP connect
    Tcp(TcpSpec),
    /// DNS query
    Dns(DnsSpec),
}

impl CheckSpec {
    /// Kind tag
    #[must_use]
    pub const fn check_type(&self) -> CheckType {
        match self {
            Self::Api(_) => CheckType::Api,
            Self::Browser(_) => CheckType::Browser,
            Self::MultiStep(_) => CheckType::MultiStep,
            Self::Heartbeat(_) => CheckType::Heartbeat,
            Self::Tcp(_) => CheckType::Tcp,
            Self::Dns(_) => CheckType::Dns,
        }
    }
}

/// A check with its defaults resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    logical_id: LogicalId,
    name: String,
    activated: bool,
    muted: bool,
    should_fail: bool,
    double_check: Option<bool>,
    run_parallel: bool,
    runtime_id: Option<String>,
    locations: Vec<String>,
    private_locations: Vec<PrivateLocationTarget>,
    tags: Vec<String>,
    frequency: u32,
    frequency_offset: Option<u32>,
    environment_variables: Vec<EnvironmentVariable>,
    group: Option<Ref>,
    alert_channels: Vec<Ref>,
    test_only: bool,
    retry_strategy: Option<RetryStrategy>,
    trigger_incident: Option<IncidentTrigger>,
    spec: CheckSpec,
}

impl Check {
    /// Create a check, resolving inherited properties
    ///
    /// Group defaults apply only if the group is already known to the
    /// session. Heartbeats never inherit `doubleCheck` or `retryStrategy`.
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(
        session: &Session,
        logical_id: &str,
        props: CheckProps,
        spec: impl Into<CheckSpec>,
    ) -> CoreResult<Self> {
        let logical_id = LogicalId::new(logical_id)?;
        let spec = spec.into();
        let check_type = spec.check_type();

        let group_defaults = props
            .group
            .as_ref()
            .and_then(|group| session.find(ResourceKind::CheckGroup, group.logical_id()))
            .and_then(|entry| match entry.as_resource() {
                Some(Resource::CheckGroup(group)) => Some(group.defaults()),
                _ => None,
            });
        let cascade = DefaultsCascade::for_check(check_type, group_defaults, session.defaults());

        let inherits_retries = check_type != CheckType::Heartbeat;
        let double_check = props
            .double_check
            .or_else(|| inherits_retries.then(|| cascade.resolve(|d| d.double_check.as_ref())).flatten());
        let retry_strategy = props
            .retry_strategy
            .or_else(|| inherits_retries.then(|| cascade.resolve(|d| d.retry_strategy.as_ref())).flatten());

        let runtime_id = if check_type.uses_runtime() {
            Some(
                props
                    .runtime_id
                    .or_else(|| cascade.resolve(|d| d.runtime_id.as_ref()))
                    .unwrap_or_else(|| session.default_runtime_id().to_string()),
            )
        } else {
            None
        };

        let private_locations = props.private_locations.unwrap_or_else(|| {
            cascade
                .resolve(|d| d.private_locations.as_ref())
                .unwrap_or_default()
                .into_iter()
                .map(PrivateLocationTarget::Slug)
                .collect()
        });

        Ok(Self {
            logical_id,
            name: props.name,
            activated: props
                .activated
                .or_else(|| cascade.resolve(|d| d.activated.as_ref()))
                .unwrap_or(true),
            muted: props
                .muted
                .or_else(|| cascade.resolve(|d| d.muted.as_ref()))
                .unwrap_or(false),
            should_fail: props
                .should_fail
                .or_else(|| cascade.resolve(|d| d.should_fail.as_ref()))
                .unwrap_or(false),
            double_check,
            run_parallel: props
                .run_parallel
                .or_else(|| cascade.resolve(|d| d.run_parallel.as_ref()))
                .unwrap_or(false),
            runtime_id,
            locations: props
                .locations
                .or_else(|| cascade.resolve(|d| d.locations.as_ref()))
                .unwrap_or_default(),
            private_locations,
            tags: props
                .tags
                .or_else(|| cascade.resolve(|d| d.tags.as_ref()))
                .unwrap_or_default(),
            frequency: props
                .frequency
                .or_else(|| cascade.resolve(|d| d.frequency.as_ref()))
                .unwrap_or(DEFAULT_FREQUENCY),
            frequency_offset: props.frequency_offset,
            environment_variables: props
                .environment_variables
                .or_else(|| cascade.resolve(|d| d.environment_variables.as_ref()))
                .unwrap_or_default(),
            group: props.group,
            alert_channels: props
                .alert_channels
                .or_else(|| cascade.resolve(|d| d.alert_channels.as_ref()))
                .unwrap_or_default(),
            test_only: props.test_only.unwrap_or(false),
            retry_strategy,
            trigger_incident: props.trigger_incident,
            spec,
        })
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind tag
    #[must_use]
    pub fn check_type(&self) -> CheckType {
        self.spec.check_type()
    }

    /// Kind-specific details
    #[must_use]
    pub fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    /// Resolved frequency in minutes
    #[must_use]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Resolved activation flag
    #[must_use]
    pub fn activated(&self) -> bool {
        self.activated
    }

    /// Resolved public locations
    #[must_use]
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Resolved tags
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Resolved double check flag, if any source set one
    #[must_use]
    pub fn double_check(&self) -> Option<bool> {
        self.double_check
    }

    /// Resolved retry strategy
    #[must_use]
    pub fn retry_strategy(&self) -> Option<&RetryStrategy> {
        self.retry_strategy.as_ref()
    }

    /// Resolved runtime, for script-based checks
    #[must_use]
    pub fn runtime_id(&self) -> Option<&str> {
        self.runtime_id.as_deref()
    }

    /// Owning group
    #[must_use]
    pub fn group(&self) -> Option<&Ref> {
        self.group.as_ref()
    }

    /// Only deployed for test runs
    #[must_use]
    pub fn is_test_only(&self) -> bool {
        self.test_only
    }

    /// Subscriptions and private location assignments this check implies
    ///
    /// # Errors
    ///
    /// Returns error if a derived logical id is invalid
    pub fn derived(&self) -> CoreResult<Vec<Resource>> {
        let mut derived = Vec::new();
        for channel in &self.alert_channels {
            derived.push(AlertChannelSubscription::for_check(&self.logical_id, channel)?.into());
        }
        for target in &self.private_locations {
            if let PrivateLocationTarget::Construct(location) = target {
                derived.push(PrivateLocationCheckAssignment::new(&self.logical_id, location)?.into());
            }
        }
        Ok(derived)
    }

    /// Files that must be loaded before synthesis
    #[must_use]
    pub fn file_inputs(&self) -> Vec<FileInput> {
        let mut inputs = Vec::new();
        match &self.spec {
            CheckSpec::Browser(script) | CheckSpec::MultiStep(script) => {
                if let (Some(path), Some(runtime_id)) = (script.code.entrypoint(), &self.runtime_id) {
                    inputs.push(FileInput::bundle("code", path, runtime_id));
                }
            }
            CheckSpec::Api(api) => {
                if let Some(path) = api.setup_script.as_ref().and_then(ContentSource::entrypoint) {
                    inputs.push(FileInput::text("setupScript", path));
                }
                if let Some(path) = api.tear_down_script.as_ref().and_then(ContentSource::entrypoint) {
                    inputs.push(FileInput::text("tearDownScript", path));
                }
            }
            _ => {}
        }
        inputs
    }

    fn validate_frequency(&self, diagnostics: &mut dyn DiagnosticSink) {
        let check_type = self.check_type();
        if check_type == CheckType::Heartbeat {
            return;
        }
        if !ALLOWED_FREQUENCIES.contains(&self.frequency) {
            diagnostics.add(Diagnostic::invalid_property_value(
                "frequency",
                format!(
                    "Frequency must be one of {:?}, got {}.",
                    ALLOWED_FREQUENCIES, self.frequency
                ),
            ));
            return;
        }
        if self.frequency != 0 {
            return;
        }
        if !check_type.supports_high_frequency() {
            diagnostics.add(Diagnostic::invalid_property_value(
                "frequency",
                "A frequency of 0 is only supported by API, TCP and DNS checks.",
            ));
        }
        match self.frequency_offset {
            Some(offset) if ALLOWED_FREQUENCY_OFFSETS.contains(&offset) => {}
            Some(offset) => diagnostics.add(Diagnostic::invalid_property_value(
                "frequencyOffset",
                format!(
                    "frequencyOffset must be one of {:?}, got {}.",
                    ALLOWED_FREQUENCY_OFFSETS, offset
                ),
            )),
            None => diagnostics.add(Diagnostic::conflicting_properties(
                "frequency",
                "frequencyOffset",
                "A frequency of 0 requires a frequencyOffset.",
            )),
        }
    }

    fn validate_retries(&self, diagnostics: &mut dyn DiagnosticSink) {
        if self.check_type() == CheckType::Heartbeat && self.retry_strategy.is_some() {
            diagnostics.add(Diagnostic::unsupported_property("HeartbeatMonitor", "retryStrategy"));
        }
        validate_retry_settings(self.retry_strategy.as_ref(), self.double_check, diagnostics);
    }

    fn validate_runtime(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        let Some(runtime_id) = &self.runtime_id else {
            return;
        };
        match ctx.runtime(runtime_id) {
            None => diagnostics.add(Diagnostic::invalid_property_value(
                "runtimeId",
                format!("Runtime \"{}\" is not available.", runtime_id),
            )),
            Some(runtime) if self.check_type() == CheckType::MultiStep && !runtime.multi_step_support => {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "runtimeId",
                    format!("Runtime \"{}\" does not support multi-step checks.", runtime_id),
                ));
            }
            Some(_) => {}
        }
    }

    fn validate_references(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if let Some(group) = &self.group {
            ctx.require_ref("group", ResourceKind::CheckGroup, group, diagnostics);
        }
        for channel in &self.alert_channels {
            ctx.require_ref("alertChannels", ResourceKind::AlertChannel, channel, diagnostics);
        }
        for target in &self.private_locations {
            if let PrivateLocationTarget::Construct(location) = target {
                ctx.require_ref("privateLocations", ResourceKind::PrivateLocation, location, diagnostics);
            }
        }
        if let Some(trigger) = &self.trigger_incident {
            ctx.require_ref(
                "triggerIncident",
                ResourceKind::StatusPageService,
                &trigger.service,
                diagnostics,
            );
        }
    }

    async fn validate_spec(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        match &self.spec {
            CheckSpec::Api(api) => {
                if !api.request.url.starts_with("http://") && !api.request.url.starts_with("https://") {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        "request.url",
                        format!("\"{}\" is not an http(s) URL.", api.request.url),
                    ));
                }
                validate_response_times(
                    api.degraded_response_time,
                    api.max_response_time,
                    MAX_API_RESPONSE_TIME,
                    diagnostics,
                );
                if let Some(script) = &api.setup_script {
                    ctx.require_file("setupScript", script, diagnostics).await;
                }
                if let Some(script) = &api.tear_down_script {
                    ctx.require_file("tearDownScript", script, diagnostics).await;
                }
            }
            CheckSpec::Browser(script) | CheckSpec::MultiStep(script) => {
                ctx.require_file("code", &script.code, diagnostics).await;
            }
            CheckSpec::Heartbeat(heartbeat) => {
                let period = heartbeat.period_unit.to_seconds(u64::from(heartbeat.period));
                if !(MIN_HEARTBEAT_SECONDS..=MAX_HEARTBEAT_SECONDS).contains(&period) {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        "period",
                        "The period must be between 30 seconds and 365 days.",
                    ));
                }
                let grace = heartbeat.grace_unit.to_seconds(u64::from(heartbeat.grace));
                if grace > MAX_HEARTBEAT_SECONDS {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        "grace",
                        "The grace period must be at most 365 days.",
                    ));
                }
            }
            CheckSpec::Tcp(tcp) => {
                if tcp.hostname.trim().is_empty() {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        "request.hostname",
                        "A hostname is required.",
                    ));
                }
                validate_port("request.port", tcp.port, diagnostics);
                validate_response_times(
                    tcp.degraded_response_time,
                    tcp.max_response_time,
                    MAX_SOCKET_RESPONSE_TIME,
                    diagnostics,
                );
            }
            CheckSpec::Dns(dns) => {
                if dns.query.trim().is_empty() {
                    diagnostics.add(Diagnostic::invalid_property_value(
                        "request.query",
                        "A query is required.",
                    ));
                }
                match (&dns.name_server, dns.port) {
                    (Some(_), None) => diagnostics.add(Diagnostic::conflicting_properties(
                        "nameServer",
                        "port",
                        "nameServer requires port.",
                    )),
                    (None, Some(_)) => diagnostics.add(Diagnostic::conflicting_properties(
                        "port",
                        "nameServer",
                        "port requires nameServer.",
                    )),
                    _ => {}
                }
                if let Some(port) = dns.port {
                    validate_port("port", port, diagnostics);
                }
                validate_response_times(
                    dns.degraded_response_time,
                    dns.max_response_time,
                    MAX_SOCKET_RESPONSE_TIME,
                    diagnostics,
                );
            }
        }
    }

    fn details(&self, files: &LoadedFiles) -> CoreResult<Map<String, Value>> {
        let details = match &self.spec {
            CheckSpec::Api(api) => {
                let mut details = json!({ "request": api.request });
                insert_some(&mut details, "degradedResponseTime", api.degraded_response_time);
                insert_some(&mut details, "maxResponseTime", api.max_response_time);
                if let Some(script) = &api.setup_script {
                    details["localSetupScript"] = self.text(files, "setupScript", script)?.into();
                }
                if let Some(script) = &api.tear_down_script {
                    details["localTearDownScript"] = self.text(files, "tearDownScript", script)?.into();
                }
                details
            }
            CheckSpec::Browser(script) | CheckSpec::MultiStep(script) => self.script_details(files, &script.code)?,
            CheckSpec::Heartbeat(heartbeat) => json!({ "heartbeat": heartbeat }),
            CheckSpec::Tcp(tcp) => {
                let mut details = json!({
                    "request": { "hostname": tcp.hostname, "port": tcp.port },
                });
                if let Some(data) = &tcp.data {
                    details["request"]["data"] = data.clone().into();
                }
                insert_some(&mut details, "degradedResponseTime", tcp.degraded_response_time);
                insert_some(&mut details, "maxResponseTime", tcp.max_response_time);
                details
            }
            CheckSpec::Dns(dns) => {
                let mut details = json!({
                    "request": { "query": dns.query, "recordType": dns.record_type },
                });
                if let Some(name_server) = &dns.name_server {
                    details["request"]["nameServer"] = name_server.clone().into();
                }
                if let Some(port) = dns.port {
                    details["request"]["port"] = port.into();
                }
                insert_some(&mut details, "degradedResponseTime", dns.degraded_response_time);
                insert_some(&mut details, "maxResponseTime", dns.max_response_time);
                details
            }
        };
        match details {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn script_details(&self, files: &LoadedFiles, code: &ContentSource) -> CoreResult<Value> {
        match code {
            ContentSource::Content(script) => Ok(json!({ "script": script })),
            ContentSource::Entrypoint(path) => match files.get(self.logical_id.as_str(), "code") {
                Some(LoadedFile::Bundle { bundle, storage_key }) => {
                    let mut details = json!({
                        "script": bundle.script,
                        "scriptPath": bundle.script_path,
                        "dependencies": bundle.dependencies,
                    });
                    if let Some(key) = storage_key {
                        details["codeBundlePath"] = key.clone().into();
                    }
                    Ok(details)
                }
                _ => Err(CoreError::Bundle {
                    message: format!(
                        "code for check '{}' ({}) was not bundled",
                        self.logical_id,
                        path.display()
                    ),
                }),
            },
        }
    }

    fn text(&self, files: &LoadedFiles, property: &'static str, source: &ContentSource) -> CoreResult<String> {
        match source {
            ContentSource::Content(content) => Ok(content.clone()),
            ContentSource::Entrypoint(path) => match files.get(self.logical_id.as_str(), property) {
                Some(LoadedFile::Text(content)) => Ok(content.clone()),
                _ => Err(CoreError::Io {
                    path: path.display().to_string(),
                    message: format!("{} for check '{}' was not loaded", property, self.logical_id),
                }),
            },
        }
    }
}

fn validate_port(property: &str, port: u32, diagnostics: &mut dyn DiagnosticSink) {
    if !(1..=65_535).contains(&port) {
        diagnostics.add(Diagnostic::invalid_property_value(
            property,
            format!("Port must be between 1 and 65535, got {}.", port),
        ));
    }
}

fn validate_response_times(
    degraded: Option<u32>,
    max: Option<u32>,
    limit: u32,
    diagnostics: &mut dyn DiagnosticSink,
) {
    if let Some(max) = max {
        if max > limit {
            diagnostics.add(Diagnostic::invalid_property_value(
                "maxResponseTime",
                format!("maxResponseTime must be at most {} ms, got {}.", limit, max),
            ));
        }
    }
    if let Some(degraded) = degraded {
        if degraded > limit {
            diagnostics.add(Diagnostic::invalid_property_value(
                "degradedResponseTime",
                format!("degradedResponseTime must be at most {} ms, got {}.", limit, degraded),
            ));
        }
    }
    if let (Some(degraded), Some(max)) = (degraded, max) {
        if degraded > max {
            diagnostics.add(Diagnostic::conflicting_properties(
                "degradedResponseTime",
                "maxResponseTime",
                "degradedResponseTime must not exceed maxResponseTime.",
            ));
        }
    }
}

fn insert_some(details: &mut Value, key: &str, value: Option<u32>) {
    if let (Some(value), Value::Object(map)) = (value, details) {
        map.insert(key.to_string(), value.into());
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckPayload<'a> {
    check_type: CheckType,
    name: &'a str,
    activated: bool,
    muted: bool,
    should_fail: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime_id: Option<&'a str>,
    locations: &'a [String],
    private_locations: Vec<&'a str>,
    tags: &'a [String],
    frequency: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_offset: Option<u32>,
    environment_variables: &'a [EnvironmentVariable],
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a Ref>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_strategy: Option<Option<&'a RetryStrategy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    double_check: Option<bool>,
    run_parallel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    trigger_incident: Option<&'a IncidentTrigger>,
    #[serde(flatten)]
    details: Map<String, Value>,
}

#[async_trait]
impl Construct for Check {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Check
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        if self.name.trim().is_empty() {
            diagnostics.add(Diagnostic::invalid_property_value("name", "A name is required."));
        }
        self.validate_frequency(diagnostics);
        self.validate_retries(diagnostics);
        self.validate_runtime(ctx, diagnostics);
        self.validate_references(ctx, diagnostics);
        self.validate_spec(ctx, diagnostics).await;
    }

    fn synthesize(&self, files: &LoadedFiles) -> CoreResult<Value> {
        let (retry_strategy, double_check) = retry_fields(self.retry_strategy.as_ref(), self.double_check);
        let payload = CheckPayload {
            check_type: self.check_type(),
            name: &self.name,
            activated: self.activated,
            muted: self.muted,
            should_fail: self.should_fail,
            runtime_id: self.runtime_id.as_deref(),
            locations: &self.locations,
            private_locations: self
                .private_locations
                .iter()
                .filter_map(|target| match target {
                    PrivateLocationTarget::Slug(slug) => Some(slug.as_str()),
                    PrivateLocationTarget::Construct(_) => None,
                })
                .collect(),
            tags: &self.tags,
            frequency: self.frequency,
            frequency_offset: self.frequency_offset,
            environment_variables: &self.environment_variables,
            group_id: self.group.as_ref(),
            retry_strategy,
            double_check,
            run_parallel: self.run_parallel,
            trigger_incident: self.trigger_incident.as_ref(),
            details: self.details(files)?,
        };
        Ok(serde_json::to_value(payload)?)
    }
}

impl From<ApiCheckSpec> for CheckSpec {
    fn from(spec: ApiCheckSpec) -> Self {
        Self::Api(spec)
    }
}

impl From<HeartbeatSpec> for CheckSpec {
    fn from(spec: HeartbeatSpec) -> Self {
        Self::Heartbeat(spec)
    }
}

impl From<TcpSpec> for CheckSpec {
    fn from(spec: TcpSpec) -> Self {
        Self::Tcp(spec)
    }
}

impl From<DnsSpec> for CheckSpec {
    fn from(spec: DnsSpec) -> Self {
        Self::Dns(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_group::{CheckGroup, CheckGroupProps};
    use crate::defaults::{ConfigDefaults, DefaultsScope};
    use crate::project::Project;
    use vigil_core::Diagnostics;

    fn session() -> Session {
        let mut session = Session::new();
        session.set_project(Project::new("demo", "Demo").unwrap()).unwrap();
        session
    }

    fn api(url: &str) -> ApiCheckSpec {
        ApiCheckSpec::new(ApiRequest::get(url))
    }

    async fn validate(session: &Session, check: &Check) -> Diagnostics {
        let ctx = session.validation_context().unwrap();
        let mut diagnostics = Diagnostics::new();
        check.validate(&ctx, &mut diagnostics).await;
        diagnostics
    }

    #[test]
    fn test_builtin_defaults() {
        let session = session();
        let check = Check::new(&session, "home", CheckProps::named("Home"), api("https://example.com")).unwrap();
        assert!(check.activated());
        assert_eq!(check.frequency(), 10);
        assert_eq!(check.runtime_id(), Some(session.default_runtime_id()));
        assert_eq!(check.double_check(), None);
    }

    #[test]
    fn test_invalid_logical_id_is_thrown() {
        let session = session();
        let err = Check::new(&session, "has space", CheckProps::named("x"), api("https://example.com")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidLogicalId { .. }));
    }

    #[test]
    fn test_cascade_from_group_and_session() {
        let mut session = session().with_defaults(DefaultsScope {
            checks: Some(ConfigDefaults {
                frequency: Some(5),
                tags: Some(vec!["session".to_string()]),
                locations: Some(vec!["us-east-1".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        });
        let group = CheckGroup::new(
            "group",
            CheckGroupProps {
                name: "Group".to_string(),
                defaults: DefaultsScope {
                    checks: Some(ConfigDefaults {
                        tags: Some(vec!["group".to_string()]),
                        activated: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
        let group = session.register(group).unwrap();

        let props = CheckProps {
            group: Some(group),
            locations: Some(vec![]),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        assert_eq!(check.frequency(), 5);
        assert_eq!(check.tags(), ["group".to_string()]);
        assert!(!check.activated());
        assert!(check.locations().is_empty());
    }

    #[test]
    fn test_heartbeat_does_not_inherit_retries() {
        let session = session().with_defaults(DefaultsScope {
            checks: Some(ConfigDefaults {
                double_check: Some(true),
                retry_strategy: Some(RetryStrategy::linear()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let heartbeat = HeartbeatSpec {
            period: 1,
            period_unit: TimeUnit::Hours,
            grace: 10,
            grace_unit: TimeUnit::Minutes,
        };
        let check = Check::new(&session, "beat", CheckProps::named("Beat"), heartbeat).unwrap();
        assert_eq!(check.double_check(), None);
        assert!(check.retry_strategy().is_none());
        assert!(check.runtime_id().is_none());

        let api_check = Check::new(&session, "api", CheckProps::named("Api"), api("https://example.com")).unwrap();
        assert_eq!(api_check.double_check(), Some(true));
        assert!(api_check.retry_strategy().is_some());
    }

    #[test]
    fn test_no_retries_transform() {
        let session = session();
        let props = CheckProps {
            retry_strategy: Some(RetryStrategy::no_retries()),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        let payload = check.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["retryStrategy"], Value::Null);
        assert!(payload.as_object().unwrap().contains_key("retryStrategy"));
        assert_eq!(payload["doubleCheck"], Value::Bool(false));
        assert_eq!(payload["checkType"], "API");
    }

    #[test]
    fn test_explicit_double_check_survives_transform() {
        let session = session();
        let props = CheckProps {
            retry_strategy: Some(RetryStrategy::no_retries()),
            double_check: Some(true),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        let payload = check.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["doubleCheck"], Value::Bool(true));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let session = session();
        let check = Check::new(&session, "home", CheckProps::named("Home"), api("https://example.com")).unwrap();
        let payload = check.synthesize(&LoadedFiles::default()).unwrap();
        let object = payload.as_object().unwrap();
        assert!(!object.contains_key("retryStrategy"));
        assert!(!object.contains_key("doubleCheck"));
        assert!(!object.contains_key("groupId"));
        assert_eq!(payload["request"]["url"], "https://example.com");
    }

    #[tokio::test]
    async fn test_frequency_rules() {
        let session = session();
        let props = CheckProps {
            frequency: Some(7),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        assert!(validate(&session, &check).await.is_fatal());

        let props = CheckProps {
            frequency: Some(0),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "fast", props, api("https://example.com")).unwrap();
        assert!(validate(&session, &check).await.is_fatal());

        let props = CheckProps {
            frequency: Some(0),
            frequency_offset: Some(10),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "fast-ok", props, api("https://example.com")).unwrap();
        assert!(!validate(&session, &check).await.is_fatal());

        let props = CheckProps {
            frequency: Some(0),
            frequency_offset: Some(10),
            ..CheckProps::named("Browser")
        };
        let spec = CheckSpec::Browser(ScriptCheckSpec {
            code: ContentSource::Content("await page.goto('/')".to_string()),
        });
        let check = Check::new(&session, "browser", props, spec).unwrap();
        assert!(validate(&session, &check).await.is_fatal());
    }

    #[tokio::test]
    async fn test_double_check_conflicts_with_retries() {
        let session = session();
        let props = CheckProps {
            double_check: Some(true),
            retry_strategy: Some(RetryStrategy::fixed()),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        let diagnostics = validate(&session, &check).await;
        assert!(diagnostics.is_fatal());
        assert_eq!(diagnostics.errors().count(), 1);

        let props = CheckProps {
            double_check: Some(false),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "legacy", props, api("https://example.com")).unwrap();
        let diagnostics = validate(&session, &check).await;
        assert!(!diagnostics.is_fatal());
        assert!(!diagnostics.is_benign());
    }

    #[tokio::test]
    async fn test_unresolved_references() {
        let session = session();
        let props = CheckProps {
            group: Some(Ref::from("missing-group")),
            alert_channels: Some(vec![Ref::from("missing-channel")]),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        let diagnostics = validate(&session, &check).await;
        assert_eq!(diagnostics.errors().count(), 2);
    }

    #[tokio::test]
    async fn test_socket_monitor_rules() {
        let session = session();
        let tcp = TcpSpec {
            hostname: String::new(),
            port: 70_000,
            data: None,
            degraded_response_time: Some(4_000),
            max_response_time: Some(3_000),
        };
        let check = Check::new(&session, "tcp", CheckProps::named("Tcp"), tcp).unwrap();
        assert_eq!(validate(&session, &check).await.errors().count(), 3);

        let dns = DnsSpec {
            query: "example.com".to_string(),
            record_type: DnsRecordType::A,
            name_server: Some("1.1.1.1".to_string()),
            port: None,
            degraded_response_time: None,
            max_response_time: None,
        };
        let check = Check::new(&session, "dns", CheckProps::named("Dns"), dns).unwrap();
        assert_eq!(validate(&session, &check).await.errors().count(), 1);
    }

    #[tokio::test]
    async fn test_dns_port_range() {
        let session = session();
        let resolver = |port| DnsSpec {
            query: "example.com".to_string(),
            record_type: DnsRecordType::A,
            name_server: Some("1.1.1.1".to_string()),
            port: Some(port),
            degraded_response_time: None,
            max_response_time: None,
        };

        let check = Check::new(&session, "dns-ok", CheckProps::named("Dns"), resolver(53)).unwrap();
        assert!(!validate(&session, &check).await.is_fatal());

        for port in [0, 65_536] {
            let check = Check::new(&session, "dns-bad", CheckProps::named("Dns"), resolver(port)).unwrap();
            let diagnostics = validate(&session, &check).await;
            assert_eq!(diagnostics.errors().count(), 1);
            assert!(diagnostics.to_string().contains("between 1 and 65535"));
        }
    }

    #[tokio::test]
    async fn test_heartbeat_period_bounds() {
        let session = session();
        let heartbeat = HeartbeatSpec {
            period: 10,
            period_unit: TimeUnit::Seconds,
            grace: 400,
            grace_unit: TimeUnit::Days,
        };
        let check = Check::new(&session, "beat", CheckProps::named("Beat"), heartbeat).unwrap();
        assert_eq!(validate(&session, &check).await.errors().count(), 2);
    }

    #[tokio::test]
    async fn test_multi_step_requires_support() {
        let mut session = session();
        session.add_runtime("legacy", vigil_bundle::Runtime::new("legacy"));
        let props = CheckProps {
            runtime_id: Some("legacy".to_string()),
            ..CheckProps::named("Flow")
        };
        let spec = CheckSpec::MultiStep(ScriptCheckSpec {
            code: ContentSource::Content("await request.get('/')".to_string()),
        });
        let check = Check::new(&session, "flow", props, spec).unwrap();
        let diagnostics = validate(&session, &check).await;
        assert!(diagnostics.iter().any(|d| d.message().contains("multi-step")));
    }

    #[test]
    fn test_derived_subscriptions() {
        let session = session();
        let props = CheckProps {
            alert_channels: Some(vec![Ref::from("email")]),
            private_locations: Some(vec![
                PrivateLocationTarget::Slug("on-prem".to_string()),
                PrivateLocationTarget::Construct(Ref::from("datacenter")),
            ]),
            ..CheckProps::named("Home")
        };
        let check = Check::new(&session, "home", props, api("https://example.com")).unwrap();
        let derived = check.derived().unwrap();
        let ids: Vec<&str> = derived.iter().map(|r| r.logical_id().as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "check-alert-channel-subscription#home#email",
                "private-location-check-assignment#home#datacenter",
            ]
        );

        let payload = check.synthesize(&LoadedFiles::default()).unwrap();
        assert_eq!(payload["privateLocations"], json!(["on-prem"]));
    }

    #[test]
    fn test_private_location_targets_deserialize() {
        let targets: Vec<PrivateLocationTarget> =
            serde_json::from_str(r#"["on-prem", {"ref": "datacenter"}]"#).unwrap();
        assert_eq!(targets[0], PrivateLocationTarget::Slug("on-prem".to_string()));
        assert_eq!(targets[1], PrivateLocationTarget::Construct(Ref::from("datacenter")));
    }
}
