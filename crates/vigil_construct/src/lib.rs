//! Vigil Constructs
//!
//! Monitoring constructs, the session they are declared against, the
//! defaults cascade, validation and the ordered synthesis pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alert_channel;
pub mod check;
pub mod check_group;
pub mod config;
pub mod construct;
pub mod dashboard;
pub mod defaults;
pub mod kind;
pub mod maintenance_window;
pub mod private_location;
pub mod project;
pub mod resource;
pub mod retry;
pub mod session;
pub mod status_page;
pub mod synth;

pub use alert_channel::{AlertChannel, AlertChannelConfig, AlertChannelProps, AlertChannelSubscription};
pub use check::{
    ApiCheckSpec, ApiRequest, Check, CheckProps, CheckSpec, CheckType, DnsSpec, HeartbeatSpec,
    ScriptCheckSpec, TcpSpec,
};
pub use check_group::{CheckGroup, CheckGroupProps};
pub use config::{ConfigError, ProjectConfig, ResourceDecl, CONFIG_FILE_NAME};
pub use construct::{Construct, ContentSource, Entry, ReferenceConstruct, ValidationContext};
pub use dashboard::{Dashboard, DashboardProps};
pub use defaults::{ConfigDefaults, DefaultsCascade, DefaultsScope};
pub use kind::{ResourceKind, SYNTHESIS_ORDER};
pub use maintenance_window::{MaintenanceWindow, MaintenanceWindowProps};
pub use private_location::{PrivateLocation, PrivateLocationProps};
pub use project::{Project, ProjectPayload, ResourcePayload};
pub use resource::Resource;
pub use retry::{RetryStrategy, RetryStrategyType};
pub use session::{Session, SessionSettings, DEFAULT_RUNTIME_ID};
pub use status_page::{StatusPage, StatusPageProps, StatusPageService};
pub use synth::{FileInput, LoadedFile, LoadedFiles, SynthOutcome, Synthesizer};
