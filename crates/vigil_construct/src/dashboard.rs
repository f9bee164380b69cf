//! Public dashboards.

use crate::construct::{Construct, ContentSource, ValidationContext};
use crate::kind::ResourceKind;
use crate::synth::{FileInput, LoadedFile, LoadedFiles};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_core::{CoreError, CoreResult, Diagnostic, DiagnosticSink, LogicalId};

/// Allowed refresh rates in seconds
pub const REFRESH_RATES: [u32; 3] = [60, 300, 600];

/// Allowed pagination rates in seconds
pub const PAGINATION_RATES: [u32; 3] = [30, 60, 300];

const MAX_CHECKS_PER_PAGE: u32 = 20;

/// Dashboard width
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardWidth {
    /// Full browser width
    #[default]
    Full,
    /// Fixed 960 pixels
    #[serde(rename = "960PX")]
    Fixed960,
}

/// Declared dashboard properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardProps {
    /// Subdomain on the vendor domain
    #[serde(default)]
    pub custom_url: Option<String>,
    /// Own domain
    #[serde(default)]
    pub custom_domain: Option<String>,
    /// Logo URL
    #[serde(default)]
    pub logo: Option<String>,
    /// Favicon URL
    #[serde(default)]
    pub favicon: Option<String>,
    /// Logo link target
    #[serde(default)]
    pub link: Option<String>,
    /// Header text
    #[serde(default)]
    pub header: Option<String>,
    /// Description text
    #[serde(default)]
    pub description: Option<String>,
    /// Layout width
    #[serde(default)]
    pub width: DashboardWidth,
    /// Seconds between refreshes
    #[serde(default)]
    pub refresh_rate: Option<u32>,
    /// Paginate checks
    #[serde(default)]
    pub paginate: Option<bool>,
    /// Seconds per page
    #[serde(default)]
    pub pagination_rate: Option<u32>,
    /// Checks shown per page
    #[serde(default)]
    pub checks_per_page: Option<u32>,
    /// Require every tag instead of any
    #[serde(default)]
    pub use_tags_and_operator: bool,
    /// Hide tags on check cards
    #[serde(default)]
    pub hide_tags: bool,
    /// Show incidents
    #[serde(default)]
    pub enable_incidents: bool,
    /// Expand check cards
    #[serde(default)]
    pub expand_checks: bool,
    /// Show the header
    #[serde(default = "default_show_header")]
    pub show_header: bool,
    /// Checks shown, by tag
    #[serde(default)]
    pub tags: Vec<String>,
    /// Custom stylesheet
    #[serde(default, rename = "customCSS")]
    pub custom_css: Option<ContentSource>,
}

fn default_show_header() -> bool {
    true
}

/// A public dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    logical_id: LogicalId,
    props: DashboardProps,
}

impl Dashboard {
    /// Create a dashboard
    ///
    /// # Errors
    ///
    /// Returns error if `logical_id` is not a valid logical id
    pub fn new(logical_id: &str, props: DashboardProps) -> CoreResult<Self> {
        Ok(Self {
            logical_id: LogicalId::new(logical_id)?,
            props,
        })
    }

    /// Files that must be loaded before synthesis
    #[must_use]
    pub fn file_inputs(&self) -> Vec<FileInput> {
        self.props
            .custom_css
            .as_ref()
            .and_then(ContentSource::entrypoint)
            .map(|path| vec![FileInput::text("customCSS", path)])
            .unwrap_or_default()
    }

    fn custom_css(&self, files: &LoadedFiles) -> CoreResult<Option<String>> {
        match &self.props.custom_css {
            None => Ok(None),
            Some(ContentSource::Content(css)) => Ok(Some(css.clone())),
            Some(ContentSource::Entrypoint(path)) => match files.get(self.logical_id.as_str(), "customCSS") {
                Some(LoadedFile::Text(css)) => Ok(Some(css.clone())),
                _ => Err(CoreError::Io {
                    path: path.display().to_string(),
                    message: format!("customCSS for dashboard '{}' was not loaded", self.logical_id),
                }),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    favicon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    width: DashboardWidth,
    refresh_rate: u32,
    paginate: bool,
    pagination_rate: u32,
    checks_per_page: u32,
    use_tags_and_operator: bool,
    hide_tags: bool,
    enable_incidents: bool,
    expand_checks: bool,
    show_header: bool,
    tags: &'a [String],
    #[serde(rename = "customCSS", skip_serializing_if = "Option::is_none")]
    custom_css: Option<String>,
}

#[async_trait]
impl Construct for Dashboard {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Dashboard
    }

    fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, diagnostics: &mut dyn DiagnosticSink) {
        let props = &self.props;
        match (&props.custom_url, &props.custom_domain) {
            (Some(_), Some(_)) => diagnostics.add(Diagnostic::conflicting_properties(
                "customUrl",
                "customDomain",
                "Set either customUrl or customDomain, not both.",
            )),
            (None, None) => diagnostics.add(Diagnostic::invalid_property_value(
                "customUrl",
                "One of customUrl or customDomain is required.",
            )),
            _ => {}
        }

        if let Some(rate) = props.refresh_rate {
            if !REFRESH_RATES.contains(&rate) {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "refreshRate",
                    format!("refreshRate must be one of {:?}, got {}.", REFRESH_RATES, rate),
                ));
            }
        }
        if let Some(rate) = props.pagination_rate {
            if !PAGINATION_RATES.contains(&rate) {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "paginationRate",
                    format!("paginationRate must be one of {:?}, got {}.", PAGINATION_RATES, rate),
                ));
            }
        }
        if let Some(per_page) = props.checks_per_page {
            if !(1..=MAX_CHECKS_PER_PAGE).contains(&per_page) {
                diagnostics.add(Diagnostic::invalid_property_value(
                    "checksPerPage",
                    format!(
                        "checksPerPage must be between 1 and {}, got {}.",
                        MAX_CHECKS_PER_PAGE, per_page
                    ),
                ));
            }
        }
        if let Some(css) = &props.custom_css {
            ctx.require_file("customCSS", css, diagnostics).await;
        }
    }

    fn synthesize(&self, files: &LoadedFiles) -> CoreResult<Value> {
        let props = &self.props;
        let payload = DashboardPayload {
            custom_url: props.custom_url.as_deref(),
            custom_domain: props.custom_domain.as_deref(),
            logo: props.logo.as_deref(),
            favicon: props.favicon.as_deref(),
            link: props.link.as_deref(),
            header: props.header.as_deref(),
            description: props.description.as_deref(),
            width: props.width,
            refresh_rate: props.refresh_rate.unwrap_or(60),
            paginate: props.paginate.unwrap_or(true),
            pagination_rate: props.pagination_rate.unwrap_or(60),
            checks_per_page: props.checks_per_page.unwrap_or(15),
            use_tags_and_operator: props.use_tags_and_operator,
            hide_tags: props.hide_tags,
            enable_incidents: props.enable_incidents,
            expand_checks: props.expand_checks,
            show_header: props.show_header,
            tags: &props.tags,
            custom_css: self.custom_css(files)?,
        };
        Ok(serde_json::to_value(payload)?)
    }
}
