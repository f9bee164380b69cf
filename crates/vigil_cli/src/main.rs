//! Vigil CLI
//!
//! Validate and synthesize monitoring-as-code projects.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use console::style;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vigil_bundle::{BundleUploader, UploadBody};
use vigil_construct::{ProjectConfig, Session, Synthesizer, CONFIG_FILE_NAME};
use vigil_core::{Diagnostics, SanitizedIdTracker, Severity};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - monitoring as code", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every construct of a project
    Validate {
        /// Path to the project config
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Hide output when every observation is benign
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate, bundle and write the synthesized payload
    Synth {
        /// Path to the project config
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Output file; stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Leave test-only checks out of the payload
        #[arg(long)]
        exclude_test_only: bool,
        /// Store code bundles in this directory
        #[arg(long)]
        bundle_dir: Option<PathBuf>,
    },
    /// Print the logical ids derived from arbitrary strings
    Sanitize {
        /// File paths or display names
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

/// Stores bundles as files in a local directory
struct DirectoryUploader {
    dir: PathBuf,
}

impl DirectoryUploader {
    async fn create(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .wrap_err_with(|| format!("Failed to create bundle directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl BundleUploader for DirectoryUploader {
    async fn upload(
        &self,
        mut body: UploadBody,
        length: u64,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let key = format!("{}.json", Uuid::new_v4());
        let mut file = tokio::fs::File::create(self.dir.join(&key)).await?;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        if written != length {
            return Err(format!("expected {} bytes, wrote {}", length, written).into());
        }
        debug!(key = %key, length, "stored bundle");
        Ok(key)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("VIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn load_session(config: &Path) -> Result<Session> {
    let project_config = ProjectConfig::load(config).await?;
    let mut session = Session::new();
    project_config.apply(&mut session)?;
    Ok(session)
}

fn print_diagnostics(diagnostics: &Diagnostics, quiet: bool) {
    if quiet && diagnostics.is_benign() {
        return;
    }
    for diagnostic in diagnostics.iter() {
        let label = match diagnostic.severity() {
            Severity::Error => style("error").red().bold(),
            Severity::Warning => style("warning").yellow().bold(),
            Severity::Notice => style("notice").dim(),
        };
        eprintln!("{}: {}", label, style(diagnostic.title()).bold());
        eprintln!("  {}", diagnostic.message());
    }
}

async fn validate(config: &Path, quiet: bool) -> Result<()> {
    let session = load_session(config).await?;
    let diagnostics = Synthesizer::new(&session).validate().await?;
    print_diagnostics(&diagnostics, quiet);

    if diagnostics.is_fatal() {
        bail!("validation failed with {} error(s)", diagnostics.errors().count());
    }
    if !quiet {
        eprintln!("{} {} observation(s)", style("ok").green().bold(), diagnostics.len());
    }
    Ok(())
}

async fn synth(
    config: &Path,
    output: Option<&Path>,
    exclude_test_only: bool,
    bundle_dir: Option<&Path>,
) -> Result<()> {
    let session = load_session(config).await?;
    let uploader = match bundle_dir {
        Some(dir) => Some(DirectoryUploader::create(dir).await?),
        None => None,
    };

    let mut synthesizer = Synthesizer::new(&session).with_test_only(!exclude_test_only);
    if let Some(uploader) = &uploader {
        synthesizer = synthesizer.with_uploader(uploader);
    }
    let outcome = synthesizer.run().await?;
    print_diagnostics(&outcome.diagnostics, false);

    let Some(payload) = outcome.payload else {
        bail!(
            "synthesis stopped with {} error(s)",
            outcome.diagnostics.errors().count()
        );
    };
    let json = serde_json::to_string_pretty(&payload)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), resources = payload.resources.len(), "wrote payload");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn sanitize(inputs: &[String]) {
    let mut tracker = SanitizedIdTracker::new();
    for input in inputs {
        println!("{}", tracker.sanitize("input", input));
    }
    for record in tracker.records() {
        eprintln!(
            "{} {} -> {}",
            style("changed").yellow(),
            record.original,
            record.sanitized
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Validate { config, quiet } => validate(&config, quiet).await,
        Commands::Synth {
            config,
            output,
            exclude_test_only,
            bundle_dir,
        } => synth(&config, output.as_deref(), exclude_test_only, bundle_dir.as_deref()).await,
        Commands::Sanitize { inputs } => {
            sanitize(&inputs);
            Ok(())
        }
    }
}
