//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use sleuth_core::{CaseSnapshot, ChangeNotifier};
use sleuth_sync::{HttpBackend, MemoryBackend, Services, Session, SleuthConfig};

pub mod case;
pub mod graph;
pub mod infer;

/// Sleuth - explore and enrich a case knowledge graph
#[derive(Parser)]
#[command(name = "sleuth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Case to open
    #[arg(short, long, global = true, env = "SLEUTH_CASE", default_value = "default")]
    pub case: String,

    /// Path to sleuth.toml (defaults to ./sleuth.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Notation service URL, overriding configuration
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Work offline on an exported case snapshot (JSON) instead of the service
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Print JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show case status and counts
    Status,

    /// List entities
    Entities(case::EntitiesArgs),

    /// Show the timeline, oldest first
    Timeline,

    /// Nodes reachable from a node within some hops
    Cone(graph::ConeArgs),

    /// All simple paths between two nodes
    Paths(graph::PathsArgs),

    /// Partition the graph around a node
    Focus(graph::FocusArgs),

    /// Suggest missing relations, and apply or dismiss them
    Infer(infer::InferArgs),

    /// Check canonical text structure
    Validate(case::ValidateArgs),

    /// Replace the case's canonical text with a file's content
    Push(case::PushArgs),
}

/// Options shared by every command once parsed.
pub struct Globals {
    pub json: bool,
    pub offline: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let session = self.open_session().await?;
        let globals = Globals {
            json: self.json,
            offline: self.snapshot.is_some(),
        };

        if self.verbose {
            session.sync().subscribe(|event| {
                eprintln!("{} {}", "event:".dimmed(), event.kind.name().cyan());
                Ok(())
            });
        }

        match self.command {
            Commands::Status => case::status(&session, &globals),
            Commands::Entities(args) => case::entities(&session, args, &globals),
            Commands::Timeline => case::timeline(&session, &globals),
            Commands::Cone(args) => graph::cone(&session, args, &globals),
            Commands::Paths(args) => graph::paths(&session, args, &globals),
            Commands::Focus(args) => graph::focus(&session, args, &globals),
            Commands::Infer(args) => infer::execute(&session, args, &globals).await,
            Commands::Validate(args) => case::validate(&session, args, &globals).await,
            Commands::Push(args) => case::push(&session, args, &globals).await,
        }
    }

    fn services(&self) -> Result<Services> {
        if let Some(path) = &self.snapshot {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            let snapshot: CaseSnapshot = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a case snapshot", path.display()))?;
            let backend = MemoryBackend::new().with_case(&self.case, &snapshot)?;
            return Ok(Services::from_backend(Arc::new(backend)));
        }

        let cwd = std::env::current_dir()?;
        let mut config = SleuthConfig::load(self.config.as_deref(), &cwd)?;
        if let Some(url) = &self.api_url {
            config.backend.base_url = url.clone();
        }
        let backend = HttpBackend::new(&config.backend)?;
        Ok(Services::from_backend(Arc::new(backend)))
    }

    async fn open_session(&self) -> Result<Session> {
        let services = self.services()?;
        debug!(case = %self.case, offline = self.snapshot.is_some(), "Opening session");
        Session::open(&self.case, services, ChangeNotifier::new())
            .await
            .with_context(|| format!("Could not open case '{}'", self.case))
    }
}
