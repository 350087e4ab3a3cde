//! GraphVCS command-line management tool.
//!
//! Provides subcommands for running a structured plan through the query
//! engine, resolving merge bases, inspecting branch heads, listing a
//! commit's stored files, and validating configuration. All output is
//! JSON; narration lives outside this system.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use graphvcs_core::blob::{sigv4::Credentials, BlobStore, S3BlobClient};
use graphvcs_core::config::AppConfig;
use graphvcs_core::engine::{EngineLimits, QueryEngine};
use graphvcs_core::graph::{GraphStore, HttpGraphClient};
use graphvcs_core::merge_base::MergeBaseResolver;
use graphvcs_core::plan::QueryPlan;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// GraphVCS command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "graphvcs",
    version,
    about = "Run and inspect GraphVCS merge-analysis queries"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/graphvcs/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a structured plan file and print the result.
    Query {
        /// Path to the plan JSON file.
        plan: PathBuf,
    },

    /// Resolve the merge base of two commits.
    MergeBase {
        /// Source commit id.
        source: String,
        /// Target commit id.
        target: String,
    },

    /// Show the commit a branch's HEAD points to.
    Head {
        /// Branch name.
        branch: String,
    },

    /// List the files stored for a commit.
    Files {
        /// Commit id.
        commit_id: String,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate => {
            AppConfig::load(&cli.config)?;
            println!("configuration OK");
            Ok(())
        }
        Commands::Query { plan } => {
            let (graph, blobs, limits) = connect(&cli.config)?;
            let raw = std::fs::read_to_string(&plan)
                .with_context(|| format!("reading plan file {}", plan.display()))?;
            let raw: serde_json::Value =
                serde_json::from_str(&raw).context("plan file is not valid JSON")?;
            let plan = QueryPlan::from_value(raw)?;

            let engine = QueryEngine::new(graph, blobs, limits);
            let result = engine.execute(plan).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::MergeBase { source, target } => {
            let (graph, _, limits) = connect(&cli.config)?;
            let resolver = MergeBaseResolver::new(graph.as_ref(), limits.max_traversal_depth);
            let base = resolver.find(&source, &target).await?;
            println!("{}", serde_json::to_string_pretty(&base)?);
            Ok(())
        }
        Commands::Head { branch } => {
            let (graph, _, _) = connect(&cli.config)?;
            match graph.head_commit(&branch).await? {
                Some(commit) => {
                    println!("{}", serde_json::to_string_pretty(&commit)?);
                    Ok(())
                }
                None => anyhow::bail!("branch '{}' not found", branch),
            }
        }
        Commands::Files { commit_id } => {
            let (_, blobs, _) = connect(&cli.config)?;
            let files = blobs.list_and_fetch(&commit_id).await?;
            let listing: Vec<serde_json::Value> = files
                .iter()
                .map(|(path, content)| {
                    serde_json::json!({ "path": path, "size": content.len() })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
            Ok(())
        }
    }
}

/// Load config, resolve secrets, and build the store clients.
fn connect(
    config_path: &PathBuf,
) -> Result<(Arc<dyn GraphStore>, Arc<dyn BlobStore>, EngineLimits)> {
    let mut config = AppConfig::load(config_path)?;
    config.resolve_env_vars()?;

    let graph = HttpGraphClient::new(
        &config.graph.uri,
        &config.graph.database,
        &config.graph.username,
        config.graph.password.as_deref().unwrap_or_default(),
    );

    let credentials = match (&config.blob.access_key_id, &config.blob.secret_key) {
        (Some(access_key_id), Some(secret_key)) => Some(Credentials {
            access_key_id: access_key_id.clone(),
            secret_key: secret_key.clone(),
        }),
        _ => None,
    };
    let blobs = S3BlobClient::new(
        &config.blob.endpoint,
        &config.blob.bucket,
        &config.blob.region,
        credentials,
    )?;

    let limits = EngineLimits::from(&config.engine);
    Ok((Arc::new(graph), Arc::new(blobs), limits))
}
