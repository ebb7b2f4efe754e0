//! glbdash - command-line client for the model-library backend
//!
//! Subcommands:
//! - `list`: List stored models, optionally filtered
//! - `show`: Print the detail panel of one model
//! - `upload`: Validate and upload a GLB file
//! - `delete`: Delete a model after confirmation
//! - `view`: Open a model in the interactive 3D viewer

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glbdash_client::SelectedFile;
use glbdash_core::{DashboardConfig, ModelFilters, ModelRecord};
use glbdash_dashboard::{Confirm, Dashboard, DeleteOutcome, ModelCard, ModelDetails};
use glbdash_viewer::{run_viewer, ViewerWindowOptions};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "glbdash", version)]
#[command(about = "Upload, list and preview GLB models", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List stored models
    List(ListArgs),
    /// Show the details of one model
    Show {
        /// Model identifier
        id: String,
    },
    /// Upload a GLB file
    Upload(UploadArgs),
    /// Delete a model
    Delete {
        /// Model identifier
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Open a model in the 3D viewer
    View {
        /// Model identifier
        id: String,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Only models in this category ("all" for any)
    #[arg(long)]
    category: Option<String>,

    /// Only models carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Free-text search passed to the backend
    #[arg(long)]
    search: Option<String>,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Path to the .glb file
    path: PathBuf,

    /// Display name (default: file name without .glb)
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

/// Prompts on the terminal
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, title: &str, text: &str) -> bool {
        print!("{} {} [y/N] ", title, text);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

fn init_tracing(config: &DashboardConfig) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: log level '{}' is not a valid tracing filter ({}); falling back to 'info'",
                    config.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true);

    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = DashboardConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);
    info!(version = env!("CARGO_PKG_VERSION"), base_url = %config.base_url, "glbdash starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let mut dashboard = Dashboard::from_config(&config)?;

    match cli.command {
        Commands::List(args) => runtime.block_on(list(&mut dashboard, args)),
        Commands::Show { id } => {
            let model = runtime.block_on(find_model(&mut dashboard, &id))?;
            println!("{}", ModelDetails(&model));
            Ok(())
        }
        Commands::Upload(args) => runtime.block_on(upload(&mut dashboard, args)),
        Commands::Delete { id, yes } => runtime.block_on(delete(&mut dashboard, &id, yes)),
        Commands::View { id } => {
            let model = runtime.block_on(find_model(&mut dashboard, &id))?;
            let url = dashboard
                .select(model)
                .map(|selection| selection.asset_url.clone())
                .ok_or_else(|| anyhow!("No asset URL for model {}", id))?;
            let options = ViewerWindowOptions {
                title: format!("glbdash - {}", dashboard.selected().map_or(id.as_str(), |s| s.record.name.as_str())),
                ..Default::default()
            };
            run_viewer(runtime.handle().clone(), dashboard.client().clone(), url, options)
                .context("Viewer failed")
        }
    }
}

async fn list(dashboard: &mut Dashboard, args: ListArgs) -> Result<()> {
    let filters = ModelFilters::new()
        .with("category", args.category)
        .with("tag", args.tag)
        .with("search", args.search);
    if !dashboard.apply_filters(&filters).await? {
        dashboard.refresh().await?;
    }

    let models = dashboard.models();
    if models.is_empty() {
        println!("No models found. Upload one with `glbdash upload <file.glb>`.");
        return Ok(());
    }
    println!("{} model(s)\n", models.len());
    for model in models {
        println!("{}\n", ModelCard(model));
    }
    Ok(())
}

/// The backend has no single-record endpoint; look the id up in the list
async fn find_model(dashboard: &mut Dashboard, id: &str) -> Result<ModelRecord> {
    dashboard.refresh().await?;
    dashboard
        .collection()
        .find(id)
        .cloned()
        .ok_or_else(|| anyhow!("No model with id {}", id))
}

async fn upload(dashboard: &mut Dashboard, args: UploadArgs) -> Result<()> {
    let file = SelectedFile::from_path(&args.path)
        .await
        .with_context(|| format!("Failed to read {}", args.path.display()))?;
    let policy = dashboard.policy().clone();

    let draft = dashboard.open_upload();
    if let Some(name) = args.name {
        draft.name = name;
    }
    draft.description = args.description.unwrap_or_default();
    draft.select_file(file, &policy)?;

    match dashboard.submit_upload().await? {
        Some(receipt) => {
            match receipt.record {
                Some(record) => println!("Uploaded {} ({})", record.name, record.id),
                None => println!("Upload complete"),
            }
            Ok(())
        }
        None => {
            let errors = dashboard
                .draft()
                .map(|d| {
                    d.errors()
                        .iter()
                        .map(|(field, e)| format!("{}: {}", field, e))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();
            bail!("Upload not sent: {}", errors)
        }
    }
}

async fn delete(dashboard: &mut Dashboard, id: &str, yes: bool) -> Result<()> {
    let outcome = if yes {
        let mut approve = |_: &str, _: &str| true;
        dashboard.delete_model(id, &mut approve).await?
    } else {
        dashboard.delete_model(id, &mut TerminalConfirm).await?
    };

    match outcome {
        DeleteOutcome::Deleted => println!("Deleted {}", id),
        DeleteOutcome::Declined => println!("Cancelled"),
    }
    Ok(())
}
