use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use storymill::config::{GenerationSettings, ServerConfig};
use storymill::domain::Project;
use storymill::generation::HttpGenerationClient;
use storymill::server;
use storymill::store::{ProjectStore, StoreHandle};
use storymill::sync::pipeline::{SyncOptions, SyncPipeline};

#[derive(Parser)]
#[command(name = "storymill")]
#[command(version, about = "Repository-driven user story and backend scaffold generation")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, default_value = "4200")]
        port: u16,
        #[arg(long, default_value = "storymill.db")]
        db: PathBuf,
        /// Bind on all interfaces and allow any CORS origin
        #[arg(long)]
        dev: bool,
    },
    /// Run the sync pipeline once for a project and print the summary
    Sync {
        project_id: i64,
        #[arg(long, default_value = "storymill.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "storymill=debug" } else { "storymill=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Serve { port, db, dev } => {
            server::start_server(ServerConfig {
                port,
                db_path: db,
                dev_mode: dev,
                workdir_root: std::env::temp_dir(),
            })
            .await
        }
        Commands::Sync { project_id, db } => run_sync_once(project_id, db).await,
    }
}

async fn run_sync_once(project_id: i64, db: PathBuf) -> Result<()> {
    let settings = GenerationSettings::from_env()
        .context("Generation service credential is not configured (set ANTHROPIC_API_KEY)")?;
    let client = Arc::new(HttpGenerationClient::new(settings));

    let store = StoreHandle::new(ProjectStore::new(&db).context("Failed to open store")?);
    let mut project: Project = store
        .call(move |s| s.get_project(project_id))
        .await?
        .with_context(|| format!("Project {} not found", project_id))?;

    let pipeline = SyncPipeline::new(&store, client.as_ref(), SyncOptions::default());
    let summary = pipeline.run(&mut project).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
