use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use finn_atlas_sync::config::Config;
use finn_atlas_sync::files::Workspace;
use finn_atlas_sync::{logging, pipeline};

#[derive(Parser)]
#[command(name = "finn_atlas_sync")]
#[command(about = "Syncs Finn.no real estate exports to an Atlas map dataset")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full sync pipeline
    Run,
    /// Geocode the staged raw export
    Geocode,
    /// Clean the geocoded export into a fresh snapshot
    Clean,
    /// Merge the fresh snapshot against an existing snapshot file
    Merge {
        /// Existing snapshot (CSV or GeoJSON); defaults to the previous
        /// merged CSV when present
        #[arg(long)]
        existing: Option<PathBuf>,
    },
    /// Publish the merged GeoJSON artifact
    Upload,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let result = match cli.command {
        Commands::Run => {
            println!("🔄 Running full sync...");
            pipeline::run(&config).await.map(|_| ())
        }
        Commands::Geocode => pipeline::geocode_stage(&config).await.map(|report| {
            println!(
                "✅ Geocoded {} addresses ({} without a match)",
                report.geocoded, report.failed
            );
        }),
        Commands::Clean => pipeline::clean_stage(&config, true).map(|report| {
            println!(
                "✅ Cleaned {} listings ({} rows skipped)",
                report.listings.len(),
                report.skipped.len()
            );
        }),
        Commands::Merge { existing } => merge_command(&config, existing).await,
        Commands::Upload => pipeline::upload_stage(&config).await.map(|published| {
            println!("✅ Published {} features", published);
        }),
    };

    if let Err(e) = result {
        error!("Run failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn merge_command(
    config: &Config,
    existing: Option<PathBuf>,
) -> Result<(), finn_atlas_sync::error::PipelineError> {
    let ws = Workspace::new(&config.path_root);
    ws.ensure_layout()?;

    let existing_path = existing.unwrap_or_else(|| ws.merged_csv());
    let existing_snapshot = if existing_path.exists() {
        pipeline::read_existing_snapshot(&existing_path)?
    } else {
        Vec::new()
    };

    let fresh = pipeline::clean_stage(config, true)?.listings;
    let outcome = pipeline::merge_stage(&ws, existing_snapshot, fresh)?;
    println!(
        "✅ Merged {} listings ({} newly marked sold, {} missing coordinates)",
        outcome.merged.len(),
        outcome.disappeared,
        outcome.no_coords.len()
    );
    Ok(())
}
