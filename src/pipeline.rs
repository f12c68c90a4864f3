use std::fs;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::atlas::{publish_via_webhook, AtlasClient};
use crate::clean::{self, CleanReport};
use crate::config::Config;
use crate::constants::COL_URL;
use crate::convert::{snapshot_from_geojson, snapshot_to_geojson, FeatureCollection};
use crate::csv_io;
use crate::error::{PipelineError, Result};
use crate::files::{is_newer_than, Workspace};
use crate::geocode::{GeocodeReport, Geocoder};
use crate::merge::{merge_snapshots, MergeOutcome};
use crate::types::Snapshot;

/// Per-stage counts for one sync run, reported at the end so an operator
/// can sanity-check before the next scheduled run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub geocoded: usize,
    pub geocode_failed: usize,
    pub cleaned: usize,
    pub skipped_rows: usize,
    pub merged: usize,
    pub disappeared: usize,
    pub no_coords: usize,
    pub published: usize,
}

fn run_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Geocodes the staged raw export, reusing the previous pass when it is
/// newer than the source file.
pub async fn geocode_stage(config: &Config) -> Result<GeocodeReport> {
    let ws = Workspace::new(&config.path_root);
    ws.ensure_layout()?;

    let source = ws.raw_export(&config.download_file_name);
    if !source.exists() {
        return Err(PipelineError::MissingSourceFile(source));
    }

    let geocoded_path = ws.geocoded_export(&config.download_file_name);
    if geocoded_path.exists() && is_newer_than(&geocoded_path, &source) {
        info!("Geocoded data is up-to-date");
        return Ok(GeocodeReport::default());
    }

    info!("Geocoding {}", source.display());
    println!("🌍 Geocoding addresses...");
    let mut table = csv_io::read_raw_table(&source)?;
    let mut geocoder = Geocoder::new(&config.geocoder);
    let report = geocoder.geocode_table(&mut table).await;
    csv_io::write_raw_table(&geocoded_path, &table)?;

    info!(
        "Geocoded {} of {} addresses ({} without a match)",
        report.geocoded,
        table.len(),
        report.failed
    );
    Ok(report)
}

/// Cleans the geocoded export into the fresh snapshot. Persisting the
/// cleaned table is the caller's choice.
pub fn clean_stage(config: &Config, persist: bool) -> Result<CleanReport> {
    let ws = Workspace::new(&config.path_root);
    let geocoded_path = ws.geocoded_export(&config.download_file_name);
    if !geocoded_path.exists() {
        return Err(PipelineError::MissingSourceFile(geocoded_path));
    }

    println!("🔧 Cleaning listings...");
    let table = csv_io::read_raw_table(&geocoded_path)?;
    let report = clean::clean_table(&table);
    if persist {
        csv_io::write_snapshot(
            &ws.cleaned_export(&config.download_file_name),
            &report.listings,
        )?;
    }

    info!(
        "Cleaned {} listings ({} rows skipped)",
        report.listings.len(),
        report.skipped.len()
    );
    for reason in &report.skipped {
        warn!("Skipped {}", reason);
    }
    Ok(report)
}

/// Reconciles fresh against existing and writes every merged artifact:
/// the tabular snapshot, the geospatial snapshot, and the no-coordinates
/// side file.
pub fn merge_stage(ws: &Workspace, existing: Snapshot, fresh: Snapshot) -> Result<MergeOutcome> {
    println!("🔀 Merging snapshots...");
    let key_columns = vec![COL_URL.to_string()];
    let outcome = merge_snapshots(existing, fresh, &key_columns, &run_timestamp())?;

    csv_io::write_snapshot(&ws.merged_csv(), &outcome.merged)?;
    if !outcome.no_coords.is_empty() {
        info!(
            "{} entries are missing coordinates; saving to {}",
            outcome.no_coords.len(),
            ws.no_coords_csv().display()
        );
        csv_io::write_snapshot(&ws.no_coords_csv(), &outcome.no_coords)?;
    }

    let collection = snapshot_to_geojson(&outcome.merged);
    fs::write(
        ws.merged_geojson(),
        serde_json::to_string_pretty(&collection)?,
    )?;
    info!(
        "Updated dataset of {} records saved to {} and {}",
        outcome.total(),
        ws.merged_csv().display(),
        ws.merged_geojson().display()
    );
    Ok(outcome)
}

/// Loads a previously published snapshot from a local artifact, by
/// extension: GeoJSON documents or tabular CSV.
pub fn read_existing_snapshot(path: &Path) -> Result<Snapshot> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("geojson") | Some("json") => {
            let doc: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
            Ok(snapshot_from_geojson(&doc))
        }
        _ => csv_io::read_snapshot(path),
    }
}

async fn dataset_client(config: &Config) -> Result<AtlasClient> {
    let (username, password) = config.atlas_credentials()?;
    AtlasClient::login(&config.atlas_api_url, username, password).await
}

/// Publishes the merged artifact: delete-and-replace in dataset mode,
/// plain POST in webhook mode.
async fn publish_collection(
    config: &Config,
    client: Option<&AtlasClient>,
    collection: &FeatureCollection,
) -> Result<usize> {
    match (&config.dataset_id, client) {
        (Some(dataset_id), Some(client)) => {
            let ids = client.list_feature_ids(dataset_id).await?;
            client.delete_features(dataset_id, &ids).await?;
            client.upload_features(dataset_id, collection).await?;
        }
        _ => {
            let url = config.webhook_url.as_ref().ok_or_else(|| {
                PipelineError::Config("either DATASET_ID or WEBHOOK_URL must be set".into())
            })?;
            let task_id = publish_via_webhook(url, collection).await?;
            info!("Webhook accepted the collection as task {}", task_id);
        }
    }
    Ok(collection.features.len())
}

fn load_merged_collection(ws: &Workspace) -> Result<FeatureCollection> {
    let path = ws.merged_geojson();
    if !path.exists() {
        return Err(PipelineError::MissingSourceFile(path));
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Publishes an already-merged artifact without redoing reconciliation.
pub async fn upload_stage(config: &Config) -> Result<usize> {
    let ws = Workspace::new(&config.path_root);
    let collection = load_merged_collection(&ws)?;
    let client = match config.dataset_id {
        Some(_) => Some(dataset_client(config).await?),
        None => None,
    };
    publish_collection(config, client.as_ref(), &collection).await
}

/// The whole pipeline: stage → geocode → clean → fetch existing → merge →
/// write artifacts → publish. One linear pass; any failure aborts the run.
pub async fn run(config: &Config) -> Result<RunReport> {
    let ws = Workspace::new(&config.path_root);
    ws.ensure_layout()?;

    if let Some(download_dir) = &config.download_path {
        ws.stage_download(download_dir, &config.download_file_name)?;
    }
    let source = ws.raw_export(&config.download_file_name);
    if !source.exists() {
        return Err(PipelineError::MissingSourceFile(source));
    }

    let mut report = RunReport::default();

    // The merged output can outlive the export between scheduled runs; in
    // that case only publishing is left to do.
    if ws.merged_geojson().exists() && is_newer_than(&ws.merged_geojson(), &source) {
        info!("Merged output is up-to-date; republishing the existing artifact");
        println!("⤴️  Data already processed, republishing...");
        report.published = upload_stage(config).await?;
        print_summary(&report);
        return Ok(report);
    }

    let geocode_report = geocode_stage(config).await?;
    report.geocoded = geocode_report.geocoded;
    report.geocode_failed = geocode_report.failed;

    let clean_report = clean_stage(config, true)?;
    report.cleaned = clean_report.listings.len();
    report.skipped_rows = clean_report.skipped.len();

    // Dataset mode reconciles against the published dataset; webhook mode
    // falls back to the previous local artifact.
    let client = match config.dataset_id {
        Some(_) => Some(dataset_client(config).await?),
        None => None,
    };
    let existing: Snapshot = match (&config.dataset_id, &client) {
        (Some(dataset_id), Some(client)) => match client.download_dataset(dataset_id).await? {
            Some(document) => {
                ws.backup_existing_dataset(&document)?;
                snapshot_from_geojson(&document)
            }
            None => Snapshot::new(),
        },
        _ if ws.merged_csv().exists() => read_existing_snapshot(&ws.merged_csv())?,
        _ => Snapshot::new(),
    };

    let outcome = merge_stage(&ws, existing, clean_report.listings)?;
    report.merged = outcome.merged.len();
    report.disappeared = outcome.disappeared;
    report.no_coords = outcome.no_coords.len();

    let collection = load_merged_collection(&ws)?;
    report.published = publish_collection(config, client.as_ref(), &collection).await?;

    print_summary(&report);
    Ok(report)
}

fn print_summary(report: &RunReport) {
    println!("\n📊 Sync results:");
    println!(
        "   Geocoded: {} ({} without a match)",
        report.geocoded, report.geocode_failed
    );
    println!(
        "   Cleaned: {} ({} rows skipped)",
        report.cleaned, report.skipped_rows
    );
    println!(
        "   Merged: {} ({} newly marked sold)",
        report.merged, report.disappeared
    );
    println!("   Missing coordinates: {}", report.no_coords);
    println!("   Published features: {}", report.published);
}
