use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::info;

use crate::constants::{EXISTING_BASENAME, MERGED_BASENAME};
use crate::error::Result;

/// On-disk layout of one pipeline workspace: `files/` for the working
/// artifacts, `old_datasets/` for timestamped backups of previously
/// published snapshots.
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.files_dir())?;
        fs::create_dir_all(self.old_datasets_dir())?;
        Ok(())
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    pub fn old_datasets_dir(&self) -> PathBuf {
        self.root.join("old_datasets")
    }

    pub fn raw_export(&self, file_name: &str) -> PathBuf {
        self.files_dir().join(file_name)
    }

    pub fn geocoded_export(&self, file_name: &str) -> PathBuf {
        self.files_dir().join(format!("geocoded_{}", file_name))
    }

    pub fn cleaned_export(&self, file_name: &str) -> PathBuf {
        self.files_dir().join(format!("new_{}", file_name))
    }

    pub fn merged_csv(&self) -> PathBuf {
        self.files_dir().join(format!("{}.csv", MERGED_BASENAME))
    }

    pub fn merged_geojson(&self) -> PathBuf {
        self.files_dir().join(format!("{}.geojson", MERGED_BASENAME))
    }

    pub fn no_coords_csv(&self) -> PathBuf {
        self.files_dir()
            .join(format!("{}_no_coords.csv", MERGED_BASENAME))
    }

    /// Moves a freshly downloaded export into `files/`, when one is
    /// waiting in the download directory.
    pub fn stage_download(&self, download_dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
        let source = download_dir.join(file_name);
        if !source.exists() {
            return Ok(None);
        }
        let target = self.raw_export(file_name);
        fs::rename(&source, &target)?;
        info!("Staged fresh export from {}", source.display());
        Ok(Some(target))
    }

    /// Archives the currently published dataset before it gets replaced.
    /// Backups are named by backup time and are never overwritten.
    pub fn backup_existing_dataset(&self, document: &Value) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let mut path = self
            .old_datasets_dir()
            .join(format!("{}_{}.geojson", EXISTING_BASENAME, timestamp));
        let mut attempt = 1;
        while path.exists() {
            path = self.old_datasets_dir().join(format!(
                "{}_{}_{}.geojson",
                EXISTING_BASENAME, timestamp, attempt
            ));
            attempt += 1;
        }
        fs::write(&path, serde_json::to_vec_pretty(document)?)?;
        info!("Backed up published dataset to {}", path.display());
        Ok(path)
    }
}

/// Whether `path` was modified more recently than `reference`. Missing
/// files never count as newer.
pub fn is_newer_than(path: &Path, reference: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(path), modified(reference)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn layout_and_staging() -> anyhow::Result<()> {
        let downloads = tempdir()?;
        let root = tempdir()?;
        let ws = Workspace::new(root.path());
        ws.ensure_layout()?;

        assert_eq!(ws.stage_download(downloads.path(), "finn-eiendom.csv")?, None);

        fs::write(downloads.path().join("finn-eiendom.csv"), "data")?;
        let staged = ws
            .stage_download(downloads.path(), "finn-eiendom.csv")?
            .expect("staged");
        assert!(staged.exists());
        assert!(!downloads.path().join("finn-eiendom.csv").exists());
        Ok(())
    }

    #[test]
    fn backups_never_overwrite() -> anyhow::Result<()> {
        let root = tempdir()?;
        let ws = Workspace::new(root.path());
        ws.ensure_layout()?;

        let first = ws.backup_existing_dataset(&json!({"type": "FeatureCollection"}))?;
        let second = ws.backup_existing_dataset(&json!({"type": "FeatureCollection"}))?;
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
        Ok(())
    }
}
