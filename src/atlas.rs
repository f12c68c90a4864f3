use std::io::{Cursor, Read};

use serde_json::Value;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::convert::FeatureCollection;
use crate::error::{PipelineError, Result};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Authenticated client for the Atlas dataset API.
pub struct AtlasClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AtlasClient {
    /// Exchanges credentials for a bearer token.
    pub async fn login(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/auth/login", base_url))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PipelineError::Auth(format!(
                "login returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::Auth("login response carried no access token".into()))?
            .to_string();

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Downloads the currently published dataset. The endpoint answers
    /// with either a raw GeoJSON document or a ZIP archive holding one;
    /// the body is sniffed by magic bytes. A failed download is treated
    /// as "no published dataset yet" so first runs can bootstrap.
    pub async fn download_dataset(&self, dataset_id: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(format!(
                "{}/datasets/download/{}?format=GEOJSON",
                self.base_url, dataset_id
            ))
            .header("Authorization", self.bearer())
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(
                "Dataset download returned status {}; treating as empty",
                response.status()
            );
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.starts_with(&ZIP_MAGIC) {
            return Ok(read_geojson_from_zip(&bytes)?);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Ids of every feature currently published in the dataset.
    pub async fn list_feature_ids(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(format!(
                "{}/datasets/vector/{}/features",
                self.base_url, dataset_id
            ))
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(
                "Feature listing returned status {}; nothing to delete",
                response.status()
            );
            return Ok(Vec::new());
        }

        let body: Value = response.json().await?;
        let ids = body
            .pointer("/geometries/features")
            .and_then(Value::as_array)
            .map(|features| {
                features
                    .iter()
                    .filter_map(|f| f.get("id").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    /// Deletes the given features so the upload replaces the dataset
    /// instead of appending to it.
    pub async fn delete_features(&self, dataset_id: &str, feature_ids: &[Value]) -> Result<()> {
        if feature_ids.is_empty() {
            return Ok(());
        }
        info!(
            "Deleting {} features from dataset {}",
            feature_ids.len(),
            dataset_id
        );
        let mut body = serde_json::Map::new();
        body.insert(dataset_id.to_string(), Value::from(feature_ids.to_vec()));
        let response = self
            .client
            .delete(format!("{}/datasets/vector/delete_features", self.base_url))
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PipelineError::Publish {
                message: format!("feature delete returned status {}", response.status()),
            });
        }
        Ok(())
    }

    /// Uploads the full merged feature set. A non-success response is
    /// fatal; local artifacts are already written, so a rerun can retry
    /// publishing without redoing reconciliation.
    pub async fn upload_features(
        &self,
        dataset_id: &str,
        collection: &FeatureCollection,
    ) -> Result<()> {
        info!(
            "Uploading {} features to dataset {}",
            collection.features.len(),
            dataset_id
        );
        let response = self
            .client
            .post(format!(
                "{}/datasets/vector/{}/features",
                self.base_url, dataset_id
            ))
            .header("Authorization", self.bearer())
            .json(collection)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PipelineError::Publish {
                message: format!("feature upload returned status {}", response.status()),
            });
        }
        info!("Upload successful");
        Ok(())
    }
}

/// POSTs the merged collection to a generic webhook. The acknowledgement
/// must carry a task identifier.
pub async fn publish_via_webhook(url: &str, collection: &FeatureCollection) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client.post(url).json(collection).send().await?;
    if !response.status().is_success() {
        return Err(PipelineError::Publish {
            message: format!("webhook returned status {}", response.status()),
        });
    }

    let body: Value = response.json().await?;
    let task_id = body
        .get("task_id")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .ok_or_else(|| PipelineError::Publish {
            message: "webhook acknowledgement carried no task_id".into(),
        })?;
    Ok(task_id)
}

fn read_geojson_from_zip(bytes: &[u8]) -> Result<Option<Value>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_file() && entry.name().ends_with(".geojson") {
            let mut contents = String::new();
            entry.read_to_string(&mut contents)?;
            return Ok(Some(serde_json::from_str(&contents)?));
        }
    }
    warn!("Downloaded archive held no .geojson entry");
    Ok(None)
}
