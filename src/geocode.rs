use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};

use crate::address::normalize_address;
use crate::config::GeocoderConfig;
use crate::constants::{COL_ADDRESS, COL_LATITUDE, COL_LONGITUDE};
use crate::error::Result;
use crate::types::RawTable;

#[derive(Debug, Deserialize)]
struct GeocoderHit {
    lat: String,
    lon: String,
}

/// How the geocoding pass went; failed rows keep null coordinates and the
/// run continues.
#[derive(Debug, Default)]
pub struct GeocodeReport {
    pub geocoded: usize,
    pub failed: usize,
}

/// Nominatim-style forward geocoder. Successive lookups are spaced at
/// least `delay_ms` apart to respect the provider's rate limit.
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl Geocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            user_agent: config.user_agent.clone(),
            min_delay: Duration::from_millis(config.delay_ms),
            last_request: None,
        }
    }

    async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// Looks up one address. `Ok(None)` means the provider had no match.
    pub async fn lookup(&mut self, address: &str) -> Result<Option<(f64, f64)>> {
        self.throttle().await;

        let response = self
            .client
            .get(&self.endpoint)
            .header("User-Agent", self.user_agent.as_str())
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            warn!("Geocoder returned status {} for '{}'", response.status(), address);
            return Ok(None);
        }

        let hits: Vec<GeocoderHit> = response.json().await?;
        let position = hits.first().and_then(|hit| {
            let lat = hit.lat.parse::<f64>().ok()?;
            let lon = hit.lon.parse::<f64>().ok()?;
            Some((lat, lon))
        });
        Ok(position)
    }

    /// Geocodes every row of the raw export in place: the address cell is
    /// normalized for lookup, and matching rows gain latitude/longitude
    /// cells. Per-row failures are counted, never fatal.
    pub async fn geocode_table(&mut self, table: &mut RawTable) -> GeocodeReport {
        table.ensure_column(COL_LATITUDE);
        table.ensure_column(COL_LONGITUDE);

        let mut report = GeocodeReport::default();
        let total = table.rows.len();
        for (index, row) in table.rows.iter_mut().enumerate() {
            let address = match row.get(COL_ADDRESS) {
                Some(raw) if !raw.trim().is_empty() => normalize_address(raw),
                _ => {
                    report.failed += 1;
                    continue;
                }
            };
            row.insert(COL_ADDRESS.to_string(), address.clone());

            match self.lookup(&address).await {
                Ok(Some((lat, lon))) => {
                    row.insert(COL_LATITUDE.to_string(), lat.to_string());
                    row.insert(COL_LONGITUDE.to_string(), lon.to_string());
                    report.geocoded += 1;
                }
                Ok(None) => {
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Error geocoding row {}: {}", index, e);
                    report.failed += 1;
                }
            }

            if (index + 1) % 10 == 0 {
                info!("Geocoded {}/{} addresses", index + 1, total);
            }
        }
        report
    }
}
