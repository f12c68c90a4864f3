use std::collections::HashMap;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::types::{Listing, Snapshot};

/// Result of reconciling a fresh snapshot against the published one.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Records with coordinates, ready for the geospatial output.
    pub merged: Snapshot,
    /// Records that cannot be placed on the map, reported separately.
    pub no_coords: Snapshot,
    /// How many published listings disappeared from the fresh export.
    pub disappeared: usize,
}

impl MergeOutcome {
    pub fn total(&self) -> usize {
        self.merged.len() + self.no_coords.len()
    }
}

/// Composite reconciliation key. Missing parts key as empty strings so a
/// record is never silently dropped for lacking one.
fn key_of(listing: &Listing, key_columns: &[String]) -> String {
    key_columns
        .iter()
        .map(|col| listing.field_as_string(col).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Keeps the last occurrence per key while preserving first-seen order.
fn index_by_key(
    records: Vec<Listing>,
    key_columns: &[String],
) -> (Vec<String>, HashMap<String, Listing>) {
    let mut order = Vec::new();
    let mut by_key: HashMap<String, Listing> = HashMap::new();
    for record in records {
        let key = key_of(&record, key_columns);
        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.insert(key, record);
    }
    (order, by_key)
}

/// Geocoding artifacts from earlier pipeline generations: numbered
/// duplicate coordinate columns and scratch geometry columns.
fn drop_legacy_columns(listing: &mut Listing) {
    listing.extras.remove("__area");
    listing.extras.remove("__length");
    for i in 1..=10 {
        listing.extras.remove(&format!("latitude.{}", i));
        listing.extras.remove(&format!("longitude.{}", i));
    }
}

/// Combine-first for one key present in both snapshots: the fresh side's
/// non-null fields win, nulls never erase. Curated flags and first-seen
/// stay with the published record; a freshly cleaned row always carries
/// default flags, and letting those win would wipe manual curation.
fn combine_records(existing: &Listing, fresh: &Listing) -> Listing {
    fn prefer_fresh<T: Clone>(fresh: &Option<T>, existing: &Option<T>) -> Option<T> {
        fresh.clone().or_else(|| existing.clone())
    }

    let (facilities, has_elevator, has_balcony) = if fresh.facilities.is_empty() {
        (
            existing.facilities.clone(),
            existing.has_elevator,
            existing.has_balcony,
        )
    } else {
        (
            fresh.facilities.clone(),
            fresh.has_elevator,
            fresh.has_balcony,
        )
    };

    let mut extras = existing.extras.clone();
    for (name, value) in &fresh.extras {
        if !value.is_null() {
            extras.insert(name.clone(), value.clone());
        }
    }

    Listing {
        url: existing.url.clone(),
        address: prefer_fresh(&fresh.address, &existing.address),
        latitude: prefer_fresh(&fresh.latitude, &existing.latitude),
        longitude: prefer_fresh(&fresh.longitude, &existing.longitude),
        price: prefer_fresh(&fresh.price, &existing.price),
        asking_price: prefer_fresh(&fresh.asking_price, &existing.asking_price),
        closing_costs: prefer_fresh(&fresh.closing_costs, &existing.closing_costs),
        shared_costs: prefer_fresh(&fresh.shared_costs, &existing.shared_costs),
        rooms: prefer_fresh(&fresh.rooms, &existing.rooms),
        bedrooms: prefer_fresh(&fresh.bedrooms, &existing.bedrooms),
        internal_usable_area: prefer_fresh(
            &fresh.internal_usable_area,
            &existing.internal_usable_area,
        ),
        usable_area: prefer_fresh(&fresh.usable_area, &existing.usable_area),
        external_usable_area: prefer_fresh(
            &fresh.external_usable_area,
            &existing.external_usable_area,
        ),
        floor: prefer_fresh(&fresh.floor, &existing.floor),
        build_year: prefer_fresh(&fresh.build_year, &existing.build_year),
        energy_rating: prefer_fresh(&fresh.energy_rating, &existing.energy_rating),
        energy_rating_color: prefer_fresh(
            &fresh.energy_rating_color,
            &existing.energy_rating_color,
        ),
        facilities,
        has_elevator,
        has_balcony,
        price_per_area: prefer_fresh(&fresh.price_per_area, &existing.price_per_area),
        asking_price_per_area: prefer_fresh(
            &fresh.asking_price_per_area,
            &existing.asking_price_per_area,
        ),
        image_url: prefer_fresh(&fresh.image_url, &existing.image_url),
        sold: existing.sold,
        pinned: existing.pinned,
        hidden: existing.hidden,
        first_seen: existing.first_seen.clone().or_else(|| fresh.first_seen.clone()),
        extras,
    }
}

fn validate_key_columns(
    key_columns: &[String],
    existing: &Snapshot,
    fresh: &Snapshot,
) -> Result<()> {
    for column in key_columns {
        if Listing::is_schema_column(column) {
            continue;
        }
        let present = existing
            .iter()
            .chain(fresh.iter())
            .any(|l| l.extras.contains_key(column));
        if !present {
            return Err(PipelineError::MissingKeyColumn(column.clone()));
        }
    }
    Ok(())
}

/// Finishing steps shared by the diffing and degenerate paths: keep-last
/// dedup, first-seen fill-in, and the coordinate partition.
fn finish(records: Vec<Listing>, key_columns: &[String], run_timestamp: &str) -> MergeOutcome {
    let (order, mut by_key) = index_by_key(records, key_columns);

    let mut outcome = MergeOutcome::default();
    for key in order {
        let mut record = match by_key.remove(&key) {
            Some(r) => r,
            None => continue,
        };
        if record.first_seen.is_none() {
            record.first_seen = Some(run_timestamp.to_string());
        }
        if record.longitude.is_none() || record.latitude.is_none() {
            outcome.no_coords.push(record);
        } else {
            outcome.merged.push(record);
        }
    }
    outcome
}

/// Reconciles the freshly scraped snapshot against the currently published
/// one. Published listings whose key no longer appears in the fresh export
/// are marked sold; everything else is combined field by field with the
/// fresh side winning wherever it has a value.
///
/// Re-running the merge against its own output changes nothing beyond
/// first-seen fill-in and de-duplication.
pub fn merge_snapshots(
    existing: Snapshot,
    fresh: Snapshot,
    key_columns: &[String],
    run_timestamp: &str,
) -> Result<MergeOutcome> {
    if existing.is_empty() && fresh.is_empty() {
        return Ok(MergeOutcome::default());
    }
    validate_key_columns(key_columns, &existing, &fresh)?;

    let scrub = |mut records: Snapshot| -> Snapshot {
        for record in &mut records {
            drop_legacy_columns(record);
        }
        records
    };
    let existing = scrub(existing);
    let fresh = scrub(fresh);

    // Bootstrap runs and empty exports skip the diff entirely.
    if existing.is_empty() {
        return Ok(finish(fresh, key_columns, run_timestamp));
    }
    if fresh.is_empty() {
        return Ok(finish(existing, key_columns, run_timestamp));
    }

    let (existing_order, existing_by_key) = index_by_key(existing, key_columns);
    let (fresh_order, fresh_by_key) = index_by_key(fresh, key_columns);

    // A key is routed either through disappearance detection or through the
    // field-level combine, never both.
    let mut combined: Vec<Listing> = Vec::with_capacity(existing_order.len());
    let mut disappeared = 0usize;
    for key in &existing_order {
        let published = &existing_by_key[key];
        match fresh_by_key.get(key) {
            Some(fresh_record) => combined.push(combine_records(published, fresh_record)),
            None => {
                let mut gone = published.clone();
                gone.sold = true;
                combined.push(gone);
                disappeared += 1;
            }
        }
    }
    for key in &fresh_order {
        if !existing_by_key.contains_key(key) {
            combined.push(fresh_by_key[key].clone());
        }
    }

    info!(
        "Merged {} published and {} fresh listings ({} disappeared)",
        existing_order.len(),
        fresh_order.len(),
        disappeared
    );

    let mut outcome = finish(combined, key_columns, run_timestamp);
    outcome.disappeared = disappeared;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(url: &str) -> Listing {
        Listing {
            url: url.to_string(),
            latitude: Some(59.9),
            longitude: Some(10.7),
            ..Default::default()
        }
    }

    #[test]
    fn duplicate_keys_keep_the_last_occurrence() {
        let mut a = listing("x");
        a.price = Some(1);
        let mut b = listing("x");
        b.price = Some(2);

        let keys = vec!["annonse-href".to_string()];
        let outcome = merge_snapshots(vec![], vec![a, b], &keys, "2026-08-05 06:00:00").unwrap();
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].price, Some(2));
    }

    #[test]
    fn unknown_key_column_is_fatal() {
        let keys = vec!["no-such-column".to_string()];
        let err = merge_snapshots(vec![listing("x")], vec![], &keys, "ts").unwrap_err();
        assert!(matches!(err, PipelineError::MissingKeyColumn(_)));
    }

    #[test]
    fn legacy_coordinate_columns_are_dropped() {
        let mut old = listing("x");
        old.extras
            .insert("latitude.1".into(), serde_json::Value::from(1.0));
        old.extras
            .insert("__area".into(), serde_json::Value::from(12.0));

        let keys = vec!["annonse-href".to_string()];
        let outcome = merge_snapshots(vec![old], vec![listing("x")], &keys, "ts").unwrap();
        assert!(outcome.merged[0].extras.is_empty());
    }
}
