use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::address::normalize_address;
use crate::constants::*;
use crate::types::{coerce_integer, Listing, RawTable, Snapshot};

static EMBEDDED_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static ENERGY_RATING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-G]) - ([\w\s]+)$").unwrap());

/// What happened to one raw row during cleaning.
#[derive(Debug)]
pub enum RowOutcome {
    Cleaned(Box<Listing>),
    Skipped(String),
}

/// Per-run cleaning summary: the fresh snapshot plus every row that could
/// not take part in reconciliation.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub listings: Snapshot,
    pub skipped: Vec<String>,
}

/// New-build projects advertise ranges like "1000-1500"; such values are
/// averaged. Returns null when the range carries no digits at all.
fn average_hyphenated(value: &str) -> Option<i64> {
    let mut numbers = Vec::new();
    for part in value.split('-') {
        for m in EMBEDDED_NUMBER.find_iter(part) {
            if let Ok(n) = m.as_str().parse::<f64>() {
                numbers.push(n);
            }
        }
    }
    if numbers.is_empty() {
        return None;
    }
    Some((numbers.iter().sum::<f64>() / numbers.len() as f64).round() as i64)
}

/// Hyphen averaging first, plain integer coercion otherwise.
fn clean_numeric_cell(cell: &str) -> Option<i64> {
    if cell.contains('-') {
        return average_hyphenated(cell);
    }
    coerce_integer(&Value::from(cell))
}

/// Splits the combined "C - Oransje" source field into letter and color.
/// Anything that does not match the pattern yields two nulls.
fn split_energy_rating(cell: &str) -> (Option<String>, Option<String>) {
    match ENERGY_RATING.captures(cell.trim()) {
        Some(caps) => (
            Some(caps[1].to_string()),
            Some(caps[2].trim().to_string()),
        ),
        None => (None, None),
    }
}

/// Extracts plain-text facility labels from the export's HTML fragment.
/// Absent or unparseable markup yields an empty list.
fn extract_facilities(fragment: &str) -> Vec<String> {
    let selector = match Selector::parse("div.py-4.break-words") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let doc = Html::parse_fragment(fragment);
    doc.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

fn ratio(numerator: Option<i64>, denominator: Option<i64>) -> Option<i64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0 => Some((n as f64 / d as f64).round() as i64),
        _ => None,
    }
}

fn nonempty(row: &BTreeMap<String, String>, column: &str) -> Option<String> {
    row.get(column)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Cleans a single raw row into a typed listing. Every per-field repair
/// degrades to null or empty rather than failing; only a missing
/// identifying key skips the whole row.
pub fn clean_row(row: &BTreeMap<String, String>) -> RowOutcome {
    let url = match nonempty(row, COL_URL) {
        Some(url) => url,
        None => return RowOutcome::Skipped(format!("missing {}", COL_URL)),
    };

    let numeric = |column: &str| nonempty(row, column).and_then(|c| clean_numeric_cell(&c));

    let (energy_rating, energy_rating_color) = nonempty(row, COL_ENERGY_RATING)
        .map(|c| split_energy_rating(&c))
        .unwrap_or((None, None));

    let facilities = nonempty(row, COL_FACILITIES)
        .map(|c| extract_facilities(&c))
        .unwrap_or_default();

    let price = numeric(COL_PRICE);
    let asking_price = numeric(COL_ASKING_PRICE);
    let internal_usable_area = numeric(COL_INTERNAL_USABLE_AREA);

    let mut listing = Listing {
        url,
        address: nonempty(row, COL_ADDRESS).map(|a| normalize_address(&a)),
        latitude: nonempty(row, COL_LATITUDE).and_then(|c| c.parse().ok()),
        longitude: nonempty(row, COL_LONGITUDE).and_then(|c| c.parse().ok()),
        price,
        asking_price,
        closing_costs: numeric(COL_CLOSING_COSTS),
        shared_costs: numeric(COL_SHARED_COSTS),
        rooms: numeric(COL_ROOMS),
        bedrooms: numeric(COL_BEDROOMS),
        internal_usable_area,
        usable_area: numeric(COL_USABLE_AREA),
        external_usable_area: numeric(COL_EXTERNAL_USABLE_AREA),
        floor: numeric(COL_FLOOR),
        build_year: numeric(COL_BUILD_YEAR),
        energy_rating,
        energy_rating_color,
        has_elevator: facilities.iter().any(|f| f == FACILITY_ELEVATOR),
        has_balcony: facilities.iter().any(|f| f == FACILITY_BALCONY),
        facilities,
        price_per_area: ratio(price, internal_usable_area),
        asking_price_per_area: ratio(asking_price, internal_usable_area),
        // The export packs every gallery image into one cell; only the
        // first URL is worth keeping.
        image_url: nonempty(row, COL_IMAGE_URL)
            .and_then(|c| c.split_whitespace().next().map(str::to_string)),
        // Curated state starts clean; reconciliation preserves overrides.
        sold: false,
        pinned: false,
        hidden: false,
        first_seen: nonempty(row, COL_FIRST_SEEN),
        extras: BTreeMap::new(),
    };

    for (column, cell) in row {
        if Listing::is_schema_column(column) || cell.trim().is_empty() {
            continue;
        }
        listing
            .extras
            .insert(column.clone(), Value::from(cell.trim()));
    }

    RowOutcome::Cleaned(Box::new(listing))
}

/// Cleans the whole geocoded table into a fresh snapshot, row by row with
/// no cross-row state.
pub fn clean_table(table: &RawTable) -> CleanReport {
    let mut report = CleanReport::default();
    for (index, row) in table.rows.iter().enumerate() {
        match clean_row(row) {
            RowOutcome::Cleaned(listing) => report.listings.push(*listing),
            RowOutcome::Skipped(reason) => {
                debug!("Skipping row {}: {}", index, reason);
                report.skipped.push(format!("row {}: {}", index, reason));
            }
        }
    }
    report
}
