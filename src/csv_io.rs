use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::SCHEMA_COLUMNS;
use crate::error::Result;
use crate::types::{Listing, RawTable, Snapshot};

/// Reads an export CSV as-is: header order preserved, cells kept as strings.
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = BTreeMap::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), cell.to_string());
        }
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

pub fn write_raw_table(path: &Path, table: &RawTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        let cells: Vec<&str> = table
            .headers
            .iter()
            .map(|h| row.get(h).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell_from_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Snapshot column order: the typed schema first, then extras sorted by
/// name. Deterministic within a run.
fn snapshot_columns(records: &[Listing]) -> Vec<String> {
    let mut columns: Vec<String> = SCHEMA_COLUMNS.iter().map(|c| c.to_string()).collect();
    let extras: BTreeSet<&String> = records.iter().flat_map(|l| l.extras.keys()).collect();
    columns.extend(extras.into_iter().cloned());
    columns
}

/// Writes a snapshot as CSV. Facilities are stored in their `", "`-joined
/// form, the same lossy flattening the geospatial output uses.
pub fn write_snapshot(path: &Path, records: &[Listing]) -> Result<()> {
    let columns = snapshot_columns(records);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for listing in records {
        let props = listing.to_properties(true);
        let cells: Vec<String> = columns
            .iter()
            .map(|column| props.get(column).map(cell_from_value).unwrap_or_default())
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a snapshot back from CSV. Cells pass through the same lenient
/// coercion as every other wire path, so numeric fields are renormalized
/// on the way in; rows without the identifying key are dropped.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let table = read_raw_table(path)?;
    let mut snapshot = Snapshot::new();
    for (index, row) in table.rows.iter().enumerate() {
        let mut props = Map::new();
        for (column, cell) in row {
            if !cell.is_empty() {
                props.insert(column.clone(), Value::from(cell.as_str()));
            }
        }
        match Listing::from_properties(&props) {
            Some(listing) => snapshot.push(listing),
            None => warn!("Dropping CSV row {} without an identifying key", index),
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_round_trips_through_csv() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.csv");

        let listing = Listing {
            url: "https://finn.no/ad/1".into(),
            latitude: Some(59.9),
            longitude: Some(10.7),
            price: Some(4_000_000),
            facilities: vec!["Heis".into()],
            has_elevator: true,
            sold: true,
            first_seen: Some("2026-08-05 06:00:00".into()),
            ..Default::default()
        };
        write_snapshot(&path, &[listing.clone()])?;

        let back = read_snapshot(&path)?;
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].url, listing.url);
        assert_eq!(back[0].price, Some(4_000_000));
        assert_eq!(back[0].facilities, vec!["Heis".to_string()]);
        assert!(back[0].sold);
        assert_eq!(back[0].first_seen, listing.first_seen);
        Ok(())
    }

    #[test]
    fn raw_tables_preserve_header_order() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "b,a\n1,2\n")?;

        let table = read_raw_table(&path)?;
        assert_eq!(table.headers, vec!["b", "a"]);
        assert_eq!(table.rows[0]["a"], "2");

        let out = dir.path().join("out.csv");
        write_raw_table(&out, &table)?;
        assert_eq!(std::fs::read_to_string(&out)?, "b,a\n1,2\n");
        Ok(())
    }
}
