use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::{COL_LATITUDE, COL_LONGITUDE};
use crate::types::{Listing, Snapshot};

/// GeoJSON document shapes for the published dataset. Geometry stays a
/// plain point; properties stay JSON values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: Vec<f64>,
}

/// Geospatial → tabular. Coordinates come from the geometry and override
/// any stale coordinate copies in the properties; rows without the
/// identifying key are dropped with a warning. Degenerate documents
/// (missing `type` or `features`) yield an empty snapshot.
pub fn snapshot_from_geojson(doc: &Value) -> Snapshot {
    let features = match (doc.get("type"), doc.get("features")) {
        (Some(_), Some(Value::Array(features))) => features,
        _ => return Snapshot::new(),
    };

    let mut snapshot = Snapshot::new();
    for feature in features {
        let mut props: Map<String, Value> = feature
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let coords = feature
            .get("geometry")
            .and_then(|g| g.get("coordinates"))
            .and_then(Value::as_array);
        if let Some(coords) = coords {
            let lon = coords.first().and_then(Value::as_f64);
            let lat = coords.get(1).and_then(Value::as_f64);
            props.insert(COL_LONGITUDE.into(), lon.map(Value::from).unwrap_or(Value::Null));
            props.insert(COL_LATITUDE.into(), lat.map(Value::from).unwrap_or(Value::Null));
        }

        match Listing::from_properties(&props) {
            Some(listing) => snapshot.push(listing),
            None => warn!("Dropping feature without an identifying key"),
        }
    }
    snapshot
}

/// Tabular → geospatial. One point feature per record; list values are
/// flattened to `", "`-joined strings (a documented lossy conversion) and
/// nulls stay explicit so the serialization carries no sentinels.
pub fn snapshot_to_geojson(records: &[Listing]) -> FeatureCollection {
    let features = records
        .iter()
        .map(|listing| {
            let geometry = match (listing.longitude, listing.latitude) {
                (Some(lon), Some(lat)) => Some(Geometry {
                    kind: "Point".to_string(),
                    coordinates: vec![lon, lat],
                }),
                _ => None,
            };
            Feature {
                kind: "Feature".to_string(),
                id: None,
                geometry,
                properties: listing.to_properties(false),
            }
        })
        .collect();

    FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn degenerate_documents_yield_empty_snapshots() {
        assert!(snapshot_from_geojson(&json!({})).is_empty());
        assert!(snapshot_from_geojson(&json!(null)).is_empty());
        assert!(snapshot_from_geojson(&json!({"type": "FeatureCollection"})).is_empty());
    }

    #[test]
    fn geometry_coordinates_win_over_property_copies() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [10.7, 59.9]},
                "properties": {
                    "annonse-href": "https://finn.no/ad/1",
                    "latitude": 1.0,
                    "longitude": 2.0
                }
            }]
        });
        let snapshot = snapshot_from_geojson(&doc);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].longitude, Some(10.7));
        assert_eq!(snapshot[0].latitude, Some(59.9));
    }

    #[test]
    fn records_without_coordinates_get_null_geometry() {
        let listing = Listing {
            url: "u".into(),
            ..Default::default()
        };
        let fc = snapshot_to_geojson(&[listing]);
        assert!(fc.features[0].geometry.is_none());
    }
}
