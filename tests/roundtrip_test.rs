use serde_json::{json, Value};

use finn_atlas_sync::constants::{COL_FACILITIES, COL_FIRST_SEEN};
use finn_atlas_sync::convert::{snapshot_from_geojson, snapshot_to_geojson};
use finn_atlas_sync::types::Listing;

fn sample() -> Listing {
    Listing {
        url: "https://finn.no/ad/1".into(),
        address: Some("Storgata 1, Oslo".into()),
        latitude: Some(59.913),
        longitude: Some(10.738),
        price: Some(4_250_000),
        asking_price: Some(4_000_000),
        rooms: Some(3),
        internal_usable_area: Some(85),
        build_year: Some(1998),
        energy_rating: Some("C".into()),
        energy_rating_color: Some("Oransje".into()),
        facilities: vec!["Heis".into(), "Balkong/Terrasse".into()],
        has_elevator: true,
        has_balcony: true,
        price_per_area: Some(50_000),
        sold: false,
        pinned: true,
        hidden: false,
        first_seen: Some("2026-08-05 06:00:00".into()),
        ..Default::default()
    }
}

#[test]
fn tabular_to_geospatial_and_back_preserves_scalars() {
    let original = sample();

    let collection = snapshot_to_geojson(&[original.clone()]);
    let doc = serde_json::to_value(&collection).unwrap();
    let back = snapshot_from_geojson(&doc);

    assert_eq!(back.len(), 1);
    let restored = &back[0];
    assert_eq!(restored.url, original.url);
    assert_eq!(restored.address, original.address);
    assert_eq!(restored.latitude, original.latitude);
    assert_eq!(restored.longitude, original.longitude);
    assert_eq!(restored.price, original.price);
    assert_eq!(restored.rooms, original.rooms);
    assert_eq!(restored.energy_rating, original.energy_rating);
    assert_eq!(restored.first_seen, original.first_seen);
    assert_eq!(restored.pinned, original.pinned);
}

#[test]
fn list_fields_are_flattened_in_the_geospatial_form() {
    let collection = snapshot_to_geojson(&[sample()]);
    let props = &collection.features[0].properties;

    // The geospatial serialization carries no nested lists.
    assert_eq!(props[COL_FACILITIES], json!("Heis, Balkong/Terrasse"));
    assert!(props.values().all(|v| !v.is_array()));

    // Splitting on the join marker restores the labels, which is as much
    // of a round trip as the flattened form supports.
    let doc = serde_json::to_value(&collection).unwrap();
    let back = snapshot_from_geojson(&doc);
    assert_eq!(back[0].facilities, vec!["Heis", "Balkong/Terrasse"]);
}

#[test]
fn nulls_stay_explicit_in_feature_properties() {
    let mut listing = sample();
    listing.first_seen = None;
    let collection = snapshot_to_geojson(&[listing]);
    let props = &collection.features[0].properties;
    assert_eq!(props[COL_FIRST_SEEN], Value::Null);
}

#[test]
fn union_of_property_names_becomes_the_column_set() {
    let doc = json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [10.7, 59.9]},
                "properties": {"annonse-href": "https://finn.no/ad/1", "megler": "DNB"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [10.8, 59.8]},
                "properties": {"annonse-href": "https://finn.no/ad/2", "visning": "lørdag"}
            }
        ]
    });

    let snapshot = snapshot_from_geojson(&doc);
    assert_eq!(snapshot.len(), 2);
    // Properties missing on a given feature are simply null there.
    assert_eq!(snapshot[0].extras.get("megler"), Some(&json!("DNB")));
    assert!(snapshot[0].extras.get("visning").is_none());
    assert_eq!(snapshot[1].extras.get("visning"), Some(&json!("lørdag")));
}
