use finn_atlas_sync::constants::COL_URL;
use finn_atlas_sync::merge::merge_snapshots;
use finn_atlas_sync::types::Listing;

const RUN_TS: &str = "2026-08-05 06:00:00";

fn keys() -> Vec<String> {
    vec![COL_URL.to_string()]
}

fn listing(url: &str) -> Listing {
    Listing {
        url: format!("https://finn.no/ad/{}", url),
        latitude: Some(59.9),
        longitude: Some(10.7),
        price: Some(3_000_000),
        first_seen: Some("2025-11-01 09:00:00".into()),
        ..Default::default()
    }
}

#[test]
fn merging_a_snapshot_with_itself_changes_nothing() {
    let snapshot = vec![listing("1"), listing("2"), listing("3")];

    let outcome = merge_snapshots(snapshot.clone(), snapshot.clone(), &keys(), RUN_TS).unwrap();

    assert_eq!(outcome.disappeared, 0);
    assert_eq!(outcome.merged, snapshot);
    assert!(outcome.merged.iter().all(|l| !l.sold));
}

#[test]
fn disjoint_snapshots_union_and_mark_existing_sold() {
    let existing = vec![listing("1"), listing("2")];
    let fresh = vec![listing("3"), listing("4"), listing("5")];

    let outcome = merge_snapshots(existing.clone(), fresh, &keys(), RUN_TS).unwrap();

    assert_eq!(outcome.merged.len(), 5);
    assert_eq!(outcome.disappeared, 2);
    for old in &existing {
        let merged = outcome
            .merged
            .iter()
            .find(|l| l.url == old.url)
            .expect("existing key kept");
        assert!(merged.sold);
    }
    assert!(outcome
        .merged
        .iter()
        .filter(|l| l.url.ends_with('3') || l.url.ends_with('4') || l.url.ends_with('5'))
        .all(|l| !l.sold));
}

#[test]
fn disappeared_records_keep_their_other_fields() {
    let mut gone = listing("1");
    gone.price = Some(5_500_000);
    gone.address = Some("Storgata 1, Oslo".into());
    gone.pinned = true;

    let outcome = merge_snapshots(vec![gone.clone()], vec![listing("2")], &keys(), RUN_TS).unwrap();

    let merged = outcome
        .merged
        .iter()
        .find(|l| l.url == gone.url)
        .expect("disappeared key kept");
    assert!(merged.sold);
    assert_eq!(merged.price, gone.price);
    assert_eq!(merged.address, gone.address);
    assert!(merged.pinned);
}

#[test]
fn fresh_non_null_fields_override_and_nulls_never_erase() {
    let mut existing = listing("1");
    existing.price = Some(3_000_000);
    existing.address = Some("Storgata 1, Oslo".into());
    existing.build_year = Some(1985);

    let mut fresh = listing("1");
    fresh.price = Some(2_900_000);
    fresh.address = None;
    fresh.build_year = None;
    fresh.first_seen = None;

    let outcome = merge_snapshots(vec![existing], vec![fresh], &keys(), RUN_TS).unwrap();

    let merged = &outcome.merged[0];
    assert_eq!(merged.price, Some(2_900_000));
    assert_eq!(merged.address.as_deref(), Some("Storgata 1, Oslo"));
    assert_eq!(merged.build_year, Some(1985));
}

#[test]
fn curated_flags_survive_a_fresh_scrape() {
    let mut existing = listing("1");
    existing.pinned = true;
    existing.hidden = true;

    // A freshly cleaned row always carries default flags.
    let fresh = listing("1");

    let outcome = merge_snapshots(vec![existing], vec![fresh], &keys(), RUN_TS).unwrap();
    assert!(outcome.merged[0].pinned);
    assert!(outcome.merged[0].hidden);
    assert!(!outcome.merged[0].sold);
}

#[test]
fn sold_is_only_set_by_disappearance() {
    let existing = vec![listing("1"), listing("2")];
    let fresh = vec![listing("1")];

    let outcome = merge_snapshots(existing, fresh, &keys(), RUN_TS).unwrap();

    let still_listed = outcome.merged.iter().find(|l| l.url.ends_with('1')).unwrap();
    let disappeared = outcome.merged.iter().find(|l| l.url.ends_with('2')).unwrap();
    assert!(!still_listed.sold);
    assert!(disappeared.sold);
    assert_eq!(outcome.disappeared, 1);
}

#[test]
fn first_seen_is_write_once() {
    let mut fresh = listing("1");
    fresh.first_seen = None;

    // Bootstrap: no existing snapshot, timestamp filled in.
    let bootstrap = merge_snapshots(vec![], vec![fresh], &keys(), RUN_TS).unwrap();
    assert_eq!(bootstrap.merged[0].first_seen.as_deref(), Some(RUN_TS));

    // A later run must not move it.
    let mut later_fresh = listing("1");
    later_fresh.first_seen = None;
    let later = merge_snapshots(
        bootstrap.merged,
        vec![later_fresh],
        &keys(),
        "2026-09-01 06:00:00",
    )
    .unwrap();
    assert_eq!(later.merged[0].first_seen.as_deref(), Some(RUN_TS));
}

#[test]
fn records_without_coordinates_go_to_the_side_channel() {
    let mut grounded = listing("1");
    grounded.longitude = None;

    let outcome = merge_snapshots(vec![], vec![grounded, listing("2")], &keys(), RUN_TS).unwrap();

    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.no_coords.len(), 1);
    assert!(outcome.no_coords[0].url.ends_with('1'));
    assert!(outcome.merged[0].url.ends_with('2'));
}

#[test]
fn empty_existing_bootstraps_to_fresh() {
    let fresh = vec![listing("1"), listing("2")];
    let outcome = merge_snapshots(vec![], fresh.clone(), &keys(), RUN_TS).unwrap();
    assert_eq!(outcome.merged, fresh);
    assert_eq!(outcome.disappeared, 0);
}

#[test]
fn empty_fresh_keeps_existing_unchanged() {
    let existing = vec![listing("1")];
    let outcome = merge_snapshots(existing.clone(), vec![], &keys(), RUN_TS).unwrap();
    assert_eq!(outcome.merged, existing);
    assert!(!outcome.merged[0].sold);
}
