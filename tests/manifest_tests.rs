// Copyright (c) 2025 - Cowboy AI, Inc.
//! Applying inventory manifests end to end

mod fixtures;

use cim_dcim_allocation::errors::AllocationError;
use cim_dcim_allocation::manifest::InventoryManifest;
use fixtures::*;
use pretty_assertions::assert_eq;

const MANIFEST: &str = r#"{
  "pools": [
    { "service": "web", "cidr": "10.0.0.0/30" },
    { "service": "db", "cidr": "10.0.1.0/29" }
  ],
  "fabs": [{
    "name": "dc1",
    "rooms": [{
      "name": "hall-a", "rack_capacity": 4, "height": 42,
      "racks": [
        { "name": "a01", "service": "web", "height": 42 },
        { "name": "a02", "service": "db", "height": 42 }
      ]
    }]
  }],
  "placements": [
    { "name": "web-1", "service": "web", "fab": "dc1", "room": "hall-a", "rack": "a01",
      "slot": { "front": 0, "back": 9 } },
    { "name": "web-2", "service": "web", "fab": "dc1", "room": "hall-a", "rack": "a01",
      "slot": { "front": 9, "back": 12 } },
    { "name": "web-3", "service": "web", "fab": "dc1", "room": "hall-a", "rack": "a01",
      "slot": { "front": 20, "back": 21 } },
    { "name": "web-4", "service": "web", "fab": "dc1", "room": "hall-a", "rack": "a01",
      "slot": { "front": 30, "back": 31 } },
    { "name": "db-1", "service": "db", "fab": "dc1", "room": "hall-b", "rack": "a02",
      "slot": { "front": 0, "back": 1 } }
  ]
}"#;

#[tokio::test]
async fn test_manifest_report() {
    let s = services();
    let manifest = InventoryManifest::from_json(MANIFEST).unwrap();
    let report = manifest.apply(&s).await.unwrap();

    let placed: Vec<_> = report
        .placed
        .iter()
        .map(|p| (p.name.as_str(), p.address.to_string()))
        .collect();
    assert_eq!(
        placed,
        vec![
            ("web-1", "10.0.0.1".to_string()),
            ("web-3", "10.0.0.2".to_string())
        ]
    );

    let failed: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["web-2", "web-4", "db-1"]);
    assert!(report.failures[0].error.contains("overlaps"));
    assert!(report.failures[1].error.contains("exhausted"));
    assert!(report.failures[2].error.contains("not in the manifest"));

    let racks: Vec<_> = report
        .racks
        .iter()
        .map(|r| (r.path.as_str(), r.max_empty))
        .collect();
    assert_eq!(racks, vec![("dc1/hall-a/a01", 20), ("dc1/hall-a/a02", 42)]);

    let web = &report.pools[0];
    assert_eq!((web.used, web.free), (2, 0));
}

#[tokio::test]
async fn test_structural_error_aborts_apply() {
    let s = services();
    let manifest = InventoryManifest::from_json(
        r#"{ "pools": [
            { "service": "web", "cidr": "10.0.0.0/24" },
            { "service": "db", "cidr": "10.0.0.0/25" }
        ] }"#,
    )
    .unwrap();

    assert!(matches!(
        manifest.apply(&s).await,
        Err(AllocationError::Conflict(_))
    ));
}

#[test]
fn test_malformed_manifest_is_serialization_error() {
    assert!(matches!(
        InventoryManifest::from_json("{ \"pools\": 3 }"),
        Err(AllocationError::Serialization(_))
    ));
}
