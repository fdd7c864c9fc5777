//! Integration tests for loading a catalog from a descriptor directory.

use pedalera_catalog::{Catalog, CatalogError, PluginUri};
use tempfile::TempDir;

const FUZZ_JSON: &str = r#"{
    "uri": "urn:test:fuzz",
    "name": "Fuzz",
    "category": "distortion",
    "ports": [
        { "symbol": "in", "name": "In", "direction": "input", "kind": "audio" },
        { "symbol": "out", "name": "Out", "direction": "output", "kind": "audio" },
        {
            "symbol": "fuzz", "name": "Fuzz", "direction": "input", "kind": "control",
            "range": { "min": 0.0, "max": 10.0, "default": 5.0 }
        },
        {
            "symbol": "gate", "name": "Gate", "direction": "input", "kind": "control",
            "range": { "min": 0.0, "max": 1.0, "default": 0.0 },
            "flags": ["toggled"]
        }
    ]
}"#;

const WAH_JSON: &str = r#"{
    "uri": "urn:test:wah",
    "name": "Wah",
    "category": "filter",
    "ports": [
        { "symbol": "in", "name": "In", "direction": "input", "kind": "audio" },
        { "symbol": "out", "name": "Out", "direction": "output", "kind": "audio" },
        {
            "symbol": "freq", "name": "Frequency", "direction": "input", "kind": "control",
            "range": { "min": 200.0, "max": 2000.0, "default": 600.0 },
            "unit": "hertz",
            "flags": ["logarithmic"]
        }
    ]
}"#;

/// Descriptor files load, non-JSON files are skipped, lookups work.
#[test]
fn test_load_descriptor_dir() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(dir.path().join("fuzz.json"), FUZZ_JSON).expect("write fuzz");
    std::fs::write(dir.path().join("wah.json"), WAH_JSON).expect("write wah");
    std::fs::write(dir.path().join("notes.txt"), "not a descriptor").expect("write txt");

    let catalog = Catalog::load_dir(dir.path()).expect("should load catalog");
    assert_eq!(catalog.len(), 2);

    let fuzz = catalog.resolve(&PluginUri::new("urn:test:fuzz")).unwrap();
    assert_eq!(fuzz.name, "Fuzz");
    assert_eq!(fuzz.control_inputs().count(), 2);

    let freq = catalog
        .resolve(&PluginUri::new("urn:test:wah"))
        .unwrap()
        .port("freq")
        .cloned()
        .expect("wah should have freq port");
    assert_eq!(freq.range.unwrap().default, 600.0);
    assert!(freq.flags.contains(pedalera_catalog::PortFlags::LOGARITHMIC));
}

/// A syntactically broken file fails the load with the offending path.
#[test]
fn test_malformed_descriptor_fails_load() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(dir.path().join("fuzz.json"), FUZZ_JSON).expect("write fuzz");
    std::fs::write(dir.path().join("broken.json"), "{ not json").expect("write broken");

    let err = Catalog::load_dir(dir.path()).expect_err("load must fail");
    match err {
        CatalogError::Malformed { path, .. } => {
            assert!(path.ends_with("broken.json"), "got path {path:?}");
        }
        other => panic!("expected Malformed, got {other:?}"),
    }
}

/// A control port without a declared range is rejected at load.
#[test]
fn test_control_port_without_range_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    let bad = r#"{
        "uri": "urn:test:bad",
        "name": "Bad",
        "category": "utility",
        "ports": [
            { "symbol": "knob", "name": "Knob", "direction": "input", "kind": "control" }
        ]
    }"#;
    std::fs::write(dir.path().join("bad.json"), bad).expect("write bad");

    let err = Catalog::load_dir(dir.path()).expect_err("load must fail");
    assert!(matches!(err, CatalogError::Descriptor { .. }), "got {err:?}");
}

/// Two files claiming the same URI fail the load.
#[test]
fn test_duplicate_uri_across_files_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(dir.path().join("fuzz.json"), FUZZ_JSON).expect("write fuzz");
    std::fs::write(dir.path().join("fuzz_again.json"), FUZZ_JSON).expect("write copy");

    let err = Catalog::load_dir(dir.path()).expect_err("load must fail");
    assert!(matches!(err, CatalogError::DuplicateUri(_)), "got {err:?}");
}

/// A missing directory reports a read error, not a panic.
#[test]
fn test_missing_dir_is_read_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let gone = dir.path().join("does-not-exist");

    let err = Catalog::load_dir(&gone).expect_err("load must fail");
    assert!(matches!(err, CatalogError::ReadFile { .. }), "got {err:?}");
}

/// Loaded descriptors round-trip back out through serde unchanged.
#[test]
fn test_loaded_descriptor_reserializes() {
    let dir = TempDir::new().expect("should create temp dir");
    std::fs::write(dir.path().join("wah.json"), WAH_JSON).expect("write wah");

    let catalog = Catalog::load_dir(dir.path()).expect("should load catalog");
    let wah = catalog.resolve(&PluginUri::new("urn:test:wah")).unwrap();

    let json = serde_json::to_string(&*wah).expect("serialize");
    let reparsed: pedalera_catalog::PluginDescriptor =
        serde_json::from_str(&json).expect("reparse");
    assert_eq!(reparsed, *wah);
}
