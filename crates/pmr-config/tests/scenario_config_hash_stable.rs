//! Config hash stability.
//!
//! GREEN when:
//! - loading the same inputs twice yields the same config_hash
//! - key order inside a YAML document does not change the hash
//! - a changed value changes the hash
//! - an override layer is reflected in both the merged document and the hash

use pmr_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
reconcile:
  platform: "LinkedIn"
  winner_multiplier: 2.0
  fallback_threshold: 10
ledger:
  dir: "./ledger"
sources:
  - kind: official
    feed:
      url: "https://api.example.test/rest/shares"
    session_env:
      token: "PMR_OFFICIAL_TOKEN"
"#;

const BASE_YAML_REORDERED: &str = r#"
sources:
  - session_env:
      token: "PMR_OFFICIAL_TOKEN"
    feed:
      url: "https://api.example.test/rest/shares"
    kind: official
ledger:
  dir: "./ledger"
reconcile:
  fallback_threshold: 10
  winner_multiplier: 2.0
  platform: "LinkedIn"
"#;

const OVERRIDE_YAML: &str = r#"
reconcile:
  fallback_threshold: 25
"#;

#[test]
fn same_input_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn override_layer_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERRIDE_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(merged.config_json["reconcile"]["fallback_threshold"], 25);
    assert_eq!(merged.config_json["reconcile"]["platform"], "LinkedIn");
}

#[test]
fn empty_layer_is_a_no_op() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn files_load_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let over = dir.path().join("override.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&over, OVERRIDE_YAML).unwrap();

    let loaded = pmr_config::load_layered_yaml(&[&base, &over]).unwrap();
    assert_eq!(loaded.config_json["reconcile"]["fallback_threshold"], 25);

    let missing = dir.path().join("nope.yaml");
    assert!(pmr_config::load_layered_yaml(&[&missing]).is_err());
}
