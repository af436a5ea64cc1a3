use kestrel_deck::config::{DeckConfig, RetriggerPolicy};
use std::fs;
use tempfile::tempdir;

#[test]
fn partial_file_keeps_defaults_for_missing_fields() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("deck.json");
    fs::write(&path, r#"{"retrigger_policy":"restart","effect_timeout":0.75,"audio":{"cue_duration":0.4}}"#)
        .expect("write config");

    let config = DeckConfig::load(&path).expect("load config");
    assert_eq!(config.retrigger_policy, RetriggerPolicy::Restart);
    assert_eq!(config.effect_timeout, 0.75);
    assert!((config.audio.cue_duration - 0.4).abs() < f32::EPSILON);
    assert_eq!(config.audio.ring_capacity, DeckConfig::default().audio.ring_capacity);
    assert_eq!(config.button_grid.positions.len(), 6);
}

#[test]
fn malformed_file_reports_path_in_error() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").expect("write config");

    let err = DeckConfig::load(&path).expect_err("malformed config");
    let message = format!("{err:#}");
    assert!(message.contains("Failed to parse config file"), "{message}");
    assert!(message.contains("broken.json"), "{message}");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempdir().expect("temp dir");
    let config = DeckConfig::load_or_default(dir.path().join("absent.json"));
    assert_eq!(config.retrigger_policy, RetriggerPolicy::Drop);
    assert_eq!(config.effect_timeout, 1.5);
}

#[test]
fn unknown_policy_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("deck.json");
    fs::write(&path, r#"{"retrigger_policy":"stack"}"#).expect("write config");
    assert!(DeckConfig::load(&path).is_err());
}

#[test]
fn shipped_sample_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/deck.json");
    DeckConfig::load(path).expect("sample config parses");
}
