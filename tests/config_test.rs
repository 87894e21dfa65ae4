//! Configuration loading tests

use std::fs;
use std::path::PathBuf;

use groove_sweep::config::{load_config, validate_config, Config};
use groove_sweep::Error;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.preprocess.runs_root, PathBuf::from("preprocessing_runs"));
    assert_eq!(config.preprocess.scratch_dir, "pre_out");
    assert_eq!(config.preprocess.error_log, "preprocessing_errors.log");
    assert_eq!(config.preprocess.transfer_script, vec!["./dataToCluster.sh"]);
    assert_eq!(config.train.runs_root, PathBuf::from("train_runs"));
    assert_eq!(config.train.hyperparams_setting, "solar-shadow");
    assert!(config.train.log_wandb);
    assert!(config.train.is_smol);
    assert_eq!(config.evaluate.error_log, "eval_errors.log");
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.json");
    fs::write(
        &path,
        r#"{
            "preprocess": {
                "random_seed": 7,
                "seed_example_sets": {"salsa": "seeds/salsa"},
                "grid": { "num_replacements": [1, 2] }
            },
            "train": { "log_wandb": false }
        }"#,
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.preprocess.random_seed, 7);
    assert_eq!(config.preprocess.grid.num_replacements, vec![1, 2]);
    assert_eq!(config.preprocess.grid.num_transformations, vec![1]);
    assert_eq!(config.preprocess.scratch_dir, "pre_out");
    assert!(!config.train.log_wandb);
    assert!(config.train.is_smol);

    let full = config.preprocess.combinations(true).unwrap();
    assert_eq!(full.len(), 6);
    assert_eq!(
        full[0].seed_example_sets(),
        &serde_json::json!({"salsa": "seeds/salsa"})
    );
}

#[test]
fn test_round_trip() {
    let config = Config::default();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let back: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
}

#[test]
fn test_invalid_grid_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{ "preprocess": { "grid": { "out_of_style_probs": [0.5, 2.0] } } }"#,
    )
    .unwrap();

    assert!(matches!(load_config(&path), Err(Error::InvalidParameter(_))));
}

#[test]
fn test_empty_command_rejected() {
    let mut config = Config::default();
    config.evaluate.evaluate_command.clear();
    assert!(matches!(validate_config(&config), Err(Error::Config(_))));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_config(dir.path().join("absent.json")),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(load_config(&path), Err(Error::Json(_))));
}
