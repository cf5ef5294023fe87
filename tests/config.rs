use std::fs;

use daybook::config::{Config, CONFIG_FILE};
use daybook::error::Error;

#[test]
fn partial_config_keeps_other_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[github]\nenabled = false\n").expect("write config");

    let config = Config::load(&path).expect("load config");
    assert!(!config.github.enabled);
    assert_eq!(config.github.gh_bin, "gh");
    assert_eq!(config.history.max_depth, 50);
    assert!(config.rollover.on_open);
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);

    let mut config = Config::default();
    config.history.max_depth = 7;
    config.export.enabled = true;
    config.export.dir = Some(dir.path().join("notes"));
    config.save(&path).expect("save config");

    let loaded = Config::load(&path).expect("load config");
    assert_eq!(loaded.history.max_depth, 7);
    assert!(loaded.export.enabled);
    assert_eq!(loaded.export.dir, Some(dir.path().join("notes")));
}

#[test]
fn invalid_timeout_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[github]\ntimeout = \"soon\"\n").expect("write config");

    let err = Config::load(&path).expect_err("invalid timeout");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[history\nmax_depth = 3\n").expect("write config");

    assert!(matches!(Config::load(&path), Err(Error::TomlParse(_))));
}
