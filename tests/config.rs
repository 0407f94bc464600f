use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use hips_provisioner::config::{Config, ConfigLoader, ConfigOverrides};
use hips_provisioner::domain::{TileFormat, TileLayout};
use hips_provisioner::error::HipsError;

#[test]
fn file_values_override_defaults() {
    let config: Config = serde_json::from_str(
        r#"{
            "base_url": "https://alasky.cds.unistra.fr/DSS/DSSColor/",
            "output_base": "viewer/public/hips",
            "layout": "hips",
            "tile_format": "png",
            "tile_timeout_secs": 30,
            "workers": 4,
            "creator_did_prefix": "ivo://example/P/test"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_config(config, &ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.output_base.as_str(), "viewer/public/hips");
    assert_eq!(resolved.layout, TileLayout::Hips);
    assert_eq!(resolved.tile_format, TileFormat::Png);
    assert_eq!(resolved.tile_timeout, Duration::from_secs(30));
    assert_eq!(resolved.properties_timeout, Duration::from_secs(10));
    assert_eq!(resolved.workers, 4);
    assert_eq!(resolved.creator_did_prefix, "ivo://example/P/test");
}

#[test]
fn command_line_wins_over_file() {
    let config = Config {
        workers: Some(4),
        layout: Some(TileLayout::Hips),
        catalog: Some("catalog.json".to_string()),
        ..Config::default()
    };
    let overrides = ConfigOverrides {
        workers: Some(2),
        layout: Some(TileLayout::Plain),
        tile_format: Some(TileFormat::Fits),
        catalog: Some("other.json".to_string()),
    };
    let resolved = ConfigLoader::resolve_config(config, &overrides).unwrap();
    assert_eq!(resolved.workers, 2);
    assert_eq!(resolved.layout, TileLayout::Plain);
    assert_eq!(resolved.tile_format, TileFormat::Fits);
    assert_eq!(resolved.catalog.unwrap().as_str(), "other.json");
}

#[test]
fn invalid_values_are_rejected() {
    let zero_workers = Config {
        workers: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_workers, &ConfigOverrides::default()),
        Err(HipsError::InvalidConfig(_))
    );

    let bad_url = Config {
        base_url: Some("ftp://example.org".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_url, &ConfigOverrides::default()),
        Err(HipsError::InvalidConfig(_))
    );
}

#[test]
fn unknown_keys_fail_to_parse() {
    assert!(serde_json::from_str::<Config>(r#"{"base_uri": "http://x"}"#).is_err());
}

#[test]
fn explicit_path_is_read() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("hips-provision.json");
    fs::write(&path, r#"{"workers": 3}"#).unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), &ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.workers, 3);
    assert_eq!(resolved.source.as_deref(), Some(path.as_path()));
}

#[test]
fn explicit_path_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), &ConfigOverrides::default()),
        Err(HipsError::ConfigRead(_))
    );

    let broken = temp.path().join("broken.json");
    fs::write(&broken, "{").unwrap();
    assert_matches!(
        ConfigLoader::resolve(broken.to_str(), &ConfigOverrides::default()),
        Err(HipsError::ConfigParse(_))
    );
}
