mod common;

use std::io::Write;

use common::{init_tracing, temp_config};
use nh_collect::HarvestSettings;
use nh_config::{ConfigError, NhConfig};

#[test]
fn test_temp_config_defaults() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = temp_config(&dir);
    assert!(config.global.db_path.starts_with(dir.path()));
    assert!(config.validate().is_ok());

    let settings = HarvestSettings::from_config(&config);
    assert_eq!(settings.batch_size, 100);
    assert_eq!(settings.max_concurrent, 50);
    assert!(settings.reconcile_inventory);
}

#[test]
fn test_load_file_drives_harvest_settings() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[harvest]
batch_size = 25
max_concurrent = 8
batch_cooldown_secs = 0

[ssh]
user = "netops"

[akips]
enabled = false
"#
    )
    .unwrap();

    let config = NhConfig::load(file.path()).unwrap();
    assert!(config.validate_for_harvest().is_ok());

    let settings = HarvestSettings::from_config(&config);
    assert_eq!(settings.batch_size, 25);
    assert_eq!(settings.max_concurrent, 8);
    assert!(settings.batch_cooldown.is_zero());
    assert!(!settings.reconcile_inventory);
    assert_eq!(settings.insert_chunk_size, 1000);
}

#[test]
fn test_harvest_requires_akips_credentials_when_enabled() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[ssh]\nuser = \"netops\"\n").unwrap();

    let config = NhConfig::load(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert!(matches!(
        config.validate_for_harvest(),
        Err(ConfigError::MissingField(field)) if field.starts_with("akips.base_url")
    ));
}
