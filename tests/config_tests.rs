use price_relay::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.web.listen, "127.0.0.1:8000");
    assert_eq!(config.platform.session, "message_bot");
    assert_eq!(config.scheduler.tick, Duration::from_secs(60));
    assert_eq!(config.scheduler.publish_delay, Duration::from_secs(5));
    assert_eq!(config.platform.login_code_ttl, Duration::from_secs(300));
    assert!(config.defaults.settings.is_active);
    // Tilde is expanded in the storage path
    assert!(!config.storage.path.to_string_lossy().starts_with('~'));
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config(&temp_dir.path().join("absent.yml"));

    match result {
        Err(ConfigError::Io(e)) => assert!(e.to_string().contains("absent.yml")),
        other => panic!("expected I/O error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_invalid_yaml_names_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("broken.yml");
    fs::write(&config_path, "storage: [unterminated\n").unwrap();

    match load_config(&config_path) {
        Err(ConfigError::Io(e)) => assert!(e.to_string().contains("broken.yml")),
        other => panic!("expected wrapped parse error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_env_placeholders_resolve_from_environment() {
    std::env::set_var("PRICE_RELAY_IT_GEMINI_KEY", "gm-123");
    std::env::set_var("PRICE_RELAY_IT_DB_DIR", "/var/lib/relay-it");

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        r#"
storage:
  path: $env{PRICE_RELAY_IT_DB_DIR}/relay.duckdb
web:
  listen: 0.0.0.0:8000
platform:
  url: https://bridge.internal
defaults:
  gemini_api_key: $env{PRICE_RELAY_IT_GEMINI_KEY}
  source_channels: ["@shop_one", "@shop_two"]
  target_channel: "@deals"
  add_fee: 25
  interval_minutes: 15
"#,
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.storage.path.to_string_lossy(), "/var/lib/relay-it/relay.duckdb");
    assert_eq!(config.defaults.settings.gemini_api_key, "gm-123");
    assert_eq!(config.defaults.settings.source_channels.len(), 2);
    assert_eq!(config.defaults.settings.interval_minutes, 15);

    std::env::remove_var("PRICE_RELAY_IT_GEMINI_KEY");
    std::env::remove_var("PRICE_RELAY_IT_DB_DIR");
}
