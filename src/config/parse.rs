use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parses and validates config from YAML text.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Secrets such as the admin password usually arrive via $env{..}
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = serde_yaml::from_str(&yaml)?;
    config.storage.path = expand_tilde(&config.storage.path);
    if let Some(dir) = config.web.static_dir.as_mut() {
        *dir = expand_tilde(dir);
    }

    validate_config(&config)?;
    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded = unexpanded_env_vars(yaml_string);
    if unexpanded.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.web.listen.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "web.listen: '{}' is not a valid socket address",
            config.web.listen
        ));
    }

    validate_url("platform.url", &config.platform.url, &mut errors);
    validate_url(
        "text_generation.endpoint",
        &config.text_generation.endpoint,
        &mut errors,
    );

    if config.platform.session.trim().is_empty() {
        errors.push("platform.session: must not be empty".to_string());
    }
    if config.scheduler.tick.is_zero() {
        errors.push("scheduler.tick: must be greater than zero".to_string());
    }
    if config.scheduler.batch_size == 0 {
        errors.push("scheduler.batch_size: must be greater than zero".to_string());
    }

    let defaults = &config.defaults.settings;
    if defaults.interval_minutes < 1 {
        errors.push(format!(
            "defaults.interval_minutes: must be at least 1, got {}",
            defaults.interval_minutes
        ));
    }
    if defaults.add_fee < 0 {
        errors.push(format!(
            "defaults.add_fee: must not be negative, got {}",
            defaults.add_fee
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_url(context: &str, value: &str, errors: &mut Vec<String>) {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!(
            "{}: unsupported scheme '{}' in '{}'",
            context,
            url.scheme(),
            value
        )),
        Err(e) => errors.push(format!("{}: invalid URL '{}': {}", context, value, e)),
    }
}
