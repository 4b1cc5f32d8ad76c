use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config file already exists at {0}; remove it first or use --stdout")]
    AlreadyExists(PathBuf),

    #[error("no config file found; use --config to specify a path")]
    NoConfig,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub fn init(stdout: bool) -> Result<(), CliError> {
    write_config(&generate_starter_config(), stdout)
}

fn write_config(config_content: &str, stdout: bool) -> Result<(), CliError> {
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/price-relay/config.yml, fall back to /etc/price-relay/config.yml
    let config_path = dirs::home_dir()
        .map(|home| home.join(".config/price-relay/config.yml"))
        .filter(|path| match path.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(e) => {
                    eprintln!("Warning: Could not create directory {}: {}", parent.display(), e);
                    eprintln!("Falling back to /etc/price-relay/config.yml");
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from("/etc/price-relay/config.yml"));

    if config_path.exists() {
        return Err(CliError::AlreadyExists(config_path));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let path = config_path.ok_or(CliError::NoConfig)?;

    println!("Validating config file: {}", path.display());
    crate::config::load_config(&path)?;
    println!("✓ Config is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_accepts_starter_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(generate_starter_config().as_bytes()).unwrap();

        validate(Some(file.path().to_path_buf())).unwrap();
    }

    #[test]
    fn test_validate_without_path() {
        assert!(matches!(validate(None), Err(CliError::NoConfig)));
    }

    #[test]
    fn test_validate_reports_bad_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"storage:\n  path: /tmp/x.duckdb\nweb:\n  listen: nope\nplatform:\n  url: http://127.0.0.1:9000\n")
            .unwrap();

        assert!(matches!(
            validate(Some(file.path().to_path_buf())),
            Err(CliError::Config(_))
        ));
    }
}
