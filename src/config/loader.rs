//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { name: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { name, value } => {
                write!(f, "Environment error: {}={:?} is not a valid value", name, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides from the process environment, then validate.
pub fn load_config(path: Option<&Path>, env_prefix: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    config.trust.normalize_header_names();
    apply_env_overrides(&mut config, env_prefix, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` resolves a fully prefixed variable name. Header names are
/// lowercased and an empty value clears an optional header.
pub fn apply_env_overrides<F>(
    config: &mut GatewayConfig,
    prefix: &str,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{prefix}{name}"));
    let trust = &mut config.trust;

    if let Some(origin) = var("ORIGIN") {
        trust.origin = non_empty(origin.trim_end_matches('/').to_string());
    }
    if let Some(depth) = var("XFF_DEPTH") {
        trust.forwarding_depth = depth.trim().parse().map_err(|_| ConfigError::Env {
            name: format!("{prefix}XFF_DEPTH"),
            value: depth.clone(),
        })?;
    }
    if let Some(header) = var("ADDRESS_HEADER") {
        trust.address_header = non_empty(header.to_lowercase());
    }
    if let Some(header) = var("PROTOCOL_HEADER") {
        trust.protocol_header = non_empty(header.to_lowercase());
    }
    if let Some(header) = var("HOST_HEADER") {
        trust.host_header = non_empty(header.to_lowercase()).unwrap_or_else(|| "host".to_string());
    }
    if let Some(header) = var("PORT_HEADER") {
        trust.port_header = non_empty(header.to_lowercase());
    }

    let host = var("HOST");
    let port = var("PORT");
    if host.is_some() || port.is_some() {
        let (default_host, default_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| ("0.0.0.0".to_string(), "3000".to_string()));
        config.listener.bind_address = format!(
            "{}:{}",
            host.unwrap_or(default_host),
            port.unwrap_or(default_port)
        );
    }

    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
