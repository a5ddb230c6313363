use crate::config::ScrapeConfig;
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config.json",
    "/etc/goscraper/app/config.json",
    "/app/config.json",
];

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<ScrapeConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    parse_config_from_str(&contents, extension)
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<ScrapeConfig> {
    let config: ScrapeConfig = match format.to_lowercase().as_str() {
        "json" => serde_json::from_str(content)?,
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "toml" => toml::from_str(content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    config.validate()?;
    Ok(config)
}

/// Loads `explicit` if given, otherwise the first of [`DEFAULT_CONFIG_PATHS`]
/// that exists. Returns the path actually read.
pub async fn discover_config(explicit: Option<&Path>) -> Result<(PathBuf, ScrapeConfig)> {
    match explicit {
        Some(path) => {
            let config = parse_config_from_file(path).await?;
            info!("Config file read from {}", path.display());
            Ok((path.to_path_buf(), config))
        }
        None => {
            let candidates: Vec<PathBuf> = DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect();
            discover_in(&candidates).await
        }
    }
}

pub async fn discover_in(candidates: &[PathBuf]) -> Result<(PathBuf, ScrapeConfig)> {
    for path in candidates {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!("No config at {}", path.display());
            continue;
        }

        let config = parse_config_from_file(path).await?;
        info!("Config file read from {}", path.display());
        return Ok((path.clone(), config));
    }

    Err(ConfigError::NotFound {
        searched: candidates.iter().map(|p| p.display().to_string()).collect(),
    })
}
