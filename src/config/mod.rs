mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./segmux.toml", "~/.config/segmux/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.demux.clock_threshold_us < 0 {
        anyhow::bail!(
            "demux.clock_threshold_us cannot be negative (got {})",
            config.demux.clock_threshold_us
        );
    }

    if config.output.max_frames == Some(0) {
        anyhow::bail!("output.max_frames must be at least 1");
    }

    if config.output.preview_bytes > 64 {
        tracing::warn!(
            "output.preview_bytes is {}, frame lines will be long",
            config.output.preview_bytes
        );
    }

    Ok(())
}
