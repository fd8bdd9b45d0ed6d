//! Loading and bootstrapping of the on-disk configuration file.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;

const CONFIG_DIR_NAME: &str = "mpd-mirror";
const CONFIG_FILE_NAME: &str = "config.toml";

/// `<config dir>/mpd-mirror/config.toml`, or `None` on platforms without a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Writes the default configuration to `path` when no file exists yet.
pub fn ensure_config_file(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string(&Config::default())
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?;
    std::fs::write(path, text)?;
    info!(
        "Config file not found. Created default config. path={}",
        path.display()
    );
    Ok(())
}

/// Reads `path`, falling back to defaults when it is missing or invalid.
pub fn load_config_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(
                "Failed to read config file {}: {}. Using defaults.",
                path.display(),
                error
            );
            return Config::default();
        }
    };
    match toml::from_str::<Config>(&text) {
        Ok(config) => config,
        Err(error) => {
            warn!(
                "Failed to parse config file {}: {}. Using defaults.",
                path.display(),
                error
            );
            Config::default()
        }
    }
}
