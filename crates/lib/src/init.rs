//! Initialize the configuration directory: create ~/.hibiki and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the config directory and a default config file if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = b"{}";
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_directory_and_default_config() {
        let dir = std::env::temp_dir().join(format!("hibiki-init-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let config_path = dir.join("config.json");

        let created = init_config_dir(&config_path).expect("init");
        assert_eq!(created, dir);
        assert_eq!(
            std::fs::read_to_string(&config_path).expect("read config"),
            "{}"
        );

        // A second run leaves the existing file alone.
        std::fs::write(&config_path, r#"{"gateway":{"port":1}}"#).expect("write config");
        init_config_dir(&config_path).expect("init again");
        assert_eq!(
            std::fs::read_to_string(&config_path).expect("read config"),
            r#"{"gateway":{"port":1}}"#
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
