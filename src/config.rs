use crate::resources::VantageConfig;
use crate::scene::errors::{VantageError, VantageResult};
use std::fs;
use std::path::{Path, PathBuf};

pub mod range_types;

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().and_then(|mut path| {
        path.push("vantage");
        fs::create_dir_all(&path).ok()?;
        path.push("config.toml");
        Some(path)
    })
}

/// Loads the user config, falling back to defaults when it is missing or unreadable
pub fn load_config() -> VantageConfig {
    get_config_path()
        .and_then(|path| load_config_from(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_from(path: &Path) -> VantageResult<VantageConfig> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str::<VantageConfig>(&contents)?)
}

pub fn save_config(config: &VantageConfig) -> VantageResult<()> {
    let path = get_config_path().ok_or(VantageError::ConfigDirNotFound)?;
    save_config_to(config, &path)
}

pub fn save_config_to(config: &VantageConfig, path: &Path) -> VantageResult<()> {
    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::range_types::VisionRange;

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("vantage-config-{}.toml", std::process::id()));
        let mut config = VantageConfig::default();
        config.settings.vision_range = VisionRange::new(250.0);
        config.settings.rebuild_threshold = 7;

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.settings.vision_range.get(), 250.0);
        assert_eq!(loaded.settings.rebuild_threshold, 7);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: VantageConfig = toml::from_str("[settings]\nrebuild_threshold = 3\n").unwrap();
        assert_eq!(config.settings.rebuild_threshold, 3);
        assert!(config.settings.enforce_movement_blocking);
        assert_eq!(config.settings.route_cell_size.get(), 50.0);
    }

    #[test]
    fn test_out_of_range_settings_are_clamped_on_load() {
        let path = std::env::temp_dir().join(format!("vantage-clamp-{}.toml", std::process::id()));
        fs::write(&path, "[settings]\nroute_cell_size = 0.0\nvision_range = -10.0\nroute_clearance = -2.0\n").unwrap();
        let loaded = load_config_from(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.settings.route_cell_size.get(), 1.0);
        assert_eq!(loaded.settings.vision_range.get(), 1.0);
        assert_eq!(loaded.settings.route_clearance.get(), 0.0);
        assert_eq!(loaded.settings.route_config().cell_size, 1.0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config_from(Path::new("/nonexistent/vantage/config.toml"));
        assert!(matches!(result, Err(VantageError::Io(_))));
    }
}
