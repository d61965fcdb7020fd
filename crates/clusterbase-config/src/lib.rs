pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{AzureSettings, Features, Mode, RpSettings, Settings};

use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "CLUSTERBASE_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "clusterbase.local.yaml",
    ".clusterbase.local.yaml",
    "clusterbase.yaml",
    ".clusterbase.yaml",
];

/// Global clusterbase config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("clusterbase");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the settings file
///
/// Search order:
/// 1. `CLUSTERBASE_CONFIG_PATH` (direct path)
/// 2. current directory: clusterbase.local.yaml, .clusterbase.local.yaml, clusterbase.yaml, .clusterbase.yaml
/// 3. `./.clusterbase/` with the same names
/// 4. `~/.config/clusterbase/config.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".clusterbase");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("clusterbase").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Discover and load settings, then apply environment overrides.
/// No settings file at all yields the defaults.
pub fn load_settings() -> Result<Settings> {
    let settings = match find_settings_file() {
        Ok(path) => Settings::load(&path)?,
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("No settings file found, using defaults");
            Settings::default()
        }
        Err(e) => return Err(e),
    };

    Ok(settings.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let result = get_config_dir();
        assert!(result.is_ok());

        let config_dir = result.unwrap();
        assert!(config_dir.ends_with("clusterbase"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("clusterbase.yaml"), "mode: production").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("clusterbase.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("clusterbase.yaml"), "").unwrap();
        fs::write(temp_dir.path().join(".clusterbase.local.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".clusterbase.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".clusterbase");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("clusterbase.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".clusterbase/clusterbase.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "mode: development").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(config_path.as_os_str()), || {
            assert_eq!(find_settings_file().unwrap(), config_path);
        });
    }

    #[test]
    #[serial]
    fn test_load_settings_from_env_path_with_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(
            &config_path,
            "rp:\n  subscription_id: rp-sub\nfeatures:\n  disable_deny_assignments: false\n",
        )
        .unwrap();

        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, Some(config_path.to_str().unwrap())),
                (settings::DISABLE_DENY_ASSIGNMENTS_ENV, Some("true")),
                (settings::RP_MODE_ENV, None),
            ],
            || {
                let settings = load_settings().unwrap();
                assert_eq!(settings.rp.subscription_id, "rp-sub");
                assert!(settings.features.disable_deny_assignments);
                assert_eq!(settings.mode, Mode::Production);
            },
        );
    }
}
