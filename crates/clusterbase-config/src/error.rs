use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: clusterbase.local.yaml, .clusterbase.local.yaml, clusterbase.yaml, .clusterbase.yaml\n\
        - ./.clusterbase/ directory\n\
        - ~/.config/clusterbase/config.yaml\n\
        Set CLUSTERBASE_CONFIG_PATH to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Invalid settings in {path}: {message}")]
    Invalid { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
