//! Platform directories

use std::path::PathBuf;

use etcetera::{BaseStrategy, choose_base_strategy};

/// File name of user and project configuration files
pub const CONFIG_FILE_NAME: &str = "pysplit.toml";

/// Per-user configuration directory, `$XDG_CONFIG_HOME/pysplit` or the platform equivalent
pub fn user_config_dir() -> Option<PathBuf> {
    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("pysplit"))
}

/// Per-user configuration file, whether or not it exists
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
