// Configuration management module
// TOML settings, validation, and the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChatConfig, Config, ConfigError, CorpusConfig, EmbeddingConfig, EmbeddingProvider, IndexConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn default_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("bookmind"))
        .ok_or(ConfigError::DirectoryError)
}
