//! Server configuration loading
//!
//! Resolves the effective [`ApplicationConfig`] from, in priority order:
//! 1. `SKETCHD_CONFIG` environment variable (path to a TOML file)
//! 2. `./sketchd.toml` in the current directory
//! 3. Defaults with environment overrides

use sketchd::config::ApplicationConfig;

/// Load configuration from file or environment.
pub fn load_config() -> ApplicationConfig {
    if let Ok(path) = std::env::var("SKETCHD_CONFIG") {
        match ApplicationConfig::from_file_with_env(&path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from: {}", path);
                return config;
            }
            Err(e) => {
                eprintln!(
                    "[config] Failed to load config from {}: {}. Trying defaults.",
                    path, e
                );
            }
        }
    }

    let default_path = std::path::Path::new("sketchd.toml");
    if default_path.exists() {
        match ApplicationConfig::from_file_with_env("sketchd.toml") {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from sketchd.toml");
                return config;
            }
            Err(e) => {
                eprintln!("[config] Failed to parse sketchd.toml: {}. Using defaults.", e);
            }
        }
    }

    eprintln!("[config] Using default configuration");
    ApplicationConfig::from_env()
}
