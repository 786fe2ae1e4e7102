use squall_core::Settings;
use std::path::{Path, PathBuf};

const CONFIG_PATH: &str = "~/.squall/config.toml";

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load settings from `path`, or from `~/.squall/config.toml` when not given
pub fn parse_config(path: Option<&Path>) -> Result<Settings, Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(p) => expand_tilde(&p.to_string_lossy()),
        None => expand_tilde(CONFIG_PATH),
    };
    tracing::debug!(path = %config_path.display(), "loading config");
    Ok(Settings::load(&config_path)?)
}
