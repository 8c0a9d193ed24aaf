use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_MUSIC_ROOT: &str = "library";
const DEFAULT_STAGING_PATH: &str = ".staging";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_WATCH_DEBOUNCE_SECS: u64 = 2;
const DEFAULT_MAX_UPLOAD_TRACKS: usize = 50;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub music_root: String,
    /// Relative values resolve against the music root.
    pub staging_path: String,
    pub port: u16,
    pub watch_music: bool,
    pub watch_debounce_secs: u64,
    pub max_upload_tracks: usize,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: DEFAULT_MUSIC_ROOT.to_string(),
            staging_path: DEFAULT_STAGING_PATH.to_string(),
            port: DEFAULT_PORT,
            watch_music: true,
            watch_debounce_secs: DEFAULT_WATCH_DEBOUNCE_SECS,
            max_upload_tracks: DEFAULT_MAX_UPLOAD_TRACKS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Replaces zero and blank values with their defaults.
    pub fn repair(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.music_root.trim().is_empty() {
            self.music_root = DEFAULT_MUSIC_ROOT.to_string();
        }
        if self.staging_path.trim().is_empty() {
            self.staging_path = DEFAULT_STAGING_PATH.to_string();
        }
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.watch_debounce_secs == 0 {
            self.watch_debounce_secs = DEFAULT_WATCH_DEBOUNCE_SECS;
        }
        if self.max_upload_tracks == 0 {
            self.max_upload_tracks = DEFAULT_MAX_UPLOAD_TRACKS;
        }
        if self.max_upload_bytes == 0 {
            self.max_upload_bytes = DEFAULT_MAX_UPLOAD_BYTES;
        }
    }

    /// Applies `LIBRARY_ROOT` and `PORT` style overrides. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("LIBRARY_ROOT") {
            if !root.trim().is_empty() {
                self.music_root = root.trim().to_string();
            }
        }
        if let Some(port) = lookup("PORT") {
            if let Ok(port) = port.trim().parse::<u16>() {
                if port != 0 {
                    self.port = port;
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("ALBUMSHELF_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = if contents.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.repair();
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, config: &ServerConfig) -> PathBuf {
    resolve_path(config_path, config.music_root.trim())
}

pub fn resolve_staging_dir(music_root: &Path, config: &ServerConfig) -> PathBuf {
    let raw = PathBuf::from(config.staging_path.trim());
    if raw.is_absolute() {
        raw
    } else {
        music_root.join(raw)
    }
}
