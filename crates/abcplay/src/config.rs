//! Configuration loading for abcplay.
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/abcplay/config.toml` (user)
//! 2. `./abcplay.toml`, or the `--config` path when given
//! 3. Environment variables (`ABCPLAY_*`)
//!
//! Command-line flags are applied on top by the caller.
//!
//! # Example Config
//!
//! ```toml
//! [midi]
//! velocity = 96
//! channel = 0
//! program = 24
//!
//! [output]
//! directory = "~/midi/out"
//! log_level = "debug"
//! ```

use abcseq::MidiParams;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{key} = {value} is out of range {min}-{max}")]
    OutOfRange {
        key: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub velocity: u8,
    pub channel: u8,
    pub program: Option<u8>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        let params = MidiParams::default();
        Self {
            velocity: params.velocity,
            channel: params.channel,
            program: params.program,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where .mid files go; next to the input when unset
    pub directory: Option<PathBuf>,
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbcplayConfig {
    pub midi: MidiConfig,
    pub output: OutputConfig,
}

impl AbcplayConfig {
    /// Load configuration from all sources, with `config_path` replacing the
    /// local `./abcplay.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in discover_config_files(config_path) {
            let table = load_table(&path)?;
            merge_tables(&mut merged, table);
            sources.files.push(path.clone());
        }

        let mut config: AbcplayConfig = toml::Value::Table(merged).try_into().map_err(|e: toml::de::Error| {
            ConfigError::Parse {
                path: sources.files.last().cloned().unwrap_or_default(),
                message: e.to_string(),
            }
        })?;
        if let Some(dir) = config.output.directory.take() {
            config.output.directory = Some(expand_path(&dir.to_string_lossy()));
        }

        apply_overrides(&mut config, &mut sources, |key| env::var(key).ok());
        config.validate()?;
        Ok((config, sources))
    }

    /// Reject MIDI values that do not fit their data byte or nibble.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("midi.velocity", self.midi.velocity, 1, 127)?;
        check_range("midi.channel", self.midi.channel, 0, 15)?;
        if let Some(program) = self.midi.program {
            check_range("midi.program", program, 0, 127)?;
        }
        Ok(())
    }

    pub fn midi_params(&self) -> MidiParams {
        MidiParams {
            velocity: self.midi.velocity,
            channel: self.midi.channel,
            program: self.midi.program,
            ..MidiParams::default()
        }
    }
}

fn check_range(key: &'static str, value: u8, min: u8, max: u8) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        })
    }
}

/// Config files to load, in load order.
///
/// An explicit path is always returned so a missing file is reported;
/// the standard locations are only used when they exist.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("abcplay/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("abcplay.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base` key by key, recursing into sections.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(section)) => {
                merge_tables(existing, section)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `ABCPLAY_*` overrides read through `lookup`.
///
/// Values that do not parse are ignored.
pub fn apply_overrides(
    config: &mut AbcplayConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("ABCPLAY_VELOCITY").and_then(|v| v.parse().ok()) {
        config.midi.velocity = v;
        sources.env_overrides.push("ABCPLAY_VELOCITY".to_string());
    }
    if let Some(v) = lookup("ABCPLAY_CHANNEL").and_then(|v| v.parse().ok()) {
        config.midi.channel = v;
        sources.env_overrides.push("ABCPLAY_CHANNEL".to_string());
    }
    if let Some(v) = lookup("ABCPLAY_PROGRAM").and_then(|v| v.parse().ok()) {
        config.midi.program = Some(v);
        sources.env_overrides.push("ABCPLAY_PROGRAM".to_string());
    }
    if let Some(v) = lookup("ABCPLAY_OUTPUT_DIR") {
        config.output.directory = Some(expand_path(&v));
        sources.env_overrides.push("ABCPLAY_OUTPUT_DIR".to_string());
    }
    if let Some(v) = lookup("ABCPLAY_LOG_LEVEL") {
        config.output.log_level = v;
        sources.env_overrides.push("ABCPLAY_LOG_LEVEL".to_string());
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(stripped) => match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(stripped),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
