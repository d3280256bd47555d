//! Engine configuration, loaded from TOML.
//!
//! Every section has working defaults, so an empty file is a valid
//! configuration. `validate` is the startup gate: a config that fails
//! it refuses to enable the engine rather than running with undefined
//! timer behavior.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeathChestConfig {
    #[serde(default)]
    pub chest: ChestSection,
    #[serde(default)]
    pub falling: FallingSection,
    #[serde(default)]
    pub hologram: HologramSection,
    #[serde(default)]
    pub messages: MessagesSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChestSection {
    /// Seconds until a chest is broken automatically.
    #[serde(default = "default_break_time")]
    pub break_time: u32,
    /// Whether one interaction may destroy a tracked chest early.
    #[serde(default = "default_true")]
    pub allow_instant_break: bool,
    /// Whether chest creation is announced in chat.
    #[serde(default = "default_true")]
    pub announce: bool,
}

fn default_break_time() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ChestSection {
    fn default() -> Self {
        Self {
            break_time: default_break_time(),
            allow_instant_break: true,
            announce: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallingSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Blocks above the death location where the proxy spawns.
    #[serde(default = "default_fall_height")]
    pub height: i32,
}

fn default_fall_height() -> i32 {
    20
}

impl Default for FallingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            height: default_fall_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HologramSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Height of the title line above the chest block.
    #[serde(default = "default_holo_height")]
    pub height: f64,
    /// Vertical gap between the title and countdown lines.
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
    /// Title line template. `%player%` is substituted.
    #[serde(default = "default_first_line")]
    pub first_line: String,
    /// Countdown line template. `%seconds%` is substituted.
    #[serde(default = "default_second_line")]
    pub second_line: String,
}

fn default_holo_height() -> f64 {
    1.0
}

fn default_line_spacing() -> f64 {
    0.3
}

fn default_first_line() -> String {
    "&7%player%'s &fLoot".into()
}

fn default_second_line() -> String {
    "&fTime remaining: &c%seconds%s".into()
}

impl Default for HologramSection {
    fn default() -> Self {
        Self {
            enabled: true,
            height: default_holo_height(),
            line_spacing: default_line_spacing(),
            first_line: default_first_line(),
            second_line: default_second_line(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesSection {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Creation announcement. `%player%` and `%time%` are substituted.
    #[serde(default = "default_created")]
    pub created: String,
    /// Destruction announcement. Empty string disables it.
    #[serde(default = "default_broken")]
    pub broken: String,
}

fn default_prefix() -> String {
    "&f&l[&3&lDeathChest&f&l] ".into()
}

fn default_created() -> String {
    "&c%player%'s death chest has been created! It will break in %time% seconds!".into()
}

fn default_broken() -> String {
    "&cDeath chest is breaking!".into()
}

impl Default for MessagesSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            created: default_created(),
            broken: default_broken(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DeathChestConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Startup-time gate over timer and geometry settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chest.break_time == 0 {
            return Err(ConfigError::Invalid("chest.break_time must be > 0".into()));
        }
        if self.falling.height <= 0 {
            return Err(ConfigError::Invalid("falling.height must be > 0".into()));
        }
        if self.hologram.height < 0.0 {
            return Err(ConfigError::Invalid("hologram.height must be >= 0".into()));
        }
        if self.hologram.line_spacing < 0.0 {
            return Err(ConfigError::Invalid(
                "hologram.line_spacing must be >= 0".into(),
            ));
        }
        Ok(())
    }
}
