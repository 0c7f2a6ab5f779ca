//! Configuration management for gesturepad
//!
//! Settings live in `~/.gesturepad/config.json` with schema versioning and
//! migrations. Every section uses `#[serde(default)]`, so a partial file only
//! overrides what it names. Regions, cooldowns, the AI prompt and the AI
//! credential are all configuration; the state machines never embed them.

use crate::dispatch::prompts::DEFAULT_PROMPT_ID;
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Environment variable overriding `ai.api_key`
pub const API_KEY_ENV: &str = "GESTUREPAD_AI_KEY";

/// Operator label that clears the expression
pub const RESET_LABEL: &str = "R";

/// Operator label that deletes the last character
pub const DELETE_LABEL: &str = "Del";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Frame geometry
    pub frame: FrameConfig,
    /// Calculator regions and cooldowns
    pub calculator: CalculatorConfig,
    /// Drawing canvas settings
    pub canvas: CanvasConfig,
    /// Vision service settings
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            frame: FrameConfig::default(),
            calculator: CalculatorConfig::default(),
            canvas: CanvasConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

/// Frame geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Whether incoming landmarks are normalised to 0..1 and need scaling
    pub normalized_input: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            normalized_input: false,
        }
    }
}

/// Calculator regions and cooldowns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Wrist region read by the left (slot 0) hand
    pub left_input: Region,
    /// Wrist region read by the right (slot 1) hand
    pub right_input: Region,
    /// Region where an open hand commits and two fists evaluate
    pub confirm: Region,
    /// Operator buttons, hit-tested in this order
    pub operators: Vec<Region>,
    /// Minimum time between deletes while `Del` is held
    pub delete_cooldown_ms: u64,
    /// Minimum time between evaluations (shared with commits)
    pub evaluate_cooldown_ms: u64,
}

impl CalculatorConfig {
    pub fn delete_cooldown(&self) -> Duration {
        Duration::from_millis(self.delete_cooldown_ms)
    }

    pub fn evaluate_cooldown(&self) -> Duration {
        Duration::from_millis(self.evaluate_cooldown_ms)
    }
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            left_input: Region::new("input-1", 50.0, 200.0, 400.0, 600.0),
            right_input: Region::new("input-2", 450.0, 200.0, 800.0, 600.0),
            confirm: Region::new("confirm", 850.0, 200.0, 1250.0, 600.0),
            operators: vec![
                Region::new(RESET_LABEL, 50.0, 20.0, 150.0, 70.0),
                Region::new("+", 200.0, 20.0, 300.0, 70.0),
                Region::new("-", 350.0, 20.0, 450.0, 70.0),
                Region::new("*", 500.0, 20.0, 600.0, 70.0),
                Region::new("/", 650.0, 20.0, 750.0, 70.0),
                Region::new(DELETE_LABEL, 800.0, 20.0, 950.0, 70.0),
            ],
            delete_cooldown_ms: 2000,
            evaluate_cooldown_ms: 2000,
        }
    }
}

/// Drawing canvas settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// The "Done" button
    pub confirm: Region,
    /// Built-in prompt template ID
    pub prompt_id: String,
    /// Custom prompt text; overrides `prompt_id` when set
    pub prompt: Option<String>,
    /// Stroke thickness in pixels
    pub stroke_thickness: u32,
    /// Stroke colour as RGB
    pub stroke_color: [u8; 3],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            confirm: Region::new("done", 1100.0, 50.0, 1250.0, 150.0),
            prompt_id: DEFAULT_PROMPT_ID.to_string(),
            prompt: None,
            stroke_thickness: 10,
            stroke_color: [255, 0, 255],
        }
    }
}

/// Vision service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Ollama-compatible server URL
    pub base_url: String,
    /// Vision-capable model name
    pub model: String,
    /// Bearer credential for authenticated endpoints
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AiConfig {
    /// Credential from the environment, falling back to the config file
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Check invariants the state machines rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame resolution must be non-zero, got {}x{}",
                self.frame.width, self.frame.height
            )));
        }

        let calc = &self.calculator;
        let regions = [&calc.left_input, &calc.right_input, &calc.confirm, &self.canvas.confirm]
            .into_iter()
            .chain(calc.operators.iter());
        for region in regions {
            if !region.is_well_formed() {
                return Err(ConfigError::Invalid(format!(
                    "region '{}' has inverted corners",
                    region.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for op in &calc.operators {
            if !seen.insert(op.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate operator label '{}'",
                    op.name
                )));
            }
            let is_symbol = matches!(op.name.as_str(), "+" | "-" | "*" | "/");
            if !is_symbol && op.name != RESET_LABEL && op.name != DELETE_LABEL {
                return Err(ConfigError::Invalid(format!(
                    "unsupported operator label '{}'",
                    op.name
                )));
            }
        }

        if calc.delete_cooldown_ms == 0 || calc.evaluate_cooldown_ms == 0 {
            return Err(ConfigError::Invalid(
                "cooldown periods must be non-zero".to_string(),
            ));
        }

        if self.canvas.stroke_thickness == 0 {
            return Err(ConfigError::Invalid(
                "stroke thickness must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from `path`, falling back to defaults if absent
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_str(&contents)?;
        let migrated = migrate_config(config)?;
        migrated.validate()?;

        tracing::info!(
            "Config loaded from {} ({}x{})",
            path.display(),
            migrated.frame.width,
            migrated.frame.height
        );
        Ok(migrated)
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from(&get_config_path())
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(write_err)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(write_err)?;

        tracing::info!("Config saved to {}", path.display());
        Ok(())
    }
}

/// Get the path to the config file (~/.gesturepad/config.json)
pub fn get_config_path() -> PathBuf {
    get_app_dir().join("config.json")
}

/// Get the application directory (~/.gesturepad)
pub fn get_app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| {
            tracing::error!("Could not determine home directory, using /tmp");
            PathBuf::from("/tmp")
        })
        .join(".gesturepad")
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: initial schema
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_current_version() {
        let config = Config::default();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_calculator_defaults() {
        let calc = CalculatorConfig::default();
        assert_eq!(calc.delete_cooldown(), Duration::from_secs(2));
        assert_eq!(calc.evaluate_cooldown(), Duration::from_secs(2));
        let labels: Vec<&str> = calc.operators.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(labels, vec!["R", "+", "-", "*", "/", "Del"]);
    }

    #[test]
    fn test_canvas_defaults() {
        let canvas = CanvasConfig::default();
        assert_eq!(canvas.confirm.x1, 1100.0);
        assert_eq!(canvas.prompt_id, "compare-drawings");
        assert!(canvas.prompt.is_none());
        assert_eq!(canvas.stroke_thickness, 10);
    }

    #[test]
    fn test_partial_config_deserialisation() {
        let json = r#"{"version": 1, "frame": {"width": 640}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.frame.width, 640);
        assert_eq!(config.frame.height, 720);
        assert_eq!(config.ai.model, "llava");
    }

    #[test]
    fn test_migration_from_version_0() {
        let old_config = Config {
            version: 0,
            ..Default::default()
        };

        let migrated = migrate_config(old_config).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_future_version_rejected() {
        let future_config = Config {
            version: 999,
            ..Default::default()
        };

        let result = migrate_config(future_config);
        assert!(matches!(result, Err(ConfigError::UnknownVersion(999))));
    }

    #[test]
    fn test_validate_rejects_inverted_region() {
        let mut config = Config::default();
        config.calculator.confirm = Region::new("confirm", 900.0, 200.0, 850.0, 600.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("confirm"));
    }

    #[test]
    fn test_validate_rejects_unknown_operator() {
        let mut config = Config::default();
        config
            .calculator
            .operators
            .push(Region::new("^", 1000.0, 20.0, 1100.0, 70.0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_operator() {
        let mut config = Config::default();
        config
            .calculator
            .operators
            .push(Region::new("+", 1000.0, 20.0, 1100.0, 70.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cooldown() {
        let mut config = Config::default();
        config.calculator.delete_cooldown_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_resolution() {
        let mut config = Config::default();
        config.frame.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_path_format() {
        let path = get_config_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".gesturepad"));
        assert!(path_str.ends_with("config.json"));
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnknownVersion(7);
        assert_eq!(err.to_string(), "Unknown config version: 7");

        let err = ConfigError::Invalid("bad".to_string());
        assert_eq!(err.to_string(), "Invalid config: bad");
    }
}
