//! Game configuration.
//!
//! User config lives at `~/.spaghetto/spaghetto.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use spaghetto_engine::domain::GameConstants;

use crate::error::{Result, RuntimeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "spaghetto.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".spaghetto";

/// Upper bound for `customers_per_employee`.
pub const MAX_CUSTOMERS_PER_EMPLOYEE: i64 = 100_000;

// ---------------------------------------------------------------------------
// Config structs (matching spaghetto.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub economy: EconomyConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// `[game]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Directory holding one sub-directory per saved game.
    #[serde(default = "default_save_dir")]
    pub save_dir: String,

    /// Snapshot every N events (0 disables periodic autosave).
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval: u64,

    /// Owner capital deposited when a new game starts, cents.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            autosave_interval: default_autosave_interval(),
            starting_balance: default_starting_balance(),
        }
    }
}

fn default_save_dir() -> String {
    "~/.spaghetto/saves".into()
}
fn default_autosave_interval() -> u64 {
    10
}
fn default_starting_balance() -> i64 {
    1_000_000
}

/// `[economy]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Weekly wage per employee, cents.
    #[serde(default = "default_wage")]
    pub wage_per_employee: i64,

    /// Weekly customers each employee can serve.
    #[serde(default = "default_customers_per_employee")]
    pub customers_per_employee: i64,

    /// Random variation of weekly demand, percent either way.
    #[serde(default = "default_demand_jitter")]
    pub demand_jitter: i64,

    /// Most loans listed at once.
    #[serde(default = "default_loan_offer_limit")]
    pub loan_offer_limit: i64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            wage_per_employee: default_wage(),
            customers_per_employee: default_customers_per_employee(),
            demand_jitter: default_demand_jitter(),
            loan_offer_limit: default_loan_offer_limit(),
        }
    }
}

fn default_wage() -> i64 {
    40_000
}
fn default_customers_per_employee() -> i64 {
    60
}
fn default_demand_jitter() -> i64 {
    20
}
fn default_loan_offer_limit() -> i64 {
    8
}

/// `[simulation]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed RNG seed; a fresh seed is drawn from the OS when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl AppConfig {
    /// Kernel constants for a new game.
    pub fn constants(&self) -> GameConstants {
        GameConstants {
            wage_per_employee: self.economy.wage_per_employee,
            loan_offer_limit: self.economy.loan_offer_limit,
        }
    }

    /// The save directory with a leading `~` expanded.
    pub fn save_dir(&self) -> Result<PathBuf> {
        expand_home(&self.game.save_dir)
    }

    /// Reject values the game cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.game.starting_balance < 0 {
            return Err(RuntimeError::config("starting_balance must not be negative"));
        }
        if self.economy.wage_per_employee < 0 {
            return Err(RuntimeError::config("wage_per_employee must not be negative"));
        }
        if !(1..=MAX_CUSTOMERS_PER_EMPLOYEE).contains(&self.economy.customers_per_employee) {
            return Err(RuntimeError::config(format!(
                "customers_per_employee must be between 1 and {MAX_CUSTOMERS_PER_EMPLOYEE}"
            )));
        }
        if !(0..=100).contains(&self.economy.demand_jitter) {
            return Err(RuntimeError::config("demand_jitter must be between 0 and 100"));
        }
        if self.economy.loan_offer_limit < 0 {
            return Err(RuntimeError::config("loan_offer_limit must not be negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.spaghetto/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RuntimeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.spaghetto/spaghetto.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RuntimeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RuntimeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Write a default config file at `path` (or the default location).
/// Returns the path to the created file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| RuntimeError::io(dir, e))?;
    }

    let content = to_toml(&AppConfig::default())?;
    std::fs::write(&path, content).map_err(|e| RuntimeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Render a config as pretty TOML.
pub fn to_toml(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| RuntimeError::config(e.to_string()))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| RuntimeError::config("could not determine home directory"))?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let toml_str = to_toml(&AppConfig::default()).expect("serialize default config");
        assert!(toml_str.contains("save_dir"));
        assert!(toml_str.contains("wage_per_employee"));
        assert!(!toml_str.contains("seed"));
    }

    #[test]
    fn config_roundtrip() {
        let toml_str = to_toml(&AppConfig::default()).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, AppConfig::default());
        assert_eq!(parsed.game.autosave_interval, 10);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[economy]
wage_per_employee = 55000

[simulation]
seed = 7
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.economy.wage_per_employee, 55_000);
        assert_eq!(config.economy.loan_offer_limit, 8);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.constants().wage_per_employee, 55_000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.economy.demand_jitter = 150;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.economy.customers_per_employee = 0;
        assert!(config.validate().unwrap_err().to_string().contains("customers_per_employee"));

        let mut config = AppConfig::default();
        config.economy.customers_per_employee = i64::MAX / 2;
        assert!(config.validate().is_err());
        config.economy.customers_per_employee = MAX_CUSTOMERS_PER_EMPLOYEE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_and_init_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("spaghetto.toml");
        init_config(Some(&path)).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn plain_paths_are_not_expanded() {
        assert_eq!(expand_home("/tmp/saves").unwrap(), PathBuf::from("/tmp/saves"));
    }
}
