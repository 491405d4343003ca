//! Configuration loading and management.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hlo_core::{MistakePolicy, ScenarioCatalog, ScenarioConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Directory that `hlo analyze` writes markdown reports into.
    pub output_dir: PathBuf,
    /// Base directory for relative plan and world paths.
    pub resource_dir: PathBuf,
    /// Count "add this block again" corrections as mistakes.
    pub count_missing_as_mistake: bool,
    /// Number of per-HLO columns in CSV output.
    pub hlo_columns: usize,
    /// Plans and labels per scenario name.
    pub scenarios: BTreeMap<String, ScenarioConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("output_dir", &self.output_dir)
            .field("resource_dir", &self.resource_dir)
            .field("count_missing_as_mistake", &self.count_missing_as_mistake)
            .field("hlo_columns", &self.hlo_columns)
            .field("scenarios", &self.scenarios.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hlo.db"),
            output_dir: PathBuf::from("analysis"),
            resource_dir: data_dir.join("resources"),
            count_missing_as_mistake: true,
            hlo_columns: 8,
            scenarios: ScenarioConfig::defaults(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HLO_*)
        figment = figment.merge(Env::prefixed("HLO_"));

        figment.extract()
    }

    pub const fn mistake_policy(&self) -> MistakePolicy {
        MistakePolicy::from_count_missing(self.count_missing_as_mistake)
    }

    /// Loads the plans of the named scenarios.
    ///
    /// Names without a configured scenario are skipped; sessions using them
    /// fail individually with an unknown-scenario error. Scenarios whose
    /// files fail to load keep the error for their sessions.
    pub fn load_catalog(&self, names: &[String]) -> ScenarioCatalog {
        let configs: BTreeMap<String, ScenarioConfig> = self
            .scenarios
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();
        ScenarioCatalog::load(&configs, &self.resource_dir)
    }
}

/// Returns the platform-specific config directory for hlo.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hlo"))
}

/// Returns the platform-specific data directory for hlo.
///
/// On Linux: `~/.local/share/hlo`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hlo"))
}
