//! TOML configuration for the companion core.
//!
//! Sections mirror the shipped config file: `[ai]`, `[ai.connection]`,
//! `[ai.cloud]`, `[ai.cloud_fallback]`, `[security]`, `[abilities]`,
//! `[ranges]`, `[logging]`.  Every numeric option is clamped into its valid
//! range at load time (with a warning) rather than rejected, so a hand-edited
//! file can never take the companion offline.  Hot reload swaps a whole
//! immutable snapshot behind one reference; nothing mutates a live config.
//!
//! ```text
//! [ai]
//! temperature = 0.7
//! max_tokens = 512
//! max_tool_iterations = 8
//!
//! [ai.cloud]
//! url = "https://api.openai.com/v1"
//! key = "sk-..."
//! model = "gpt-4.1-mini"
//!
//! [ai.connection]
//! timeout_ms = 30000
//! local_url = "http://localhost:11434"
//! local_model = "llama3.1"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::blockmind::recipes::resolver::RecipeOverride;
use crate::blockmind::world::ItemId;

/// Errors produced while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config io error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub ai: AiSection,
    pub security: SecuritySection,
    pub abilities: AbilitiesSection,
    pub ranges: RangesSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    /// Master switch; when off the dispatcher answers with a fixed notice.
    pub enabled: bool,
    /// Sampling temperature, clamped to `[0, 2]`.
    pub temperature: f32,
    /// Response token cap, clamped to `[50, 4096]`.
    pub max_tokens: u32,
    /// Agent-loop hard cap, clamped to `[1, 20]`.
    pub max_tool_iterations: u32,
    pub connection: ConnectionSection,
    pub cloud: CloudSection,
    pub cloud_fallback: CloudSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    /// Per-request HTTP timeout, clamped to `[5000, 300000]` milliseconds.
    pub timeout_ms: u64,
    pub local_url: String,
    pub local_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSection {
    /// Base URL of an OpenAI-compatible endpoint; empty disables the rung.
    pub url: String,
    pub key: String,
    pub model: String,
}

impl CloudSection {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.model.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Comma-separated, lowercased list of game commands tools may never run.
    pub blocked_commands: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilitiesSection {
    /// Tools disabled by the operator; consulted by the registry.
    pub disabled_tools: Vec<String>,
    /// Extra manual recipe decompositions merged over the built-in table.
    pub recipe_overrides: Vec<RecipeOverrideEntry>,
}

/// A config-file recipe override: result item plus its decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeOverrideEntry {
    pub result: String,
    #[serde(flatten)]
    pub recipe: RecipeOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangesSection {
    /// Radius for surroundings scans and ore searches.
    pub scan_radius: i32,
    /// Radius for tree chopping.
    pub chop_radius: i32,
    /// Default strip-mine tunnel length.
    pub strip_mine_length: u32,
    /// Reach distance used for arrival gating.
    pub reach_distance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `log`-style level filter ("error" | "warn" | "info" | "debug" | "trace").
    pub level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            ai: AiSection::default(),
            security: SecuritySection::default(),
            abilities: AbilitiesSection::default(),
            ranges: RangesSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: 0.7,
            max_tokens: 512,
            max_tool_iterations: 8,
            connection: ConnectionSection::default(),
            cloud: CloudSection::default(),
            cloud_fallback: CloudSection::default(),
        }
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            local_url: "http://localhost:11434".to_string(),
            local_model: "llama3.1".to_string(),
        }
    }
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            model: String::new(),
        }
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            blocked_commands: "stop,op,deop,ban,ban-ip,pardon,whitelist,kick,save-off,reload"
                .to_string(),
        }
    }
}

impl Default for AbilitiesSection {
    fn default() -> Self {
        Self {
            disabled_tools: Vec::new(),
            recipe_overrides: Vec::new(),
        }
    }
}

impl Default for RangesSection {
    fn default() -> Self {
        Self {
            scan_radius: 32,
            chop_radius: 32,
            strip_mine_length: 64,
            reach_distance: 4.5,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Configuration =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.validated())
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&source)
    }

    /// Clamp every bounded option into its valid range, warning on each fix.
    pub fn validated(mut self) -> Self {
        clamp_f32(&mut self.ai.temperature, 0.0, 2.0, "ai.temperature");
        clamp_u32(&mut self.ai.max_tokens, 50, 4096, "ai.max_tokens");
        clamp_u32(
            &mut self.ai.max_tool_iterations,
            1,
            20,
            "ai.max_tool_iterations",
        );
        clamp_u64(
            &mut self.ai.connection.timeout_ms,
            5_000,
            300_000,
            "ai.connection.timeout_ms",
        );
        self
    }

    /// Install a process-wide logger honouring `[logging] level`.  Safe to
    /// call more than once; later calls are no-ops.
    pub fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(&self.logging.level);
        let _ = env_logger::Builder::from_env(env).try_init();
    }

    /// Whether the named tool is enabled.
    pub fn tool_enabled(&self, name: &str) -> bool {
        !self
            .abilities
            .disabled_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(name))
    }

    /// The blocked-command set, lowercased and trimmed.
    pub fn blocked_commands(&self) -> Vec<String> {
        self.security
            .blocked_commands
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Config-declared recipe overrides keyed by result item.
    pub fn recipe_overrides(&self) -> Vec<(ItemId, RecipeOverride)> {
        self.abilities
            .recipe_overrides
            .iter()
            .map(|e| (ItemId::new(e.result.clone()), e.recipe.clone()))
            .collect()
    }
}

fn clamp_f32(value: &mut f32, min: f32, max: f32, name: &str) {
    if *value < min || *value > max || value.is_nan() {
        let fixed = if value.is_nan() { min } else { value.clamp(min, max) };
        log::warn!("config: {} = {} out of [{}, {}], using {}", name, value, min, max, fixed);
        *value = fixed;
    }
}

fn clamp_u32(value: &mut u32, min: u32, max: u32, name: &str) {
    if *value < min || *value > max {
        let fixed = (*value).clamp(min, max);
        log::warn!("config: {} = {} out of [{}, {}], using {}", name, value, min, max, fixed);
        *value = fixed;
    }
}

fn clamp_u64(value: &mut u64, min: u64, max: u64, name: &str) {
    if *value < min || *value > max {
        let fixed = (*value).clamp(min, max);
        log::warn!("config: {} = {} out of [{}, {}], using {}", name, value, min, max, fixed);
        *value = fixed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let config = Configuration::default().validated();
        assert!(config.ai.temperature >= 0.0 && config.ai.temperature <= 2.0);
        assert!(config.ai.max_tokens >= 50);
        assert!(config.tool_enabled("craft_item"));
    }

    #[test]
    fn out_of_range_values_clamp() {
        let toml = r#"
            [ai]
            temperature = 9.5
            max_tokens = 10
            max_tool_iterations = 99

            [ai.connection]
            timeout_ms = 100
        "#;
        let config = Configuration::from_toml_str(toml).unwrap();
        assert_eq!(config.ai.temperature, 2.0);
        assert_eq!(config.ai.max_tokens, 50);
        assert_eq!(config.ai.max_tool_iterations, 20);
        assert_eq!(config.ai.connection.timeout_ms, 5_000);
    }

    #[test]
    fn loads_and_validates_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockmind.toml");
        std::fs::write(&path, "[ai]\nmax_tokens = 256\n\n[logging]\nlevel = \"debug\"\n").unwrap();
        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.ai.max_tokens, 256);
        assert_eq!(config.logging.level, "debug");
        assert!(matches!(
            Configuration::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn blocked_commands_parse_lowercased() {
        let mut config = Configuration::default();
        config.security.blocked_commands = "Stop, OP ,ban-ip,".to_string();
        assert_eq!(config.blocked_commands(), vec!["stop", "op", "ban-ip"]);
    }

    #[test]
    fn disabled_tools_are_case_insensitive() {
        let mut config = Configuration::default();
        config.abilities.disabled_tools = vec!["Strip_Mine".to_string()];
        assert!(!config.tool_enabled("strip_mine"));
        assert!(config.tool_enabled("chop_trees"));
    }

    #[test]
    fn recipe_overrides_load_from_toml() {
        let toml = r#"
            [[abilities.recipe_overrides]]
            result = "mod:alloy_sword"
            result_count = 1

            [[abilities.recipe_overrides.parts]]
            item = "minecraft:iron_ingot"
            count = 2

            [[abilities.recipe_overrides.parts]]
            item = "mod:alloy_core"
            count = 1
            terminal = true
        "#;
        let config = Configuration::from_toml_str(toml).unwrap();
        let overrides = config.recipe_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, ItemId::new("mod:alloy_sword"));
        assert!(overrides[0].1.parts[1].terminal);
    }
}
