//! Kernel Configuration - tuning constants as operator-tunable TOML values
//!
//! Every constant the kernel would otherwise hardcode is a field in this
//! module. Each struct implements `Default` with the built-in values from
//! `defaults`, so a missing config file changes nothing.
//!
//! Regulatory minimums are never configured here; they come only from the
//! effective policy.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults as d;
use crate::types::SlurryRecipe;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "PLUGPLAN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "plugplan.toml";

// ============================================================================
// Config Provenance: tracks which keys the user explicitly set
// ============================================================================

/// Tracks which configuration keys were explicitly present in the user's TOML file.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    /// Dotted key paths explicitly present in the user's TOML file
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    /// Check whether a dotted key path was explicitly set by the user.
    ///
    /// Example: `provenance.is_user_set("materials.open_hole_excess")`
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root kernel configuration.
///
/// Load with `KernelConfig::load()` which searches:
/// 1. `$PLUGPLAN_CONFIG` env var
/// 2. `./plugplan.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Annular excess inference and regulatory multiplier
    #[serde(default)]
    pub materials: MaterialsConfig,

    /// Recipe used when the policy has no default recipe
    #[serde(default = "default_fallback_recipe")]
    pub fallback_recipe: SlurryRecipe,

    /// Baseline generator fallbacks
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Enrichment pipeline fallbacks
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Spacer and displacement sizing
    #[serde(default)]
    pub fluids: FluidsConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            materials: MaterialsConfig::default(),
            fallback_recipe: default_fallback_recipe(),
            baseline: BaselineConfig::default(),
            pipeline: PipelineConfig::default(),
            fluids: FluidsConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PLUGPLAN_CONFIG` environment variable
    /// 2. `./plugplan.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        Self::load_with_provenance().0
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _provenance) = Self::load_from_file_with_provenance(path)?;
        Ok(config)
    }

    /// Load from a specific TOML file path, also returning provenance
    /// so callers can distinguish user-set values from defaults.
    pub fn load_from_file_with_provenance(
        path: &Path,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        // Two-pass: check for unknown keys first (warnings only)
        let typo_warnings = super::validation::validate_unknown_keys(&contents);
        for w in &typo_warnings {
            warn!("{}", w);
        }

        let provenance = ConfigProvenance {
            explicit_keys: super::validation::walk_toml_keys(
                &contents
                    .parse::<toml::Value>()
                    .unwrap_or(toml::Value::Table(toml::map::Map::new())),
                "",
            )
            .into_iter()
            .collect(),
        };

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok((config, provenance))
    }

    /// Load configuration using standard search order, returning provenance.
    pub fn load_with_provenance() -> (Self, ConfigProvenance) {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file_with_provenance(&p) {
                    Ok(loaded) => {
                        info!(path = %p.display(), "Loaded kernel config from {}", CONFIG_ENV_VAR);
                        return loaded;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./plugplan.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file_with_provenance(&local) {
                Ok(loaded) => {
                    info!("Loaded kernel config from ./{}", LOCAL_CONFIG_FILE);
                    return loaded;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        (Self::default(), ConfigProvenance::default())
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Kernel config saved");
        Ok(())
    }

    /// Validate all values for physical sense.
    ///
    /// Collects every error rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_physical_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Materials
// ============================================================================

/// Annular excess inference table and the regulatory length multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialsConfig {
    /// Cased intervals at or beyond this length use `cased_long_excess` (ft)
    #[serde(default = "default_excess_interval_threshold")]
    pub excess_interval_threshold_ft: f64,

    #[serde(default = "default_open_hole_excess")]
    pub open_hole_excess: f64,

    #[serde(default = "default_cased_long_excess")]
    pub cased_long_excess: f64,

    #[serde(default = "default_cased_short_excess")]
    pub cased_short_excess: f64,

    /// Used when the hole context is unknown
    #[serde(default = "default_fallback_excess")]
    pub fallback_excess: f64,

    #[serde(default = "default_regulatory_excess_step")]
    pub regulatory_excess_step: f64,

    #[serde(default = "default_regulatory_excess_unit")]
    pub regulatory_excess_unit_ft: f64,
}

fn default_excess_interval_threshold() -> f64 {
    d::EXCESS_INTERVAL_THRESHOLD_FT
}
fn default_open_hole_excess() -> f64 {
    d::OPEN_HOLE_EXCESS
}
fn default_cased_long_excess() -> f64 {
    d::CASED_LONG_EXCESS
}
fn default_cased_short_excess() -> f64 {
    d::CASED_SHORT_EXCESS
}
fn default_fallback_excess() -> f64 {
    d::FALLBACK_EXCESS
}
fn default_regulatory_excess_step() -> f64 {
    d::REGULATORY_EXCESS_STEP
}
fn default_regulatory_excess_unit() -> f64 {
    d::REGULATORY_EXCESS_UNIT_FT
}

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            excess_interval_threshold_ft: default_excess_interval_threshold(),
            open_hole_excess: default_open_hole_excess(),
            cased_long_excess: default_cased_long_excess(),
            cased_short_excess: default_cased_short_excess(),
            fallback_excess: default_fallback_excess(),
            regulatory_excess_step: default_regulatory_excess_step(),
            regulatory_excess_unit_ft: default_regulatory_excess_unit(),
        }
    }
}

// ============================================================================
// Fallback Recipe
// ============================================================================

fn default_fallback_recipe() -> SlurryRecipe {
    SlurryRecipe {
        class: d::FALLBACK_CEMENT_CLASS.to_string(),
        density_ppg: d::FALLBACK_DENSITY_PPG,
        yield_ft3_per_sk: d::FALLBACK_YIELD_FT3_PER_SK,
        water_gal_per_sk: d::FALLBACK_WATER_GAL_PER_SK,
        additives: Vec::new(),
        rounding: None,
    }
}

// ============================================================================
// Baseline Generator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    #[serde(default = "default_uqw_min_len")]
    pub uqw_min_len_ft: f64,

    #[serde(default = "default_uqw_above")]
    pub uqw_above_ft: f64,

    #[serde(default = "default_uqw_below")]
    pub uqw_below_ft: f64,

    /// Half-width of intermediate-shoe and productive-horizon plugs (ft)
    #[serde(default = "default_shoe_half_width")]
    pub shoe_plug_half_width_ft: f64,

    /// Bridge plug setting depth above the exposed interval (ft)
    #[serde(default = "default_cibp_setting_offset")]
    pub cibp_setting_offset_ft: f64,
}

fn default_uqw_min_len() -> f64 {
    d::UQW_MIN_LEN_FT
}
fn default_uqw_above() -> f64 {
    d::UQW_ABOVE_FT
}
fn default_uqw_below() -> f64 {
    d::UQW_BELOW_FT
}
fn default_shoe_half_width() -> f64 {
    d::SHOE_PLUG_HALF_WIDTH_FT
}
fn default_cibp_setting_offset() -> f64 {
    d::CIBP_SETTING_OFFSET_FT
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            uqw_min_len_ft: default_uqw_min_len(),
            uqw_above_ft: default_uqw_above(),
            uqw_below_ft: default_uqw_below(),
            shoe_plug_half_width_ft: default_shoe_half_width(),
            cibp_setting_offset_ft: default_cibp_setting_offset(),
        }
    }
}

// ============================================================================
// Enrichment Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cap length above a bridge plug when no knob gives one (ft)
    #[serde(default = "default_cap_length")]
    pub default_cap_length_ft: f64,

    #[serde(default = "default_merge_threshold")]
    pub default_merge_threshold_ft: f64,

    #[serde(default = "default_squeeze_factor")]
    pub default_squeeze_factor: f64,

    #[serde(default = "default_formation_half_width")]
    pub formation_plug_half_width_ft: f64,

    /// Half-width of plugs bracketing packers and DV tools (ft)
    #[serde(default = "default_mechanical_half_width")]
    pub mechanical_bracket_half_width_ft: f64,
}

fn default_cap_length() -> f64 {
    d::DEFAULT_CAP_LENGTH_FT
}
fn default_merge_threshold() -> f64 {
    d::DEFAULT_MERGE_THRESHOLD_FT
}
fn default_squeeze_factor() -> f64 {
    d::DEFAULT_SQUEEZE_FACTOR
}
fn default_formation_half_width() -> f64 {
    d::FORMATION_PLUG_HALF_WIDTH_FT
}
fn default_mechanical_half_width() -> f64 {
    d::MECHANICAL_BRACKET_HALF_WIDTH_FT
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_cap_length_ft: default_cap_length(),
            default_merge_threshold_ft: default_merge_threshold(),
            default_squeeze_factor: default_squeeze_factor(),
            formation_plug_half_width_ft: default_formation_half_width(),
            mechanical_bracket_half_width_ft: default_mechanical_half_width(),
        }
    }
}

// ============================================================================
// Fluids
// ============================================================================

/// Spacer and displacement sizing. Policy preferences override each field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidsConfig {
    #[serde(default = "default_spacer_min")]
    pub spacer_min_bbl: f64,

    #[serde(default = "default_spacer_multiple")]
    pub spacer_multiple: f64,

    #[serde(default = "default_spacer_contact")]
    pub spacer_contact_minutes: f64,

    #[serde(default = "default_pump_rate")]
    pub pump_rate_bpm: f64,

    #[serde(default = "default_displacement_margin")]
    pub displacement_margin_bbl: f64,
}

fn default_spacer_min() -> f64 {
    d::SPACER_MIN_BBL
}
fn default_spacer_multiple() -> f64 {
    d::SPACER_MULTIPLE
}
fn default_spacer_contact() -> f64 {
    d::SPACER_CONTACT_MINUTES
}
fn default_pump_rate() -> f64 {
    d::PUMP_RATE_BPM
}
fn default_displacement_margin() -> f64 {
    d::DISPLACEMENT_MARGIN_BBL
}

impl Default for FluidsConfig {
    fn default() -> Self {
        Self {
            spacer_min_bbl: default_spacer_min(),
            spacer_multiple: default_spacer_multiple(),
            spacer_contact_minutes: default_spacer_contact(),
            pump_rate_bpm: default_pump_rate(),
            displacement_margin_bbl: default_displacement_margin(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_constants() {
        let config = KernelConfig::default();
        assert_eq!(config.materials.excess_interval_threshold_ft, 200.0);
        assert_eq!(config.materials.cased_short_excess, 0.5);
        assert_eq!(config.fallback_recipe.class, "H");
        assert_eq!(config.fallback_recipe.yield_ft3_per_sk, 1.18);
        assert_eq!(config.baseline.uqw_min_len_ft, 100.0);
        assert_eq!(config.pipeline.default_cap_length_ft, 100.0);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(KernelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_catches_zero_yield() {
        let mut config = KernelConfig::default();
        config.fallback_recipe.yield_ft3_per_sk = 0.0;
        let result = config.validate();
        assert!(result.is_err(), "Zero yield should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("yield_ft3_per_sk")));
        }
    }

    #[test]
    fn test_validation_catches_negative_excess() {
        let mut config = KernelConfig::default();
        config.materials.open_hole_excess = -0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = KernelConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: KernelConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original, roundtripped);
    }

    #[test]
    fn test_all_sections_serialize() {
        let toml_str = KernelConfig::default()
            .to_toml()
            .expect("serialization should work");
        assert!(toml_str.contains("[materials]"), "Missing [materials] section");
        assert!(toml_str.contains("[fallback_recipe]"), "Missing [fallback_recipe] section");
        assert!(toml_str.contains("[baseline]"), "Missing [baseline] section");
        assert!(toml_str.contains("[pipeline]"), "Missing [pipeline] section");
        assert!(toml_str.contains("[fluids]"), "Missing [fluids] section");
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[materials]
cased_short_excess = 0.4
"#;
        let config: KernelConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.materials.cased_short_excess, 0.4);
        assert_eq!(config.materials.open_hole_excess, 1.0);
        assert_eq!(config.fluids.spacer_min_bbl, 5.0);
    }

    #[test]
    fn test_provenance_tracks_explicit_keys() {
        let toml_str = r#"
[pipeline]
default_cap_length_ft = 50.0
"#;
        let value: toml::Value = toml_str.parse().expect("parse");
        let keys: HashSet<String> = super::super::validation::walk_toml_keys(&value, "")
            .into_iter()
            .collect();
        let provenance = ConfigProvenance {
            explicit_keys: keys,
        };
        assert!(provenance.is_user_set("pipeline.default_cap_length_ft"));
        assert!(provenance.is_user_set("pipeline"));
        assert!(!provenance.is_user_set("materials.open_hole_excess"));
    }
}
