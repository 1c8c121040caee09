//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, "; did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for KernelConfig.
///
/// Maintained by hand to match the struct hierarchy in kernel_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [materials]
        "materials",
        "materials.excess_interval_threshold_ft",
        "materials.open_hole_excess",
        "materials.cased_long_excess",
        "materials.cased_short_excess",
        "materials.fallback_excess",
        "materials.regulatory_excess_step",
        "materials.regulatory_excess_unit_ft",
        // [fallback_recipe]
        "fallback_recipe",
        "fallback_recipe.class",
        "fallback_recipe.density_ppg",
        "fallback_recipe.yield_ft3_per_sk",
        "fallback_recipe.water_gal_per_sk",
        "fallback_recipe.additives",
        "fallback_recipe.rounding",
        // [baseline]
        "baseline",
        "baseline.uqw_min_len_ft",
        "baseline.uqw_above_ft",
        "baseline.uqw_below_ft",
        "baseline.shoe_plug_half_width_ft",
        "baseline.cibp_setting_offset_ft",
        // [pipeline]
        "pipeline",
        "pipeline.default_cap_length_ft",
        "pipeline.default_merge_threshold_ft",
        "pipeline.default_squeeze_factor",
        "pipeline.formation_plug_half_width_ft",
        "pipeline.mechanical_bracket_half_width_ft",
        // [fluids]
        "fluids",
        "fluids.spacer_min_bbl",
        "fluids.spacer_multiple",
        "fluids.spacer_contact_minutes",
        "fluids.pump_rate_bpm",
        "fluids.displacement_margin_bbl",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed KernelConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent planning; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::KernelConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let m = &config.materials;
    for (name, value) in [
        ("materials.open_hole_excess", m.open_hole_excess),
        ("materials.cased_long_excess", m.cased_long_excess),
        ("materials.cased_short_excess", m.cased_short_excess),
        ("materials.fallback_excess", m.fallback_excess),
        ("materials.regulatory_excess_step", m.regulatory_excess_step),
    ] {
        if value < 0.0 {
            errors.push(format!("{name} = {value:.3} cannot be negative"));
        } else if value > 3.0 {
            warnings.push(ValidationWarning {
                field: name.to_string(),
                message: format!("{name} = {value:.2} is unusually large (> 300% excess)"),
                suggestion: None,
            });
        }
    }
    if m.regulatory_excess_unit_ft <= 0.0 {
        errors.push(format!(
            "materials.regulatory_excess_unit_ft = {:.1} must be > 0 (used as divisor)",
            m.regulatory_excess_unit_ft
        ));
    }

    // Recipe: yield is a divisor; density 8-23 ppg covers lightweight to heavyweight slurries
    let r = &config.fallback_recipe;
    if r.yield_ft3_per_sk <= 0.0 {
        errors.push(format!(
            "fallback_recipe.yield_ft3_per_sk = {:.3} must be > 0 (used as divisor)",
            r.yield_ft3_per_sk
        ));
    }
    if r.water_gal_per_sk < 0.0 {
        errors.push(format!(
            "fallback_recipe.water_gal_per_sk = {:.2} cannot be negative",
            r.water_gal_per_sk
        ));
    }
    if !(8.0..=23.0).contains(&r.density_ppg) {
        warnings.push(ValidationWarning {
            field: "fallback_recipe.density_ppg".to_string(),
            message: format!(
                "fallback_recipe.density_ppg = {:.1} is outside typical slurry range (8-23 ppg)",
                r.density_ppg
            ),
            suggestion: None,
        });
    }

    for (name, value) in [
        ("baseline.uqw_min_len_ft", config.baseline.uqw_min_len_ft),
        ("baseline.uqw_above_ft", config.baseline.uqw_above_ft),
        ("baseline.uqw_below_ft", config.baseline.uqw_below_ft),
        ("baseline.shoe_plug_half_width_ft", config.baseline.shoe_plug_half_width_ft),
        ("baseline.cibp_setting_offset_ft", config.baseline.cibp_setting_offset_ft),
        ("pipeline.default_cap_length_ft", config.pipeline.default_cap_length_ft),
        ("pipeline.default_merge_threshold_ft", config.pipeline.default_merge_threshold_ft),
        ("pipeline.formation_plug_half_width_ft", config.pipeline.formation_plug_half_width_ft),
        (
            "pipeline.mechanical_bracket_half_width_ft",
            config.pipeline.mechanical_bracket_half_width_ft,
        ),
        ("fluids.spacer_min_bbl", config.fluids.spacer_min_bbl),
        ("fluids.spacer_multiple", config.fluids.spacer_multiple),
        ("fluids.spacer_contact_minutes", config.fluids.spacer_contact_minutes),
        ("fluids.pump_rate_bpm", config.fluids.pump_rate_bpm),
        ("fluids.displacement_margin_bbl", config.fluids.displacement_margin_bbl),
    ] {
        if value < 0.0 {
            errors.push(format!("{name} = {value:.2} cannot be negative"));
        }
    }

    // Squeeze factor below 1.0 under-fills the base volume
    let sf = config.pipeline.default_squeeze_factor;
    if sf <= 0.0 {
        errors.push(format!("pipeline.default_squeeze_factor = {sf:.2} must be > 0"));
    } else if sf < 1.0 {
        warnings.push(ValidationWarning {
            field: "pipeline.default_squeeze_factor".to_string(),
            message: format!(
                "pipeline.default_squeeze_factor = {sf:.2} is below 1.0 (typical 1.5-2.0)"
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}
