//! Sack conversion, mix water and additives

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::volumes::SlurryVolume;
use super::{FT3_PER_BBL, GAL_PER_BBL};
use crate::types::{RoundingMode, SlurryRecipe};

/// Final slurry quantities for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBreakdown {
    pub total_bbl: f64,
    pub sacks: u32,
    pub ft3: f64,
    pub water_bbl: f64,
    pub additives: BTreeMap<String, f64>,
    pub explain: BTreeMap<String, serde_json::Value>,
}

/// Sack count adjustments applied after rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SackOverride {
    /// Replaces the computed count outright
    pub sacks: Option<u32>,
    /// Added on top of the (possibly overridden) count
    pub safety_stock: u32,
}

/// Round a fractional sack count. Negative or non-finite input yields 0.
pub fn round_sacks(raw_sacks: f64, mode: RoundingMode) -> u32 {
    if !raw_sacks.is_finite() || raw_sacks <= 0.0 {
        return 0;
    }
    let rounded = match mode {
        RoundingMode::Ceil => raw_sacks.ceil(),
        RoundingMode::Floor => raw_sacks.floor(),
        RoundingMode::Nearest => (raw_sacks + 0.5).floor(),
    };
    // Saturating float→int conversion
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sacks = rounded as u32;
    sacks
}

/// Convert a slurry volume into sacks, water and additives for `recipe`.
///
/// `ft3 = bbl × 5.6146`, `raw = ft3 / yield`, `water_bbl = sacks × gal/sk / 42`,
/// additive totals = `sacks × rate`.
pub fn slurry_breakdown(
    volume: &SlurryVolume,
    recipe: &SlurryRecipe,
    mode: RoundingMode,
    adjust: SackOverride,
) -> VolumeBreakdown {
    let ft3 = volume.total_bbl * FT3_PER_BBL;
    let raw_sacks = if recipe.yield_ft3_per_sk > 0.0 {
        ft3 / recipe.yield_ft3_per_sk
    } else {
        0.0
    };
    let rounded = round_sacks(raw_sacks, mode);
    let sacks = adjust
        .sacks
        .unwrap_or(rounded)
        .saturating_add(adjust.safety_stock);

    let water_bbl = f64::from(sacks) * recipe.water_gal_per_sk / GAL_PER_BBL;

    let mut additives = BTreeMap::new();
    for additive in &recipe.additives {
        *additives.entry(additive.name.clone()).or_insert(0.0) += f64::from(sacks) * additive.rate;
    }

    let mut explain = volume.explain.clone();
    explain.insert("total_bbl".to_string(), json!(volume.total_bbl));
    explain.insert("ft3".to_string(), json!(ft3));
    explain.insert("cement_class".to_string(), json!(recipe.class));
    explain.insert("yield_ft3_per_sk".to_string(), json!(recipe.yield_ft3_per_sk));
    explain.insert("water_gal_per_sk".to_string(), json!(recipe.water_gal_per_sk));
    explain.insert("raw_sacks".to_string(), json!(raw_sacks));
    explain.insert("rounding".to_string(), json!(mode.to_string()));
    explain.insert("rounded_sacks".to_string(), json!(rounded));
    if let Some(s) = adjust.sacks {
        explain.insert("sacks_override".to_string(), json!(s));
    }
    if adjust.safety_stock > 0 {
        explain.insert("safety_stock_sacks".to_string(), json!(adjust.safety_stock));
    }

    VolumeBreakdown {
        total_bbl: volume.total_bbl,
        sacks,
        ft3,
        water_bbl,
        additives,
        explain,
    }
}
