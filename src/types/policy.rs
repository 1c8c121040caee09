//! Effective policy: the already-merged jurisdiction policy the kernel reads
//!
//! Produced by the external policy resolver (base pack + overlays). The
//! kernel never mutates it and never looks anything up beyond it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::step::{CasingGeometrySegment, RoundingMode, SlurryRecipe};

/// Well-known policy knob names.
pub mod knobs {
    pub const SURFACE_CASING_SHOE_PLUG_MIN_FT: &str = "surface_casing_shoe_plug_min_ft";
    pub const SURFACE_SHOE_REQUIRED_COVERAGE_FT: &str = "surface_shoe_required_coverage_ft";
    pub const CEMENT_ABOVE_CIBP_MIN_FT: &str = "cement_above_cibp_min_ft";
    pub const UQW_ISOLATION_MIN_LEN_FT: &str = "uqw_isolation_min_len_ft";
    pub const UQW_ISOLATION_ABOVE_FT: &str = "uqw_isolation_above_ft";
    pub const UQW_ISOLATION_BELOW_FT: &str = "uqw_isolation_below_ft";
    pub const DUQW_ISOLATION_REQUIRED: &str = "duqw_isolation_required";
    pub const PLUG_COUNT: &str = "plug_count";
    pub const SEGMENT_LENGTH_FT: &str = "segment_length_ft";
    pub const SPACING_FT: &str = "spacing_ft";
    pub const TOP_PLUG_LENGTH_FT: &str = "top_plug_length_ft";
    pub const CASING_CUT_BELOW_SURFACE_FT: &str = "casing_cut_below_surface_ft";
    pub const INTERMEDIATE_SHOE_PLUG_REQUIRED: &str = "intermediate_shoe_plug_required";
    pub const PRODUCTIVE_HORIZON_PLUG_REQUIRED: &str = "productive_horizon_plug_required";
    pub const EXPOSURE_CAP_LENGTH_FT: &str = "exposure_cap_length_ft";
    pub const CIBP_SETTING_OFFSET_FT: &str = "cibp_setting_offset_ft";
    pub const SQUEEZE_FACTOR: &str = "squeeze_factor";
    pub const CEMENT_CLASS_CUTOFF_FT: &str = "cement_class_cutoff_ft";
    pub const TAG_WAIT_HOURS: &str = "tag_wait_hours";
    pub const MERGE_ADJACENT_PLUGS: &str = "merge_adjacent_plugs";
    pub const MERGE_THRESHOLD_FT: &str = "merge_threshold_ft";
    pub const PROTECT_INTERVAL_CITATION: &str = "protect_interval";
    pub const MECHANICAL_BARRIER_ISOLATION: &str = "mechanical_barrier_isolation";
    pub const DISTRICT_OVERLAY: &str = "district_overlay";
}

// ============================================================================
// Knob values
// ============================================================================

/// A scalar or list policy knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnobValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl KnobValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for KnobValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for KnobValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

// ============================================================================
// Preferences
// ============================================================================

/// Geometry defaults applied to steps missing dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryDefaults {
    pub stinger_od_in: Option<f64>,
    pub stinger_id_in: Option<f64>,
    /// Only applied to cased-hole steps
    pub casing_id_in: Option<f64>,
    pub annular_excess: Option<f64>,
}

/// Operator preferences for fluids; unset fields fall back to kernel config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidPreferences {
    pub spacer_min_bbl: Option<f64>,
    pub spacer_multiple: Option<f64>,
    pub spacer_contact_minutes: Option<f64>,
    pub pump_rate_bpm: Option<f64>,
    pub displacement_margin_bbl: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub rounding: Option<RoundingMode>,
    #[serde(default)]
    pub default_recipe: Option<SlurryRecipe>,
    #[serde(default)]
    pub geometry_defaults: GeometryDefaults,
    #[serde(default)]
    pub fluids: FluidPreferences,
    /// Extra sacks added to every cement step after rounding
    #[serde(default)]
    pub safety_stock_sacks: u32,
    #[serde(default)]
    pub shallow_cement_class: Option<String>,
    #[serde(default)]
    pub deep_cement_class: Option<String>,
}

// ============================================================================
// Formation plug candidates
// ============================================================================

/// How narrowly a citation applies. Ordered from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationScope {
    Statewide,
    District,
    County,
}

/// A formation-top plug requested by some rule of the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationPlugCandidate {
    pub formation: String,
    /// Declared top; falls back to the `formation_tops` fact
    #[serde(default)]
    pub top_ft: Option<f64>,
    pub scope: CitationScope,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub tag_required: bool,
}

// ============================================================================
// District overlay
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayFormation {
    pub name: String,
    pub top_ft: f64,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Jurisdiction-specific requirements layered on the base policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictOverlay {
    #[serde(default)]
    pub tag_open_hole_shoe_plugs: bool,
    #[serde(default)]
    pub notice_hours: Option<f64>,
    #[serde(default)]
    pub mud_weight_ppg: Option<f64>,
    #[serde(default)]
    pub funnel_time_sec: Option<f64>,
    #[serde(default)]
    pub formations: Vec<OverlayFormation>,
    /// Formation names that must be tagged, matched case-insensitively;
    /// a `re:` prefix makes the entry a regular expression
    #[serde(default)]
    pub tag_required_formations: Vec<String>,
    #[serde(default)]
    pub formation_plug_half_width_ft: Option<f64>,
    #[serde(default)]
    pub citations: Vec<String>,
}

// ============================================================================
// Explicit step overrides
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqueezeOverride {
    pub top_ft: f64,
    pub bottom_ft: f64,
    #[serde(default)]
    pub squeeze_factor: Option<f64>,
    /// Operator-specified sack count; wins over computed sacks
    #[serde(default)]
    pub sacks: Option<u32>,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalOverride {
    pub top_ft: f64,
    pub bottom_ft: f64,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CementPlugOverride {
    pub top_ft: f64,
    pub bottom_ft: f64,
    /// Forces the geometry context; inferred from facts when absent
    #[serde(default)]
    pub open_hole: Option<bool>,
    #[serde(default)]
    pub segments: Vec<CasingGeometrySegment>,
    #[serde(default)]
    pub annular_excess: Option<f64>,
    #[serde(default)]
    pub tag_required: bool,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOverrides {
    #[serde(default)]
    pub cap_length_ft: Option<f64>,
    #[serde(default)]
    pub squeeze: Option<SqueezeOverride>,
    #[serde(default)]
    pub perf_circulate: Vec<IntervalOverride>,
    #[serde(default)]
    pub cement_plugs: Vec<CementPlugOverride>,
}

impl StepOverrides {
    pub fn is_empty(&self) -> bool {
        self.cap_length_ft.is_none()
            && self.squeeze.is_none()
            && self.perf_circulate.is_empty()
            && self.cement_plugs.is_empty()
    }
}

// ============================================================================
// Effective policy
// ============================================================================

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    /// Identifier used to select the policy handler (e.g. `tx.w3a`)
    pub policy_id: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub knobs: BTreeMap<String, KnobValue>,
    #[serde(default)]
    pub preferences: Preferences,
    pub completeness: bool,
    #[serde(default)]
    pub missing_knobs: Vec<String>,
    #[serde(default)]
    pub overlays_applied: Vec<String>,
    /// Clause identifiers per knob; override the handler's defaults
    #[serde(default)]
    pub citations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub formation_plugs: Vec<FormationPlugCandidate>,
    #[serde(default)]
    pub district_overlay: DistrictOverlay,
    #[serde(default)]
    pub overrides: StepOverrides,
}

impl EffectivePolicy {
    /// A complete policy with no knobs set.
    pub fn new(policy_id: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
            jurisdiction: None,
            knobs: BTreeMap::new(),
            preferences: Preferences::default(),
            completeness: true,
            missing_knobs: Vec::new(),
            overlays_applied: Vec::new(),
            citations: BTreeMap::new(),
            formation_plugs: Vec::new(),
            district_overlay: DistrictOverlay::default(),
            overrides: StepOverrides::default(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(raw)?)
    }

    #[must_use]
    pub fn with_knob(mut self, name: &str, value: impl Into<KnobValue>) -> Self {
        self.knobs.insert(name.to_string(), value.into());
        self
    }

    pub fn knob_f64(&self, name: &str) -> Option<f64> {
        self.knobs.get(name).and_then(KnobValue::as_f64)
    }

    /// Flags default to false when absent.
    pub fn knob_flag(&self, name: &str) -> bool {
        self.knobs
            .get(name)
            .and_then(KnobValue::as_bool)
            .unwrap_or(false)
    }
}
