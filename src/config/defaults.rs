//! Kernel default constants.
//!
//! Built-in values for every `KernelConfig` field. A missing config file
//! reproduces exactly these numbers. Grouped by subsystem for easy discovery.

// ============================================================================
// Annular excess inference
// ============================================================================

/// Cased-hole intervals at or beyond this length get the long-interval excess (ft).
pub const EXCESS_INTERVAL_THRESHOLD_FT: f64 = 200.0;

/// Open hole excess (100%).
pub const OPEN_HOLE_EXCESS: f64 = 1.0;

/// Cased hole, long interval (100%).
pub const CASED_LONG_EXCESS: f64 = 1.0;

/// Cased hole, short interval (50%).
pub const CASED_SHORT_EXCESS: f64 = 0.5;

/// Excess when the hole context is unknown (50%).
pub const FALLBACK_EXCESS: f64 = 0.5;

/// Regulatory multiplier increment per length unit.
///
/// `multiplier = 1 + 0.1 × ⌈length / 1000⌉`
pub const REGULATORY_EXCESS_STEP: f64 = 0.1;

/// Length unit for the regulatory multiplier (ft).
pub const REGULATORY_EXCESS_UNIT_FT: f64 = 1_000.0;

// ============================================================================
// Fallback recipe (used when the policy carries none)
// ============================================================================

pub const FALLBACK_CEMENT_CLASS: &str = "H";
pub const FALLBACK_DENSITY_PPG: f64 = 15.8;
pub const FALLBACK_YIELD_FT3_PER_SK: f64 = 1.18;
pub const FALLBACK_WATER_GAL_PER_SK: f64 = 5.2;

// ============================================================================
// Baseline generator
// ============================================================================

/// UQW isolation plug minimum length when the knob is absent (ft).
pub const UQW_MIN_LEN_FT: f64 = 100.0;

/// UQW coverage above the base of usable water when the knob is absent (ft).
pub const UQW_ABOVE_FT: f64 = 50.0;

/// UQW coverage below the base of usable water when the knob is absent (ft).
pub const UQW_BELOW_FT: f64 = 50.0;

/// Half-width of intermediate-shoe and productive-horizon plugs (ft).
pub const SHOE_PLUG_HALF_WIDTH_FT: f64 = 50.0;

/// Bridge plug set this far above the shallower of producing top and shoe (ft).
pub const CIBP_SETTING_OFFSET_FT: f64 = 50.0;

// ============================================================================
// Enrichment pipeline
// ============================================================================

/// Cap length above a bridge plug when no knob specifies one (ft).
pub const DEFAULT_CAP_LENGTH_FT: f64 = 100.0;

/// Adjacent-plug merge gap when the policy enables merge without a threshold (ft).
pub const DEFAULT_MERGE_THRESHOLD_FT: f64 = 200.0;

/// Squeeze factor when neither the override nor a knob gives one.
pub const DEFAULT_SQUEEZE_FACTOR: f64 = 1.5;

/// Half-width of overlay formation-top plugs (ft).
pub const FORMATION_PLUG_HALF_WIDTH_FT: f64 = 50.0;

/// Half-width of isolation plugs bracketing a packer or DV tool (ft).
pub const MECHANICAL_BRACKET_HALF_WIDTH_FT: f64 = 50.0;

// ============================================================================
// Fluids
// ============================================================================

/// Minimum spacer volume (bbl).
pub const SPACER_MIN_BBL: f64 = 5.0;

/// Spacer as a multiple of the plug's annular volume.
pub const SPACER_MULTIPLE: f64 = 1.0;

/// Spacer contact time at the pump rate (minutes).
pub const SPACER_CONTACT_MINUTES: f64 = 5.0;

/// Pump rate used for the contact-time rule (bbl/min).
pub const PUMP_RATE_BPM: f64 = 1.0;

/// Margin added to the work-string displacement (bbl).
pub const DISPLACEMENT_MARGIN_BBL: f64 = 1.0;
