//! Annular excess: inference when a step carries none, and the regulatory
//! length multiplier for statutory plugs.

use serde::{Deserialize, Serialize};

use crate::config::MaterialsConfig;
use crate::types::HoleContext;

/// Where the excess used for a computation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessSource {
    Explicit,
    InferredOpenHole,
    InferredCasedLong,
    InferredCasedShort,
    Fallback,
}

/// Infer annular excess from hole context and interval length.
///
/// - open hole → `open_hole_excess` (1.0)
/// - cased, interval ≥ threshold (200 ft) → `cased_long_excess` (1.0)
/// - cased, interval < threshold → `cased_short_excess` (0.5)
/// - unknown context (no shoe on record) → `fallback_excess` (0.5)
pub fn infer_annular_excess(
    context: Option<HoleContext>,
    interval_ft: f64,
    cfg: &MaterialsConfig,
) -> (f64, ExcessSource) {
    match context {
        Some(HoleContext::OpenHole) => (cfg.open_hole_excess, ExcessSource::InferredOpenHole),
        Some(HoleContext::Cased) if interval_ft >= cfg.excess_interval_threshold_ft => {
            (cfg.cased_long_excess, ExcessSource::InferredCasedLong)
        }
        Some(HoleContext::Cased) => (cfg.cased_short_excess, ExcessSource::InferredCasedShort),
        None => (cfg.fallback_excess, ExcessSource::Fallback),
    }
}

/// Explicit step-level excess always wins over inference.
pub fn resolve_excess(
    explicit: Option<f64>,
    context: Option<HoleContext>,
    interval_ft: f64,
    cfg: &MaterialsConfig,
) -> (f64, ExcessSource) {
    match explicit {
        Some(e) if e >= 0.0 => (e, ExcessSource::Explicit),
        _ => infer_annular_excess(context, interval_ft, cfg),
    }
}

/// Regulatory excess multiplier: `1 + step × ⌈length / unit⌉`.
///
/// With defaults a 2,500 ft plug spans 3 kft units and gets 1.3×.
pub fn regulatory_multiplier(length_ft: f64, cfg: &MaterialsConfig) -> f64 {
    if length_ft <= 0.0 || cfg.regulatory_excess_unit_ft <= 0.0 {
        return 1.0;
    }
    let units = (length_ft / cfg.regulatory_excess_unit_ft).ceil();
    cfg.regulatory_excess_step.mul_add(units, 1.0)
}
