//! Slurry and fluid volume formulas
//!
//! Every slurry computation returns a [`SlurryVolume`] carrying an `explain`
//! map of its inputs and intermediate capacities. The explain payload is part
//! of the audit record, not debug output.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::{annulus_capacity, cylinder_capacity};
use crate::types::CasingGeometrySegment;

/// Slurry volume with its audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlurryVolume {
    pub total_bbl: f64,
    pub explain: BTreeMap<String, serde_json::Value>,
}

impl SlurryVolume {
    fn new(total_bbl: f64, method: &str) -> Self {
        let mut explain = BTreeMap::new();
        explain.insert("method".to_string(), json!(method));
        Self {
            total_bbl: total_bbl.max(0.0),
            explain,
        }
    }

    fn note(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.explain.insert(key.to_string(), value.into());
        self
    }
}

/// Balanced plug placed through a work string.
///
/// `total = L × C_ann × (1 + excess) + L × C_inside`
///
/// Excess applies to the annular term only. `stinger_id_in = 0` (no string,
/// or a dump-bailed plug) drops the inside term.
pub fn balanced_plug(
    length_ft: f64,
    outer_in: f64,
    stinger_od_in: f64,
    stinger_id_in: f64,
    excess: f64,
) -> SlurryVolume {
    let ann_cap = annulus_capacity(outer_in, stinger_od_in);
    let inside_cap = cylinder_capacity(stinger_id_in);
    let annular_bbl = length_ft * ann_cap;
    let annular_with_excess = annular_bbl * (1.0 + excess);
    let inside_bbl = length_ft * inside_cap;

    SlurryVolume::new(annular_with_excess + inside_bbl, "balanced_plug")
        .note("length_ft", length_ft)
        .note("outer_diameter_in", outer_in)
        .note("stinger_od_in", stinger_od_in)
        .note("stinger_id_in", stinger_id_in)
        .note("annulus_capacity_bbl_per_ft", ann_cap)
        .note("inside_capacity_bbl_per_ft", inside_cap)
        .note("annular_bbl", annular_bbl)
        .note("annular_with_excess_bbl", annular_with_excess)
        .note("inside_bbl", inside_bbl)
        .note("excess", excess)
}

/// Cement cap dumped on top of a bridge plug.
///
/// `cap_bbl = L_cap × C_ann(casing_id, stinger_od) × (1 + excess)`
pub fn cap_above_bridge_plug(
    cap_length_ft: f64,
    casing_id_in: f64,
    stinger_od_in: f64,
    excess: f64,
) -> SlurryVolume {
    let ann_cap = annulus_capacity(casing_id_in, stinger_od_in);
    let base = cap_length_ft * ann_cap;

    SlurryVolume::new(base * (1.0 + excess), "bridge_plug_cap")
        .note("cap_length_ft", cap_length_ft)
        .note("casing_id_in", casing_id_in)
        .note("stinger_od_in", stinger_od_in)
        .note("annulus_capacity_bbl_per_ft", ann_cap)
        .note("base_bbl", base)
        .note("excess", excess)
}

/// Squeeze into perforations or voids.
///
/// `total = L × C_ann × squeeze_factor` (factor typically 1.5-2.0)
pub fn squeeze(
    interval_ft: f64,
    outer_in: f64,
    inner_in: f64,
    squeeze_factor: f64,
) -> SlurryVolume {
    let ann_cap = annulus_capacity(outer_in, inner_in);
    let base = interval_ft * ann_cap;

    SlurryVolume::new(base * squeeze_factor, "squeeze")
        .note("interval_ft", interval_ft)
        .note("outer_diameter_in", outer_in)
        .note("inner_diameter_in", inner_in)
        .note("annulus_capacity_bbl_per_ft", ann_cap)
        .note("base_bbl", base)
        .note("squeeze_factor", squeeze_factor)
}

/// Spacer ahead of the slurry: the largest of three independent sizing rules.
///
/// `max(min_bbl, multiple × L × C_ann, contact_minutes × pump_rate_bpm)`
pub fn spacer(
    min_bbl: f64,
    spacer_multiple: f64,
    interval_ft: f64,
    annulus_cap: f64,
    contact_minutes: f64,
    pump_rate_bpm: f64,
) -> f64 {
    let by_annulus = spacer_multiple * interval_ft * annulus_cap;
    let by_contact = contact_minutes * pump_rate_bpm;
    min_bbl.max(by_annulus).max(by_contact).max(0.0)
}

/// Displacement to spot the slurry: `L × C_inside + margin`.
pub fn displacement(interval_ft: f64, inside_capacity: f64, margin_bbl: f64) -> f64 {
    (interval_ft * inside_capacity + margin_bbl).max(0.0)
}

/// Annular volume summed across segments of differing geometry.
///
/// `Σ L_i × C_ann(D_i, d_i) × (1 + excess)`
pub fn piecewise_annular(segments: &[CasingGeometrySegment], excess: f64) -> SlurryVolume {
    let mut total = 0.0;
    let mut parts = Vec::with_capacity(segments.len());

    for seg in segments {
        let cap = annulus_capacity(seg.hole_or_casing_id_in, seg.pipe_od_in);
        let bbl = seg.length_ft() * cap * (1.0 + excess);
        total += bbl;
        parts.push(json!({
            "top_ft": seg.top_ft,
            "bottom_ft": seg.bottom_ft,
            "hole_or_casing_id_in": seg.hole_or_casing_id_in,
            "pipe_od_in": seg.pipe_od_in,
            "annulus_capacity_bbl_per_ft": cap,
            "bbl": bbl,
        }));
    }

    SlurryVolume::new(total, "piecewise_annular")
        .note("segments", parts)
        .note("excess", excess)
}
