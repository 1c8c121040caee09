//! Materials Worked Examples
//!
//! Field-checkable numbers for the capacity, volume and sack formulas, plus
//! the adjacent-plug merge scenario. Tolerances match what a cementing
//! engineer would accept from a hand calculation.

use std::collections::BTreeMap;

use plugplan::config::MaterialsConfig;
use plugplan::kernel::merge_adjacent;
use plugplan::materials::{
    annulus_capacity, balanced_plug, cap_above_bridge_plug, displacement, piecewise_annular,
    regulatory_multiplier, slurry_breakdown, spacer, SackOverride, SlurryVolume,
};
use plugplan::types::{CasingGeometrySegment, RoundingMode, SlurryRecipe};
use plugplan::{Interval, PlanStep, StepType};

fn class_h(yield_ft3_per_sk: f64) -> SlurryRecipe {
    SlurryRecipe {
        class: "H".to_string(),
        density_ppg: 15.8,
        yield_ft3_per_sk,
        water_gal_per_sk: 5.2,
        additives: Vec::new(),
        rounding: None,
    }
}

fn volume(total_bbl: f64) -> SlurryVolume {
    SlurryVolume {
        total_bbl,
        explain: BTreeMap::new(),
    }
}

// ============================================================================
// Worked examples
// ============================================================================

#[test]
fn open_hole_plug_8_5_inch_100_ft_50_percent_excess() {
    let cap = annulus_capacity(8.5, 0.0);
    assert!((cap - 0.07019).abs() < 1e-4, "capacity {cap}");

    let vol = balanced_plug(100.0, 8.5, 0.0, 0.0, 0.5);
    assert!((vol.explain["annular_bbl"].as_f64().unwrap_or_default() - 7.019).abs() < 0.01);
    assert!((vol.total_bbl - 10.53).abs() < 0.02, "total {}", vol.total_bbl);

    let slurry = slurry_breakdown(
        &vol,
        &class_h(1.18),
        RoundingMode::Nearest,
        SackOverride::default(),
    );
    assert_eq!(slurry.sacks, 50);
}

#[test]
fn bridge_plug_cap_7_inch_casing_with_stinger() {
    let cap = annulus_capacity(6.094, 2.875);
    assert!((cap - 0.02803).abs() < 1e-4, "capacity {cap}");

    let vol = cap_above_bridge_plug(100.0, 6.094, 2.875, 0.5);
    assert!((vol.explain["base_bbl"].as_f64().unwrap_or_default() - 2.803).abs() < 0.01);
    assert!((vol.total_bbl - 4.21).abs() < 0.02, "total {}", vol.total_bbl);

    let slurry = slurry_breakdown(
        &vol,
        &class_h(1.18),
        RoundingMode::Nearest,
        SackOverride::default(),
    );
    assert_eq!(slurry.sacks, 20);
}

#[test]
fn rounding_modes_on_47_58_raw_sacks() {
    let recipe = class_h(1.18);
    let sacks = |mode| slurry_breakdown(&volume(10.0), &recipe, mode, SackOverride::default()).sacks;

    let raw = slurry_breakdown(
        &volume(10.0),
        &recipe,
        RoundingMode::Ceil,
        SackOverride::default(),
    )
    .explain["raw_sacks"]
        .as_f64()
        .unwrap_or_default();
    assert!((raw - 47.58).abs() < 0.01, "raw sacks {raw}");

    assert_eq!(sacks(RoundingMode::Ceil), 48);
    assert_eq!(sacks(RoundingMode::Floor), 47);
    assert_eq!(sacks(RoundingMode::Nearest), 48);
}

#[test]
fn override_and_safety_stock_apply_after_rounding() {
    let slurry = slurry_breakdown(
        &volume(10.0),
        &class_h(1.18),
        RoundingMode::Ceil,
        SackOverride {
            sacks: Some(60),
            safety_stock: 5,
        },
    );
    assert_eq!(slurry.sacks, 65);
    assert_eq!(slurry.explain["rounded_sacks"], 48);
    // Water follows the final count
    assert!((slurry.water_bbl - 65.0 * 5.2 / 42.0).abs() < 1e-9);
}

#[test]
fn regulatory_multiplier_steps_per_thousand_feet() {
    let cfg = MaterialsConfig::default();
    assert!((regulatory_multiplier(100.0, &cfg) - 1.1).abs() < 1e-9);
    assert!((regulatory_multiplier(1000.0, &cfg) - 1.1).abs() < 1e-9);
    assert!((regulatory_multiplier(2500.0, &cfg) - 1.3).abs() < 1e-9);
    assert!((regulatory_multiplier(0.0, &cfg) - 1.0).abs() < 1e-9);
}

#[test]
fn piecewise_sum_matches_single_segment_volumes() {
    let segments = [
        CasingGeometrySegment {
            top_ft: 8900.0,
            bottom_ft: 9000.0,
            hole_or_casing_id_in: 6.094,
            pipe_od_in: 2.875,
        },
        CasingGeometrySegment {
            top_ft: 9000.0,
            bottom_ft: 9100.0,
            hole_or_casing_id_in: 8.5,
            pipe_od_in: 2.875,
        },
    ];
    let vol = piecewise_annular(&segments, 0.0);
    let expected = 100.0 * annulus_capacity(6.094, 2.875) + 100.0 * annulus_capacity(8.5, 2.875);
    assert!((vol.total_bbl - expected).abs() < 1e-9);
}

#[test]
fn spacer_takes_largest_rule_and_displacement_adds_margin() {
    // 100 ft × 0.07 bbl/ft × 1.5 = 10.5 beats both 5 bbl and 5 min × 1 bpm
    assert!((spacer(5.0, 1.5, 100.0, 0.07, 5.0, 1.0) - 10.5).abs() < 1e-9);
    assert!((spacer(20.0, 1.5, 100.0, 0.07, 5.0, 1.0) - 20.0).abs() < 1e-9);
    assert!((displacement(5000.0, 0.00387, 1.0) - 20.35).abs() < 1e-9);
}

// ============================================================================
// Merge scenario
// ============================================================================

#[test]
fn three_plugs_150_ft_apart_merge_into_one() {
    let plug = |id: &str, center: f64, tag: bool| {
        PlanStep::new(id, StepType::FormationTopPlug, Interval::centered(center, 50.0))
            .cite([format!("cite:{id}")])
            .tagged(tag)
    };
    let steps = vec![
        plug("p5000", 5000.0, false),
        plug("p5150", 5150.0, true),
        plug("p5300", 5300.0, false),
    ];

    let out = merge_adjacent(steps, 200.0);
    assert_eq!(out.len(), 1);
    let merged = &out[0];
    assert_eq!((merged.top_ft, merged.bottom_ft), (4950.0, 5350.0));
    assert!(merged.tag_required);
    assert_eq!(
        merged.citations,
        vec!["cite:p5300", "cite:p5150", "cite:p5000"]
    );
    assert_eq!(merged.details["merged_from"].as_array().map(Vec::len), Some(3));
}
