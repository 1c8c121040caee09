//! Terminal stage: barrier guard, ordering and materials
//!
//! - Nothing but the cap on the shallowest existing CIBP may sit below that
//!   plug: steps entirely beneath it are dropped with a finding, steps
//!   straddling it are clipped at the barrier. Caps on deeper plugs are
//!   unreachable and are dropped like any other step.
//! - Steps are ordered deepest-first (stable), the order they are executed.
//! - Every cement step gets slurry, sacks, water, additives and fluids.

use serde_json::json;

use super::{PlanContext, PlanState};
use crate::findings::{codes, Violation};
use crate::materials::{
    annulus_capacity, balanced_plug, cap_above_bridge_plug, cylinder_capacity, displacement,
    piecewise_annular, regulatory_multiplier, resolve_excess, slurry_breakdown, spacer, squeeze,
    SackOverride, SlurryVolume,
};
use crate::types::{
    knobs, CasingGeometrySegment, FluidVolumes, PlanStep, StepMaterials, StepType,
};

pub(super) fn apply(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    barrier_guard(&mut state, ctx);

    state.steps.sort_by(|a, b| {
        b.bottom_ft
            .total_cmp(&a.bottom_ft)
            .then(b.top_ft.total_cmp(&a.top_ft))
    });

    let mut findings = Vec::new();
    for step in &mut state.steps {
        match step_materials(step, ctx) {
            Ok(materials) => step.materials = materials,
            Err(violation) => findings.push(violation),
        }
    }
    state.violations.extend(findings);
    state
}

fn barrier_guard(state: &mut PlanState, ctx: &PlanContext<'_>) {
    let Some(barrier) = ctx.facts.isolating_cibp_ft() else {
        return;
    };

    let steps = std::mem::take(&mut state.steps);
    for mut step in steps {
        if caps_barrier(&step, barrier) || step.bottom_ft <= barrier {
            state.steps.push(step);
            continue;
        }
        if step.top_ft >= barrier {
            state.violations.push(
                Violation::minor(
                    codes::STEP_BELOW_BARRIER,
                    format!(
                        "Dropped {} '{}' at {:.0}-{:.0} ft: below existing CIBP at {barrier:.0} ft",
                        step.step_type, step.id, step.top_ft, step.bottom_ft
                    ),
                )
                .with_context("step_id", step.id.as_str())
                .with_context("barrier_ft", barrier)
                .with_citations(step.citations.clone()),
            );
            continue;
        }

        state.notes.push(format!(
            "Clipped {} '{}' at existing CIBP {barrier:.0} ft (was {:.0}-{:.0} ft)",
            step.step_type, step.id, step.top_ft, step.bottom_ft
        ));
        step.bottom_ft = barrier;
        step.geometry.segments.retain(|s| s.top_ft < barrier);
        for seg in &mut step.geometry.segments {
            seg.bottom_ft = seg.bottom_ft.min(barrier);
        }
        step.details
            .insert("clipped_at_barrier_ft".to_string(), json!(barrier));
        state.steps.push(step);
    }
}

/// True for the cement cap sitting on the CIBP at `barrier_ft`.
fn caps_barrier(step: &PlanStep, barrier_ft: f64) -> bool {
    step.step_type == StepType::CibpCap
        && step
            .details
            .get("cibp_depth_ft")
            .and_then(serde_json::Value::as_f64)
            .is_some_and(|d| (d - barrier_ft).abs() < 0.5)
}

fn geometry_incomplete(step: &PlanStep, missing: &str) -> Violation {
    Violation::minor(
        codes::MATERIALS_GEOMETRY_INCOMPLETE,
        format!(
            "No materials for {} '{}': {missing} unknown",
            step.step_type, step.id
        ),
    )
    .with_context("step_id", step.id.as_str())
    .with_context("missing", missing)
    .with_hint("Supply casing IDs / hole size in facts or geometry_defaults in preferences")
}

fn step_materials(
    step: &PlanStep,
    ctx: &PlanContext<'_>,
) -> Result<Option<StepMaterials>, Violation> {
    if !step.step_type.places_cement() {
        return Ok(None);
    }
    let prefs = &ctx.policy.preferences;
    let cfg = &ctx.config.materials;

    let recipe = step
        .recipe
        .clone()
        .unwrap_or_else(|| ctx.config.fallback_recipe.clone());
    if recipe.yield_ft3_per_sk.is_nan() || recipe.yield_ft3_per_sk <= 0.0 {
        return Err(Violation::minor(
            codes::INVALID_RECIPE,
            format!(
                "Recipe class {} on '{}' has non-positive yield {}",
                recipe.class, step.id, recipe.yield_ft3_per_sk
            ),
        )
        .with_context("step_id", step.id.as_str()));
    }
    let mode = recipe.rounding.or(prefs.rounding).unwrap_or_default();

    let g = &step.geometry;
    let stinger_od = g.stinger_od_in.unwrap_or(0.0);
    let stinger_id = g.stinger_id_in.unwrap_or(0.0);
    let length = step.length_ft();
    let outer = g.outer_diameter_in(step.context);

    // Without any shoe on record the cased/open split is a guess
    let context = ctx.facts.deepest_shoe_ft().map(|_| step.context);
    let (base_excess, source) = resolve_excess(step.annular_excess, context, length, cfg);
    let multiplier = if step.step_type.is_regulatory_plug() {
        regulatory_multiplier(length, cfg)
    } else {
        1.0
    };
    let excess = (1.0 + base_excess) * multiplier - 1.0;

    let mut adjust = SackOverride {
        sacks: None,
        safety_stock: prefs.safety_stock_sacks,
    };

    let (mut volume, ann_cap): (SlurryVolume, f64) = match step.step_type {
        StepType::CibpCap => {
            let casing = g
                .casing_id_in
                .or(outer)
                .ok_or_else(|| geometry_incomplete(step, "casing_id_in"))?;
            (
                cap_above_bridge_plug(length, casing, stinger_od, excess),
                annulus_capacity(casing, stinger_od),
            )
        }
        StepType::Squeeze => {
            let outer = outer.ok_or_else(|| geometry_incomplete(step, "outer diameter"))?;
            let factor = step
                .details
                .get("squeeze_factor")
                .and_then(serde_json::Value::as_f64)
                .or_else(|| ctx.policy.knob_f64(knobs::SQUEEZE_FACTOR))
                .unwrap_or(ctx.config.pipeline.default_squeeze_factor);
            adjust.sacks = step
                .details
                .get("sacks_override")
                .and_then(serde_json::Value::as_u64)
                .and_then(|n| u32::try_from(n).ok());
            (
                squeeze(length, outer, stinger_od, factor),
                annulus_capacity(outer, stinger_od),
            )
        }
        _ if !g.segments.is_empty() => {
            let segments: Vec<CasingGeometrySegment> = g
                .segments
                .iter()
                .map(|s| CasingGeometrySegment {
                    pipe_od_in: if s.pipe_od_in > 0.0 { s.pipe_od_in } else { stinger_od },
                    ..*s
                })
                .collect();
            let mut volume = piecewise_annular(&segments, excess);
            let inside_bbl = length * cylinder_capacity(stinger_id);
            volume.total_bbl += inside_bbl;
            volume.explain.insert("inside_bbl".to_string(), json!(inside_bbl));
            let weighted: f64 = segments
                .iter()
                .map(|s| s.length_ft() * annulus_capacity(s.hole_or_casing_id_in, s.pipe_od_in))
                .sum();
            let ann_cap = if length > 0.0 { weighted / length } else { 0.0 };
            (volume, ann_cap)
        }
        _ => {
            let outer = outer.ok_or_else(|| geometry_incomplete(step, "outer diameter"))?;
            (
                balanced_plug(length, outer, stinger_od, stinger_id, excess),
                annulus_capacity(outer, stinger_od),
            )
        }
    };

    volume.explain.insert(
        "excess_source".to_string(),
        serde_json::to_value(source).unwrap_or_default(),
    );
    volume.explain.insert("base_excess".to_string(), json!(base_excess));
    if step.step_type.is_regulatory_plug() {
        volume
            .explain
            .insert("regulatory_multiplier".to_string(), json!(multiplier));
    }

    let slurry = slurry_breakdown(&volume, &recipe, mode, adjust);

    let fp = &prefs.fluids;
    let fc = &ctx.config.fluids;
    let fluids = FluidVolumes {
        spacer_bbl: spacer(
            fp.spacer_min_bbl.unwrap_or(fc.spacer_min_bbl),
            fp.spacer_multiple.unwrap_or(fc.spacer_multiple),
            length,
            ann_cap,
            fp.spacer_contact_minutes.unwrap_or(fc.spacer_contact_minutes),
            fp.pump_rate_bpm.unwrap_or(fc.pump_rate_bpm),
        ),
        displacement_bbl: displacement(
            step.top_ft,
            cylinder_capacity(stinger_id),
            fp.displacement_margin_bbl
                .unwrap_or(fc.displacement_margin_bbl),
        ),
    };

    Ok(Some(StepMaterials { slurry, fluids }))
}
