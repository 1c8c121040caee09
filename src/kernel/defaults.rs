//! Stage 4: geometry and recipe defaults
//!
//! Fills whatever a cement step does not already carry from the policy
//! preferences, falling back to the built-in recipe when the policy has
//! none. Explicit step values are never overwritten.

use super::{PlanContext, PlanState};
use crate::findings::{codes, Violation};
use crate::types::{GeometryDefaults, HoleContext, PlanStep};

pub(super) fn apply(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let mut used_fallback = false;
    for step in &mut state.steps {
        used_fallback |= prepare_step(step, ctx);
    }
    if used_fallback {
        note_fallback_recipe(&mut state, ctx);
    }
    state
}

/// Apply geometry defaults and a recipe to one step.
///
/// Returns true when the built-in fallback recipe was attached. Used by
/// later stages for the steps they synthesize.
pub(super) fn prepare_step(step: &mut PlanStep, ctx: &PlanContext<'_>) -> bool {
    if !step.step_type.places_cement() {
        return false;
    }
    fill_geometry(step, &ctx.policy.preferences.geometry_defaults);

    if step.recipe.is_some() {
        return false;
    }
    let (mut recipe, fallback) = match &ctx.policy.preferences.default_recipe {
        Some(r) => (r.clone(), false),
        None => (ctx.config.fallback_recipe.clone(), true),
    };
    if recipe.rounding.is_none() {
        recipe.rounding = ctx.policy.preferences.rounding;
    }
    step.recipe = Some(recipe);
    fallback
}

/// Record the fallback recipe once per plan.
pub(super) fn note_fallback_recipe(state: &mut PlanState, ctx: &PlanContext<'_>) {
    if state.has_violation(codes::MISSING_RECIPE) {
        return;
    }
    let r = &ctx.config.fallback_recipe;
    state.violations.push(
        Violation::minor(
            codes::MISSING_RECIPE,
            format!(
                "Policy carries no default recipe; using class {} at {} ppg, {} ft3/sk",
                r.class, r.density_ppg, r.yield_ft3_per_sk
            ),
        )
        .with_context("fallback_class", r.class.as_str())
        .with_hint("Set preferences.default_recipe in the policy pack"),
    );
}

/// Fill missing geometry fields. Casing ID is only defaulted in cased hole.
pub(super) fn fill_geometry(step: &mut PlanStep, defaults: &GeometryDefaults) {
    let g = &mut step.geometry;
    if g.stinger_od_in.is_none() {
        g.stinger_od_in = defaults.stinger_od_in;
    }
    if g.stinger_id_in.is_none() {
        g.stinger_id_in = defaults.stinger_id_in;
    }
    if step.context == HoleContext::Cased && g.casing_id_in.is_none() {
        g.casing_id_in = defaults.casing_id_in;
    }
    if step.annular_excess.is_none() {
        step.annular_excess = defaults.annular_excess;
    }
}
