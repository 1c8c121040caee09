//! Baseline Step Generator
//!
//! Translates well facts and effective-policy knobs into the statutory step
//! set before any enrichment runs. Every rule here is independent: a rule
//! whose inputs are missing either skips silently (optional rules) or emits a
//! violation describing the gap (required rules). Nothing is looked up beyond
//! the facts and the policy.
//!
//! ## Rules
//!
//! - Surface casing shoe plug (`surface_casing_shoe_plug_min_ft`)
//! - Cement cap over existing CIBPs (`cement_above_cibp_min_ft`)
//! - UQW isolation plug (`uqw_isolation_*`, config fallbacks)
//! - Protect-interval plugs from the `protect_intervals` fact
//! - Spaced plugs across the producing interval (`plug_count` et al.)
//! - Intermediate shoe and productive horizon plugs (`*_plug_required` flags)
//! - Formation-top plugs (most specific citation scope per formation)
//! - Top plug and casing cut
//! - DUQW isolation check

mod formations;

use tracing::debug;

use crate::findings::{codes, Violation};
use crate::kernel::{depth_tag, PlanContext};
use crate::types::{knobs, Interval, MechanicalBarrier, PlanStep, StepType};

/// Steps and findings produced by the baseline rules.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    pub steps: Vec<PlanStep>,
    pub violations: Vec<Violation>,
}

/// Run every baseline rule in a fixed order.
pub fn generate(ctx: &PlanContext<'_>) -> Baseline {
    let mut out = Baseline::default();

    surface_shoe_plug(ctx, &mut out);
    existing_cibp_caps(ctx, &mut out);
    uqw_isolation_plug(ctx, &mut out);
    protect_interval_plugs(ctx, &mut out);
    spaced_plugs(ctx, &mut out);
    intermediate_shoe_plug(ctx, &mut out);
    productive_horizon_plug(ctx, &mut out);
    formations::formation_top_plugs(ctx, &mut out);
    top_plug_and_cut(ctx, &mut out);
    duqw_check(ctx, &mut out);

    debug!(
        steps = out.steps.len(),
        violations = out.violations.len(),
        "Baseline rules evaluated"
    );
    out
}

// ============================================================================
// Shoe plugs
// ============================================================================

fn surface_shoe_plug(ctx: &PlanContext<'_>, out: &mut Baseline) {
    let Some(min_len) = ctx.policy.knob_f64(knobs::SURFACE_CASING_SHOE_PLUG_MIN_FT) else {
        return;
    };
    let citations = ctx.cite(knobs::SURFACE_CASING_SHOE_PLUG_MIN_FT);

    let Some(shoe) = ctx.facts.surface_shoe_ft else {
        out.violations.push(
            Violation::major(
                codes::SURFACE_SHOE_DEPTH_UNKNOWN,
                "Surface casing shoe depth is unknown; shoe plug cannot be placed",
            )
            .with_citations(citations)
            .with_hint("Supply surface_shoe_ft from the casing record"),
        );
        return;
    };

    let interval = Interval::centered(shoe, min_len / 2.0);
    let step = ctx
        .place("surface_shoe_plug", StepType::SurfaceCasingShoePlug, interval)
        .cite(citations.clone())
        .with_detail("shoe_ft", shoe);

    if let Some(required) = ctx.policy.knob_f64(knobs::SURFACE_SHOE_REQUIRED_COVERAGE_FT) {
        let coverage = interval.length_ft();
        if coverage < required {
            out.violations.push(
                Violation::major(
                    codes::INSUFFICIENT_SHOE_COVERAGE,
                    format!(
                        "Surface shoe plug covers {coverage:.0} ft; {required:.0} ft required"
                    ),
                )
                .with_context("coverage_ft", coverage)
                .with_context("required_ft", required)
                .with_context("shoe_ft", shoe)
                .with_citations(ctx.cite(knobs::SURFACE_SHOE_REQUIRED_COVERAGE_FT)),
            );
        }
    }
    out.steps.push(step);
}

fn intermediate_shoe_plug(ctx: &PlanContext<'_>, out: &mut Baseline) {
    if !ctx.policy.knob_flag(knobs::INTERMEDIATE_SHOE_PLUG_REQUIRED) {
        return;
    }
    let Some(shoe) = ctx.facts.intermediate_shoe_ft else {
        return;
    };
    let half = ctx.config.baseline.shoe_plug_half_width_ft;
    out.steps.push(
        ctx.place(
            "intermediate_shoe_plug",
            StepType::IntermediateShoePlug,
            Interval::centered(shoe, half),
        )
        .cite(ctx.cite(knobs::INTERMEDIATE_SHOE_PLUG_REQUIRED))
        .with_detail("shoe_ft", shoe),
    );
}

fn productive_horizon_plug(ctx: &PlanContext<'_>, out: &mut Baseline) {
    if !ctx.policy.knob_flag(knobs::PRODUCTIVE_HORIZON_PLUG_REQUIRED) {
        return;
    }
    let Some(horizon) = ctx.facts.productive_horizon_ft else {
        return;
    };
    let half = ctx.config.baseline.shoe_plug_half_width_ft;
    out.steps.push(
        ctx.place(
            "productive_horizon_plug",
            StepType::ProductiveHorizonPlug,
            Interval::centered(horizon, half),
        )
        .cite(ctx.cite(knobs::PRODUCTIVE_HORIZON_PLUG_REQUIRED))
        .with_detail("horizon_ft", horizon),
    );
}

// ============================================================================
// Bridge plug caps
// ============================================================================

/// Cement cap bringing an existing CIBP up to `required_ft` of cement.
///
/// Returns `None` when the cement already on the plug meets the requirement.
pub(crate) fn cibp_cap_step(
    ctx: &PlanContext<'_>,
    barrier: &MechanicalBarrier,
    required_ft: f64,
    citations: Vec<String>,
) -> Option<PlanStep> {
    let existing = barrier.cap_ft.unwrap_or(0.0).max(0.0);
    if existing >= required_ft {
        return None;
    }
    let depth = barrier.depth_ft;
    let interval = Interval::new((depth - required_ft).max(0.0), depth - existing);
    Some(
        ctx.place(format!("cibp_cap_{}", depth_tag(depth)), StepType::CibpCap, interval)
            .cite(citations)
            .with_detail("cibp_depth_ft", depth)
            .with_detail("existing_cap_ft", existing)
            .with_detail("required_cap_ft", required_ft),
    )
}

fn existing_cibp_caps(ctx: &PlanContext<'_>, out: &mut Baseline) {
    let Some(required) = ctx.policy.knob_f64(knobs::CEMENT_ABOVE_CIBP_MIN_FT) else {
        return;
    };
    let citations = ctx.cite(knobs::CEMENT_ABOVE_CIBP_MIN_FT);
    for barrier in ctx.facts.existing_cibps() {
        if let Some(step) = cibp_cap_step(ctx, barrier, required, citations.clone()) {
            out.steps.push(step);
        }
    }
}

// ============================================================================
// Groundwater
// ============================================================================

fn uqw_isolation_plug(ctx: &PlanContext<'_>, out: &mut Baseline) {
    let citations = ctx.cite(knobs::UQW_ISOLATION_MIN_LEN_FT);
    let Some(base) = ctx.facts.uqw_base_ft else {
        if ctx.policy.knob_flag(knobs::DUQW_ISOLATION_REQUIRED) {
            out.violations.push(
                Violation::major(
                    codes::UQW_DEPTH_UNKNOWN,
                    "Base of usable-quality water is unknown; isolation plug cannot be placed",
                )
                .with_citations(citations)
                .with_hint("Supply uqw_base_ft from the groundwater determination letter"),
            );
        }
        return;
    };

    let defaults = &ctx.config.baseline;
    let min_len = ctx
        .policy
        .knob_f64(knobs::UQW_ISOLATION_MIN_LEN_FT)
        .unwrap_or(defaults.uqw_min_len_ft);
    let above = ctx
        .policy
        .knob_f64(knobs::UQW_ISOLATION_ABOVE_FT)
        .unwrap_or(defaults.uqw_above_ft);
    let below = ctx
        .policy
        .knob_f64(knobs::UQW_ISOLATION_BELOW_FT)
        .unwrap_or(defaults.uqw_below_ft);

    // Offsets are depth offsets: `below` reaches shallower, `above` deeper
    let mut interval = Interval::new((base - below).max(0.0), base + above);
    let deficit = min_len - interval.length_ft();
    if deficit > 0.0 {
        interval = Interval::new(
            (interval.top_ft - deficit / 2.0).max(0.0),
            interval.bottom_ft + deficit / 2.0,
        );
        // Surface clamp can eat part of the extension; push it below instead
        if interval.length_ft() < min_len {
            interval.bottom_ft = interval.top_ft + min_len;
        }
    }

    out.steps.push(
        ctx.place("uqw_isolation_plug", StepType::UqwIsolationPlug, interval)
            .cite(citations)
            .with_detail("uqw_base_ft", base),
    );
}

fn duqw_check(ctx: &PlanContext<'_>, out: &mut Baseline) {
    if !ctx.policy.knob_flag(knobs::DUQW_ISOLATION_REQUIRED) {
        return;
    }
    let planned = out
        .steps
        .iter()
        .any(|s| s.step_type == StepType::UqwIsolationPlug);
    if !planned {
        out.violations.push(
            Violation::major(
                codes::DUQW_ISOLATION_MISSING,
                "Policy requires DUQW isolation but no isolation plug was planned",
            )
            .with_citations(ctx.cite(knobs::DUQW_ISOLATION_REQUIRED)),
        );
    }
}

fn protect_interval_plugs(ctx: &PlanContext<'_>, out: &mut Baseline) {
    for (i, protect) in ctx.facts.protect_intervals.iter().enumerate() {
        let interval = Interval::new(protect.top_ft, protect.bottom_ft);
        let mut citations = Vec::new();
        if !protect.source.trim().is_empty() {
            citations.push(protect.source.clone());
        }
        citations.extend(ctx.cite(knobs::PROTECT_INTERVAL_CITATION));
        out.steps.push(
            ctx.place(format!("protect_interval_{}", i + 1), StepType::CementPlug, interval)
                .cite(citations)
                .with_detail("purpose", "protect_interval")
                .with_detail("source", protect.source.as_str()),
        );
    }
}

// ============================================================================
// Producing interval
// ============================================================================

fn spaced_plugs(ctx: &PlanContext<'_>, out: &mut Baseline) {
    let policy = ctx.policy;
    let (Some(count), Some(segment), Some(spacing)) = (
        policy.knob_f64(knobs::PLUG_COUNT),
        policy.knob_f64(knobs::SEGMENT_LENGTH_FT),
        policy.knob_f64(knobs::SPACING_FT),
    ) else {
        return;
    };
    let citations = ctx.cite(knobs::PLUG_COUNT);

    let Some(producing) = ctx.facts.producing_interval else {
        out.violations.push(
            Violation::major(
                codes::PRODUCING_INTERVAL_UNKNOWN,
                "Producing interval is unknown; spaced plugs cannot be placed",
            )
            .with_citations(citations)
            .with_hint("Supply producing_interval {top_ft, bottom_ft} from the completion record"),
        );
        return;
    };

    if count < 1.0 || segment <= 0.0 || spacing <= 0.0 {
        out.violations.push(
            Violation::minor(
                codes::INVALID_KNOB_VALUE,
                format!(
                    "Spaced plug knobs must be positive (plug_count={count}, \
                     segment_length_ft={segment}, spacing_ft={spacing})"
                ),
            )
            .with_citations(citations),
        );
        return;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = count.round() as usize;
    for n in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let top = producing.top_ft + n as f64 * spacing;
        if top >= producing.bottom_ft {
            break;
        }
        out.steps.push(
            ctx.place(
                format!("spaced_plug_{}", n + 1),
                StepType::CementPlug,
                Interval::new(top, top + segment),
            )
            .cite(citations.clone())
            .with_detail("purpose", "spaced_plug")
            .with_detail("index", n + 1),
        );
    }
}

// ============================================================================
// Surface
// ============================================================================

fn top_plug_and_cut(ctx: &PlanContext<'_>, out: &mut Baseline) {
    if let Some(length) = ctx.policy.knob_f64(knobs::TOP_PLUG_LENGTH_FT) {
        out.steps.push(
            ctx.place("top_plug", StepType::TopPlug, Interval::new(0.0, length))
                .cite(ctx.cite(knobs::TOP_PLUG_LENGTH_FT)),
        );
    }
    if let Some(depth) = ctx.policy.knob_f64(knobs::CASING_CUT_BELOW_SURFACE_FT) {
        out.steps.push(
            ctx.place("cut_casing", StepType::CutCasing, Interval::new(depth, depth))
                .cite(ctx.cite(knobs::CASING_CUT_BELOW_SURFACE_FT)),
        );
    }
}
