//! Stage 1: mechanical awareness
//!
//! Reacts to barriers already in the well: perforation work isolated by an
//! existing CIBP is dropped, every existing CIBP gets its cement cap, and
//! packers / DV tools are bracketed with a cement plug.

use super::{depth_tag, PlanContext, PlanState};
use crate::baseline::cibp_cap_step;
use crate::types::{knobs, BarrierKind, Interval, StepType};

pub(super) fn apply(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let facts = ctx.facts;

    if let Some(cibp) = facts.isolating_cibp_ft() {
        let mut notes = Vec::new();
        state.steps.retain(|s| {
            let isolated = s.step_type.is_perforation() && s.top_ft >= cibp;
            if isolated {
                notes.push(format!(
                    "Dropped {} '{}' at {:.0}-{:.0} ft: isolated by existing CIBP at {cibp:.0} ft",
                    s.step_type, s.id, s.top_ft, s.bottom_ft
                ));
            }
            !isolated
        });
        state.notes.extend(notes);
    }

    let required = ctx
        .policy
        .knob_f64(knobs::CEMENT_ABOVE_CIBP_MIN_FT)
        .unwrap_or(ctx.config.pipeline.default_cap_length_ft);
    for barrier in facts.existing_cibps() {
        let capped = state.steps.iter().any(|s| {
            s.step_type == StepType::CibpCap
                && s.details
                    .get("cibp_depth_ft")
                    .and_then(serde_json::Value::as_f64)
                    .is_some_and(|d| (d - barrier.depth_ft).abs() < 0.5)
        });
        if capped {
            continue;
        }
        if let Some(step) =
            cibp_cap_step(ctx, barrier, required, ctx.cite(knobs::CEMENT_ABOVE_CIBP_MIN_FT))
        {
            state.steps.push(step);
        }
    }

    let half = ctx.config.pipeline.mechanical_bracket_half_width_ft;
    let isolating = facts.isolating_cibp_ft();
    for barrier in &facts.barriers {
        let purpose = match barrier.kind {
            BarrierKind::Packer => "packer_isolation",
            BarrierKind::DvTool => "dv_tool_isolation",
            BarrierKind::Cibp => continue,
        };
        if isolating.is_some_and(|c| barrier.depth_ft > c) {
            continue;
        }
        let kind = match barrier.kind {
            BarrierKind::Packer => "packer",
            _ => "dv_tool",
        };
        state.steps.push(
            ctx.place(
                format!("bracket_{kind}_{}", depth_tag(barrier.depth_ft)),
                StepType::CementPlug,
                Interval::centered(barrier.depth_ft, half),
            )
            .cite(ctx.cite(knobs::MECHANICAL_BARRIER_ISOLATION))
            .with_detail("purpose", purpose)
            .with_detail("barrier_depth_ft", barrier.depth_ft),
        );
    }

    state
}
