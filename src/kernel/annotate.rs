//! Per-step annotation stages: citation dedup (3), cement class (8),
//! tagging (9) and plan notes (10).

use super::{PlanContext, PlanState};
use crate::findings::{self, codes, Violation};
use crate::types::{knobs, BarrierKind};

pub(super) fn dedup_citations(mut state: PlanState, _ctx: &PlanContext<'_>) -> PlanState {
    for step in &mut state.steps {
        step.citations = findings::dedup_citations(std::mem::take(&mut step.citations));
    }
    state
}

/// Label cement steps shallow or deep against `cement_class_cutoff_ft`.
pub(super) fn cement_class(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let Some(cutoff) = ctx.policy.knob_f64(knobs::CEMENT_CLASS_CUTOFF_FT) else {
        return state;
    };
    let prefs = &ctx.policy.preferences;
    for step in state.steps.iter_mut().filter(|s| s.step_type.places_cement()) {
        let (band, class) = if step.bottom_ft > cutoff {
            ("deep", prefs.deep_cement_class.as_deref())
        } else {
            ("shallow", prefs.shallow_cement_class.as_deref())
        };
        step.details.insert("cement_band".to_string(), band.into());
        if let Some(class) = class {
            step.details.insert("cement_class".to_string(), class.into());
        }
    }
    state
}

pub(super) fn tagging(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let hours = ctx.policy.knob_f64(knobs::TAG_WAIT_HOURS);
    let mut unspecified = Vec::new();

    for step in state.steps.iter_mut().filter(|s| s.tag_required) {
        match hours {
            Some(h) => {
                step.details.insert("tag_wait_hours".to_string(), h.into());
                let line = format!("WOC {h} hours, then tag top of cement to verify placement");
                if !step.special_instructions.contains(&line) {
                    step.special_instructions.push(line);
                }
                step.citations.extend(ctx.cite(knobs::TAG_WAIT_HOURS));
                step.citations = findings::dedup_citations(std::mem::take(&mut step.citations));
            }
            None => unspecified.push(step.id.clone()),
        }
    }

    if !unspecified.is_empty() {
        state.violations.push(
            Violation::minor(
                codes::TAG_WAIT_HOURS_UNSPECIFIED,
                format!(
                    "{} step(s) require tagging but the policy sets no wait-on-cement time",
                    unspecified.len()
                ),
            )
            .with_context("steps", unspecified)
            .with_hint("Set tag_wait_hours in the policy pack"),
        );
    }
    state
}

pub(super) fn plan_notes(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    for barrier in &ctx.facts.barriers {
        let note = match (barrier.kind, barrier.cap_ft) {
            (BarrierKind::Cibp, Some(cap)) => format!(
                "Existing CIBP at {:.0} ft with {cap:.0} ft cement on top",
                barrier.depth_ft
            ),
            (BarrierKind::Cibp, None) => {
                format!("Existing CIBP at {:.0} ft, no cap recorded", barrier.depth_ft)
            }
            (kind, _) => format!("Existing {kind} at {:.0} ft", barrier.depth_ft),
        };
        state.notes.push(note);
    }
    if !ctx.policy.overlays_applied.is_empty() {
        state.notes.push(format!(
            "Policy overlays applied: {}",
            ctx.policy.overlays_applied.join(", ")
        ));
    }
    if !state.overrides_applied.is_empty() {
        let summary = state.overrides_applied.join("; ");
        state.notes.push(format!("Overrides applied: {summary}"));
    }
    state
}
