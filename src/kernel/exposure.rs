//! Stage 2: producing-interval exposure
//!
//! A producing interval reaching below the production shoe with no bridge
//! plug above it is open to the wellbore. The fix is a CIBP set above the
//! interval and the shoe, capped with cement.

use super::{PlanContext, PlanState};
use crate::types::{knobs, Interval, StepType};

pub(super) fn apply(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let (Some(shoe), Some(producing)) = (ctx.facts.production_shoe_ft, ctx.facts.producing_interval)
    else {
        return state;
    };
    if producing.bottom_ft <= shoe {
        return state;
    }

    let existing_above = ctx
        .facts
        .existing_cibps()
        .any(|b| b.depth_ft <= producing.top_ft);
    let planned_above = state
        .steps
        .iter()
        .any(|s| s.step_type == StepType::BridgePlug && s.top_ft <= producing.top_ft);
    if existing_above || planned_above {
        return state;
    }

    let offset = ctx
        .policy
        .knob_f64(knobs::CIBP_SETTING_OFFSET_FT)
        .unwrap_or(ctx.config.baseline.cibp_setting_offset_ft);
    let cap_length = ctx
        .policy
        .knob_f64(knobs::EXPOSURE_CAP_LENGTH_FT)
        .unwrap_or(ctx.config.pipeline.default_cap_length_ft);
    let set_depth = (producing.top_ft.min(shoe) - offset).max(0.0);
    let citations = ctx.cite(knobs::EXPOSURE_CAP_LENGTH_FT);

    state.steps.push(
        ctx.place(
            "exposure_bridge_plug",
            StepType::BridgePlug,
            Interval::new(set_depth, set_depth),
        )
        .cite(citations.clone())
        .with_detail("purpose", "producing_interval_isolation"),
    );
    state.steps.push(
        ctx.place(
            "exposure_cibp_cap",
            StepType::CibpCap,
            Interval::new((set_depth - cap_length).max(0.0), set_depth),
        )
        .cite(citations)
        .with_detail("cibp_depth_ft", set_depth)
        .with_detail("required_cap_ft", cap_length),
    );
    state.notes.push(format!(
        "Producing interval {:.0}-{:.0} ft extends below production shoe at {shoe:.0} ft \
         with no barrier above it; bridge plug planned at {set_depth:.0} ft",
        producing.top_ft, producing.bottom_ft
    ));

    state
}
