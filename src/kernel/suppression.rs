//! Stage 7: subsumption
//!
//! Formation and cement plugs lying wholly inside a perforate-and-circulate
//! interval are redundant: circulating cement through that interval already
//! covers them.

use super::{PlanContext, PlanState};
use crate::types::{Interval, StepType};

pub(super) fn apply(mut state: PlanState, _ctx: &PlanContext<'_>) -> PlanState {
    let circulated: Vec<(String, Interval)> = state
        .steps
        .iter()
        .filter(|s| s.step_type == StepType::PerforateAndCirculate)
        .map(|s| (s.id.clone(), s.interval()))
        .collect();
    if circulated.is_empty() {
        return state;
    }

    let mut notes = Vec::new();
    state.steps.retain(|s| {
        if !s.step_type.is_formation_or_cement_plug() {
            return true;
        }
        let inner = s.interval();
        match circulated.iter().find(|(_, outer)| outer.contains(&inner)) {
            Some((by, outer)) => {
                notes.push(format!(
                    "Removed {} '{}' at {:.0}-{:.0} ft: covered by '{by}' ({:.0}-{:.0} ft)",
                    s.step_type, s.id, inner.top_ft, inner.bottom_ft, outer.top_ft, outer.bottom_ft
                ));
                false
            }
            None => true,
        }
    });
    state.notes.extend(notes);
    state
}
