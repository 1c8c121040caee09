//! Formation-top plugs
//!
//! Several rules of a policy pack may ask for a plug on the same formation
//! (a statewide list, a district list, a county list). Only the candidate
//! with the most specific citation scope survives, and its top comes from
//! the candidate itself or the `formation_tops` fact.

use std::collections::BTreeMap;

use super::Baseline;
use crate::findings::{codes, Violation};
use crate::kernel::{slug, PlanContext};
use crate::types::{FormationPlugCandidate, Interval, StepType};

/// Keep one candidate per formation (case-insensitive), preferring the most
/// specific scope; ties keep the first seen. Output order is first appearance.
pub(crate) fn dedup_candidates(candidates: &[FormationPlugCandidate]) -> Vec<&FormationPlugCandidate> {
    let mut order: Vec<String> = Vec::new();
    let mut best: BTreeMap<String, &FormationPlugCandidate> = BTreeMap::new();

    for candidate in candidates {
        let key = candidate.formation.trim().to_lowercase();
        match best.get(&key) {
            Some(kept) if kept.scope >= candidate.scope => {}
            Some(_) => {
                best.insert(key, candidate);
            }
            None => {
                order.push(key.clone());
                best.insert(key, candidate);
            }
        }
    }

    order.iter().filter_map(|k| best.get(k).copied()).collect()
}

pub(super) fn formation_top_plugs(ctx: &PlanContext<'_>, out: &mut Baseline) {
    let candidates = dedup_candidates(&ctx.policy.formation_plugs);
    if candidates.is_empty() {
        return;
    }

    let half = ctx.config.pipeline.formation_plug_half_width_ft;
    let mut missing = Vec::new();

    for candidate in candidates {
        let Some(top) = candidate.top_ft.or_else(|| fact_top(ctx, &candidate.formation)) else {
            missing.push(candidate.formation.clone());
            continue;
        };

        let citations = if candidate.citations.is_empty() {
            vec![format!("policy:formation_plugs:{}", slug(&candidate.formation))]
        } else {
            candidate.citations.clone()
        };

        out.steps.push(
            ctx.place(
                format!("formation_plug_{}", slug(&candidate.formation)),
                StepType::FormationTopPlug,
                Interval::centered(top, half),
            )
            .cite(citations)
            .tagged(candidate.tag_required)
            .with_detail("formation", candidate.formation.as_str())
            .with_detail("formation_top_ft", top)
            .with_detail("scope", serde_json::to_value(candidate.scope).unwrap_or_default()),
        );
    }

    if !missing.is_empty() {
        out.violations.push(
            Violation::minor(
                codes::FORMATION_TOPS_INCOMPLETE,
                format!("No top known for formation(s): {}", missing.join(", ")),
            )
            .with_context("formations", missing)
            .with_hint("Supply formation_tops for the listed formations"),
        );
    }
}

fn fact_top(ctx: &PlanContext<'_>, formation: &str) -> Option<f64> {
    let wanted = formation.trim();
    ctx.facts
        .formation_tops
        .iter()
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
        .map(|(_, top)| *top)
}
