//! Stage 11: adjacent-plug merge
//!
//! Formation and cement plugs are walked deepest-first and grouped while the
//! gap between the group's shallowest edge and the next plug's bottom is at
//! most the threshold. Each multi-member group collapses into one plug that
//! spans the group and keeps the deepest member's recipe and work string.
//! Hole context and wellbore geometry are re-derived from facts for the
//! merged interval, so a merged plug that spans a shoe is sized piecewise.

use serde_json::json;
use tracing::debug;

use super::defaults::fill_geometry;
use super::{PlanContext, PlanState};
use crate::findings::union_citations;
use crate::types::{knobs, PlanStep, StepType};

pub(super) fn apply(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    if !ctx.policy.knob_flag(knobs::MERGE_ADJACENT_PLUGS) {
        return state;
    }
    let threshold = ctx
        .policy
        .knob_f64(knobs::MERGE_THRESHOLD_FT)
        .unwrap_or(ctx.config.pipeline.default_merge_threshold_ft);

    let before = state.steps.len();
    state.steps = merge_adjacent(std::mem::take(&mut state.steps), threshold);
    for step in state
        .steps
        .iter_mut()
        .filter(|s| s.details.contains_key("merged_from"))
    {
        replace_wellbore(step, ctx);
    }
    let merged = before - state.steps.len();
    if merged > 0 {
        debug!(merged, threshold, "Adjacent plugs merged");
        state.notes.push(format!(
            "Merged adjacent plugs within {threshold:.0} ft ({merged} step(s) absorbed)"
        ));
    }
    state
}

/// Rebuild hole context and wellbore geometry for a widened step.
///
/// Stinger dimensions stay with the step. Diameters the facts do not know
/// fall back to the deepest member's values, then to policy defaults.
fn replace_wellbore(step: &mut PlanStep, ctx: &PlanContext<'_>) {
    let context = ctx.facts.hole_context_at(step.bottom_ft);
    let old = std::mem::take(&mut step.geometry);
    let mut geometry = ctx.geometry_for(step.interval(), context);
    geometry.casing_id_in = geometry.casing_id_in.or(old.casing_id_in);
    geometry.hole_diameter_in = geometry.hole_diameter_in.or(old.hole_diameter_in);
    geometry.stinger_od_in = old.stinger_od_in;
    geometry.stinger_id_in = old.stinger_id_in;
    step.context = context;
    step.geometry = geometry;
    fill_geometry(step, &ctx.policy.preferences.geometry_defaults);
}

/// Merge formation/cement plugs separated by at most `threshold_ft`.
///
/// Other step types pass through first, in their original order; merge
/// candidates follow deepest-first.
pub fn merge_adjacent(steps: Vec<PlanStep>, threshold_ft: f64) -> Vec<PlanStep> {
    let (mut candidates, mut out): (Vec<PlanStep>, Vec<PlanStep>) = steps
        .into_iter()
        .partition(|s| s.step_type.is_formation_or_cement_plug());

    candidates.sort_by(|a, b| {
        b.bottom_ft
            .total_cmp(&a.bottom_ft)
            .then(b.top_ft.total_cmp(&a.top_ft))
    });

    let mut groups: Vec<Vec<PlanStep>> = Vec::new();
    let mut group_top = f64::INFINITY;
    for step in candidates {
        match groups.last_mut() {
            Some(group) if group_top - step.bottom_ft <= threshold_ft => {
                group_top = group_top.min(step.top_ft);
                group.push(step);
            }
            _ => {
                group_top = step.top_ft;
                groups.push(vec![step]);
            }
        }
    }

    let mut merged_count = 0usize;
    for group in groups {
        let mut members = group.into_iter();
        let Some(deepest) = members.next() else {
            continue;
        };
        let rest: Vec<PlanStep> = members.collect();
        if rest.is_empty() {
            out.push(deepest);
        } else {
            merged_count += 1;
            out.push(combine(deepest, &rest, merged_count));
        }
    }
    out
}

/// Collapse a group into its deepest member, widened to span the group.
fn combine(mut merged: PlanStep, rest: &[PlanStep], n: usize) -> PlanStep {
    let group: Vec<&PlanStep> = std::iter::once(&merged).chain(rest).collect();
    let top = group.iter().map(|s| s.top_ft).fold(f64::INFINITY, f64::min);
    let bottom = group
        .iter()
        .map(|s| s.bottom_ft)
        .fold(f64::NEG_INFINITY, f64::max);
    let all_formation = group
        .iter()
        .all(|s| s.step_type == StepType::FormationTopPlug);

    let citations = union_citations(group.iter().map(|s| &s.citations));
    let tag_required = group.iter().any(|s| s.tag_required);
    let ids: Vec<&str> = group.iter().map(|s| s.id.as_str()).collect();
    let formations: Vec<&str> = group.iter().filter_map(|s| s.formation()).collect();
    let mut instructions: Vec<String> = Vec::new();
    for line in group.iter().flat_map(|s| s.special_instructions.iter()) {
        if !instructions.contains(line) {
            instructions.push(line.clone());
        }
    }
    let tag_wait = group
        .iter()
        .filter_map(|s| s.details.get("tag_wait_hours").and_then(serde_json::Value::as_f64))
        .reduce(f64::max);
    let merged_from = json!(ids);
    let formations = json!(formations);

    // Recipe, work string and annotations come from the deepest member
    merged.id = format!("merged_plug_{n}");
    merged.step_type = if all_formation {
        StepType::FormationTopPlug
    } else {
        StepType::CementPlug
    };
    merged.top_ft = top;
    merged.bottom_ft = bottom;
    merged.citations = citations;
    merged.tag_required = tag_required;
    merged.special_instructions = instructions;
    merged.geometry.segments.clear();
    merged.details.remove("formation");
    merged.details.remove("formation_top_ft");
    merged.details.insert("merged_from".to_string(), merged_from);
    merged.details.insert("formations".to_string(), formations);
    if let Some(h) = tag_wait {
        merged.details.insert("tag_wait_hours".to_string(), h.into());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;

    fn plug(id: &str, top: f64, bottom: f64) -> PlanStep {
        PlanStep::new(id, StepType::FormationTopPlug, Interval::new(top, bottom))
            .cite([format!("cite:{id}")])
            .with_detail("formation", id)
    }

    #[test]
    fn test_two_plugs_within_threshold_merge() {
        let steps = vec![plug("yates", 6000.0, 6100.0), plug("queen", 6200.0, 6300.0)];
        let out = merge_adjacent(steps, 200.0);
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.id, "merged_plug_1");
        assert_eq!((m.top_ft, m.bottom_ft), (6000.0, 6300.0));
        assert_eq!(m.details["merged_from"], json!(["queen", "yates"]));
        assert_eq!(m.citations, vec!["cite:queen", "cite:yates"]);
        assert_eq!(m.step_type, StepType::FormationTopPlug);
    }

    #[test]
    fn test_gap_equal_to_threshold_merges() {
        let steps = vec![plug("a", 5000.0, 5100.0), plug("b", 5300.0, 5400.0)];
        assert_eq!(merge_adjacent(steps, 200.0).len(), 1);
    }

    #[test]
    fn test_gap_just_over_threshold_stays_separate() {
        let steps = vec![plug("a", 5000.0, 5100.0), plug("b", 5300.1, 5400.0)];
        let out = merge_adjacent(steps, 200.0);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| !s.details.contains_key("merged_from")));
    }

    #[test]
    fn test_chain_measured_from_group_edge() {
        // Each plug is within threshold of the previous group's shallow edge
        let steps = vec![
            plug("c", 4000.0, 4100.0),
            plug("a", 4600.0, 4700.0),
            plug("b", 4300.0, 4400.0),
        ];
        let out = merge_adjacent(steps, 200.0);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].top_ft, out[0].bottom_ft), (4000.0, 4700.0));
        assert_eq!(out[0].details["merged_from"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_merged_plug_across_shoe_is_sized_piecewise() {
        use crate::config::KernelConfig;
        use crate::materials::annulus_capacity;
        use crate::types::{EffectivePolicy, HoleContext, WellFacts};

        let mut facts = WellFacts {
            production_shoe_ft: Some(9000.0),
            hole_size_in: Some(7.875),
            ..Default::default()
        };
        facts.casing.production_id_in = Some(6.094);
        let policy = EffectivePolicy::new("tx.w3a").with_knob(knobs::MERGE_ADJACENT_PLUGS, true);
        let config = KernelConfig::default();
        let ctx = PlanContext::new(&facts, &policy, &config);

        let plug = |id: &str, top: f64, bottom: f64| {
            let mut step = ctx.place(id, StepType::CementPlug, Interval::new(top, bottom));
            step.geometry.stinger_od_in = Some(2.875);
            step.annular_excess = Some(0.0);
            step
        };
        let cased = plug("cased", 8850.0, 8950.0);
        let open = plug("open", 9050.0, 9150.0);
        assert_eq!(cased.context, HoleContext::Cased);
        assert_eq!(open.context, HoleContext::OpenHole);

        let state = PlanState {
            steps: vec![cased, open],
            ..Default::default()
        };
        let state = apply(state, &ctx);
        assert_eq!(state.steps.len(), 1);
        let merged = &state.steps[0];
        assert_eq!((merged.top_ft, merged.bottom_ft), (8850.0, 9150.0));
        assert_eq!(merged.context, HoleContext::OpenHole);
        assert_eq!(merged.geometry.stinger_od_in, Some(2.875));
        let bounds: Vec<(f64, f64, f64)> = merged
            .geometry
            .segments
            .iter()
            .map(|s| (s.top_ft, s.bottom_ft, s.hole_or_casing_id_in))
            .collect();
        assert_eq!(
            bounds,
            vec![(8850.0, 9000.0, 6.094), (9000.0, 9150.0, 7.875)]
        );

        // Materials integrate casing and open hole separately
        let state = super::super::finalize::apply(state, &ctx);
        let total = state.steps[0]
            .materials
            .as_ref()
            .map(|m| m.slurry.total_bbl)
            .unwrap_or_default();
        let expected =
            150.0 * annulus_capacity(6.094, 2.875) + 150.0 * annulus_capacity(7.875, 2.875);
        assert!((total - expected).abs() < 1e-9, "total {total} vs {expected}");
        assert!(total < 13.0);
    }

    #[test]
    fn test_other_step_types_untouched_and_tags_ored() {
        let steps = vec![
            PlanStep::new("uqw", StepType::UqwIsolationPlug, Interval::new(3000.0, 3100.0)),
            plug("a", 3150.0, 3250.0).tagged(true),
            PlanStep::new("cp", StepType::CementPlug, Interval::new(3300.0, 3400.0)),
        ];
        let out = merge_adjacent(steps, 200.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "uqw");
        assert!(out[1].tag_required);
        assert_eq!(out[1].step_type, StepType::CementPlug);
    }
}
