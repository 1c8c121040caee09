//! Stages 5 and 6: district overlay and explicit step overrides

use regex::Regex;
use tracing::warn;

use super::defaults::{note_fallback_recipe, prepare_step};
use super::{slug, PlanContext, PlanState};
use crate::findings::{codes, Violation};
use crate::types::{knobs, HoleContext, Interval, PlanStep, StepType};

// ============================================================================
// District overlay
// ============================================================================

pub(super) fn apply_district(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let overlay = &ctx.policy.district_overlay;
    let overlay_cites = if overlay.citations.is_empty() {
        ctx.cite(knobs::DISTRICT_OVERLAY)
    } else {
        overlay.citations.clone()
    };

    if overlay.tag_open_hole_shoe_plugs {
        let mut tagged = 0usize;
        for step in &mut state.steps {
            if step.step_type.is_shoe_plug() && step.context == HoleContext::OpenHole {
                step.tag_required = true;
                step.citations.extend(overlay_cites.iter().cloned());
                tagged += 1;
            }
        }
        if tagged > 0 {
            state
                .overrides_applied
                .push(format!("district: tagged {tagged} open-hole shoe plug(s)"));
        }
    }

    let instructions = district_instructions(ctx);
    if !instructions.is_empty() {
        for step in state.steps.iter_mut().filter(|s| s.step_type.places_cement()) {
            for line in &instructions {
                if !step.special_instructions.contains(line) {
                    step.special_instructions.push(line.clone());
                }
            }
        }
        state
            .overrides_applied
            .push(format!("district: {} special instruction(s)", instructions.len()));
    }

    let half = overlay
        .formation_plug_half_width_ft
        .unwrap_or(ctx.config.pipeline.formation_plug_half_width_ft);
    let mut used_fallback = false;
    for formation in &overlay.formations {
        let exists = state.steps.iter().any(|s| {
            s.step_type == StepType::FormationTopPlug
                && s.formation()
                    .is_some_and(|f| f.trim().eq_ignore_ascii_case(formation.name.trim()))
        });
        if exists {
            continue;
        }
        let citations = if formation.citations.is_empty() {
            overlay_cites.clone()
        } else {
            formation.citations.clone()
        };
        let mut step = ctx
            .place(
                format!("district_formation_{}", slug(&formation.name)),
                StepType::FormationTopPlug,
                Interval::centered(formation.top_ft, half),
            )
            .cite(citations)
            .with_detail("formation", formation.name.as_str())
            .with_detail("formation_top_ft", formation.top_ft)
            .with_detail("source", "district_overlay");
        used_fallback |= prepare_step(&mut step, ctx);
        step.special_instructions.extend(instructions.iter().cloned());
        state.steps.push(step);
        state
            .overrides_applied
            .push(format!("district: added formation plug for {}", formation.name));
    }
    if used_fallback {
        note_fallback_recipe(&mut state, ctx);
    }

    let patterns = tag_patterns(&overlay.tag_required_formations);
    if !patterns.is_empty() {
        for step in state
            .steps
            .iter_mut()
            .filter(|s| s.step_type == StepType::FormationTopPlug)
        {
            let matched = step
                .formation()
                .is_some_and(|f| patterns.iter().any(|p| p.is_match(f.trim())));
            if matched && !step.tag_required {
                step.tag_required = true;
                state
                    .overrides_applied
                    .push(format!("district: tag required on {}", step.id));
            }
        }
    }

    state
}

fn district_instructions(ctx: &PlanContext<'_>) -> Vec<String> {
    let overlay = &ctx.policy.district_overlay;
    let mut lines = Vec::new();
    if let Some(hours) = overlay.notice_hours {
        lines.push(format!(
            "Notify the district office at least {hours} hours before plugging operations"
        ));
    }
    if let Some(ppg) = overlay.mud_weight_ppg {
        lines.push(format!("Maintain minimum {ppg} ppg mud-laden fluid between plugs"));
    }
    if let Some(sec) = overlay.funnel_time_sec {
        lines.push(format!("Mud-laden fluid funnel viscosity at least {sec} sec/qt"));
    }
    lines
}

/// Prefix marking a tag entry as a regular expression.
const PATTERN_PREFIX: &str = "re:";

/// Case-insensitive whole-name matchers.
///
/// Entries match the formation name literally unless prefixed with `re:`.
/// A `re:` entry that fails to compile falls back to a literal match on
/// the text after the prefix.
fn tag_patterns(names: &[String]) -> Vec<Regex> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter_map(|n| {
            let literal = |text: &str| Regex::new(&format!("(?i)^{}$", regex::escape(text)));
            let compiled = match n.strip_prefix(PATTERN_PREFIX).map(str::trim) {
                Some(pattern) => Regex::new(&format!("(?i)^(?:{pattern})$")).or_else(|e| {
                    warn!(pattern, error = %e, "Invalid tag pattern, matching literally");
                    literal(pattern)
                }),
                None => literal(n),
            };
            compiled.ok()
        })
        .collect()
}

// ============================================================================
// Explicit overrides
// ============================================================================

pub(super) fn apply_explicit(mut state: PlanState, ctx: &PlanContext<'_>) -> PlanState {
    let overrides = &ctx.policy.overrides;
    if overrides.is_empty() {
        return state;
    }
    let mut added: Vec<PlanStep> = Vec::new();

    if let Some(cap) = overrides.cap_length_ft.filter(|c| *c > 0.0) {
        for step in state
            .steps
            .iter_mut()
            .filter(|s| s.step_type == StepType::CibpCap)
        {
            step.top_ft = (step.bottom_ft - cap).max(0.0);
            step.details.insert("cap_length_override_ft".to_string(), cap.into());
        }
        state
            .overrides_applied
            .push(format!("override: CIBP cap length {cap} ft"));
    }

    if let Some(sq) = &overrides.squeeze {
        if let Some(interval) = checked_interval(&mut state, "squeeze", sq.top_ft, sq.bottom_ft) {
            let factor = sq
                .squeeze_factor
                .or_else(|| ctx.policy.knob_f64(knobs::SQUEEZE_FACTOR))
                .unwrap_or(ctx.config.pipeline.default_squeeze_factor);
            let citations = if sq.citations.is_empty() {
                ctx.cite(knobs::SQUEEZE_FACTOR)
            } else {
                sq.citations.clone()
            };
            let mut step = ctx
                .place("override_squeeze", StepType::Squeeze, interval)
                .cite(citations)
                .with_detail("squeeze_factor", factor);
            if let Some(sacks) = sq.sacks {
                step = step.with_detail("sacks_override", sacks);
            }
            added.push(step);
            state.overrides_applied.push(format!(
                "override: squeeze {:.0}-{:.0} ft",
                interval.top_ft, interval.bottom_ft
            ));
        }
    }

    for (i, perf) in overrides.perf_circulate.iter().enumerate() {
        let Some(interval) =
            checked_interval(&mut state, "perf_circulate", perf.top_ft, perf.bottom_ft)
        else {
            continue;
        };
        let citations = if perf.citations.is_empty() {
            vec!["policy:overrides:perf_circulate".to_string()]
        } else {
            perf.citations.clone()
        };
        added.push(
            ctx.place(
                format!("override_perf_circulate_{}", i + 1),
                StepType::PerforateAndCirculate,
                interval,
            )
            .cite(citations),
        );
        state.overrides_applied.push(format!(
            "override: perforate and circulate {:.0}-{:.0} ft",
            interval.top_ft, interval.bottom_ft
        ));
    }

    for (i, plug) in overrides.cement_plugs.iter().enumerate() {
        let Some(interval) =
            checked_interval(&mut state, "cement_plug", plug.top_ft, plug.bottom_ft)
        else {
            continue;
        };
        let mut step = ctx.place(
            format!("override_cement_plug_{}", i + 1),
            StepType::CementPlug,
            interval,
        );
        if let Some(open_hole) = plug.open_hole {
            step.context = if open_hole {
                HoleContext::OpenHole
            } else {
                HoleContext::Cased
            };
            step.geometry = ctx.geometry_for(interval, step.context);
        }
        if !plug.segments.is_empty() {
            step.geometry.segments = plug.segments.clone();
        }
        step.annular_excess = plug.annular_excess;
        step.tag_required = plug.tag_required;
        let citations = if plug.citations.is_empty() {
            vec!["policy:overrides:cement_plugs".to_string()]
        } else {
            plug.citations.clone()
        };
        added.push(step.cite(citations).with_detail("purpose", "operator_override"));
        state.overrides_applied.push(format!(
            "override: cement plug {:.0}-{:.0} ft",
            interval.top_ft, interval.bottom_ft
        ));
    }

    let mut used_fallback = false;
    for mut step in added {
        used_fallback |= prepare_step(&mut step, ctx);
        state.steps.push(step);
    }
    if used_fallback {
        note_fallback_recipe(&mut state, ctx);
    }
    state
}

/// Reject zero-length or non-finite override intervals.
fn checked_interval(state: &mut PlanState, kind: &str, top: f64, bottom: f64) -> Option<Interval> {
    let interval = Interval::new(top, bottom);
    if top.is_finite() && bottom.is_finite() && interval.top_ft >= 0.0 && interval.length_ft() > 0.0
    {
        return Some(interval);
    }
    state.violations.push(
        Violation::minor(
            codes::INVALID_OVERRIDE_INTERVAL,
            format!("Ignored {kind} override with invalid interval {top}-{bottom} ft"),
        )
        .with_context("override", kind),
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::types::{
        CementPlugOverride, DistrictOverlay, EffectivePolicy, IntervalOverride, OverlayFormation,
        SqueezeOverride, WellFacts,
    };

    fn formation_plug(id: &str, name: &str) -> PlanStep {
        PlanStep::new(id, StepType::FormationTopPlug, Interval::new(4000.0, 4100.0))
            .with_detail("formation", name)
    }

    #[test]
    fn test_open_hole_shoe_plugs_tagged() {
        let facts = WellFacts::default();
        let mut policy = EffectivePolicy::new("tx.w3a");
        policy.district_overlay = DistrictOverlay {
            tag_open_hole_shoe_plugs: true,
            citations: vec!["district-08A:rule-3".to_string()],
            ..Default::default()
        };
        let config = KernelConfig::default();
        let state = PlanState {
            steps: vec![
                PlanStep::new("oh", StepType::IntermediateShoePlug, Interval::new(100.0, 200.0))
                    .in_context(HoleContext::OpenHole),
                PlanStep::new("cased", StepType::SurfaceCasingShoePlug, Interval::new(0.0, 50.0)),
            ],
            ..Default::default()
        };
        let state = apply_district(state, &PlanContext::new(&facts, &policy, &config));
        assert!(state.steps[0].tag_required);
        assert_eq!(state.steps[0].citations, vec!["district-08A:rule-3"]);
        assert!(!state.steps[1].tag_required);
    }

    #[test]
    fn test_overlay_formations_added_once_and_tagged_by_pattern() {
        let facts = WellFacts::default();
        let mut policy = EffectivePolicy::new("tx.w3a");
        policy.district_overlay = DistrictOverlay {
            formations: vec![
                OverlayFormation {
                    name: "San Andres".to_string(),
                    top_ft: 4050.0,
                    citations: vec![],
                },
                OverlayFormation {
                    name: "Wolfcamp A".to_string(),
                    top_ft: 8000.0,
                    citations: vec!["district-08A:wolfcamp".to_string()],
                },
            ],
            tag_required_formations: vec!["re:wolfcamp.*".to_string(), "san andres".to_string()],
            notice_hours: Some(48.0),
            ..Default::default()
        };
        let config = KernelConfig::default();
        let state = PlanState {
            steps: vec![formation_plug("formation_plug_san_andres", "san andres")],
            ..Default::default()
        };
        let state = apply_district(state, &PlanContext::new(&facts, &policy, &config));

        assert_eq!(state.steps.len(), 2);
        let added = &state.steps[1];
        assert_eq!(added.id, "district_formation_wolfcamp_a");
        assert_eq!((added.top_ft, added.bottom_ft), (7950.0, 8050.0));
        assert!(added.recipe.is_some());
        assert!(state.steps.iter().all(|s| s.tag_required));
        assert!(state.steps[0].special_instructions[0].contains("48 hours"));
    }

    #[test]
    fn test_tag_names_match_literally_by_default() {
        let patterns = tag_patterns(&["San Andres (Upper)".to_string(), "Wolfcamp.*".to_string()]);
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].is_match("san andres (upper)"));
        assert!(!patterns[0].is_match("San Andres Upper"));
        assert!(patterns[1].is_match("wolfcamp.*"));
        assert!(!patterns[1].is_match("Wolfcamp A"));
    }

    #[test]
    fn test_marked_tag_pattern_is_regex() {
        let patterns = tag_patterns(&["re: bone spring (1st|2nd)".to_string()]);
        assert!(patterns[0].is_match("Bone Spring 1st"));
        assert!(patterns[0].is_match("BONE SPRING 2ND"));
        assert!(!patterns[0].is_match("Bone Spring 3rd"));
    }

    #[test]
    fn test_invalid_marked_pattern_matches_literally() {
        let patterns = tag_patterns(&["re:Bone Spring (1st".to_string()]);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_match("bone spring (1st"));
    }

    #[test]
    fn test_explicit_overrides_synthesize_steps() {
        let facts = WellFacts::default();
        let mut policy = EffectivePolicy::new("tx.w3a");
        policy.overrides.squeeze = Some(SqueezeOverride {
            top_ft: 5000.0,
            bottom_ft: 5100.0,
            squeeze_factor: None,
            sacks: Some(40),
            citations: vec![],
        });
        policy.overrides.perf_circulate = vec![
            IntervalOverride {
                top_ft: 3000.0,
                bottom_ft: 3200.0,
                citations: vec![],
            },
            IntervalOverride {
                top_ft: 100.0,
                bottom_ft: 100.0,
                citations: vec![],
            },
        ];
        policy.overrides.cement_plugs = vec![CementPlugOverride {
            top_ft: 6000.0,
            bottom_ft: 6100.0,
            open_hole: Some(true),
            segments: vec![],
            annular_excess: Some(0.25),
            tag_required: true,
            citations: vec!["operator:request".to_string()],
        }];
        let config = KernelConfig::default();
        let state = apply_explicit(PlanState::default(), &PlanContext::new(&facts, &policy, &config));

        let ids: Vec<&str> = state.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["override_squeeze", "override_perf_circulate_1", "override_cement_plug_1"]
        );
        assert_eq!(state.steps[0].details["squeeze_factor"], 1.5);
        assert_eq!(state.steps[0].details["sacks_override"], 40);
        assert_eq!(state.steps[2].context, HoleContext::OpenHole);
        assert_eq!(state.steps[2].annular_excess, Some(0.25));
        assert!(state.has_violation(codes::INVALID_OVERRIDE_INTERVAL));
        assert!(state.has_violation(codes::MISSING_RECIPE));
    }

    #[test]
    fn test_cap_length_override_resizes_caps() {
        let facts = WellFacts::default();
        let mut policy = EffectivePolicy::new("tx.w3a");
        policy.overrides.cap_length_ft = Some(50.0);
        let config = KernelConfig::default();
        let state = PlanState {
            steps: vec![PlanStep::new("cap", StepType::CibpCap, Interval::new(8900.0, 9000.0))],
            ..Default::default()
        };
        let state = apply_explicit(state, &PlanContext::new(&facts, &policy, &config));
        assert_eq!(state.steps[0].top_ft, 8950.0);
        assert_eq!(state.overrides_applied.len(), 1);
    }
}
