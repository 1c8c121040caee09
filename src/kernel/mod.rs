//! Planning kernel
//!
//! `facts, effective_policy → [completeness gate] → baseline → 11 enrichment
//! stages → materials → Plan`.
//!
//! Each stage is a pure `fn(PlanState, &PlanContext) -> PlanState`. The
//! orchestrator folds the ordered [`STAGES`] table over the baseline state,
//! so the full pipeline is just composition and every stage can be tested on
//! its own. Identical inputs always produce an identical plan.

mod annotate;
mod defaults;
mod exposure;
mod finalize;
mod mechanical;
pub mod merge;
mod overrides;
mod suppression;

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};

use crate::baseline;
use crate::config::KernelConfig;
use crate::findings::{codes, Severity, Violation};
use crate::policy::PolicyHandler;
use crate::types::{
    CasingGeometrySegment, EffectivePolicy, HoleContext, Interval, MaterialTotals, Plan,
    PlanMetadata, PlanStep, ResolvedFacts, StepGeometry, StepType, WellFacts,
};

pub use merge::merge_adjacent;

/// Read-only inputs shared by every stage of one planning call.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub facts: &'a WellFacts,
    pub policy: &'a EffectivePolicy,
    pub handler: PolicyHandler,
    pub config: &'a KernelConfig,
}

impl<'a> PlanContext<'a> {
    /// Context with the handler resolved from the policy identifier.
    pub fn new(facts: &'a WellFacts, policy: &'a EffectivePolicy, config: &'a KernelConfig) -> Self {
        Self {
            facts,
            policy,
            handler: PolicyHandler::resolve(&policy.policy_id),
            config,
        }
    }

    /// Citations for a rule driven by `knob`.
    pub fn cite(&self, knob: &str) -> Vec<String> {
        self.handler.cite(self.policy, knob)
    }

    /// A step at `interval` with hole context and geometry taken from facts.
    pub fn place(&self, id: impl Into<String>, step_type: StepType, interval: Interval) -> PlanStep {
        let context = self.facts.hole_context_at(interval.bottom_ft);
        let mut step = PlanStep::new(id, step_type, interval).in_context(context);
        step.geometry = self.geometry_for(interval, context);
        step
    }

    /// Geometry known from facts for an interval.
    ///
    /// Open-hole steps that start inside the deepest casing get a two-segment
    /// piecewise geometry (casing above the shoe, open hole below it).
    pub fn geometry_for(&self, interval: Interval, context: HoleContext) -> StepGeometry {
        let mut geometry = StepGeometry::default();
        match context {
            HoleContext::Cased => {
                geometry.casing_id_in = self.facts.casing_id_at(interval.bottom_ft);
            }
            HoleContext::OpenHole => {
                geometry.hole_diameter_in = self.facts.hole_size_in;
                if let (Some(shoe), Some(hole)) =
                    (self.facts.deepest_shoe_ft(), self.facts.hole_size_in)
                {
                    if interval.top_ft < shoe {
                        if let Some(casing_id) = self.facts.casing_id_at(shoe) {
                            geometry.segments = vec![
                                CasingGeometrySegment {
                                    top_ft: interval.top_ft,
                                    bottom_ft: shoe,
                                    hole_or_casing_id_in: casing_id,
                                    pipe_od_in: 0.0,
                                },
                                CasingGeometrySegment {
                                    top_ft: shoe,
                                    bottom_ft: interval.bottom_ft,
                                    hole_or_casing_id_in: hole,
                                    pipe_od_in: 0.0,
                                },
                            ];
                        }
                    }
                }
            }
        }
        geometry
    }
}

/// Step list and side-channel findings threaded through the stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanState {
    pub steps: Vec<PlanStep>,
    pub violations: Vec<Violation>,
    pub notes: Vec<String>,
    /// Human-readable record of policy overrides that changed the plan
    pub overrides_applied: Vec<String>,
}

impl PlanState {
    pub fn has_violation(&self, code: &str) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }
}

pub type Stage = fn(PlanState, &PlanContext<'_>) -> PlanState;

/// Enrichment stages in execution order, ending with the terminal materials stage.
pub const STAGES: [(&str, Stage); 12] = [
    ("mechanical_awareness", mechanical::apply),
    ("exposure_detection", exposure::apply),
    ("citation_dedup", annotate::dedup_citations),
    ("defaults", defaults::apply),
    ("district_overrides", overrides::apply_district),
    ("explicit_overrides", overrides::apply_explicit),
    ("subsumption", suppression::apply),
    ("cement_class", annotate::cement_class),
    ("tagging", annotate::tagging),
    ("plan_notes", annotate::plan_notes),
    ("adjacent_merge", merge::apply),
    ("materials", finalize::apply),
];

/// Plan with built-in kernel config.
pub fn plan(facts: &ResolvedFacts, policy: &EffectivePolicy) -> Plan {
    plan_with_config(facts, policy, &KernelConfig::default())
}

/// Produce a plan from resolved facts and an effective policy.
pub fn plan_with_config(
    facts: &ResolvedFacts,
    policy: &EffectivePolicy,
    config: &KernelConfig,
) -> Plan {
    let handler = PolicyHandler::resolve(&policy.policy_id);

    if let Some(violations) = completeness_gate(policy) {
        info!(
            policy = %policy.policy_id,
            missing = violations.len(),
            "Policy incomplete, returning empty plan"
        );
        let metadata = PlanMetadata {
            policy_id: policy.policy_id.clone(),
            handler: handler.name().to_string(),
            kernel_version: env!("CARGO_PKG_VERSION").to_string(),
            stages: vec!["completeness_gate".to_string()],
            overlays_applied: policy.overlays_applied.clone(),
            api_number: None,
            totals: MaterialTotals::default(),
            blocked: true,
        };
        return Plan {
            steps: Vec::new(),
            violations,
            notes: Vec::new(),
            metadata,
        };
    }

    let (well, fact_violations) = WellFacts::from_resolved(facts);
    let ctx = PlanContext::new(&well, policy, config);

    let base = baseline::generate(&ctx);
    debug!(
        steps = base.steps.len(),
        violations = base.violations.len(),
        "Baseline generated"
    );

    let mut violations = fact_violations;
    violations.extend(base.violations);
    let initial = PlanState {
        steps: base.steps,
        violations,
        notes: Vec::new(),
        overrides_applied: Vec::new(),
    };

    let state = STAGES.iter().fold(initial, |state, (name, stage)| {
        let next = stage(state, &ctx);
        debug!(
            stage = name,
            steps = next.steps.len(),
            violations = next.violations.len(),
            "Stage complete"
        );
        next
    });

    let totals = material_totals(&state.steps);
    let blocked = state
        .violations
        .iter()
        .any(|v| v.severity == Severity::Critical);

    info!(
        policy = %policy.policy_id,
        handler = %handler,
        steps = state.steps.len(),
        violations = state.violations.len(),
        sacks = totals.sacks,
        "Plan complete"
    );

    let mut stages = vec!["completeness_gate".to_string(), "baseline".to_string()];
    stages.extend(STAGES.iter().map(|(name, _)| (*name).to_string()));

    Plan {
        steps: state.steps,
        violations: state.violations,
        notes: state.notes,
        metadata: PlanMetadata {
            policy_id: policy.policy_id.clone(),
            handler: handler.name().to_string(),
            kernel_version: env!("CARGO_PKG_VERSION").to_string(),
            stages,
            overlays_applied: policy.overlays_applied.clone(),
            api_number: well.api_number.clone(),
            totals,
            blocked,
        },
    }
}

/// One planning request: raw facts (normalised here) plus the effective policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub facts: serde_json::Value,
    pub policy: EffectivePolicy,
}

/// Plan many independent requests in parallel. Output order matches input order.
pub fn plan_batch(
    requests: &[PlanRequest],
    config: &KernelConfig,
) -> Vec<Result<Plan, crate::types::FactError>> {
    requests
        .par_iter()
        .map(|req| {
            let facts = crate::types::normalize_facts(&req.facts)?;
            Ok(plan_with_config(&facts, &req.policy, config))
        })
        .collect()
}

/// Returns one violation per missing knob when the policy is incomplete.
fn completeness_gate(policy: &EffectivePolicy) -> Option<Vec<Violation>> {
    if policy.completeness {
        return None;
    }
    if policy.missing_knobs.is_empty() {
        return Some(vec![Violation::critical(
            codes::POLICY_INCOMPLETE,
            "Effective policy is marked incomplete",
        )
        .with_hint("Re-resolve the policy pack before planning")]);
    }
    Some(
        policy
            .missing_knobs
            .iter()
            .map(|knob| {
                Violation::critical(
                    codes::POLICY_INCOMPLETE,
                    format!("Effective policy is missing required knob '{knob}'"),
                )
                .with_context("knob", knob.as_str())
                .with_hint(format!("Set '{knob}' in the policy pack or its overlays"))
            })
            .collect(),
    )
}

fn material_totals(steps: &[PlanStep]) -> MaterialTotals {
    let mut totals = MaterialTotals::default();
    for m in steps.iter().filter_map(|s| s.materials.as_ref()) {
        totals.sacks += u64::from(m.slurry.sacks);
        totals.slurry_bbl += m.slurry.total_bbl;
        totals.water_bbl += m.slurry.water_bbl;
        for (name, qty) in &m.slurry.additives {
            *totals.additives.entry(name.clone()).or_insert(0.0) += qty;
        }
    }
    totals
}

/// Format a depth for step identifiers.
pub(crate) fn depth_tag(depth_ft: f64) -> String {
    format!("{depth_ft:.0}")
}

/// Lowercase, underscore-separated identifier fragment.
pub(crate) fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
