//! Plan Regression Tests
//!
//! Runs the full kernel (gate → baseline → enrichment → materials) on a
//! representative Permian Basin well under the Texas W-3A handler and
//! asserts on the plan-level guarantees: determinism, deepest-first order,
//! nothing below an existing CIBP, every step cited, materials totals.

use serde_json::{json, Value};

use plugplan::findings::codes;
use plugplan::{
    normalize_facts, plan, plan_batch, plan_with_config, EffectivePolicy, FactError, KernelConfig,
    Plan, PlanRequest, Severity, StepType,
};

// ============================================================================
// Fixtures
// ============================================================================

fn well_facts() -> Value {
    json!({
        "api_number": "42-003-35711",
        "surface_shoe_ft": {"value": 1200.0, "confidence": 0.95, "provenance": "W-2 casing record"},
        "surface_casing_id_in": 8.921,
        "production_shoe_ft": 9000.0,
        "production_casing_id_in": 4.892,
        "hole_size_in": 7.875,
        "uqw_base_ft": {"value": 850.0, "confidence": 0.8, "provenance": ["GAU letter"]},
        "existing_cibp_ft": 8800.0,
        "existing_cibp_cap_ft": 20.0,
        "producing_interval": {"top_ft": 8850.0, "bottom_ft": 8950.0},
        "formation_tops": {"Yates": 3000.0, "Queen": 3150.0, "San Andres": 4500.0},
    })
}

fn texas_policy() -> Value {
    json!({
        "policy_id": "tx.w3a",
        "jurisdiction": "TX",
        "completeness": true,
        "overlays_applied": ["district-08A"],
        "knobs": {
            "surface_casing_shoe_plug_min_ft": 100,
            "cement_above_cibp_min_ft": 100,
            "uqw_isolation_min_len_ft": 100,
            "uqw_isolation_above_ft": 50,
            "uqw_isolation_below_ft": 50,
            "plug_count": 2,
            "segment_length_ft": 50,
            "spacing_ft": 100,
            "top_plug_length_ft": 10,
            "casing_cut_below_surface_ft": 3,
            "tag_wait_hours": 4,
            "merge_adjacent_plugs": true,
            "merge_threshold_ft": 200
        },
        "preferences": {
            "rounding": "ceil",
            "default_recipe": {
                "class": "H",
                "density_ppg": 16.4,
                "yield_ft3_per_sk": 1.06,
                "water_gal_per_sk": 4.3,
                "additives": [{"name": "CaCl2", "rate": 0.94}]
            },
            "geometry_defaults": {"stinger_od_in": 2.375, "stinger_id_in": 1.995}
        },
        "formation_plugs": [
            {"formation": "Yates", "scope": "statewide", "citations": ["tx.tac.16.3.14(j)"], "tag_required": true},
            {"formation": "Queen", "scope": "district", "citations": ["tx.rrc.d08a.queen"]},
            {"formation": "San Andres", "scope": "statewide", "citations": ["tx.tac.16.3.14(j)"]}
        ]
    })
}

fn facts() -> plugplan::ResolvedFacts {
    normalize_facts(&well_facts()).expect("fixture facts")
}

fn policy_from(raw: Value) -> EffectivePolicy {
    serde_json::from_value(raw).expect("fixture policy")
}

fn run() -> Plan {
    plan(&facts(), &policy_from(texas_policy()))
}

fn ids(plan: &Plan) -> Vec<&str> {
    plan.steps.iter().map(|s| s.id.as_str()).collect()
}

// ============================================================================
// Whole-plan guarantees
// ============================================================================

#[test]
fn identical_inputs_produce_identical_json() {
    let a = run().to_json_pretty().expect("serialize");
    let b = run().to_json_pretty().expect("serialize");
    assert_eq!(a, b);
}

#[test]
fn steps_are_ordered_deepest_first() {
    let plan = run();
    assert_eq!(
        ids(&plan),
        vec![
            "cibp_cap_8800",
            "formation_plug_san_andres",
            "merged_plug_1",
            "surface_shoe_plug",
            "uqw_isolation_plug",
            "top_plug",
            "cut_casing",
        ]
    );
    for pair in plan.steps.windows(2) {
        assert!(pair[0].bottom_ft >= pair[1].bottom_ft);
    }
}

#[test]
fn nothing_planned_below_existing_cibp() {
    let plan = run();
    for step in plan.steps.iter().filter(|s| s.step_type != StepType::CibpCap) {
        assert!(
            step.bottom_ft <= 8800.0,
            "{} extends to {} ft, below the CIBP",
            step.id,
            step.bottom_ft
        );
    }
    let dropped = plan
        .violations
        .iter()
        .find(|v| v.code == codes::STEP_BELOW_BARRIER)
        .expect("spaced plug below CIBP should be reported");
    assert_eq!(dropped.context["step_id"], "spaced_plug_1");
    assert_eq!(dropped.severity, Severity::Minor);
}

#[test]
fn cibp_cap_tops_up_existing_cement() {
    let plan = run();
    let cap = plan.step("cibp_cap_8800").expect("cap step");
    assert_eq!((cap.top_ft, cap.bottom_ft), (8700.0, 8780.0));
    assert_eq!(cap.citations, vec!["tx.tac.16.3.14(g)(3)"]);
    assert!(plan
        .notes
        .iter()
        .any(|n| n == "Existing CIBP at 8800 ft with 20 ft cement on top"));
}

#[test]
fn every_step_carries_a_citation() {
    let plan = run();
    for step in &plan.steps {
        assert!(!step.citations.is_empty(), "{} has no legal basis", step.id);
    }
}

#[test]
fn texas_handler_cites_tac_clauses() {
    let plan = run();
    assert_eq!(plan.metadata.handler, "texas_w3a");
    let shoe = plan.step("surface_shoe_plug").expect("shoe plug");
    assert_eq!((shoe.top_ft, shoe.bottom_ft), (1150.0, 1250.0));
    assert_eq!(shoe.citations, vec!["tx.tac.16.3.14(e)(2)"]);
    let uqw = plan.step("uqw_isolation_plug").expect("uqw plug");
    assert_eq!((uqw.top_ft, uqw.bottom_ft), (800.0, 900.0));
    assert_eq!(uqw.citations, vec!["tx.tac.16.3.14(g)(1)"]);
}

#[test]
fn unknown_jurisdiction_falls_back_to_policy_references() {
    let mut raw = texas_policy();
    raw["policy_id"] = json!("nm.c103");
    let plan = plan(&facts(), &policy_from(raw));
    assert_eq!(plan.metadata.handler, "generic");
    let shoe = plan.step("surface_shoe_plug").expect("shoe plug");
    assert_eq!(shoe.citations, vec!["policy:surface_casing_shoe_plug_min_ft"]);
}

#[test]
fn exposed_producing_interval_gets_bridge_plug_and_default_cap() {
    let mut raw = well_facts();
    let obj = raw.as_object_mut().expect("facts object");
    obj.remove("existing_cibp_ft");
    obj.remove("existing_cibp_cap_ft");
    raw["producing_interval"] = json!({"top_ft": 8950.0, "bottom_ft": 9200.0});
    let facts = normalize_facts(&raw).expect("exposed facts");
    let plan = plan(&facts, &policy_from(texas_policy()));

    let plug = plan.step("exposure_bridge_plug").expect("bridge plug");
    assert_eq!(plug.step_type, StepType::BridgePlug);
    assert_eq!((plug.top_ft, plug.bottom_ft), (8900.0, 8900.0));
    assert!(plug.materials.is_none());

    // No cap-length knob in the pack, so the cap is 100 ft
    let cap = plan.step("exposure_cibp_cap").expect("cap");
    assert_eq!(cap.step_type, StepType::CibpCap);
    assert_eq!((cap.top_ft, cap.bottom_ft), (8800.0, 8900.0));
    assert_eq!(cap.details["cibp_depth_ft"], 8900.0);
    assert!(cap.materials.as_ref().is_some_and(|m| m.slurry.sacks > 0));
    assert!(!cap.citations.is_empty());

    assert!(plan
        .notes
        .iter()
        .any(|n| n.contains("extends below production shoe at 9000 ft")));
    assert!(!plan.has_violation(codes::STEP_BELOW_BARRIER));
}

// ============================================================================
// Merge and tagging
// ============================================================================

#[test]
fn adjacent_formation_plugs_merge_and_keep_tag() {
    let plan = run();
    let merged = plan.step("merged_plug_1").expect("merged plug");
    assert_eq!(merged.step_type, StepType::FormationTopPlug);
    assert_eq!((merged.top_ft, merged.bottom_ft), (2950.0, 3200.0));
    assert_eq!(
        merged.details["merged_from"],
        json!(["formation_plug_queen", "formation_plug_yates"])
    );
    assert!(merged.tag_required);
    assert_eq!(merged.details["tag_wait_hours"], 4.0);
    assert!(merged
        .citations
        .iter()
        .any(|c| c == "tx.rrc.d08a.queen"));
    assert!(merged.citations.iter().any(|c| c == "tx.tac.16.3.14(j)"));
    assert!(!plan.has_violation(codes::TAG_WAIT_HOURS_UNSPECIFIED));
}

#[test]
fn tight_threshold_keeps_formation_plugs_apart() {
    let mut raw = texas_policy();
    raw["knobs"]["merge_threshold_ft"] = json!(40);
    let plan = plan(&facts(), &policy_from(raw));
    assert!(plan.step("merged_plug_1").is_none());
    assert!(plan.step("formation_plug_queen").is_some());
    assert!(plan.step("formation_plug_yates").is_some());
}

#[test]
fn missing_tag_wait_is_reported_once() {
    let mut raw = texas_policy();
    raw["knobs"]
        .as_object_mut()
        .expect("knobs object")
        .remove("tag_wait_hours");
    let plan = plan(&facts(), &policy_from(raw));
    let tag_findings: Vec<_> = plan
        .violations
        .iter()
        .filter(|v| v.code == codes::TAG_WAIT_HOURS_UNSPECIFIED)
        .collect();
    assert_eq!(tag_findings.len(), 1);
    assert_eq!(tag_findings[0].context["steps"], json!(["formation_plug_yates"]));
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn cement_steps_carry_materials_and_totals_add_up() {
    let plan = run();
    let mut sacks = 0u64;
    for step in &plan.steps {
        match step.step_type {
            StepType::CutCasing | StepType::BridgePlug => assert!(step.materials.is_none()),
            _ => {
                let m = step
                    .materials
                    .as_ref()
                    .unwrap_or_else(|| panic!("{} has no materials", step.id));
                assert!(m.slurry.sacks > 0, "{} computed zero sacks", step.id);
                assert!(m.fluids.spacer_bbl >= 5.0);
                assert!(m.slurry.additives.contains_key("CaCl2"));
                sacks += u64::from(m.slurry.sacks);
            }
        }
    }
    assert_eq!(plan.metadata.totals.sacks, sacks);
    assert!(!plan.has_violation(codes::MISSING_RECIPE));
    assert!(!plan.has_violation(codes::MATERIALS_GEOMETRY_INCOMPLETE));
    assert!(!plan.metadata.blocked);
}

#[test]
fn regulatory_plug_explains_its_excess() {
    let plan = run();
    let shoe = plan.step("surface_shoe_plug").expect("shoe plug");
    let explain = &shoe.materials.as_ref().expect("materials").slurry.explain;
    assert_eq!(explain["excess_source"], "inferred_cased_short");
    assert_eq!(explain["base_excess"], 0.5);
    assert!((explain["regulatory_multiplier"].as_f64().unwrap_or_default() - 1.1).abs() < 1e-9);
    assert_eq!(explain["cement_class"], "H");
}

#[test]
fn missing_recipe_falls_back_once() {
    let mut raw = texas_policy();
    raw["preferences"]
        .as_object_mut()
        .expect("preferences object")
        .remove("default_recipe");
    let plan = plan(&facts(), &policy_from(raw));
    let count = plan
        .violations
        .iter()
        .filter(|v| v.code == codes::MISSING_RECIPE)
        .count();
    assert_eq!(count, 1);
    for m in plan.steps.iter().filter_map(|s| s.materials.as_ref()) {
        assert_eq!(m.slurry.explain["yield_ft3_per_sk"], 1.18);
    }
}

#[test]
fn kernel_config_changes_materials_not_steps() {
    let policy = policy_from(texas_policy());
    let mut config = KernelConfig::default();
    config.fluids.spacer_min_bbl = 25.0;
    let tuned = plan_with_config(&facts(), &policy, &config);
    let baseline = plan(&facts(), &policy);
    assert_eq!(ids(&tuned), ids(&baseline));
    for step in &tuned.steps {
        if let Some(m) = &step.materials {
            assert!(m.fluids.spacer_bbl >= 25.0);
        }
    }
}

// ============================================================================
// Gate, inputs, batch
// ============================================================================

#[test]
fn incomplete_policy_blocks_with_one_finding_per_knob() {
    let mut raw = texas_policy();
    raw["completeness"] = json!(false);
    raw["missing_knobs"] = json!(["surface_casing_shoe_plug_min_ft"]);
    let plan = plan(&facts(), &policy_from(raw));

    assert!(plan.steps.is_empty());
    assert_eq!(plan.violations.len(), 1);
    assert_eq!(plan.violations[0].code, codes::POLICY_INCOMPLETE);
    assert_eq!(plan.violations[0].severity, Severity::Critical);
    assert_eq!(
        plan.violations[0].context["knob"],
        "surface_casing_shoe_plug_min_ft"
    );
    assert!(plan.metadata.blocked);
    assert_eq!(plan.metadata.stages, vec!["completeness_gate"]);
}

#[test]
fn envelope_and_bare_facts_plan_identically() {
    let bare = json!({
        "api_number": "42-003-35711",
        "surface_shoe_ft": 1200.0,
        "surface_casing_id_in": 8.921,
        "production_shoe_ft": 9000.0,
        "production_casing_id_in": 4.892,
        "hole_size_in": 7.875,
        "uqw_base_ft": 850.0,
        "existing_cibp_ft": 8800.0,
        "existing_cibp_cap_ft": 20.0,
        "producing_interval": {"top_ft": 8850.0, "bottom_ft": 8950.0},
        "formation_tops": {"Yates": 3000.0, "Queen": 3150.0, "San Andres": 4500.0},
    });
    let policy = policy_from(texas_policy());
    let from_bare = plan(&normalize_facts(&bare).expect("bare facts"), &policy);
    assert_eq!(from_bare, plan(&facts(), &policy));
}

#[test]
fn metadata_records_inputs_and_stages() {
    let plan = run();
    let m = &plan.metadata;
    assert_eq!(m.policy_id, "tx.w3a");
    assert_eq!(m.api_number.as_deref(), Some("42-003-35711"));
    assert_eq!(m.overlays_applied, vec!["district-08A"]);
    assert_eq!(m.stages.len(), 14);
    assert_eq!(m.stages.last().map(String::as_str), Some("materials"));
    assert!(plan
        .notes
        .iter()
        .any(|n| n == "Policy overlays applied: district-08A"));
}

#[test]
fn batch_preserves_request_order() {
    let request = |api: &str| -> PlanRequest {
        let mut facts = well_facts();
        facts["api_number"] = json!(api);
        serde_json::from_value(json!({"facts": facts, "policy": texas_policy()}))
            .expect("request")
    };
    let bad: PlanRequest =
        serde_json::from_value(json!({"facts": [1, 2, 3], "policy": texas_policy()}))
            .expect("request");
    let requests = vec![request("42-A"), bad, request("42-B"), request("42-C")];

    let results = plan_batch(&requests, &KernelConfig::default());
    assert_eq!(results.len(), 4);
    assert!(matches!(results[1], Err(FactError::NotAnObject)));
    let apis: Vec<Option<&str>> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|p| p.metadata.api_number.as_deref())
        .collect();
    assert_eq!(apis, vec![Some("42-A"), Some("42-B"), Some("42-C")]);
}
