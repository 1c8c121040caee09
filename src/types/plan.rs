//! Plan: the kernel's output document

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::step::PlanStep;
use crate::findings::Violation;

/// Whole-plan material totals across every cement step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialTotals {
    pub sacks: u64,
    pub slurry_bbl: f64,
    pub water_bbl: f64,
    pub additives: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub policy_id: String,
    /// Policy handler the identifier resolved to
    pub handler: String,
    pub kernel_version: String,
    /// Stages executed, in order
    pub stages: Vec<String>,
    #[serde(default)]
    pub overlays_applied: Vec<String>,
    #[serde(default)]
    pub api_number: Option<String>,
    pub totals: MaterialTotals,
    /// True when any critical finding is present
    pub blocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub violations: Vec<Violation>,
    pub notes: Vec<String>,
    pub metadata: PlanMetadata,
}

impl Plan {
    pub fn has_violation(&self, code: &str) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
