//! Findings: violations and citation sets
//!
//! Every abnormal condition the kernel meets becomes a [`Violation`] value
//! rather than an error. Completeness-gate failures, missing facts and
//! advisory findings all share this one record shape so callers render a
//! single taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Violation codes
// ============================================================================

/// Stable violation codes emitted by the kernel.
pub mod codes {
    /// A policy knob the jurisdiction requires is missing (completeness gate).
    pub const POLICY_INCOMPLETE: &str = "POLICY_INCOMPLETE";
    pub const SURFACE_SHOE_DEPTH_UNKNOWN: &str = "SURFACE_SHOE_DEPTH_UNKNOWN";
    pub const INSUFFICIENT_SHOE_COVERAGE: &str = "INSUFFICIENT_SHOE_COVERAGE";
    pub const UQW_DEPTH_UNKNOWN: &str = "UQW_DEPTH_UNKNOWN";
    pub const DUQW_ISOLATION_MISSING: &str = "DUQW_ISOLATION_MISSING";
    pub const PRODUCING_INTERVAL_UNKNOWN: &str = "PRODUCING_INTERVAL_UNKNOWN";
    pub const FORMATION_TOPS_INCOMPLETE: &str = "FORMATION_TOPS_INCOMPLETE";
    /// Informational: the policy carried no default recipe.
    pub const MISSING_RECIPE: &str = "MISSING_RECIPE";
    pub const MATERIALS_GEOMETRY_INCOMPLETE: &str = "MATERIALS_GEOMETRY_INCOMPLETE";
    pub const STEP_BELOW_BARRIER: &str = "STEP_BELOW_BARRIER";
    pub const TAG_WAIT_HOURS_UNSPECIFIED: &str = "TAG_WAIT_HOURS_UNSPECIFIED";
    pub const INVALID_OVERRIDE_INTERVAL: &str = "INVALID_OVERRIDE_INTERVAL";
    pub const INVALID_KNOB_VALUE: &str = "INVALID_KNOB_VALUE";
    pub const INVALID_RECIPE: &str = "INVALID_RECIPE";
    /// A resolved fact had the wrong shape and was ignored.
    pub const FACT_MALFORMED: &str = "FACT_MALFORMED";
}

// ============================================================================
// Severity
// ============================================================================

/// Finding severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ============================================================================
// Violation
// ============================================================================

/// A structured, renderable finding. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// Machine-readable detail (knob names, depths, step ids)
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofix_hint: Option<String>,
}

impl Violation {
    pub fn new(code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
            context: BTreeMap::new(),
            citations: Vec::new(),
            autofix_hint: None,
        }
    }

    pub fn critical(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Critical, message)
    }

    pub fn major(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Major, message)
    }

    pub fn minor(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Minor, message)
    }

    /// Attach a context entry.
    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_citations<I, S>(mut self, citations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.citations = dedup_citations(citations.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.autofix_hint = Some(hint.into());
        self
    }

    /// Critical findings block submission; the plan is still returned.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// ============================================================================
// Citation sets
// ============================================================================

/// Collapse citations to unique values, preserving first-seen order.
///
/// Stable rather than sorted: the first citation is the primary legal basis.
pub fn dedup_citations<I>(citations: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

/// Union of several citation lists, first-seen order preserved.
pub fn union_citations<'a, I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    dedup_citations(lists.into_iter().flatten().cloned())
}
