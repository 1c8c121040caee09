//! Policy handlers
//!
//! A closed set of handlers keyed by policy identifier. Each handler knows the
//! clause identifiers its jurisdiction cites for each knob. Identifiers that
//! match no registered handler resolve to [`PolicyHandler::Generic`].
//!
//! Clause lookups are layered: citations carried by the effective policy win,
//! then the handler's table, then a synthetic `policy:<knob>` reference so a
//! step is never emitted without a legal basis.

use serde::{Deserialize, Serialize};

use crate::types::{knobs, EffectivePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyHandler {
    /// Texas Railroad Commission W-3A plugging (16 TAC §3.14)
    TexasW3a,
    /// Any other jurisdiction; citations come from the policy itself
    Generic,
}

/// Identifier prefixes registered to a handler, most specific first.
const REGISTRY: &[(&str, PolicyHandler)] = &[
    ("tx.w3a", PolicyHandler::TexasW3a),
    ("tx.swr14", PolicyHandler::TexasW3a),
    ("tx.rrc", PolicyHandler::TexasW3a),
];

impl PolicyHandler {
    /// Resolve a policy identifier such as `tx.w3a` or `tx.w3a@2024-06`.
    pub fn resolve(policy_id: &str) -> Self {
        let id = policy_id.trim().to_ascii_lowercase();
        REGISTRY
            .iter()
            .find(|(prefix, _)| {
                id == *prefix
                    || id
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(['.', '@', ':', '/']))
            })
            .map_or(Self::Generic, |(_, handler)| *handler)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TexasW3a => "texas_w3a",
            Self::Generic => "generic",
        }
    }

    /// The clause this jurisdiction cites for a knob, if it has one.
    pub fn default_clause(self, knob: &str) -> Option<&'static str> {
        match self {
            Self::TexasW3a => texas_clause(knob),
            Self::Generic => None,
        }
    }

    /// Citations for a rule driven by `knob`.
    pub fn cite(self, policy: &EffectivePolicy, knob: &str) -> Vec<String> {
        if let Some(explicit) = policy.citations.get(knob).filter(|c| !c.is_empty()) {
            return explicit.clone();
        }
        match self.default_clause(knob) {
            Some(clause) => vec![clause.to_string()],
            None => vec![format!("policy:{knob}")],
        }
    }
}

impl std::fmt::Display for PolicyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn texas_clause(knob: &str) -> Option<&'static str> {
    let clause = match knob {
        knobs::SURFACE_CASING_SHOE_PLUG_MIN_FT | knobs::SURFACE_SHOE_REQUIRED_COVERAGE_FT => {
            "tx.tac.16.3.14(e)(2)"
        }
        knobs::CEMENT_ABOVE_CIBP_MIN_FT | knobs::EXPOSURE_CAP_LENGTH_FT => "tx.tac.16.3.14(g)(3)",
        knobs::UQW_ISOLATION_MIN_LEN_FT
        | knobs::UQW_ISOLATION_ABOVE_FT
        | knobs::UQW_ISOLATION_BELOW_FT
        | knobs::DUQW_ISOLATION_REQUIRED => "tx.tac.16.3.14(g)(1)",
        knobs::PLUG_COUNT | knobs::SEGMENT_LENGTH_FT | knobs::SPACING_FT => "tx.tac.16.3.14(g)(4)",
        knobs::TOP_PLUG_LENGTH_FT => "tx.tac.16.3.14(d)(8)",
        knobs::CASING_CUT_BELOW_SURFACE_FT => "tx.tac.16.3.14(d)(12)",
        knobs::INTERMEDIATE_SHOE_PLUG_REQUIRED => "tx.tac.16.3.14(f)(1)",
        knobs::PRODUCTIVE_HORIZON_PLUG_REQUIRED => "tx.tac.16.3.14(k)",
        knobs::SQUEEZE_FACTOR => "tx.tac.16.3.14(h)",
        knobs::TAG_WAIT_HOURS => "tx.tac.16.3.14(d)(11)",
        knobs::PROTECT_INTERVAL_CITATION => "tx.gau.groundwater_protection",
        knobs::MECHANICAL_BARRIER_ISOLATION => "tx.tac.16.3.14(g)(2)",
        _ => return None,
    };
    Some(clause)
}
