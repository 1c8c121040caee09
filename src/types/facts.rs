//! Resolved well facts
//!
//! Facts arrive from the external resolver as loosely shaped JSON: either a
//! `{value, confidence, provenance}` envelope or a bare value. They are
//! normalised once at the ingestion boundary into [`ResolvedFacts`], and the
//! kernel only ever reads the typed [`WellFacts`] view built from them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::step::Interval;
use crate::findings::{codes, Violation};

/// Well-known fact keys.
pub mod keys {
    pub const API_NUMBER: &str = "api_number";
    pub const SURFACE_SHOE_FT: &str = "surface_shoe_ft";
    pub const INTERMEDIATE_SHOE_FT: &str = "intermediate_shoe_ft";
    pub const PRODUCTION_SHOE_FT: &str = "production_shoe_ft";
    pub const UQW_BASE_FT: &str = "uqw_base_ft";
    pub const PRODUCING_INTERVAL: &str = "producing_interval";
    pub const PRODUCTIVE_HORIZON_FT: &str = "productive_horizon_ft";
    pub const EXISTING_CIBP_FT: &str = "existing_cibp_ft";
    pub const EXISTING_CIBP_CAP_FT: &str = "existing_cibp_cap_ft";
    pub const MECHANICAL_BARRIERS: &str = "mechanical_barriers";
    pub const PROTECT_INTERVALS: &str = "protect_intervals";
    pub const FORMATION_TOPS: &str = "formation_tops";
    pub const HOLE_SIZE_IN: &str = "hole_size_in";
    pub const SURFACE_CASING_ID_IN: &str = "surface_casing_id_in";
    pub const INTERMEDIATE_CASING_ID_IN: &str = "intermediate_casing_id_in";
    pub const PRODUCTION_CASING_ID_IN: &str = "production_casing_id_in";
}

// ============================================================================
// Fact envelope
// ============================================================================

/// A single resolved fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub value: serde_json::Value,
    /// Resolver confidence, 0.0-1.0
    pub confidence: f64,
    /// Source documents / extraction references
    #[serde(default)]
    pub provenance: Vec<String>,
}

impl Fact {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: value.into(),
            confidence: 1.0,
            provenance: Vec::new(),
        }
    }
}

pub type ResolvedFacts = BTreeMap<String, Fact>;

#[derive(Debug, Error)]
pub enum FactError {
    #[error("Fact payload must be a JSON object keyed by fact name")]
    NotAnObject,

    #[error("Fact '{key}' has confidence {value} outside 0.0-1.0")]
    InvalidConfidence { key: String, value: f64 },

    #[error("Fact '{key}' has malformed envelope: {message}")]
    MalformedEnvelope { key: String, message: String },
}

/// Normalise a raw fact payload into strict [`ResolvedFacts`].
///
/// Accepts, per key, either an envelope object whose keys are a subset of
/// `value`/`confidence`/`provenance` (with `value` present), or any bare JSON
/// value (confidence 1.0, no provenance). `provenance` may be a string or a
/// list of strings. Null values are dropped.
pub fn normalize_facts(raw: &serde_json::Value) -> Result<ResolvedFacts, FactError> {
    let obj = raw.as_object().ok_or(FactError::NotAnObject)?;
    let mut facts = ResolvedFacts::new();

    for (key, entry) in obj {
        let fact = if is_envelope(entry) {
            normalize_envelope(key, entry)?
        } else {
            Fact::new(entry.clone())
        };
        if fact.value.is_null() {
            continue;
        }
        facts.insert(key.clone(), fact);
    }

    Ok(facts)
}

fn is_envelope(entry: &serde_json::Value) -> bool {
    entry.as_object().is_some_and(|o| {
        o.contains_key("value")
            && o.keys()
                .all(|k| matches!(k.as_str(), "value" | "confidence" | "provenance"))
    })
}

fn normalize_envelope(key: &str, entry: &serde_json::Value) -> Result<Fact, FactError> {
    let value = entry.get("value").cloned().unwrap_or_default();

    let confidence = match entry.get("confidence") {
        None | Some(serde_json::Value::Null) => 1.0,
        Some(c) => c.as_f64().ok_or_else(|| FactError::MalformedEnvelope {
            key: key.to_string(),
            message: "confidence must be a number".to_string(),
        })?,
    };
    if !(0.0..=1.0).contains(&confidence) {
        return Err(FactError::InvalidConfidence {
            key: key.to_string(),
            value: confidence,
        });
    }

    let provenance = match entry.get("provenance") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|i| i.as_str().map_or_else(|| i.to_string(), str::to_string))
            .collect(),
        Some(_) => {
            return Err(FactError::MalformedEnvelope {
                key: key.to_string(),
                message: "provenance must be a string or list".to_string(),
            })
        }
    };

    Ok(Fact {
        value,
        confidence,
        provenance,
    })
}

// ============================================================================
// Typed view
// ============================================================================

/// Kind of downhole mechanical barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarrierKind {
    Cibp,
    Packer,
    DvTool,
}

impl std::fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cibp => write!(f, "CIBP"),
            Self::Packer => write!(f, "packer"),
            Self::DvTool => write!(f, "DV tool"),
        }
    }
}

/// An existing mechanical barrier recorded on the well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicalBarrier {
    pub kind: BarrierKind,
    pub depth_ft: f64,
    /// Cement already dumped on top of a CIBP
    #[serde(default)]
    pub cap_ft: Option<f64>,
}

/// An externally supplied interval that must be covered with cement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectInterval {
    pub top_ft: f64,
    pub bottom_ft: f64,
    pub source: String,
}

/// Inner diameters of the casing strings, where known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CasingProgram {
    pub surface_id_in: Option<f64>,
    pub intermediate_id_in: Option<f64>,
    pub production_id_in: Option<f64>,
}

/// Wellbore state in casing vs open hole at a given depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleContext {
    #[default]
    Cased,
    OpenHole,
}

/// Typed, read-only view over [`ResolvedFacts`] used by every kernel stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellFacts {
    pub api_number: Option<String>,
    pub surface_shoe_ft: Option<f64>,
    pub intermediate_shoe_ft: Option<f64>,
    pub production_shoe_ft: Option<f64>,
    pub uqw_base_ft: Option<f64>,
    pub producing_interval: Option<Interval>,
    pub productive_horizon_ft: Option<f64>,
    /// Sorted shallowest-first
    pub barriers: Vec<MechanicalBarrier>,
    pub protect_intervals: Vec<ProtectInterval>,
    pub formation_tops: BTreeMap<String, f64>,
    pub hole_size_in: Option<f64>,
    pub casing: CasingProgram,
}

#[derive(Deserialize)]
struct RawInterval {
    top_ft: f64,
    bottom_ft: f64,
}

impl WellFacts {
    /// Build the typed view. Facts with the wrong shape are treated as absent
    /// and reported as minor findings.
    pub fn from_resolved(facts: &ResolvedFacts) -> (Self, Vec<Violation>) {
        let mut reader = FactReader {
            facts,
            violations: Vec::new(),
        };

        let producing_interval = reader
            .typed::<RawInterval>(keys::PRODUCING_INTERVAL)
            .map(|r| Interval::new(r.top_ft, r.bottom_ft));

        let mut barriers: Vec<MechanicalBarrier> = reader
            .typed::<Vec<MechanicalBarrier>>(keys::MECHANICAL_BARRIERS)
            .unwrap_or_default();
        if let Some(depth_ft) = reader.number(keys::EXISTING_CIBP_FT) {
            let cap_ft = reader.number(keys::EXISTING_CIBP_CAP_FT);
            let already_listed = barriers
                .iter()
                .any(|b| b.kind == BarrierKind::Cibp && (b.depth_ft - depth_ft).abs() < 0.5);
            if !already_listed {
                barriers.push(MechanicalBarrier {
                    kind: BarrierKind::Cibp,
                    depth_ft,
                    cap_ft,
                });
            }
        }
        barriers.sort_by(|a, b| a.depth_ft.total_cmp(&b.depth_ft));

        let view = Self {
            api_number: reader.typed::<String>(keys::API_NUMBER),
            surface_shoe_ft: reader.number(keys::SURFACE_SHOE_FT),
            intermediate_shoe_ft: reader.number(keys::INTERMEDIATE_SHOE_FT),
            production_shoe_ft: reader.number(keys::PRODUCTION_SHOE_FT),
            uqw_base_ft: reader.number(keys::UQW_BASE_FT),
            producing_interval,
            productive_horizon_ft: reader.number(keys::PRODUCTIVE_HORIZON_FT),
            barriers,
            protect_intervals: reader
                .typed::<Vec<ProtectInterval>>(keys::PROTECT_INTERVALS)
                .unwrap_or_default(),
            formation_tops: reader
                .typed::<BTreeMap<String, f64>>(keys::FORMATION_TOPS)
                .unwrap_or_default(),
            hole_size_in: reader.number(keys::HOLE_SIZE_IN),
            casing: CasingProgram {
                surface_id_in: reader.number(keys::SURFACE_CASING_ID_IN),
                intermediate_id_in: reader.number(keys::INTERMEDIATE_CASING_ID_IN),
                production_id_in: reader.number(keys::PRODUCTION_CASING_ID_IN),
            },
        };

        (view, reader.violations)
    }

    /// Existing CIBPs, shallowest first.
    pub fn existing_cibps(&self) -> impl Iterator<Item = &MechanicalBarrier> {
        self.barriers.iter().filter(|b| b.kind == BarrierKind::Cibp)
    }

    /// The shallowest existing CIBP isolates everything beneath it.
    pub fn isolating_cibp_ft(&self) -> Option<f64> {
        self.existing_cibps().map(|b| b.depth_ft).next()
    }

    /// Deepest casing shoe on record; below it the well is open hole.
    pub fn deepest_shoe_ft(&self) -> Option<f64> {
        [
            self.surface_shoe_ft,
            self.intermediate_shoe_ft,
            self.production_shoe_ft,
        ]
        .into_iter()
        .flatten()
        .reduce(f64::max)
    }

    /// Context of a step whose deepest point is `bottom_ft`.
    pub fn hole_context_at(&self, bottom_ft: f64) -> HoleContext {
        match self.deepest_shoe_ft() {
            Some(shoe) if bottom_ft > shoe => HoleContext::OpenHole,
            _ => HoleContext::Cased,
        }
    }

    /// Inner diameter of the innermost casing string covering `depth_ft`.
    pub fn casing_id_at(&self, depth_ft: f64) -> Option<f64> {
        let strings = [
            (self.production_shoe_ft, self.casing.production_id_in),
            (self.intermediate_shoe_ft, self.casing.intermediate_id_in),
            (self.surface_shoe_ft, self.casing.surface_id_in),
        ];
        strings
            .into_iter()
            .find_map(|(shoe, id)| match (shoe, id) {
                (Some(shoe), Some(id)) if depth_ft <= shoe => Some(id),
                _ => None,
            })
    }
}

struct FactReader<'a> {
    facts: &'a ResolvedFacts,
    violations: Vec<Violation>,
}

impl FactReader<'_> {
    fn typed<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let fact = self.facts.get(key)?;
        match serde_json::from_value::<T>(fact.value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                self.violations.push(
                    Violation::minor(
                        codes::FACT_MALFORMED,
                        format!("Fact '{key}' could not be read and was ignored: {e}"),
                    )
                    .with_context("fact", key)
                    .with_context("provenance", fact.provenance.clone()),
                );
                None
            }
        }
    }

    fn number(&mut self, key: &str) -> Option<f64> {
        self.typed::<f64>(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_accepts_envelope_and_bare_values() {
        let raw = json!({
            "surface_shoe_ft": {"value": 1200.0, "confidence": 0.9, "provenance": "W-2 p.3"},
            "uqw_base_ft": 850,
            "api_number": "42-003-12345",
            "hole_size_in": null,
        });
        let facts = normalize_facts(&raw).expect("normalize");
        assert_eq!(facts.len(), 3);
        let shoe = &facts["surface_shoe_ft"];
        assert_eq!(shoe.value, json!(1200.0));
        assert!((shoe.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(shoe.provenance, vec!["W-2 p.3"]);
        assert_eq!(facts["uqw_base_ft"].confidence, 1.0);
    }

    #[test]
    fn test_normalize_keeps_structured_values_that_are_not_envelopes() {
        let raw = json!({
            "producing_interval": {"top_ft": 9000.0, "bottom_ft": 9400.0},
        });
        let facts = normalize_facts(&raw).expect("normalize");
        assert_eq!(facts["producing_interval"].value["top_ft"], json!(9000.0));
    }

    #[test]
    fn test_normalize_rejects_bad_confidence() {
        let raw = json!({"surface_shoe_ft": {"value": 1200.0, "confidence": 1.5}});
        assert!(matches!(
            normalize_facts(&raw),
            Err(FactError::InvalidConfidence { .. })
        ));
        assert!(matches!(
            normalize_facts(&json!([1, 2])),
            Err(FactError::NotAnObject)
        ));
    }

    #[test]
    fn test_view_reports_malformed_fact() {
        let raw = json!({"surface_shoe_ft": "about twelve hundred"});
        let facts = normalize_facts(&raw).expect("normalize");
        let (view, violations) = WellFacts::from_resolved(&facts);
        assert!(view.surface_shoe_ft.is_none());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, codes::FACT_MALFORMED);
    }

    #[test]
    fn test_view_merges_cibp_sources_and_sorts() {
        let raw = json!({
            "existing_cibp_ft": 9500.0,
            "existing_cibp_cap_ft": 20.0,
            "mechanical_barriers": [
                {"kind": "PACKER", "depth_ft": 8800.0},
                {"kind": "CIBP", "depth_ft": 10000.0, "cap_ft": 100.0},
            ],
        });
        let facts = normalize_facts(&raw).expect("normalize");
        let (view, violations) = WellFacts::from_resolved(&facts);
        assert!(violations.is_empty());
        let depths: Vec<f64> = view.barriers.iter().map(|b| b.depth_ft).collect();
        assert_eq!(depths, vec![8800.0, 9500.0, 10000.0]);
        assert_eq!(view.isolating_cibp_ft(), Some(9500.0));
    }

    #[test]
    fn test_casing_lookup_and_context() {
        let view = WellFacts {
            surface_shoe_ft: Some(1200.0),
            production_shoe_ft: Some(9000.0),
            casing: CasingProgram {
                surface_id_in: Some(8.921),
                intermediate_id_in: None,
                production_id_in: Some(4.892),
            },
            ..Default::default()
        };
        assert_eq!(view.casing_id_at(500.0), Some(4.892));
        assert_eq!(view.casing_id_at(9500.0), None);
        assert_eq!(view.hole_context_at(8900.0), HoleContext::Cased);
        assert_eq!(view.hole_context_at(9050.0), HoleContext::OpenHole);
    }
}
