//! Plan step types: intervals, geometry, recipes and the step record itself

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::facts::HoleContext;
use crate::materials::VolumeBreakdown;

// ============================================================================
// Interval
// ============================================================================

/// A depth interval measured from surface. `top_ft` is always the shallower
/// edge; [`Interval::new`] normalises either argument order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub top_ft: f64,
    pub bottom_ft: f64,
}

impl Interval {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            top_ft: a.min(b),
            bottom_ft: a.max(b),
        }
    }

    /// Interval of `half_width` on either side of `center_ft`, never above surface.
    pub fn centered(center_ft: f64, half_width: f64) -> Self {
        Self::new((center_ft - half_width).max(0.0), center_ft + half_width)
    }

    pub fn length_ft(&self) -> f64 {
        self.bottom_ft - self.top_ft
    }

    /// True when `other` lies entirely within this interval (edges inclusive).
    pub fn contains(&self, other: &Self) -> bool {
        other.top_ft >= self.top_ft && other.bottom_ft <= self.bottom_ft
    }
}

// ============================================================================
// Step type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    SurfaceCasingShoePlug,
    IntermediateShoePlug,
    ProductiveHorizonPlug,
    UqwIsolationPlug,
    FormationTopPlug,
    CementPlug,
    BridgePlug,
    CibpCap,
    PerforateAndCirculate,
    Squeeze,
    TopPlug,
    CutCasing,
}

impl StepType {
    /// Steps that pump cement and therefore carry materials.
    pub fn places_cement(self) -> bool {
        !matches!(self, Self::BridgePlug | Self::CutCasing)
    }

    /// Plugs that get the regulatory length multiplier on excess.
    pub fn is_regulatory_plug(self) -> bool {
        matches!(
            self,
            Self::SurfaceCasingShoePlug | Self::UqwIsolationPlug | Self::FormationTopPlug
        )
    }

    /// Candidates for subsumption and adjacent-plug merge.
    pub fn is_formation_or_cement_plug(self) -> bool {
        matches!(self, Self::FormationTopPlug | Self::CementPlug)
    }

    pub fn is_shoe_plug(self) -> bool {
        matches!(self, Self::SurfaceCasingShoePlug | Self::IntermediateShoePlug)
    }

    pub fn is_perforation(self) -> bool {
        matches!(self, Self::PerforateAndCirculate | Self::Squeeze)
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SurfaceCasingShoePlug => "surface casing shoe plug",
            Self::IntermediateShoePlug => "intermediate shoe plug",
            Self::ProductiveHorizonPlug => "productive horizon plug",
            Self::UqwIsolationPlug => "UQW isolation plug",
            Self::FormationTopPlug => "formation top plug",
            Self::CementPlug => "cement plug",
            Self::BridgePlug => "bridge plug",
            Self::CibpCap => "CIBP cap",
            Self::PerforateAndCirculate => "perforate and circulate",
            Self::Squeeze => "squeeze",
            Self::TopPlug => "top plug",
            Self::CutCasing => "cut casing",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// One depth segment with its own hole/casing and pipe diameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CasingGeometrySegment {
    pub top_ft: f64,
    pub bottom_ft: f64,
    pub hole_or_casing_id_in: f64,
    #[serde(default)]
    pub pipe_od_in: f64,
}

impl CasingGeometrySegment {
    pub fn length_ft(&self) -> f64 {
        (self.bottom_ft - self.top_ft).abs()
    }
}

/// Wellbore and work-string dimensions used for volume math.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepGeometry {
    /// Casing inner diameter (cased hole)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub casing_id_in: Option<f64>,
    /// Bit/hole diameter (open hole)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_diameter_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stinger_od_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stinger_id_in: Option<f64>,
    /// Piecewise geometry; when present it replaces the single-diameter fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<CasingGeometrySegment>,
}

impl StepGeometry {
    /// Outer diameter of the annulus for the given context.
    pub fn outer_diameter_in(&self, context: HoleContext) -> Option<f64> {
        match context {
            HoleContext::OpenHole => self.hole_diameter_in.or(self.casing_id_in),
            HoleContext::Cased => self.casing_id_in.or(self.hole_diameter_in),
        }
    }
}

// ============================================================================
// Slurry recipe
// ============================================================================

/// How fractional sacks are turned into a whole count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Always sufficient
    #[default]
    Ceil,
    /// Exact / minimal
    Floor,
    /// Ties round up at .5
    Nearest,
}

impl std::fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ceil => write!(f, "ceil"),
            Self::Floor => write!(f, "floor"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

/// An additive dosed per sack of cement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Additive {
    pub name: String,
    /// Units per sack
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlurryRecipe {
    pub class: String,
    pub density_ppg: f64,
    pub yield_ft3_per_sk: f64,
    pub water_gal_per_sk: f64,
    #[serde(default)]
    pub additives: Vec<Additive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding: Option<RoundingMode>,
}

// ============================================================================
// Step materials
// ============================================================================

/// Non-cement fluids pumped with a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FluidVolumes {
    pub displacement_bbl: f64,
    pub spacer_bbl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMaterials {
    pub slurry: VolumeBreakdown,
    pub fluids: FluidVolumes,
}

// ============================================================================
// Plan step
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub top_ft: f64,
    pub bottom_ft: f64,
    #[serde(default)]
    pub context: HoleContext,
    #[serde(default)]
    pub geometry: StepGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annular_excess: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<SlurryRecipe>,
    #[serde(rename = "regulatory_basis", default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub tag_required: bool,
    #[serde(default)]
    pub special_instructions: Vec<String>,
    #[serde(default)]
    pub materials: Option<StepMaterials>,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, step_type: StepType, interval: Interval) -> Self {
        Self {
            id: id.into(),
            step_type,
            top_ft: interval.top_ft,
            bottom_ft: interval.bottom_ft,
            context: HoleContext::Cased,
            geometry: StepGeometry::default(),
            annular_excess: None,
            recipe: None,
            citations: Vec::new(),
            tag_required: false,
            special_instructions: Vec::new(),
            materials: None,
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn cite<I, S>(mut self, citations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.citations.extend(citations.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn in_context(mut self, context: HoleContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn tagged(mut self, tag_required: bool) -> Self {
        self.tag_required = tag_required;
        self
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.top_ft, self.bottom_ft)
    }

    pub fn length_ft(&self) -> f64 {
        self.interval().length_ft()
    }

    /// Formation name for formation-top plugs.
    pub fn formation(&self) -> Option<&str> {
        self.details.get("formation").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_normalises_order() {
        let i = Interval::new(5050.0, 4950.0);
        assert_eq!(i.top_ft, 4950.0);
        assert_eq!(i.bottom_ft, 5050.0);
        assert_eq!(i.length_ft(), 100.0);
    }

    #[test]
    fn test_centered_interval_clamps_at_surface() {
        let i = Interval::centered(30.0, 50.0);
        assert_eq!(i.top_ft, 0.0);
        assert_eq!(i.bottom_ft, 80.0);
    }

    #[test]
    fn test_containment_is_inclusive() {
        let outer = Interval::new(4000.0, 5000.0);
        assert!(outer.contains(&Interval::new(4000.0, 5000.0)));
        assert!(outer.contains(&Interval::new(4100.0, 4200.0)));
        assert!(!outer.contains(&Interval::new(3990.0, 4200.0)));
    }

    #[test]
    fn test_step_serializes_with_contract_names() {
        let step = PlanStep::new("top_plug", StepType::TopPlug, Interval::new(0.0, 50.0))
            .cite(["tx.tac.16.3.14(d)(8)"]);
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["type"], "top_plug");
        assert_eq!(json["regulatory_basis"][0], "tx.tac.16.3.14(d)(8)");
        assert!(json["materials"].is_null());
    }
}
