//! Materials Engine
//!
//! Pure geometry, volume and sack math. Nothing in here knows about
//! regulatory steps; the kernel's terminal stage decides which formula a
//! step uses and feeds it dimensions.
//!
//! ## Capacities
//! - `cylinder_capacity()` - bbl/ft inside a pipe or open hole
//! - `annulus_capacity()` - bbl/ft between an outer and inner diameter
//!
//! ## Volumes (`volumes`)
//! - Balanced plug, bridge-plug cap, squeeze, spacer, displacement
//! - Piecewise integration across changing casing/hole geometry
//!
//! ## Excess (`excess`)
//! - Annular-excess inference and the regulatory length multiplier
//!
//! ## Sacks (`sacks`)
//! - bbl → ft³ → sacks with ceil/floor/nearest rounding, water, additives

pub mod excess;
pub mod sacks;
pub mod volumes;

pub use excess::{infer_annular_excess, regulatory_multiplier, resolve_excess, ExcessSource};
pub use sacks::{round_sacks, slurry_breakdown, SackOverride, VolumeBreakdown};
pub use volumes::{
    balanced_plug, cap_above_bridge_plug, displacement, piecewise_annular, spacer, squeeze,
    SlurryVolume,
};

/// Capacity constant: bbl per ft per square inch of diameter.
pub const BBL_PER_FT_PER_SQ_IN: f64 = 0.000971;

/// Cubic feet per oilfield barrel.
pub const FT3_PER_BBL: f64 = 5.6146;

/// US gallons per oilfield barrel.
pub const GAL_PER_BBL: f64 = 42.0;

/// Capacity of a cylinder of diameter `d_in` (bbl/ft).
///
/// Formula: C = K × d²
pub fn cylinder_capacity(d_in: f64) -> f64 {
    if d_in <= 0.0 {
        return 0.0;
    }
    BBL_PER_FT_PER_SQ_IN * d_in * d_in
}

/// Capacity of the annulus between `outer_in` and `inner_in` (bbl/ft).
///
/// Formula: C = K × (D² − d²)
///
/// Pipe not smaller than the hole/casing is invalid geometry and clamps to
/// 0.0 rather than producing a negative volume.
pub fn annulus_capacity(outer_in: f64, inner_in: f64) -> f64 {
    let diff = outer_in * outer_in - inner_in.max(0.0) * inner_in.max(0.0);
    if diff <= 0.0 {
        return 0.0;
    }
    BBL_PER_FT_PER_SQ_IN * diff
}
