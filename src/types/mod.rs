//! Shared data structures for the plugging compliance kernel
//!
//! - Facts: resolved, read-only well facts and their typed view
//! - Policy: the effective (already merged) jurisdiction policy
//! - Step: plan steps, geometry and slurry recipes
//! - Plan: the kernel's output document

mod facts;
mod plan;
mod policy;
mod step;

pub use facts::*;
pub use plan::*;
pub use policy::*;
pub use step::*;
