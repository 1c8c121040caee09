//! plugplan: plug-and-abandon compliance planning
//!
//! Deterministic planning kernel that turns resolved well facts and an
//! effective jurisdiction policy into an ordered, cited plugging plan with
//! cement materials and compliance findings.
//!
//! ## Architecture
//!
//! - **Completeness gate**: incomplete policies produce an empty, blocked plan
//! - **Baseline**: statutory steps derived from facts and policy knobs
//! - **Kernel**: eleven enrichment stages folded over the baseline, then materials
//! - **Materials**: capacities, slurry volumes, sacks, water, additives, fluids
//! - **Findings**: violations with severity, context and legal citations
//!
//! ```ignore
//! let facts = plugplan::normalize_facts(&raw_facts)?;
//! let policy = plugplan::EffectivePolicy::from_json(&raw_policy)?;
//! let plan = plugplan::plan(&facts, &policy);
//! ```

pub mod baseline;
pub mod config;
pub mod findings;
pub mod kernel;
pub mod materials;
pub mod policy;
pub mod types;

// Re-export kernel configuration
pub use config::KernelConfig;

// Re-export the planning entry points
pub use kernel::{plan, plan_batch, plan_with_config, PlanContext, PlanRequest, PlanState};

// Re-export commonly used types
pub use findings::{Severity, Violation};
pub use policy::PolicyHandler;
pub use types::{
    normalize_facts, EffectivePolicy, Fact, FactError, Interval, Plan, PlanStep, PolicyError,
    ResolvedFacts, StepType, WellFacts,
};
