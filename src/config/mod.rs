//! Kernel Configuration Module
//!
//! Provides tuning constants loaded from TOML files. Regulatory minimums are
//! never part of this config; they come only from the effective policy.
//!
//! ## Loading Order
//!
//! 1. `PLUGPLAN_CONFIG` environment variable (path to TOML file)
//! 2. `plugplan.toml` in the current working directory
//! 3. Built-in defaults (see `defaults`)
//!
//! ## Usage
//!
//! The config is passed to the kernel explicitly so planning stays a pure
//! function of its inputs:
//!
//! ```ignore
//! let config = KernelConfig::load();
//! let plan = plugplan::kernel::plan_with_config(&facts, &policy, &config);
//! ```

mod kernel_config;
pub mod defaults;
pub mod validation;

pub use kernel_config::*;
