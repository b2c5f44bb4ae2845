//! Field validation rules.
//!
//! This crate provides:
//! - the [`Rule`] trait: a named, configurable predicate over one field value
//! - a [`RuleRegistry`] mapping rule-type names to factories
//! - built-in `in-list` and `in-range` rules
//! - the per-task [`ValidationSet`] built from task configuration

pub mod builtin;
pub mod error;
pub mod registry;
pub mod rule;
pub mod validation_set;

pub use error::{RuleError, RuleViolation};
pub use registry::RuleRegistry;
pub use rule::Rule;
pub use validation_set::ValidationSet;
