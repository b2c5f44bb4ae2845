use overseer_core::config::RuleParams;
use overseer_core::Value;

use crate::error::{RuleError, RuleViolation};

/// A named, configurable predicate over a single field value.
///
/// Instances are created unconfigured by a [`RuleRegistry`](crate::RuleRegistry)
/// factory, configured exactly once during task setup and then only read.
pub trait Rule: Send + Sync {
    /// Rule-type name this instance was registered under (e.g. `"in-range"`).
    fn name(&self) -> &str;

    /// Apply the parameter mapping from the task configuration.
    fn configure(&mut self, params: &RuleParams) -> Result<(), RuleError>;

    /// Check one value of `field`.
    fn check(&self, field: &str, value: &Value) -> Result<(), RuleViolation>;
}

/// Fetch a required parameter or fail with `MissingParameter`.
pub fn required_param<'a>(
    rule: &str,
    params: &'a RuleParams,
    key: &str,
) -> Result<&'a serde_yaml::Value, RuleError> {
    params.get(key).ok_or_else(|| RuleError::MissingParameter {
        rule: rule.to_string(),
        key: key.to_string(),
    })
}
