use overseer_core::config::RuleParams;
use overseer_core::Value;

use super::IN_LIST;
use crate::error::{RuleError, RuleViolation};
use crate::rule::{required_param, Rule};

/// Accepts a value only if it is exactly one of the configured values.
///
/// Comparison is typed: `5` does not match `5.0` or `"5"`.
#[derive(Debug, Default)]
pub struct InListRule {
    allowed: Vec<Value>,
}

impl InListRule {
    pub fn allowed(&self) -> &[Value] {
        &self.allowed
    }
}

impl Rule for InListRule {
    fn name(&self) -> &str {
        IN_LIST
    }

    /// Expects `list`: a sequence of scalars.
    fn configure(&mut self, params: &RuleParams) -> Result<(), RuleError> {
        let invalid = |reason: String| RuleError::InvalidParameter {
            rule: IN_LIST.to_string(),
            key: "list".to_string(),
            reason,
        };

        let list = required_param(IN_LIST, params, "list")?
            .as_sequence()
            .ok_or_else(|| invalid("expected a sequence".to_string()))?;

        self.allowed = list
            .iter()
            .map(|item| {
                Value::from_yaml(item)
                    .ok_or_else(|| invalid(format!("non-scalar entry {item:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    fn check(&self, field: &str, value: &Value) -> Result<(), RuleViolation> {
        if self.allowed.contains(value) {
            Ok(())
        } else {
            Err(RuleViolation::NotInList {
                field: field.to_string(),
                value: value.clone(),
            })
        }
    }
}
