//! Rule setup errors and check failures.

use overseer_core::Value;

/// Errors raised while registering, instantiating or configuring rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule type \"{0}\" already registered")]
    DuplicateRuleType(String),

    #[error("rule type \"{0}\" not found")]
    UnknownRuleType(String),

    #[error("{rule}: {key} parameter expected")]
    MissingParameter { rule: String, key: String },

    #[error("{rule}: invalid {key} parameter: {reason}")]
    InvalidParameter {
        rule: String,
        key: String,
        reason: String,
    },
}

/// A failed check of one field value. `Display` renders the violation text
/// used in reports and alerts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleViolation {
    #[error("{field} : unexpected value {value}")]
    NotInList { field: String, value: Value },

    #[error("{field} : value {value} is not in range {min}..{max}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Free-form failure for rule types registered outside this crate.
    #[error("{field} : {reason}")]
    Rejected { field: String, reason: String },
}

impl RuleViolation {
    pub fn field(&self) -> &str {
        match self {
            RuleViolation::NotInList { field, .. }
            | RuleViolation::OutOfRange { field, .. }
            | RuleViolation::Rejected { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_text() {
        let v = RuleViolation::OutOfRange {
            field: "metric_1".into(),
            value: 150.0,
            min: 0.0,
            max: 100.0,
        };
        assert_eq!(v.to_string(), "metric_1 : value 150 is not in range 0..100");
        assert_eq!(v.field(), "metric_1");

        let v = RuleViolation::NotInList {
            field: "status".into(),
            value: Value::from("broken"),
        };
        assert_eq!(v.to_string(), "status : unexpected value broken");
    }

    #[test]
    fn missing_parameter_text() {
        let e = RuleError::MissingParameter {
            rule: "in-range".into(),
            key: "min".into(),
        };
        assert_eq!(e.to_string(), "in-range: min parameter expected");
    }
}
