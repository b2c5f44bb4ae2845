use overseer_core::config::RuleParams;
use overseer_core::Value;

use super::IN_RANGE;
use crate::error::{RuleError, RuleViolation};
use crate::rule::{required_param, Rule};

/// Accepts numeric values within `[min, max]`, bounds inclusive.
///
/// Integers and floats are compared directly. Text is parsed as a float
/// and unparsable text, including text padded with whitespace, counts as
/// `0`. Any other type fails the check.
#[derive(Debug, Default)]
pub struct InRangeRule {
    min: f64,
    max: f64,
}

impl InRangeRule {
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn bound(params: &RuleParams, key: &str) -> Result<f64, RuleError> {
        let raw = required_param(IN_RANGE, params, key)?;
        serde_yaml::from_value::<f64>(raw.clone()).map_err(|e| RuleError::InvalidParameter {
            rule: IN_RANGE.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn out_of_range(&self, field: &str, value: f64) -> RuleViolation {
        RuleViolation::OutOfRange {
            field: field.to_string(),
            value,
            min: self.min,
            max: self.max,
        }
    }
}

impl Rule for InRangeRule {
    fn name(&self) -> &str {
        IN_RANGE
    }

    /// Expects numeric `min` and `max`.
    fn configure(&mut self, params: &RuleParams) -> Result<(), RuleError> {
        let min = Self::bound(params, "min")?;
        let max = Self::bound(params, "max")?;
        if min > max {
            return Err(RuleError::InvalidParameter {
                rule: IN_RANGE.to_string(),
                key: "min".to_string(),
                reason: format!("min {min} is greater than max {max}"),
            });
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    fn check(&self, field: &str, value: &Value) -> Result<(), RuleViolation> {
        let number = match value {
            Value::Int(_) | Value::Float(_) => value.as_f64(),
            Value::Text(_) => Some(value.as_f64().unwrap_or(0.0)),
            _ => None,
        };

        match number {
            Some(n) if self.min <= n && n <= self.max => Ok(()),
            Some(n) => Err(self.out_of_range(field, n)),
            None => Err(self.out_of_range(field, 0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(min: i64, max: i64) -> InRangeRule {
        let params: RuleParams =
            serde_yaml::from_str(&format!("{{min: {min}, max: {max}}}")).unwrap();
        let mut rule = InRangeRule::default();
        rule.configure(&params).unwrap();
        rule
    }

    #[test]
    fn boundaries_pass() {
        let rule = configured(0, 100);
        assert!(rule.check("m", &Value::Int(0)).is_ok());
        assert!(rule.check("m", &Value::Int(100)).is_ok());
        assert!(rule.check("m", &Value::Float(100.0)).is_ok());
        assert!(rule.check("m", &Value::Float(50.5)).is_ok());
    }

    #[test]
    fn outside_fails_with_value_and_bounds() {
        let rule = configured(0, 100);
        let err = rule.check("metric_1", &Value::Int(150)).unwrap_err();
        assert_eq!(
            err,
            RuleViolation::OutOfRange {
                field: "metric_1".into(),
                value: 150.0,
                min: 0.0,
                max: 100.0,
            }
        );
        assert!(rule.check("m", &Value::Int(-1)).is_err());
        assert!(rule.check("m", &Value::Float(100.01)).is_err());
    }

    #[test]
    fn text_is_parsed() {
        let rule = configured(10, 20);
        assert!(rule.check("m", &Value::from("15.5")).is_ok());
        assert!(rule.check("m", &Value::from("25")).is_err());
    }

    #[test]
    fn unparsable_text_counts_as_zero() {
        let rule = configured(0, 10);
        assert!(rule.check("m", &Value::from("n/a")).is_ok());
        let rule = configured(1, 10);
        let err = rule.check("m", &Value::from("n/a")).unwrap_err();
        assert!(matches!(err, RuleViolation::OutOfRange { value, .. } if value == 0.0));
    }

    #[test]
    fn padded_text_counts_as_zero() {
        let rule = configured(10, 90);
        let err = rule.check("m", &Value::from(" 50 ")).unwrap_err();
        assert!(matches!(err, RuleViolation::OutOfRange { value, .. } if value == 0.0));
    }

    #[test]
    fn unsupported_types_fail() {
        let rule = configured(-10, 10);
        assert!(rule.check("m", &Value::Bool(true)).is_err());
        assert!(rule.check("m", &Value::Null).is_err());
        assert!(rule.check("m", &Value::Bytes(vec![1])).is_err());
    }

    #[test]
    fn float_bounds_accepted() {
        let params: RuleParams = serde_yaml::from_str("{min: 0.5, max: 1.5}").unwrap();
        let mut rule = InRangeRule::default();
        rule.configure(&params).unwrap();
        assert_eq!(rule.bounds(), (0.5, 1.5));
    }

    #[test]
    fn missing_max() {
        let params: RuleParams = serde_yaml::from_str("{min: 0}").unwrap();
        let mut rule = InRangeRule::default();
        let err = rule.configure(&params).unwrap_err();
        assert_eq!(err.to_string(), "in-range: max parameter expected");
    }

    #[test]
    fn non_numeric_bound() {
        let params: RuleParams = serde_yaml::from_str("{min: low, max: 3}").unwrap();
        let mut rule = InRangeRule::default();
        assert!(matches!(
            rule.configure(&params).unwrap_err(),
            RuleError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let params: RuleParams = serde_yaml::from_str("{min: 10, max: 1}").unwrap();
        let mut rule = InRangeRule::default();
        assert!(rule.configure(&params).is_err());
    }
}
