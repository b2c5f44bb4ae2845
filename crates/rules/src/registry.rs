//! Rule-type registry.
//!
//! Maps rule-type names to factories producing fresh, unconfigured
//! instances. Populated once at startup and shared read-only by every task.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin::{InListRule, InRangeRule, IN_LIST, IN_RANGE};
use crate::error::RuleError;
use crate::rule::Rule;

/// Constructor for one rule type.
pub type RuleFactory = Arc<dyn Fn() -> Box<dyn Rule> + Send + Sync>;

#[derive(Default)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `in-list` and `in-range`.
    pub fn with_builtins() -> Self {
        let mut factories: HashMap<String, RuleFactory> = HashMap::new();
        factories.insert(
            IN_LIST.to_string(),
            Arc::new(|| Box::new(InListRule::default()) as Box<dyn Rule>),
        );
        factories.insert(
            IN_RANGE.to_string(),
            Arc::new(|| Box::new(InRangeRule::default()) as Box<dyn Rule>),
        );
        Self { factories }
    }

    /// Register a factory under `rule_type`.
    pub fn register<F>(&mut self, rule_type: impl Into<String>, factory: F) -> Result<(), RuleError>
    where
        F: Fn() -> Box<dyn Rule> + Send + Sync + 'static,
    {
        let rule_type = rule_type.into();
        if self.factories.contains_key(&rule_type) {
            return Err(RuleError::DuplicateRuleType(rule_type));
        }
        self.factories.insert(rule_type, Arc::new(factory));
        Ok(())
    }

    /// Register a rule type whose unconfigured state is its `Default`.
    pub fn register_default<R>(&mut self, rule_type: impl Into<String>) -> Result<(), RuleError>
    where
        R: Rule + Default + 'static,
    {
        self.register(rule_type, || Box::new(R::default()) as Box<dyn Rule>)
    }

    /// Build a new unconfigured instance of `rule_type`.
    pub fn instantiate(&self, rule_type: &str) -> Result<Box<dyn Rule>, RuleError> {
        self.factories
            .get(rule_type)
            .map(|factory| factory())
            .ok_or_else(|| RuleError::UnknownRuleType(rule_type.to_string()))
    }

    pub fn contains(&self, rule_type: &str) -> bool {
        self.factories.contains_key(rule_type)
    }

    /// Registered rule-type names, sorted.
    pub fn rule_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rule_types", &self.rule_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleViolation;
    use overseer_core::config::RuleParams;
    use overseer_core::Value;

    /// Rejects every null value.
    #[derive(Default)]
    struct NotNull;

    impl Rule for NotNull {
        fn name(&self) -> &str {
            "not-null"
        }

        fn configure(&mut self, _params: &RuleParams) -> Result<(), RuleError> {
            Ok(())
        }

        fn check(&self, field: &str, value: &Value) -> Result<(), RuleViolation> {
            if value.is_null() {
                return Err(RuleViolation::Rejected {
                    field: field.to_string(),
                    reason: "value is null".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn builtins_registered() {
        let registry = RuleRegistry::with_builtins();
        assert_eq!(registry.rule_types(), vec!["in-list", "in-range"]);
        assert!(registry.contains("in-list"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = RuleRegistry::with_builtins();
        let err = registry.register_default::<InRangeRule>(IN_RANGE).unwrap_err();
        assert!(matches!(err, RuleError::DuplicateRuleType(ref n) if n == "in-range"));
    }

    #[test]
    fn unknown_rule_type_fails() {
        let registry = RuleRegistry::with_builtins();
        let err = registry.instantiate("regex").err().unwrap();
        assert!(matches!(err, RuleError::UnknownRuleType(ref n) if n == "regex"));
    }

    #[test]
    fn custom_rule_type_without_pipeline_changes() {
        let mut registry = RuleRegistry::with_builtins();
        registry.register_default::<NotNull>("not-null").unwrap();
        let rule = registry.instantiate("not-null").unwrap();
        assert_eq!(rule.name(), "not-null");
        assert!(rule.check("f", &Value::Int(1)).is_ok());
        assert_eq!(
            rule.check("f", &Value::Null).unwrap_err().to_string(),
            "f : value is null"
        );
    }

    #[test]
    fn instances_are_independent() {
        let registry = RuleRegistry::with_builtins();
        let mut a = registry.instantiate("in-range").unwrap();
        let mut b = registry.instantiate("in-range").unwrap();

        let params_a: RuleParams = serde_yaml::from_str("{min: 0, max: 10}").unwrap();
        let params_b: RuleParams = serde_yaml::from_str("{min: 100, max: 200}").unwrap();
        a.configure(&params_a).unwrap();
        b.configure(&params_b).unwrap();

        assert!(a.check("m", &Value::Int(5)).is_ok());
        assert!(b.check("m", &Value::Int(5)).is_err());
        assert!(b.check("m", &Value::Int(150)).is_ok());
    }
}
