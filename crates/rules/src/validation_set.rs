//! Per-task validation set.
//!
//! An ordered list of (rule instance, field names) pairs built once from task
//! configuration. The first entry covering a field decides its verdict; later
//! entries never see that field.

use overseer_core::config::SubjectConfig;
use overseer_core::Value;
use tracing::{debug, warn};

use crate::error::{RuleError, RuleViolation};
use crate::registry::RuleRegistry;
use crate::rule::Rule;

struct Subject {
    rule: Box<dyn Rule>,
    fields: Vec<String>,
}

#[derive(Default)]
pub struct ValidationSet {
    subjects: Vec<Subject>,
}

impl ValidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from configured subjects.
    ///
    /// Unknown rule types and rules that fail to configure are logged and
    /// skipped; the remaining subjects still apply.
    pub fn build(registry: &RuleRegistry, subjects: &[SubjectConfig]) -> Self {
        let mut set = Self::new();
        for subject in subjects {
            match set.add(registry, subject) {
                Ok(()) => debug!(
                    rule_type = %subject.rule_type,
                    columns = ?subject.columns,
                    "validation subject configured"
                ),
                Err(e @ RuleError::UnknownRuleType(_)) => {
                    warn!(error = %e, columns = ?subject.columns, "skipping subject with unknown rule type");
                }
                Err(e) => {
                    warn!(
                        rule_type = %subject.rule_type,
                        columns = ?subject.columns,
                        error = %e,
                        "skipping misconfigured subject"
                    );
                }
            }
        }
        set
    }

    /// Instantiate, configure and append one subject.
    pub fn add(&mut self, registry: &RuleRegistry, subject: &SubjectConfig) -> Result<(), RuleError> {
        let mut rule = registry.instantiate(&subject.rule_type)?;
        rule.configure(&subject.params)?;
        self.push(rule, subject.columns.clone());
        Ok(())
    }

    /// Append an already configured rule.
    pub fn push(&mut self, rule: Box<dyn Rule>, fields: Vec<String>) {
        self.subjects.push(Subject { rule, fields });
    }

    /// Check `value` of `field` against the first subject covering it.
    /// Uncovered fields are valid.
    pub fn validate(&self, field: &str, value: &Value) -> Result<(), RuleViolation> {
        match self.rule_for(field) {
            Some(rule) => rule.check(field, value),
            None => Ok(()),
        }
    }

    /// The rule deciding `field`, if any.
    pub fn rule_for(&self, field: &str) -> Option<&dyn Rule> {
        self.subjects
            .iter()
            .find(|s| s.fields.iter().any(|f| f == field))
            .map(|s| s.rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl std::fmt::Debug for ValidationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.subjects.iter().map(|s| (s.rule.name(), &s.fields)))
            .finish()
    }
}
