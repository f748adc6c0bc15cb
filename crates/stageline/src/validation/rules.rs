//! Validation rules.
//!
//! A [`Rule`] is a capability that hands out a fresh [`RuleEvaluator`] for
//! each run. Evaluators classify one record at a time and may keep state
//! for the duration of that run (the uniqueness rule remembers keys it has
//! seen), so applying the same rule twice to identical input gives
//! identical partitions.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, StagelineError};
use crate::record::Record;

use super::outcome::{ClassificationOutcome, RuleResult};

/// Reason recorded for every record after the first with a given key.
pub const DUPLICATE_KEY_REASON: &str = "duplicate key";

/// Per-run classifier handed out by a rule.
pub trait RuleEvaluator {
    /// Classify one record. Called in input order.
    fn classify(&mut self, record: &Record) -> ClassificationOutcome;
}

impl<F> RuleEvaluator for F
where
    F: FnMut(&Record) -> ClassificationOutcome,
{
    fn classify(&mut self, record: &Record) -> ClassificationOutcome {
        self(record)
    }
}

/// A validation rule.
pub trait Rule: Send + Sync {
    /// Stable rule name, used in reports and reject metadata.
    fn name(&self) -> &str;

    /// Fields this rule inspects.
    fn fields(&self) -> Vec<&str>;

    /// Start a new run.
    fn evaluator(&self) -> Box<dyn RuleEvaluator + '_>;

    /// Partition `records` into passed and failed, preserving input order.
    fn apply(&self, records: Vec<Record>) -> RuleResult {
        let mut evaluator = self.evaluator();
        RuleResult::partition(records, |record| evaluator.classify(record))
    }
}

impl fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name())
            .field("fields", &self.fields())
            .finish()
    }
}

/// Fails a record if any listed field is absent, null, or empty text.
///
/// The reason names the first missing field in list order.
#[derive(Debug, Clone)]
pub struct RequiredFieldRule {
    fields: Vec<String>,
}

impl RequiredFieldRule {
    /// Create a rule over `fields`, checked in the given order.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, record: &Record) -> ClassificationOutcome {
        match self.fields.iter().find(|f| record.is_missing(f)) {
            Some(field) => ClassificationOutcome::rejected(format!("Missing or empty {}", field)),
            None => ClassificationOutcome::Accepted,
        }
    }
}

impl Rule for RequiredFieldRule {
    fn name(&self) -> &str {
        "required_fields"
    }

    fn fields(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }

    fn evaluator(&self) -> Box<dyn RuleEvaluator + '_> {
        Box::new(move |record: &Record| self.check(record))
    }
}

/// Fails a record if any listed field is absent or null.
///
/// Empty text is not null here; that distinction keeps null diagnoses
/// (typically a date the cleaner could not parse) separate from
/// required-field diagnoses.
#[derive(Debug, Clone)]
pub struct NullSetRule {
    fields: Vec<String>,
}

impl NullSetRule {
    /// Create a rule over `fields`, checked in the given order.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, record: &Record) -> ClassificationOutcome {
        match self.fields.iter().find(|f| record.is_null(f)) {
            Some(field) => ClassificationOutcome::rejected(format!("NULL value in {}", field)),
            None => ClassificationOutcome::Accepted,
        }
    }
}

impl Rule for NullSetRule {
    fn name(&self) -> &str {
        "not_null"
    }

    fn fields(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }

    fn evaluator(&self) -> Box<dyn RuleEvaluator + '_> {
        Box::new(move |record: &Record| self.check(record))
    }
}

/// Fails a record whose field is present and outside an inclusive range.
///
/// Absent and null values pass. A present value with no numeric reading
/// fails.
#[derive(Debug, Clone)]
pub struct NumericRangeRule {
    name: String,
    field: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl NumericRangeRule {
    /// Create a range rule. Bounds must be finite and ordered.
    pub fn new(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Result<Self> {
        let field = field.into();
        if min.is_some_and(|m| !m.is_finite()) || max.is_some_and(|m| !m.is_finite()) {
            return Err(StagelineError::Config(format!(
                "numeric range for '{}' has a non-finite bound",
                field
            )));
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(StagelineError::Config(format!(
                    "numeric range for '{}' has min {} greater than max {}",
                    field, lo, hi
                )));
            }
        }

        Ok(Self {
            name: format!("numeric_range({})", field),
            field,
            min,
            max,
        })
    }

    /// Shorthand for a `>= 0` rule.
    pub fn non_negative(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("numeric_range({})", field),
            field,
            min: Some(0.0),
            max: None,
        }
    }

    fn check(&self, record: &Record) -> ClassificationOutcome {
        let value = match record.get(&self.field) {
            None => return ClassificationOutcome::Accepted,
            Some(v) if v.is_missing() => return ClassificationOutcome::Accepted,
            Some(v) => v,
        };

        let Some(number) = value.as_f64() else {
            return ClassificationOutcome::rejected(format!(
                "Non-numeric {}: {}",
                self.field, value
            ));
        };

        let below = self.min.is_some_and(|m| number < m);
        let above = self.max.is_some_and(|m| number > m);
        if below || above {
            ClassificationOutcome::rejected(format!(
                "{} out of range [{}, {}]: {}",
                self.field,
                self.min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string()),
                self.max.map(|v| v.to_string()).unwrap_or_else(|| "inf".to_string()),
                value
            ))
        } else {
            ClassificationOutcome::Accepted
        }
    }
}

impl Rule for NumericRangeRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<&str> {
        vec![self.field.as_str()]
    }

    fn evaluator(&self) -> Box<dyn RuleEvaluator + '_> {
        Box::new(move |record: &Record| self.check(record))
    }
}

/// Fails every record after the first occurrence of a key value.
///
/// Works on received order. Records without a key pass; owning that
/// diagnosis is the required-field rule's job.
#[derive(Debug, Clone)]
pub struct UniquenessRule {
    key: String,
}

impl UniquenessRule {
    /// Create a uniqueness rule on `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The key field.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Rule for UniquenessRule {
    fn name(&self) -> &str {
        "unique_key"
    }

    fn fields(&self) -> Vec<&str> {
        vec![self.key.as_str()]
    }

    fn evaluator(&self) -> Box<dyn RuleEvaluator + '_> {
        let mut seen: HashSet<String> = HashSet::new();
        Box::new(move |record: &Record| match record.key(&self.key) {
            Some(key) => {
                if seen.insert(key) {
                    ClassificationOutcome::Accepted
                } else {
                    ClassificationOutcome::rejected(DUPLICATE_KEY_REASON)
                }
            }
            None => ClassificationOutcome::Accepted,
        })
    }
}

/// Ordered list of rules.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    /// Empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule (builder style).
    pub fn with(mut self, rule: impl Rule + 'static) -> Self {
        self.push(rule);
        self
    }

    /// Append a rule.
    pub fn push(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every rule field against the known field names.
    pub fn check_fields(&self, known: impl Fn(&str) -> bool) -> Result<()> {
        for rule in &self.rules {
            if let Some(field) = rule.fields().into_iter().find(|f| !known(*f)) {
                return Err(StagelineError::Config(format!(
                    "rule '{}' references unknown field '{}'",
                    rule.name(),
                    field
                )));
            }
        }
        Ok(())
    }
}
