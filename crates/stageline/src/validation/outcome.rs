//! Classification results produced by rules and the validation pipeline.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::record::Record;

/// Verdict of one rule on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    /// The record passes this rule.
    Accepted,
    /// The record fails this rule for the given reason.
    Rejected(String),
}

impl ClassificationOutcome {
    /// Shorthand for a rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        ClassificationOutcome::Rejected(reason.into())
    }
}

/// Partition of a record set by one rule.
///
/// Both sides keep the relative input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleResult {
    /// Records that passed.
    pub passed: Vec<Record>,
    /// Records that failed, each with its reason.
    pub failed: Vec<(Record, String)>,
}

impl RuleResult {
    /// Empty partition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `records` with a classifier, in order.
    pub fn partition<F>(records: Vec<Record>, mut classify: F) -> Self
    where
        F: FnMut(&Record) -> ClassificationOutcome,
    {
        let mut result = Self::new();
        for record in records {
            match classify(&record) {
                ClassificationOutcome::Accepted => result.passed.push(record),
                ClassificationOutcome::Rejected(reason) => result.failed.push((record, reason)),
            }
        }
        result
    }

    /// Total number of records classified.
    pub fn len(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// True if no records were classified.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record rejected by the validation pipeline.
///
/// The record itself is carried unmodified; everything else is annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// The original record.
    pub record: Record,
    /// Why it was rejected (single reason, first failing rule).
    pub reason: String,
    /// Name of the rule that rejected it.
    pub rule: String,
    /// Zero-based position of that rule in the rule set.
    pub rule_index: usize,
    /// Source the record came from.
    pub source: String,
    /// When the record was classified.
    pub rejected_at: DateTime<Utc>,
}

impl RejectedRecord {
    /// Position of the record in the raw input.
    pub fn row(&self) -> usize {
        self.record.row()
    }
}

/// Accepted and rejected partitions for a whole input.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Records that passed every rule, in input order.
    pub accepted: Vec<Record>,
    /// Records that failed a rule, in input order.
    pub rejected: Vec<RejectedRecord>,
    /// Rejections per rule name, in rule order.
    pub rejections_by_rule: IndexMap<String, usize>,
}

impl ValidationOutcome {
    /// Number of records classified.
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    /// Share of records accepted, as a percentage (100 for empty input).
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 100.0;
        }
        self.accepted.len() as f64 / self.total() as f64 * 100.0
    }

    /// Rejection counts grouped by reason, most frequent first.
    pub fn reason_breakdown(&self) -> Vec<(String, usize)> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for rejected in &self.rejected {
            *counts.entry(rejected.reason.clone()).or_insert(0) += 1;
        }
        let mut breakdown: Vec<(String, usize)> = counts.into_iter().collect();
        breakdown.sort_by(|a, b| b.1.cmp(&a.1));
        breakdown
    }
}
