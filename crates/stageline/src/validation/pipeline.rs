//! Short-circuiting validation pipeline.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::record::Record;

use super::outcome::{RejectedRecord, ValidationOutcome};
use super::rules::RuleSet;

/// Runs an ordered rule set over a shrinking candidate set.
///
/// A record is rejected by the first rule it fails and is never shown to
/// later rules. Records that survive every rule are accepted.
#[derive(Debug)]
pub struct ValidationPipeline {
    source: String,
    rules: RuleSet,
}

impl ValidationPipeline {
    /// Create a pipeline for records coming from `source`.
    pub fn new(source: impl Into<String>, rules: RuleSet) -> Self {
        Self {
            source: source.into(),
            rules,
        }
    }

    /// Source name stamped on rejected records.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The rule set, in evaluation order.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify `records`, stamping rejects with the current time.
    pub fn validate(&self, records: Vec<Record>) -> ValidationOutcome {
        self.validate_at(records, Utc::now())
    }

    /// Classify `records`, stamping rejects with `rejected_at`.
    ///
    /// Both output partitions keep the relative input order, and every input
    /// record lands in exactly one of them.
    pub fn validate_at(
        &self,
        records: Vec<Record>,
        rejected_at: DateTime<Utc>,
    ) -> ValidationOutcome {
        let mut candidates = records;
        let mut rejected: Vec<RejectedRecord> = Vec::new();
        let mut rejections_by_rule: IndexMap<String, usize> = IndexMap::new();

        for (rule_index, rule) in self.rules.iter().enumerate() {
            let result = rule.apply(candidates);
            // Rules may share a name (two ranges on one field); counts add up.
            *rejections_by_rule
                .entry(rule.name().to_string())
                .or_default() += result.failed.len();

            rejected.extend(result.failed.into_iter().map(|(record, reason)| RejectedRecord {
                record,
                reason,
                rule: rule.name().to_string(),
                rule_index,
                source: self.source.clone(),
                rejected_at,
            }));
            candidates = result.passed;
        }

        // Rejects were gathered rule by rule; restore input order.
        rejected.sort_by_key(RejectedRecord::row);

        ValidationOutcome {
            accepted: candidates,
            rejected,
            rejections_by_rule,
        }
    }
}
