//! Validation engine: rules and the pipeline that partitions records into
//! accepted and rejected sets.

mod outcome;
mod pipeline;
mod rules;

pub use outcome::{ClassificationOutcome, RejectedRecord, RuleResult, ValidationOutcome};
pub use pipeline::ValidationPipeline;
pub use rules::{
    DUPLICATE_KEY_REASON, NullSetRule, NumericRangeRule, RequiredFieldRule, Rule, RuleEvaluator,
    RuleSet, UniquenessRule,
};
