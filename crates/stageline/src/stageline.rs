//! Main Stageline struct: read, clean, validate and load one source.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use crate::config::{Defaults, SourceConfig};
use crate::error::Result;
use crate::input::{CleanSummary, Cleaner, Parser, ParserConfig, SourceMetadata};
use crate::persistence::{self, PersistenceOutcome};
use crate::record::Record;
use crate::report::{Reporter, TracingReporter};
use crate::schema::TableSchema;
use crate::validation::{ValidationOutcome, ValidationPipeline};

/// Summary of one source run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Source name.
    pub source: String,
    /// Metadata of the file that was read.
    pub file: SourceMetadata,
    /// What cleaning changed.
    pub cleaning: CleanSummary,
    /// Records read.
    pub input: usize,
    /// Records accepted by validation.
    pub accepted: usize,
    /// Records rejected by validation.
    pub rejected: usize,
    /// Rejections per rule, in rule order.
    pub rejections_by_rule: IndexMap<String, usize>,
    /// Rejections per reason, most frequent first.
    pub reasons: Vec<(String, usize)>,
    /// Write results; `None` for validate-only runs.
    pub persistence: Option<PersistenceOutcome>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u128,
}

impl RunSummary {
    /// Share of records accepted, as a percentage (100 for empty input).
    pub fn success_rate(&self) -> f64 {
        if self.input == 0 {
            return 100.0;
        }
        self.accepted as f64 / self.input as f64 * 100.0
    }

    /// True if validation ran and, when persistence ran, every batch committed.
    pub fn is_complete(&self) -> bool {
        self.persistence
            .as_ref()
            .is_none_or(PersistenceOutcome::is_complete)
    }
}

/// Records of one source after reading, cleaning and validation.
#[derive(Debug)]
pub struct ValidatedSource {
    pub file: SourceMetadata,
    pub cleaning: CleanSummary,
    pub outcome: ValidationOutcome,
}

/// Runs sources end to end: reader, cleaner, validation, persistence.
pub struct Stageline {
    defaults: Defaults,
    reporter: Arc<dyn Reporter>,
}

impl Stageline {
    /// Create a pipeline with the given run defaults, reporting to `tracing`.
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults,
            reporter: Arc::new(TracingReporter::new()),
        }
    }

    /// Report run events to `reporter` instead.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run defaults in effect.
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Open the configured store and create any missing tables and views.
    pub fn init_db(&self, source: &SourceConfig) -> Result<Connection> {
        source.validate()?;
        let table = source.table_schema();
        let mut conn = persistence::open(&self.defaults.db_url, self.defaults.busy_timeout())?;
        persistence::bootstrap(&mut conn, &table)?;
        self.reporter.record(
            "schema_ready",
            &[
                ("db_url", json!(self.defaults.db_url)),
                ("table", json!(table.name)),
            ],
        );
        Ok(conn)
    }

    /// Read, clean and validate a source without touching the store.
    pub fn validate(&self, source: &SourceConfig) -> Result<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let validated = self.read_and_validate(source)?;
        Ok(summarize(source, validated, None, started_at, clock))
    }

    /// Run a source end to end against the configured store.
    pub fn run(&self, source: &SourceConfig) -> Result<RunSummary> {
        let mut conn = self.init_db(source)?;
        self.run_with(&mut conn, source)
    }

    /// Run a source end to end against an open, bootstrapped connection.
    pub fn run_with(&self, conn: &mut Connection, source: &SourceConfig) -> Result<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let table = source.table_schema();

        let validated = self.read_and_validate(source)?;
        let outcome = self.persist(conn, &table, &validated.outcome)?;

        let summary = summarize(source, validated, Some(outcome), started_at, clock);
        self.reporter.record(
            "run_completed",
            &[
                ("source", json!(summary.source)),
                ("input", json!(summary.input)),
                ("accepted", json!(summary.accepted)),
                ("rejected", json!(summary.rejected)),
                ("complete", json!(summary.is_complete())),
                ("duration_ms", json!(summary.duration_ms as u64)),
            ],
        );
        Ok(summary)
    }

    /// Read, clean and validate a source, returning the partitions.
    pub fn read_and_validate(&self, source: &SourceConfig) -> Result<ValidatedSource> {
        source.validate()?;
        let rules = source.rule_set()?;

        let (records, file, cleaning) = self.read(source)?;
        self.reporter.record(
            "source_read",
            &[
                ("source", json!(source.name)),
                ("file", json!(file.file)),
                ("rows", json!(file.row_count)),
                ("hash", json!(file.hash)),
            ],
        );

        let pipeline = ValidationPipeline::new(&source.name, rules);
        let outcome = pipeline.validate(records);
        self.reporter.record(
            "validation_completed",
            &[
                ("source", json!(source.name)),
                ("accepted", json!(outcome.accepted.len())),
                ("rejected", json!(outcome.rejected.len())),
                ("success_rate", json!(format!("{:.1}%", outcome.success_rate()))),
            ],
        );
        for (reason, count) in outcome.reason_breakdown() {
            self.reporter.record(
                "rejection_reason",
                &[("reason", json!(reason)), ("count", json!(count))],
            );
        }

        Ok(ValidatedSource {
            file,
            cleaning,
            outcome,
        })
    }

    fn read(&self, source: &SourceConfig) -> Result<(Vec<Record>, SourceMetadata, CleanSummary)> {
        let parser = Parser::with_config(ParserConfig {
            delimiter: source.delimiter_byte()?,
            ..ParserConfig::default()
        });
        let (table, metadata) = parser.parse_file(&source.path)?;

        let cleaner = Cleaner::new(&source.table_schema())
            .with_mapping(source.column_mapping.clone())
            .with_placeholders(source.null_placeholders.clone());
        let (records, cleaning) = cleaner.clean(&table);

        Ok((records, metadata, cleaning))
    }

    fn persist(
        &self,
        conn: &mut Connection,
        table: &TableSchema,
        outcome: &ValidationOutcome,
    ) -> Result<PersistenceOutcome> {
        persistence::persist(
            conn,
            table,
            &outcome.accepted,
            &outcome.rejected,
            &self.defaults.persist_options(),
            self.reporter.as_ref(),
        )
    }
}

fn summarize(
    source: &SourceConfig,
    validated: ValidatedSource,
    persistence: Option<PersistenceOutcome>,
    started_at: DateTime<Utc>,
    clock: Instant,
) -> RunSummary {
    let ValidatedSource {
        file,
        cleaning,
        outcome,
    } = validated;

    RunSummary {
        source: source.name.clone(),
        file,
        cleaning,
        input: outcome.total(),
        accepted: outcome.accepted.len(),
        rejected: outcome.rejected.len(),
        reasons: outcome.reason_breakdown(),
        rejections_by_rule: outcome.rejections_by_rule,
        persistence,
        started_at,
        duration_ms: clock.elapsed().as_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::report::MemoryReporter;

    const HEADER: &str = "data.date,data.owned or leased,data.parking spaces,data.status,data.type,\
location.congressional district,location.id,location.region id,data.disabilities.ADA Accessible,\
data.disabilities.ansi usable,location.address.city,location.address.county,location.address.line 1,\
location.address.state,location.address.zip";

    fn row(date: &str, parking: &str, id: &str, city: &str) -> String {
        format!(
            "{},OWNED,{},Active,BUILDING,CT01,{},1,Yes,No,{},Hartford,1 Main St,CT,06103",
            date, parking, id, city
        )
    }

    fn write_source(dir: &std::path::Path, rows: &[String]) -> SourceConfig {
        let path = dir.join("real_estate.csv");
        fs::write(&path, format!("{}\n{}\n", HEADER, rows.join("\n"))).unwrap();
        SourceConfig::new("real_estate", path)
    }

    #[test]
    fn test_validate_only_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(
            dir.path(),
            &[
                row("2020-01-01", "3", "CT001", "Hartford"),
                row("0", "3", "CT002", "Hartford"),
                row("2020-01-01", "-1", "CT003", "Hartford"),
                row("2020-01-01", "2", "CT001", "Hartford"),
                row("2020-01-01", "-4", "CT004", ""),
            ],
        );

        let reporter = Arc::new(MemoryReporter::new());
        let summary = Stageline::new(Defaults::default())
            .with_reporter(reporter.clone())
            .validate(&source)
            .unwrap();

        assert_eq!(summary.input, 5);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 4);
        assert!(summary.persistence.is_none());
        assert!(summary.is_complete());
        assert_eq!(summary.rejections_by_rule["required_fields"], 1);
        assert_eq!(summary.rejections_by_rule["numeric_range(parking_spaces)"], 1);
        assert_eq!(summary.rejections_by_rule["not_null"], 1);
        assert_eq!(summary.rejections_by_rule["unique_key"], 1);
        assert_eq!(summary.cleaning.placeholders_nulled, 1);
        assert_eq!(reporter.named("validation_completed").len(), 1);
    }

    #[test]
    fn test_run_loads_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(
            dir.path(),
            &[
                row("2020-01-01", "3", "CT001", "Hartford"),
                row("0", "3", "CT002", "Hartford"),
            ],
        );
        let defaults = Defaults {
            db_url: dir.path().join("staging.db").display().to_string(),
            ..Defaults::default()
        };
        let stageline = Stageline::new(defaults).with_reporter(Arc::new(MemoryReporter::new()));

        let summary = stageline.run(&source).unwrap();
        let persisted = summary.persistence.as_ref().unwrap();
        assert_eq!(persisted.inserted, 1);
        assert_eq!(persisted.appended, 1);
        assert_eq!(summary.reasons, vec![("NULL value in data_date".to_string(), 1)]);

        let summary = stageline.run(&source).unwrap();
        let persisted = summary.persistence.as_ref().unwrap();
        assert_eq!(persisted.inserted, 0);
        assert_eq!(persisted.updated, 1);
    }

    #[test]
    fn test_invalid_source_fails_before_reading() {
        let mut source = SourceConfig::new("bad", "/nonexistent/file.csv");
        source.primary_key = "nope".to_string();
        let err = Stageline::new(Defaults::default()).validate(&source).unwrap_err();
        assert!(matches!(err, crate::StagelineError::Config(_)));
    }
}
