//! Source configuration file.
//!
//! A JSON document with run defaults and one entry per source. Every source
//! field except `name` and `path` falls back to the real-estate source, so
//! a minimal entry is just a name and a file path.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StagelineError};
use crate::persistence::{DEFAULT_BATCH_SIZE, OnBatchError, PersistOptions};
use crate::schema::{ColumnSchema, TableSchema};
use crate::validation::{NullSetRule, NumericRangeRule, RequiredFieldRule, RuleSet, UniquenessRule};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/sources.json";

/// Names that can be used unquoted as SQL identifiers.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    pub sources: Vec<SourceConfig>,
}

/// Settings shared by every source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// SQLite database path or `sqlite://` URL.
    pub db_url: String,
    /// Records per batch transaction.
    pub batch_size: usize,
    /// What to do after a failed batch.
    pub on_batch_error: OnBatchError,
    /// How long a write waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            db_url: "data/staging.db".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            on_batch_error: OnBatchError::Continue,
            busy_timeout_ms: 5000,
        }
    }
}

impl Defaults {
    /// Persistence options derived from these defaults.
    pub fn persist_options(&self) -> PersistOptions {
        PersistOptions {
            batch_size: self.batch_size,
            on_batch_error: self.on_batch_error,
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Inclusive numeric bounds on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// One input source and the staging table it loads into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name, recorded on every reject row.
    pub name: String,
    /// Input file.
    pub path: PathBuf,
    /// Staging table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Primary-key field.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Staging columns in DDL order.
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnSchema>,
    /// Fields that must be present and non-empty.
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
    /// Fields that must not be null.
    #[serde(default = "default_not_null_fields")]
    pub not_null_fields: Vec<String>,
    /// Numeric bounds, checked in order.
    #[serde(default = "default_numeric_ranges")]
    pub numeric_ranges: Vec<RangeConfig>,
    /// Source header to field name. Unmapped headers are snake-cased.
    #[serde(default = "default_column_mapping")]
    pub column_mapping: IndexMap<String, String>,
    /// Per-field values that mean "no value".
    #[serde(default = "default_null_placeholders")]
    pub null_placeholders: IndexMap<String, Vec<String>>,
    /// Field delimiter; detected from the file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

fn default_table() -> String {
    TableSchema::real_estate().name
}

fn default_primary_key() -> String {
    TableSchema::real_estate().primary_key
}

fn default_columns() -> Vec<ColumnSchema> {
    TableSchema::real_estate().columns
}

fn default_required_fields() -> Vec<String> {
    ["location_id", "city", "state"].map(String::from).to_vec()
}

fn default_not_null_fields() -> Vec<String> {
    [
        "data_date",
        "ownership_type",
        "property_type",
        "zip_code",
        "address_line1",
    ]
    .map(String::from)
    .to_vec()
}

fn default_numeric_ranges() -> Vec<RangeConfig> {
    vec![RangeConfig {
        field: "parking_spaces".to_string(),
        min: Some(0.0),
        max: None,
    }]
}

fn default_column_mapping() -> IndexMap<String, String> {
    [
        ("data.date", "data_date"),
        ("data.owned or leased", "ownership_type"),
        ("data.parking spaces", "parking_spaces"),
        ("data.status", "status"),
        ("data.type", "property_type"),
        ("location.congressional district", "congressional_district"),
        ("location.id", "location_id"),
        ("location.region id", "region_id"),
        ("data.disabilities.ADA Accessible", "ada_accessible"),
        ("data.disabilities.ansi usable", "ansi_usable"),
        ("location.address.city", "city"),
        ("location.address.county", "county"),
        ("location.address.line 1", "address_line1"),
        ("location.address.state", "state"),
        ("location.address.zip", "zip_code"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

fn default_null_placeholders() -> IndexMap<String, Vec<String>> {
    IndexMap::from([("data_date".to_string(), vec!["0".to_string()])])
}

impl SourceConfig {
    /// A source with the real-estate defaults.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            table: default_table(),
            primary_key: default_primary_key(),
            columns: default_columns(),
            required_fields: default_required_fields(),
            not_null_fields: default_not_null_fields(),
            numeric_ranges: default_numeric_ranges(),
            column_mapping: default_column_mapping(),
            null_placeholders: default_null_placeholders(),
            delimiter: None,
        }
    }

    /// The staging table this source loads into.
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::new(&self.table, &self.primary_key, self.columns.clone())
    }

    /// Rules in evaluation order: required fields, numeric ranges, null
    /// checks, then key uniqueness.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::new();
        if !self.required_fields.is_empty() {
            rules.push(RequiredFieldRule::new(&self.required_fields));
        }
        for range in &self.numeric_ranges {
            rules.push(NumericRangeRule::new(&range.field, range.min, range.max)?);
        }
        if !self.not_null_fields.is_empty() {
            rules.push(NullSetRule::new(&self.not_null_fields));
        }
        rules.push(UniquenessRule::new(&self.primary_key));
        Ok(rules)
    }

    /// Field delimiter as a byte.
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(StagelineError::InvalidDelimiter(format!(
                "'{}' is not a single-byte character",
                c
            ))),
        }
    }

    /// Check the source before any record is read.
    pub fn validate(&self) -> Result<()> {
        let context =
            |msg: String| StagelineError::Config(format!("source '{}': {}", self.name, msg));

        if self.name.trim().is_empty() {
            return Err(StagelineError::Config("source name is empty".to_string()));
        }
        if !IDENTIFIER.is_match(&self.table) {
            return Err(context(format!("invalid table name '{}'", self.table)));
        }
        if self.columns.is_empty() {
            return Err(context("no columns declared".to_string()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !IDENTIFIER.is_match(&column.name) {
                return Err(context(format!("invalid column name '{}'", column.name)));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(context(format!("column '{}' declared twice", column.name)));
            }
            if column.max_length == Some(0) {
                return Err(context(format!("column '{}' has zero length", column.name)));
            }
        }

        if !seen.contains(self.primary_key.as_str()) {
            return Err(context(format!(
                "primary key '{}' is not a column of '{}'",
                self.primary_key, self.table
            )));
        }

        for target in self.column_mapping.values() {
            if !IDENTIFIER.is_match(target) {
                return Err(context(format!("invalid mapped field name '{}'", target)));
            }
        }

        self.delimiter_byte()?;

        self.rule_set()
            .and_then(|rules| rules.check_fields(|field| seen.contains(field)))
            .map_err(|e| match e {
                StagelineError::Config(msg) => context(msg),
                other => other,
            })
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| StagelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| StagelineError::Config(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// A configuration with one source and default settings.
    pub fn single(source: SourceConfig) -> Self {
        Self {
            defaults: Defaults::default(),
            sources: vec![source],
        }
    }

    /// Check defaults and every source.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.batch_size == 0 {
            return Err(StagelineError::Config("batch_size must be at least 1".to_string()));
        }
        if self.defaults.db_url.trim().is_empty() {
            return Err(StagelineError::Config("db_url is empty".to_string()));
        }
        if self.sources.is_empty() {
            return Err(StagelineError::Config("no sources configured".to_string()));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(StagelineError::Config(format!(
                    "source '{}' is configured twice",
                    source.name
                )));
            }
            source.validate()?;
        }
        Ok(())
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| StagelineError::Config(format!("unknown source '{}'", name)))
    }
}
