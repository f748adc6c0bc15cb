//! End-to-end tests: file on disk through to the staging store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;

use stageline::persistence::{REJECT_TABLE, count_rows};
use stageline::{Config, Defaults, MemoryReporter, SourceConfig, Stageline};

const HEADER: &str = "data.date,data.owned or leased,data.parking spaces,data.status,data.type,\
location.congressional district,location.id,location.region id,data.disabilities.ADA Accessible,\
data.disabilities.ansi usable,location.address.city,location.address.county,location.address.line 1,\
location.address.state,location.address.zip";

/// One listing row in the real-estate file layout.
fn listing(date: &str, parking: &str, id: &str, city: &str) -> String {
    format!(
        "{},LEASED,{},Active,BUILDING,CT05,{},1,Yes,No,{},Hartford,\"10 Main St, Suite 2\",CT,06103",
        date, parking, id, city
    )
}

fn write_csv(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).expect("Failed to write CSV");
    path
}

fn stageline(dir: &TempDir) -> (Stageline, PathBuf) {
    let db = dir.path().join("staging.db");
    let defaults = Defaults {
        db_url: format!("sqlite://{}", db.display()),
        ..Defaults::default()
    };
    let stageline = Stageline::new(defaults).with_reporter(Arc::new(MemoryReporter::new()));
    (stageline, db)
}

/// 9,129 listings, 5,019 of them with the `0` date placeholder, spread
/// evenly through the file.
fn real_estate_rows() -> Vec<String> {
    const TOTAL: usize = 9129;
    const NULL_DATES: usize = 5019;

    (0..TOTAL)
        .map(|i| {
            let null_date = (i + 1) * NULL_DATES / TOTAL > i * NULL_DATES / TOTAL;
            let date = if null_date { "0" } else { "2021-03-15" };
            listing(date, &(i % 40).to_string(), &format!("CT{:05}", i), "Hartford")
        })
        .collect()
}

// =============================================================================
// Full Load
// =============================================================================

#[test]
fn test_real_estate_load_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "real_estate.csv", &real_estate_rows());
    let source = SourceConfig::new("real_estate", path);
    let (stageline, db) = stageline(&dir);

    let summary = stageline.run(&source).expect("First run failed");
    assert_eq!(summary.input, 9129);
    assert_eq!(summary.accepted, 4110);
    assert_eq!(summary.rejected, 5019);
    assert_eq!(summary.reasons, vec![("NULL value in data_date".to_string(), 5019)]);
    assert_eq!(summary.cleaning.placeholders_nulled, 5019);

    let persisted = summary.persistence.as_ref().unwrap();
    assert!(persisted.is_complete());
    assert_eq!(persisted.inserted, 4110);
    assert_eq!(persisted.appended, 5019);
    // 5 staging batches + 6 reject batches.
    assert_eq!(persisted.batches_committed, 11);

    let conn = Connection::open(&db).unwrap();
    assert_eq!(count_rows(&conn, "stg_real_estate").unwrap(), 4110);
    assert_eq!(count_rows(&conn, REJECT_TABLE).unwrap(), 5019);

    let summary = stageline.run(&source).expect("Second run failed");
    let persisted = summary.persistence.as_ref().unwrap();
    assert_eq!(persisted.inserted, 0);
    assert_eq!(persisted.updated, 4110);

    assert_eq!(count_rows(&conn, "stg_real_estate").unwrap(), 4110);
    assert_eq!(count_rows(&conn, REJECT_TABLE).unwrap(), 10038);
}

#[test]
fn test_staged_values_are_typed() {
    let dir = TempDir::new().unwrap();
    let rows = [listing("03/15/2021", "12.0", " CT00001 ", "Hartford")];
    let path = write_csv(dir.path(), "listings.csv", &rows);
    let (stageline, db) = stageline(&dir);

    stageline.run(&SourceConfig::new("real_estate", path)).unwrap();

    let conn = Connection::open(&db).unwrap();
    let (date, parking, address, zip): (String, i64, String, String) = conn
        .query_row(
            "SELECT data_date, parking_spaces, address_line1, zip_code \
             FROM stg_real_estate WHERE location_id = 'CT00001'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(date, "2021-03-15");
    assert_eq!(parking, 12);
    assert_eq!(address, "10 Main St, Suite 2");
    assert_eq!(zip, "06103");
}

#[test]
fn test_reject_view_expands_payload() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        dir.path(),
        "listings.csv",
        &[listing("2021-01-01", "-3", "CT00001", "Hartford")],
    );
    let (stageline, db) = stageline(&dir);

    stageline.run(&SourceConfig::new("real_estate", path)).unwrap();

    let conn = Connection::open(&db).unwrap();
    let (source, reason, id, parking): (String, String, String, i64) = conn
        .query_row(
            "SELECT source_name, rejection_reason, location_id, parking_spaces \
             FROM v_stg_real_estate_rejects",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(source, "real_estate");
    assert_eq!(reason, "parking_spaces out of range [0, inf]: -3");
    assert_eq!(id, "CT00001");
    assert_eq!(parking, -3);
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn test_duplicates_and_short_circuit() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        dir.path(),
        "listings.csv",
        &[
            listing("2021-01-01", "1", "CT00001", "Hartford"),
            listing("2021-01-01", "-5", "CT00002", ""),
            listing("2021-01-01", "2", "CT00001", "New Haven"),
            listing("2021-01-01", "many", "CT00003", "Hartford"),
        ],
    );
    let (stageline, db) = stageline(&dir);

    let summary = stageline.run(&SourceConfig::new("real_estate", path)).unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 3);

    let conn = Connection::open(&db).unwrap();
    let mut stmt = conn
        .prepare("SELECT rejection_reason FROM stg_rejects ORDER BY id")
        .unwrap();
    let reasons: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        reasons,
        vec![
            "Missing or empty city",
            "duplicate key",
            "Non-numeric parking_spaces: many",
        ]
    );

    let city: String = conn
        .query_row(
            "SELECT city FROM stg_real_estate WHERE location_id = 'CT00001'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(city, "Hartford");
}

#[test]
fn test_header_only_file_is_empty_run() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "empty.csv", &[]);
    let (stageline, db) = stageline(&dir);

    let summary = stageline.run(&SourceConfig::new("real_estate", path)).unwrap();
    assert_eq!(summary.input, 0);
    assert_eq!(summary.success_rate(), 100.0);
    assert_eq!(summary.persistence.as_ref().unwrap().batches_committed, 0);

    let conn = Connection::open(&db).unwrap();
    assert_eq!(count_rows(&conn, "stg_real_estate").unwrap(), 0);
}

#[test]
fn test_tab_separated_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("listings.tsv");
    fs::write(
        &path,
        "location.id\tlocation.address.city\tlocation.address.state\n\
         A1\tHartford\tCT\n\
         A2\t\tCT\n",
    )
    .unwrap();

    let mut source = SourceConfig::new("tsv", path);
    source.not_null_fields.clear();
    let summary = Stageline::new(Defaults::default()).validate(&source).unwrap();

    assert_eq!(summary.file.format, "tsv");
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.reasons, vec![("Missing or empty city".to_string(), 1)]);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_run_from_config_file() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("parcels.csv");
    fs::write(&csv, "Parcel ID,Town,Acres\nP-1,Salem,2.5\nP-2,Salem,-1\nP-3,,4\n").unwrap();

    let db = dir.path().join("db").join("parcels.db");
    let config_path = dir.path().join("sources.json");
    let config = serde_json::json!({
        "defaults": { "db_url": db.display().to_string(), "batch_size": 2 },
        "sources": [{
            "name": "parcels",
            "path": csv.display().to_string(),
            "table": "stg_parcels",
            "primary_key": "parcel_id",
            "columns": [
                { "name": "parcel_id", "type": "string", "max_length": 10 },
                { "name": "town", "type": "string", "max_length": 50 },
                { "name": "acres", "type": "float" }
            ],
            "required_fields": ["parcel_id", "town"],
            "not_null_fields": [],
            "numeric_ranges": [{ "field": "acres", "min": 0 }],
            "column_mapping": {},
            "null_placeholders": {}
        }]
    });
    fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let config = Config::load(&config_path).unwrap();
    let source = config.source("parcels").unwrap();
    let summary = Stageline::new(config.defaults.clone()).run(source).unwrap();

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 2);

    let conn = Connection::open(&db).unwrap();
    let acres: f64 = conn
        .query_row("SELECT acres FROM stg_parcels WHERE parcel_id = 'P-1'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(acres, 2.5);
    let town: Option<String> = conn
        .query_row(
            "SELECT town FROM v_stg_parcels_rejects WHERE parcel_id = 'P-3'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(town, None);
}

#[test]
fn test_unreachable_store_fails_before_reading() {
    let dir = TempDir::new().unwrap();
    let rows = [listing("2021-01-01", "1", "CT1", "Hartford")];
    let path = write_csv(dir.path(), "listings.csv", &rows);
    // A directory cannot be opened as a database.
    let defaults = Defaults {
        db_url: dir.path().display().to_string(),
        ..Defaults::default()
    };

    let err = Stageline::new(defaults)
        .run(&SourceConfig::new("real_estate", path))
        .unwrap_err();
    assert!(matches!(err, stageline::StagelineError::Connection(_)));
}
