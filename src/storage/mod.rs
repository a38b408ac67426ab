//! Storage backend (Arrow/Parquet)
//!
//! Snapshot layout of a data directory:
//!
//! ```text
//! <dir>/experiments.json   experiment records (JSON array)
//! <dir>/cohorts.parquet    one row per assigned player
//! <dir>/kpis.parquet       one row per (experiment, variant, day)
//! ```
//!
//! Cohort and KPI records are stored column-wise with the fixed schemas
//! from [`cohort_schema`] and [`kpi_schema`]. Loading validates every row
//! through the record builders and the repository's referential checks.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, Date32Array, Float64Array, StringArray, TimestampMillisecondArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use tracing::{debug, info};

use crate::experiment::{
    CohortRecord, ExperimentRecord, ExperimentRepository, KpiRecord, MemoryRepository, Variant,
};
use crate::{Error, Result};

/// Experiment records file inside a snapshot directory.
pub const EXPERIMENTS_FILE: &str = "experiments.json";
/// Cohort table file inside a snapshot directory.
pub const COHORTS_FILE: &str = "cohorts.parquet";
/// KPI table file inside a snapshot directory.
pub const KPIS_FILE: &str = "kpis.parquet";

/// `NaiveDate::num_days_from_ce` of 1970-01-01 (Arrow `Date32` epoch).
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow schema of the cohort table.
#[must_use]
pub fn cohort_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("cohort_id", DataType::Utf8, false),
        Field::new("experiment_id", DataType::Utf8, false),
        Field::new("variant", DataType::Utf8, false),
        Field::new("player_id", DataType::Utf8, false),
        Field::new(
            "assigned_at",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new("retention_day1", DataType::Boolean, false),
        Field::new("retention_day7", DataType::Boolean, false),
        Field::new("retention_day30", DataType::Boolean, false),
        Field::new("converted", DataType::Boolean, false),
        Field::new("total_spend", DataType::Float64, false),
        Field::new("session_count", DataType::UInt32, false),
        Field::new("playtime_minutes", DataType::UInt32, false),
    ]))
}

/// Arrow schema of the KPI table.
#[must_use]
pub fn kpi_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("experiment_id", DataType::Utf8, false),
        Field::new("variant", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("reported_arpdau", DataType::Float64, false),
        Field::new("churn_rate", DataType::Float64, false),
        Field::new("engagement_minutes", DataType::Float64, false),
        Field::new("conversion_rate", DataType::Float64, false),
        Field::new("retention_day7", DataType::Float64, false),
        Field::new("sample_size", DataType::UInt32, false),
    ]))
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Result<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| Error::StorageError(format!("Date32 value {days} out of range")))
}

/// Convert cohort records into a single record batch.
///
/// # Errors
///
/// Returns `Error::Arrow` if the arrays do not match the schema.
pub fn cohorts_to_batch(cohorts: &[CohortRecord]) -> Result<RecordBatch> {
    let strings = |f: fn(&CohortRecord) -> &str| -> StringArray {
        cohorts.iter().map(|c| Some(f(c))).collect()
    };
    let flags = |f: fn(&CohortRecord) -> bool| -> BooleanArray {
        cohorts.iter().map(|c| Some(f(c))).collect()
    };

    let assigned_at: Vec<i64> = cohorts
        .iter()
        .map(|c| c.assigned_at().timestamp_millis())
        .collect();

    let batch = RecordBatch::try_new(
        cohort_schema(),
        vec![
            Arc::new(strings(CohortRecord::cohort_id)),
            Arc::new(strings(CohortRecord::experiment_id)),
            Arc::new(strings(|c: &CohortRecord| c.variant().as_str())),
            Arc::new(strings(CohortRecord::player_id)),
            Arc::new(TimestampMillisecondArray::from(assigned_at).with_timezone("UTC")),
            Arc::new(flags(CohortRecord::retention_day1)),
            Arc::new(flags(CohortRecord::retention_day7)),
            Arc::new(flags(CohortRecord::retention_day30)),
            Arc::new(flags(CohortRecord::converted)),
            Arc::new(Float64Array::from_iter_values(
                cohorts.iter().map(CohortRecord::total_spend),
            )),
            Arc::new(UInt32Array::from_iter_values(
                cohorts.iter().map(CohortRecord::session_count),
            )),
            Arc::new(UInt32Array::from_iter_values(
                cohorts.iter().map(CohortRecord::playtime_minutes),
            )),
        ],
    )?;

    Ok(batch)
}

/// Convert KPI records into a single record batch.
///
/// # Errors
///
/// Returns `Error::Arrow` if the arrays do not match the schema.
pub fn kpis_to_batch(records: &[KpiRecord]) -> Result<RecordBatch> {
    let values = |f: fn(&KpiRecord) -> f64| -> Float64Array {
        Float64Array::from_iter_values(records.iter().map(f))
    };

    let experiment_ids: StringArray = records.iter().map(|k| Some(k.experiment_id())).collect();
    let variants: StringArray = records.iter().map(|k| Some(k.variant().as_str())).collect();

    let batch = RecordBatch::try_new(
        kpi_schema(),
        vec![
            Arc::new(experiment_ids),
            Arc::new(variants),
            Arc::new(Date32Array::from_iter_values(
                records.iter().map(|k| date_to_days(k.date())),
            )),
            Arc::new(values(KpiRecord::reported_arpdau)),
            Arc::new(values(KpiRecord::churn_rate)),
            Arc::new(values(KpiRecord::engagement_minutes)),
            Arc::new(values(KpiRecord::conversion_rate)),
            Arc::new(values(KpiRecord::retention_day7)),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(KpiRecord::sample_size),
            )),
        ],
    )?;

    Ok(batch)
}

/// Look up a non-null column by name and downcast it.
fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::StorageError(format!("Missing column '{name}'")))?;

    if array.null_count() > 0 {
        return Err(Error::StorageError(format!(
            "Column '{name}' contains {} nulls",
            array.null_count()
        )));
    }

    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::StorageError(format!(
            "Column '{name}' has type {}, expected {}",
            array.data_type(),
            std::any::type_name::<T>()
        ))
    })
}

/// Decode cohort records from a batch with the cohort schema.
///
/// # Errors
///
/// Returns `Error::StorageError` for missing, null or mistyped columns, and
/// `Error::InvalidInput` for rows that fail record validation.
pub fn cohorts_from_batch(batch: &RecordBatch) -> Result<Vec<CohortRecord>> {
    let cohort_id = column::<StringArray>(batch, "cohort_id")?;
    let experiment_id = column::<StringArray>(batch, "experiment_id")?;
    let variant = column::<StringArray>(batch, "variant")?;
    let player_id = column::<StringArray>(batch, "player_id")?;
    let assigned_at = column::<TimestampMillisecondArray>(batch, "assigned_at")?;
    let day1 = column::<BooleanArray>(batch, "retention_day1")?;
    let day7 = column::<BooleanArray>(batch, "retention_day7")?;
    let day30 = column::<BooleanArray>(batch, "retention_day30")?;
    let converted = column::<BooleanArray>(batch, "converted")?;
    let spend = column::<Float64Array>(batch, "total_spend")?;
    let sessions = column::<UInt32Array>(batch, "session_count")?;
    let playtime = column::<UInt32Array>(batch, "playtime_minutes")?;

    (0..batch.num_rows())
        .map(|row| {
            let millis = assigned_at.value(row);
            let at = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                Error::StorageError(format!("Timestamp {millis} out of range at row {row}"))
            })?;

            CohortRecord::builder(
                experiment_id.value(row),
                variant.value(row).parse::<Variant>()?,
                player_id.value(row),
                at,
            )
            .cohort_id(cohort_id.value(row))
            .retention(day1.value(row), day7.value(row), day30.value(row))
            .converted(converted.value(row))
            .total_spend(spend.value(row))
            .session_count(sessions.value(row))
            .playtime_minutes(playtime.value(row))
            .build()
        })
        .collect()
}

/// Decode KPI records from a batch with the KPI schema.
///
/// # Errors
///
/// Returns `Error::StorageError` for missing, null or mistyped columns, and
/// `Error::InvalidInput` for unknown variant labels.
pub fn kpis_from_batch(batch: &RecordBatch) -> Result<Vec<KpiRecord>> {
    let experiment_id = column::<StringArray>(batch, "experiment_id")?;
    let variant = column::<StringArray>(batch, "variant")?;
    let date = column::<Date32Array>(batch, "date")?;
    let reported_arpdau = column::<Float64Array>(batch, "reported_arpdau")?;
    let churn = column::<Float64Array>(batch, "churn_rate")?;
    let engagement = column::<Float64Array>(batch, "engagement_minutes")?;
    let conversion = column::<Float64Array>(batch, "conversion_rate")?;
    let retention = column::<Float64Array>(batch, "retention_day7")?;
    let sample_size = column::<UInt32Array>(batch, "sample_size")?;

    (0..batch.num_rows())
        .map(|row| {
            Ok(KpiRecord::builder(
                experiment_id.value(row),
                variant.value(row).parse::<Variant>()?,
                days_to_date(date.value(row))?,
            )
            .reported_arpdau(reported_arpdau.value(row))
            .churn_rate(churn.value(row))
            .engagement_minutes(engagement.value(row))
            .conversion_rate(conversion.value(row))
            .retention_day7(retention.value(row))
            .sample_size(sample_size.value(row))
            .build())
        })
        .collect()
}

/// Write one batch to a Parquet file, replacing any existing file.
///
/// # Errors
///
/// Returns `Error::StorageError` if the file cannot be created or written.
pub fn write_parquet<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::StorageError(format!("Failed to create Parquet file {}: {e}", path.display()))
    })?;

    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).map_err(|e| {
        Error::StorageError(format!("Failed to create Parquet writer: {e}"))
    })?;

    writer
        .write(batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;

    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finalize Parquet file: {e}")))?;

    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet file");
    Ok(())
}

/// Read every record batch of a Parquet file.
///
/// # Errors
///
/// Returns `Error::StorageError` if the file cannot be read or parsed.
pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        Error::StorageError(format!("Failed to parse Parquet file: {e}"))
    })?;

    let reader = builder.build().map_err(|e| {
        Error::StorageError(format!("Failed to create Parquet reader: {e}"))
    })?;

    // Read all batches into memory
    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| {
            Error::StorageError(format!("Failed to read record batch: {e}"))
        })?;
        batches.push(batch);
    }

    Ok(batches)
}

/// Write a repository's contents to a snapshot directory.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub fn save_snapshot<P, R>(dir: P, repo: &R) -> Result<()>
where
    P: AsRef<Path>,
    R: ExperimentRepository + ?Sized,
{
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut experiments = BufWriter::new(File::create(dir.join(EXPERIMENTS_FILE))?);
    serde_json::to_writer_pretty(&mut experiments, repo.experiments())?;
    experiments.flush()?;

    write_parquet(dir.join(COHORTS_FILE), &cohorts_to_batch(repo.cohorts())?)?;
    write_parquet(dir.join(KPIS_FILE), &kpis_to_batch(repo.kpi_records())?)?;

    info!(
        dir = %dir.display(),
        experiments = repo.experiments().len(),
        cohorts = repo.cohorts().len(),
        kpis = repo.kpi_records().len(),
        "saved snapshot"
    );
    Ok(())
}

/// Load a snapshot directory into a [`MemoryRepository`].
///
/// # Errors
///
/// Returns an error if a file is missing or malformed, or if a cohort/KPI
/// row references an unknown experiment or variant.
pub fn load_snapshot<P: AsRef<Path>>(dir: P) -> Result<MemoryRepository> {
    let dir = dir.as_ref();

    let raw = fs::read_to_string(dir.join(EXPERIMENTS_FILE)).map_err(|e| {
        Error::StorageError(format!("Failed to read {EXPERIMENTS_FILE} in {}: {e}", dir.display()))
    })?;
    let experiments: Vec<ExperimentRecord> = serde_json::from_str(&raw)?;

    let mut repo = MemoryRepository::new();
    for experiment in experiments {
        repo.add_experiment(experiment)?;
    }

    for batch in read_parquet(dir.join(COHORTS_FILE))? {
        repo.add_cohorts(cohorts_from_batch(&batch)?)?;
    }
    for batch in read_parquet(dir.join(KPIS_FILE))? {
        repo.add_kpi_records(kpis_from_batch(&batch)?)?;
    }

    info!(
        dir = %dir.display(),
        experiments = repo.experiment_count(),
        cohorts = repo.cohort_count(),
        kpis = repo.kpi_count(),
        "loaded snapshot"
    );
    Ok(repo)
}
