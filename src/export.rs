//! Tabular and JSON export
//!
//! CSV writers for the cohort table and the variant comparison, plus JSON
//! rendering of a full experiment report.

use std::io::Write;

use chrono::{NaiveDate, SecondsFormat};

use crate::experiment::CohortRecord;
use crate::report::ExperimentReport;
use crate::Result;

/// Column headers of the cohort CSV.
pub const COHORT_CSV_HEADER: [&str; 8] = [
    "Player ID",
    "Variant",
    "Assigned At",
    "D1 Retention",
    "D7 Retention",
    "Converted",
    "Total Spend",
    "Sessions",
];

/// Column headers of the variant metrics CSV.
pub const VARIANT_CSV_HEADER: [&str; 8] = [
    "Variant",
    "Sample Size",
    "ARPDAU",
    "Conversion Rate",
    "D7 Retention",
    "Churn Rate",
    "Engagement Minutes",
    "Uplift %",
];

const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Write cohort rows as CSV.
///
/// Flags render as `Yes`/`No`, spend with two decimals and timestamps as
/// RFC 3339.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn cohorts_csv<'a, W, I>(writer: W, cohorts: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a CohortRecord>,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(COHORT_CSV_HEADER)?;

    for cohort in cohorts {
        csv.write_record([
            cohort.player_id(),
            cohort.variant().as_str(),
            cohort
                .assigned_at()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_str(),
            yes_no(cohort.retention_day1()),
            yes_no(cohort.retention_day7()),
            yes_no(cohort.converted()),
            format!("{:.2}", cohort.total_spend()).as_str(),
            cohort.session_count().to_string().as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the variant comparison of a report as CSV.
///
/// Undefined uplift is written as an empty cell.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn variant_metrics_csv<W: Write>(writer: W, report: &ExperimentReport) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(VARIANT_CSV_HEADER)?;

    for metrics in &report.variant_metrics {
        let s = &metrics.summary;
        csv.write_record([
            metrics.variant.as_str(),
            s.sample_size.to_string().as_str(),
            format!("{:.4}", s.arpdau).as_str(),
            format!("{:.4}", s.conversion_rate).as_str(),
            format!("{:.4}", s.retention_day7_rate).as_str(),
            format!("{:.4}", s.churn_rate).as_str(),
            format!("{:.2}", s.engagement_minutes).as_str(),
            metrics
                .uplift
                .percent()
                .map_or_else(String::new, |p| format!("{p:.2}"))
                .as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Download file name for a cohort export: `cohorts-{experiment}-{date}.csv`.
#[must_use]
pub fn cohort_export_file_name(experiment_id: &str, date: NaiveDate) -> String {
    format!("cohorts-{experiment_id}-{}.csv", date.format("%Y-%m-%d"))
}

/// Render a report as pretty-printed JSON.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
pub fn report_json(report: &ExperimentReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
