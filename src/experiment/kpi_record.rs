//! KPI Record - daily pre-aggregated metrics per experiment variant

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Variant;

/// KPI Record holds one day of reported metrics for an experiment variant.
///
/// Ratios are stored as reported and are not clamped to `[0, 1]`.
/// `reported_arpdau` is the upstream daily figure; the ARPDAU used for
/// variant comparison is derived from cohorts by [`crate::metrics`].
///
/// ## Partitioning
///
/// - `experiment_id` + `variant` select the arm
/// - `date` orders the time series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiRecord {
    experiment_id: String,
    variant: Variant,
    date: NaiveDate,
    reported_arpdau: f64,
    churn_rate: f64,
    engagement_minutes: f64,
    conversion_rate: f64,
    retention_day7: f64,
    sample_size: u32,
}

impl KpiRecord {
    /// Create a builder for a KPI record. All metric values start at zero.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        variant: Variant,
        date: NaiveDate,
    ) -> KpiRecordBuilder {
        KpiRecordBuilder::new(experiment_id, variant, date)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the variant.
    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Get the calendar day.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Reported average revenue per daily active user for the day.
    #[must_use]
    pub const fn reported_arpdau(&self) -> f64 {
        self.reported_arpdau
    }

    /// Get the churn rate.
    #[must_use]
    pub const fn churn_rate(&self) -> f64 {
        self.churn_rate
    }

    /// Get the average engagement minutes.
    #[must_use]
    pub const fn engagement_minutes(&self) -> f64 {
        self.engagement_minutes
    }

    /// Get the conversion rate.
    #[must_use]
    pub const fn conversion_rate(&self) -> f64 {
        self.conversion_rate
    }

    /// Get the day-7 retention rate.
    #[must_use]
    pub const fn retention_day7(&self) -> f64 {
        self.retention_day7
    }

    /// Get the sample size behind the day's figures.
    #[must_use]
    pub const fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Check whether the record belongs to the given experiment and variant.
    #[must_use]
    pub fn belongs_to(&self, experiment_id: &str, variant: Variant) -> bool {
        self.variant == variant && self.experiment_id == experiment_id
    }
}

/// Builder for `KpiRecord`.
#[derive(Debug)]
pub struct KpiRecordBuilder {
    record: KpiRecord,
}

impl KpiRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, variant: Variant, date: NaiveDate) -> Self {
        Self {
            record: KpiRecord {
                experiment_id: experiment_id.into(),
                variant,
                date,
                reported_arpdau: 0.0,
                churn_rate: 0.0,
                engagement_minutes: 0.0,
                conversion_rate: 0.0,
                retention_day7: 0.0,
                sample_size: 0,
            },
        }
    }

    /// Set the reported ARPDAU.
    #[must_use]
    pub const fn reported_arpdau(mut self, reported_arpdau: f64) -> Self {
        self.record.reported_arpdau = reported_arpdau;
        self
    }

    /// Set the churn rate.
    #[must_use]
    pub const fn churn_rate(mut self, churn_rate: f64) -> Self {
        self.record.churn_rate = churn_rate;
        self
    }

    /// Set engagement minutes.
    #[must_use]
    pub const fn engagement_minutes(mut self, engagement_minutes: f64) -> Self {
        self.record.engagement_minutes = engagement_minutes;
        self
    }

    /// Set the conversion rate.
    #[must_use]
    pub const fn conversion_rate(mut self, conversion_rate: f64) -> Self {
        self.record.conversion_rate = conversion_rate;
        self
    }

    /// Set the day-7 retention rate.
    #[must_use]
    pub const fn retention_day7(mut self, retention_day7: f64) -> Self {
        self.record.retention_day7 = retention_day7;
        self
    }

    /// Set the sample size.
    #[must_use]
    pub const fn sample_size(mut self, sample_size: u32) -> Self {
        self.record.sample_size = sample_size;
        self
    }

    /// Build the `KpiRecord`.
    #[must_use]
    pub fn build(self) -> KpiRecord {
        self.record
    }
}
