//! Experiment Record - root entity of the experiment schema

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ExperimentStatus, Variant};
use crate::{Error, Result};

/// Experiment Record represents one A/B experiment.
///
/// Each experiment owns a non-empty list of variants; the first one is the
/// baseline that uplift is measured against. Records are immutable once
/// built. Deserialization runs the same validation as the builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawExperimentRecord")]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    description: String,
    status: ExperimentStatus,
    variants: Vec<Variant>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    sample_size: u32,
    created_at: NaiveDate,
    updated_at: NaiveDate,
}

impl ExperimentRecord {
    /// Create a builder for an experiment record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Unique identifier for the experiment
    /// * `name` - Human-readable name for the experiment
    /// * `start_date` - First day of player assignment
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
    ) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id, name, start_date)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the experiment description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the variant labels, baseline first.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Get the baseline (control) variant.
    #[must_use]
    pub fn baseline(&self) -> Variant {
        // build() rejects empty variant lists
        self.variants[0]
    }

    /// Check whether the experiment includes `variant`.
    #[must_use]
    pub fn has_variant(&self, variant: Variant) -> bool {
        self.variants.contains(&variant)
    }

    /// Get the start date.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Get the end date, if the experiment has ended.
    #[must_use]
    pub const fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// Get the target sample size.
    #[must_use]
    pub const fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Get the creation date.
    #[must_use]
    pub const fn created_at(&self) -> NaiveDate {
        self.created_at
    }

    /// Get the last update date.
    #[must_use]
    pub const fn updated_at(&self) -> NaiveDate {
        self.updated_at
    }
}

#[derive(Deserialize)]
struct RawExperimentRecord {
    experiment_id: String,
    name: String,
    #[serde(default)]
    description: String,
    status: ExperimentStatus,
    variants: Vec<Variant>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    sample_size: u32,
    created_at: NaiveDate,
    updated_at: NaiveDate,
}

impl TryFrom<RawExperimentRecord> for ExperimentRecord {
    type Error = Error;

    fn try_from(raw: RawExperimentRecord) -> Result<Self> {
        let mut builder = ExperimentRecordBuilder::new(raw.experiment_id, raw.name, raw.start_date)
            .description(raw.description)
            .status(raw.status)
            .variants(raw.variants)
            .sample_size(raw.sample_size)
            .created_at(raw.created_at)
            .updated_at(raw.updated_at);
        if let Some(end) = raw.end_date {
            builder = builder.end_date(end);
        }
        builder.build()
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    experiment_id: String,
    name: String,
    description: String,
    status: ExperimentStatus,
    variants: Vec<Variant>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    sample_size: u32,
    created_at: Option<NaiveDate>,
    updated_at: Option<NaiveDate>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    ///
    /// Defaults: status `Draft`, variants `[A, B]`, no end date, sample size 0.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            description: String::new(),
            status: ExperimentStatus::Draft,
            variants: vec![Variant::A, Variant::B],
            start_date,
            end_date: None,
            sample_size: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the lifecycle status.
    #[must_use]
    pub const fn status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the variant labels (baseline first).
    #[must_use]
    pub fn variants(mut self, variants: impl Into<Vec<Variant>>) -> Self {
        self.variants = variants.into();
        self
    }

    /// Set the end date.
    #[must_use]
    pub const fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Set the target sample size.
    #[must_use]
    pub const fn sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the creation date (defaults to the start date).
    #[must_use]
    pub const fn created_at(mut self, created_at: NaiveDate) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Set the last update date (defaults to the creation date).
    #[must_use]
    pub const fn updated_at(mut self, updated_at: NaiveDate) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Build the `ExperimentRecord`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the ID is blank, the variant list is
    /// empty or has duplicates, or the end date precedes the start date.
    pub fn build(self) -> Result<ExperimentRecord> {
        if self.experiment_id.trim().is_empty() {
            return Err(Error::InvalidInput("experiment id must not be empty".to_string()));
        }

        if self.variants.is_empty() {
            return Err(Error::InvalidInput(format!(
                "experiment '{}' must have at least one variant",
                self.experiment_id
            )));
        }

        let mut seen = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            if seen.contains(variant) {
                return Err(Error::InvalidInput(format!(
                    "experiment '{}' lists variant {variant} twice",
                    self.experiment_id
                )));
            }
            seen.push(*variant);
        }

        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(Error::InvalidInput(format!(
                    "experiment '{}' ends ({end}) before it starts ({})",
                    self.experiment_id, self.start_date
                )));
            }
        }

        let created_at = self.created_at.unwrap_or(self.start_date);
        Ok(ExperimentRecord {
            experiment_id: self.experiment_id,
            name: self.name,
            description: self.description,
            status: self.status,
            variants: self.variants,
            start_date: self.start_date,
            end_date: self.end_date,
            sample_size: self.sample_size,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        })
    }
}
