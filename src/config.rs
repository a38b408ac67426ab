//! Dashboard configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below.
//!
//! ```json
//! {
//!   "guardrails": { "max_churn_rate": 0.1, "min_engagement_minutes": 30, "min_retention_day7": 0.35 },
//!   "cohort_preview_limit": 50,
//!   "fixtures": { "seed": 42, "kpi_days": 14 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fixtures::{FixtureOptions, MAX_KPI_DAYS};
use crate::guardrail::GuardrailConfig;
use crate::{Error, Result};

/// Rows shown in a cohort table before the export hint.
pub const DEFAULT_COHORT_PREVIEW_LIMIT: usize = 50;

/// Dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Guardrail thresholds applied to variant summaries.
    pub guardrails: GuardrailConfig,
    /// Maximum cohort rows in a table preview.
    pub cohort_preview_limit: usize,
    /// Fixture generation settings used when no snapshot is loaded.
    pub fixtures: FixtureOptions,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            guardrails: GuardrailConfig::default(),
            cohort_preview_limit: DEFAULT_COHORT_PREVIEW_LIMIT,
            fixtures: FixtureOptions::default(),
        }
    }
}

impl DashboardConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the file cannot be read, is not valid
    /// JSON, or fails [`validate`](Self::validate).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;

        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "loaded dashboard config");
        Ok(config)
    }

    /// Parse and validate config JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` on malformed JSON or out-of-range values.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.guardrails.validate()?;

        if self.cohort_preview_limit == 0 {
            return Err(Error::ConfigError(
                "cohort_preview_limit must be greater than 0".to_string(),
            ));
        }

        if self.fixtures.kpi_days == 0 {
            return Err(Error::ConfigError("fixtures.kpi_days must be greater than 0".to_string()));
        }

        if self.fixtures.kpi_days > MAX_KPI_DAYS {
            return Err(Error::ConfigError(format!(
                "fixtures.kpi_days must be at most {MAX_KPI_DAYS}, got {}",
                self.fixtures.kpi_days
            )));
        }

        Ok(())
    }

    /// Replace the guardrail thresholds.
    #[must_use]
    pub const fn with_guardrails(mut self, guardrails: GuardrailConfig) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Set the cohort preview limit.
    #[must_use]
    pub const fn with_cohort_preview_limit(mut self, limit: usize) -> Self {
        self.cohort_preview_limit = limit;
        self
    }

    /// Replace the fixture options.
    #[must_use]
    pub const fn with_fixtures(mut self, fixtures: FixtureOptions) -> Self {
        self.fixtures = fixtures;
        self
    }
}
