//! # Experiment Insights: A/B Test Results for Game Monetization
//!
//! **Version**: 0.1.0
//!
//! Experiment Insights turns per-player cohort records and daily KPI records
//! into the numbers an experiment dashboard shows: per-variant summaries,
//! ARPDAU uplift against the baseline variant, guardrail checks, cohort
//! tables and KPI trends.
//!
//! ## Metric Semantics
//!
//! - **ARPDAU**: total cohort spend divided by players assigned to the variant
//! - **Conversion / D7 retention**: share of assigned players
//! - **Churn**: `1 - D7 retention`, never an independent measurement
//! - **Uplift**: `(treatment - baseline) / baseline * 100` on ARPDAU
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use experiment_insights::Dashboard;
//!
//! // Deterministic demo data, or `.data_dir("snapshot")` for a saved snapshot
//! let dashboard = Dashboard::builder().seed(7).build()?;
//!
//! let report = dashboard.report("exp-001")?;
//! for metrics in &report.variant_metrics {
//!     println!("{}: {:.4} ({})", metrics.variant, metrics.summary.arpdau, metrics.uplift);
//! }
//! # Ok::<(), experiment_insights::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::{Path, PathBuf};

use tracing::info;

pub mod analytics;
pub mod cohort;
pub mod config;
pub mod error;
pub mod experiment;
pub mod export;
pub mod fixtures;
pub mod guardrail;
pub mod metrics;
pub mod report;
pub mod storage;

pub use error::{Error, Result};

use config::DashboardConfig;
use experiment::MemoryRepository;
use report::ExperimentReport;

/// Where dashboard data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Generate deterministic fixtures from the config's fixture options
    Fixtures,
    /// Load a snapshot directory written by [`storage::save_snapshot`]
    Snapshot(PathBuf),
}

/// Loaded dashboard: experiment data plus settings
#[derive(Debug, Clone)]
pub struct Dashboard {
    repo: MemoryRepository,
    config: DashboardConfig,
}

impl Dashboard {
    /// Create a new dashboard builder
    #[must_use]
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::default()
    }

    /// Wrap an already populated repository
    #[must_use]
    pub const fn from_parts(repo: MemoryRepository, config: DashboardConfig) -> Self {
        Self { repo, config }
    }

    /// Get the experiment data
    #[must_use]
    pub const fn repository(&self) -> &MemoryRepository {
        &self.repo
    }

    /// Get the settings
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Build the result view for one experiment
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown experiment ID
    pub fn report(&self, experiment_id: &str) -> Result<ExperimentReport> {
        report::experiment_report(&self.repo, experiment_id)
    }
}

/// Dashboard builder
#[derive(Debug, Default)]
pub struct DashboardBuilder {
    source: Option<DataSource>,
    config: Option<DashboardConfig>,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
}

impl DashboardBuilder {
    /// Set the data source explicitly
    #[must_use]
    pub fn source(mut self, source: DataSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Load data from a snapshot directory
    #[must_use]
    pub fn data_dir(self, dir: impl AsRef<Path>) -> Self {
        self.source(DataSource::Snapshot(dir.as_ref().to_path_buf()))
    }

    /// Use these settings instead of the defaults
    #[must_use]
    pub fn config(mut self, config: DashboardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read settings from a JSON file at build time
    #[must_use]
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the fixture seed
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load settings and data
    ///
    /// A config file takes precedence over [`DashboardBuilder::config`]; the
    /// seed override applies last.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for an unreadable or invalid config, or
    /// a storage error if the snapshot cannot be loaded
    pub fn build(self) -> Result<Dashboard> {
        let mut config = match &self.config_path {
            Some(path) => DashboardConfig::from_json_file(path)?,
            None => self.config.unwrap_or_default(),
        };
        if let Some(seed) = self.seed {
            config.fixtures = config.fixtures.with_seed(seed);
        }
        config.validate()?;

        let repo = match self.source.unwrap_or(DataSource::Fixtures) {
            DataSource::Fixtures => fixtures::generate(&config.fixtures)?,
            DataSource::Snapshot(dir) => storage::load_snapshot(&dir)?,
        };

        info!(
            experiments = repo.experiment_count(),
            cohorts = repo.cohort_count(),
            kpis = repo.kpi_count(),
            "dashboard loaded"
        );

        Ok(Dashboard { repo, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureOptions;
    use chrono::NaiveDate;

    fn small_config() -> DashboardConfig {
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        DashboardConfig::default().with_fixtures(
            FixtureOptions::default()
                .with_as_of(as_of)
                .with_seed(1),
        )
    }

    #[test]
    fn test_builder_defaults_to_fixtures() {
        let dashboard = Dashboard::builder().config(small_config()).build().unwrap();
        assert_eq!(dashboard.repository().experiment_count(), 5);
        assert_eq!(dashboard.config().fixtures.seed, 1);
    }

    #[test]
    fn test_builder_seed_override() {
        let dashboard = Dashboard::builder()
            .config(small_config())
            .seed(99)
            .build()
            .unwrap();
        assert_eq!(dashboard.config().fixtures.seed, 99);
    }

    #[test]
    fn test_builder_missing_snapshot() {
        let result = Dashboard::builder()
            .config(small_config())
            .data_dir("/nonexistent/snapshot")
            .build();
        assert!(matches!(result, Err(Error::StorageError(_))));
    }

    #[test]
    fn test_dashboard_report() {
        let dashboard = Dashboard::builder().config(small_config()).build().unwrap();
        let report = dashboard.report("exp-001").unwrap();
        assert_eq!(report.variant_metrics.len(), 3);
        assert!(dashboard.report("exp-999").is_err());
    }
}
