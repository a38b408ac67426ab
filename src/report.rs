//! Experiment reports
//!
//! Assembles the views a request-serving layer returns: the per-experiment
//! result (variant summaries, uplift against the baseline, daily series) and
//! the dashboard overview of all experiments.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::{experiment_time_series, ExperimentTimeSeries};
use crate::experiment::{ExperimentRecord, ExperimentRepository, ExperimentStatus, Variant};
use crate::guardrail::{GuardrailConfig, GuardrailReport};
use crate::metrics::{compute_aggregate, uplift, AggregateSummary, Uplift};
use crate::{Error, Result};

/// Summary and uplift of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    /// Variant label.
    pub variant: Variant,
    /// Aggregate summary.
    #[serde(flatten)]
    pub summary: AggregateSummary,
    /// ARPDAU uplift versus the experiment baseline.
    pub uplift: Uplift,
}

/// Full result view for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// The experiment.
    pub experiment: ExperimentRecord,
    /// Baseline variant uplift is measured against.
    pub baseline: Variant,
    /// Variants with enough data, in declaration order.
    pub variant_metrics: Vec<VariantMetrics>,
    /// Declared variants lacking cohort or KPI data.
    pub missing_variants: Vec<Variant>,
    /// Daily KPI series.
    pub time_series: ExperimentTimeSeries,
}

impl ExperimentReport {
    /// Metrics for one variant, if it had data.
    #[must_use]
    pub fn variant(&self, variant: Variant) -> Option<&VariantMetrics> {
        self.variant_metrics.iter().find(|m| m.variant == variant)
    }

    /// Non-baseline variant with the highest defined uplift.
    #[must_use]
    pub fn best_treatment(&self) -> Option<&VariantMetrics> {
        self.variant_metrics
            .iter()
            .filter(|m| m.variant != self.baseline)
            .filter_map(|m| m.uplift.percent().map(|p| (m, p)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(m, _)| m)
    }

    /// Evaluate guardrails for every reported variant.
    #[must_use]
    pub fn guardrails(&self, config: &GuardrailConfig) -> Vec<(Variant, GuardrailReport)> {
        self.variant_metrics
            .iter()
            .map(|m| (m.variant, config.evaluate(&m.summary)))
            .collect()
    }
}

/// Build the result view for one experiment.
///
/// Every declared variant is summarized; the baseline is the experiment's
/// first variant. Variants without data are listed in `missing_variants`
/// and, when the baseline itself is missing, every uplift is
/// `Uplift::Undefined`.
///
/// # Errors
///
/// Returns `Error::NotFound` if no experiment has the given ID.
pub fn experiment_report<R>(repo: &R, experiment_id: &str) -> Result<ExperimentReport>
where
    R: ExperimentRepository + ?Sized,
{
    let experiment = repo
        .experiment(experiment_id)
        .ok_or_else(|| Error::NotFound(format!("experiment '{experiment_id}'")))?;

    let cohorts = repo.cohorts_for(experiment_id);
    let kpis = repo.kpis_for(experiment_id);

    let summaries: Vec<(Variant, Option<AggregateSummary>)> = experiment
        .variants()
        .iter()
        .map(|&variant| {
            let summary = compute_aggregate(
                experiment_id,
                variant,
                cohorts.iter().copied(),
                kpis.iter().copied(),
            );
            (variant, summary)
        })
        .collect();

    let baseline = experiment.baseline();
    let baseline_summary = summaries
        .iter()
        .find(|(variant, _)| *variant == baseline)
        .and_then(|(_, summary)| summary.as_ref());

    let mut variant_metrics = Vec::with_capacity(summaries.len());
    let mut missing_variants = Vec::new();
    for (variant, summary) in &summaries {
        match summary {
            Some(summary) => variant_metrics.push(VariantMetrics {
                variant: *variant,
                summary: *summary,
                uplift: uplift(Some(summary), baseline_summary),
            }),
            None => missing_variants.push(*variant),
        }
    }

    if !missing_variants.is_empty() {
        warn!(
            experiment_id,
            missing = ?missing_variants,
            "variants without enough data for a summary"
        );
    }
    debug!(
        experiment_id,
        variants = variant_metrics.len(),
        "built experiment report"
    );

    Ok(ExperimentReport {
        experiment: experiment.clone(),
        baseline,
        variant_metrics,
        missing_variants,
        time_series: experiment_time_series(kpis),
    })
}

/// Experiment counts for the dashboard landing view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardOverview {
    /// All experiments.
    pub total: usize,
    /// Draft experiments.
    pub draft: usize,
    /// Running experiments.
    pub running: usize,
    /// Paused experiments.
    pub paused: usize,
    /// Completed experiments.
    pub completed: usize,
    /// Summed target sample size of running experiments.
    pub active_sample_size: u64,
}

/// Count experiments by status.
#[must_use]
pub fn dashboard_overview<R>(repo: &R) -> DashboardOverview
where
    R: ExperimentRepository + ?Sized,
{
    repo.experiments()
        .iter()
        .fold(DashboardOverview::default(), |mut overview, experiment| {
            overview.total += 1;
            match experiment.status() {
                ExperimentStatus::Draft => overview.draft += 1,
                ExperimentStatus::Running => {
                    overview.running += 1;
                    overview.active_sample_size += u64::from(experiment.sample_size());
                }
                ExperimentStatus::Paused => overview.paused += 1,
                ExperimentStatus::Completed => overview.completed += 1,
            }
            overview
        })
}
