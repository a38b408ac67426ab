//! Cohort table views
//!
//! Filtering, headline statistics, per-variant breakdowns and bounded
//! previews over per-player cohort records.

use serde::{Deserialize, Serialize};

use crate::experiment::{CohortRecord, ExperimentRecord, Variant};
use crate::metrics::CohortTotals;

/// Row filter for a cohort table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CohortFilter {
    /// Keep only this variant.
    pub variant: Option<Variant>,
    /// Keep players whose ID contains this text (case-insensitive).
    pub player_search: Option<String>,
}

impl CohortFilter {
    /// Filter that keeps every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one variant.
    #[must_use]
    pub const fn variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Restrict to player IDs containing `term`. Blank terms are ignored.
    #[must_use]
    pub fn player_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.player_search = (!term.trim().is_empty()).then(|| term.to_lowercase());
        self
    }

    /// Check a single record.
    #[must_use]
    pub fn matches(&self, cohort: &CohortRecord) -> bool {
        if self.variant.is_some_and(|v| v != cohort.variant()) {
            return false;
        }

        match &self.player_search {
            Some(term) => cohort.player_id().to_lowercase().contains(term.as_str()),
            None => true,
        }
    }

    /// Apply the filter, preserving input order.
    #[must_use]
    pub fn apply<'a, I>(&self, cohorts: I) -> Vec<&'a CohortRecord>
    where
        I: IntoIterator<Item = &'a CohortRecord>,
    {
        cohorts.into_iter().filter(|c| self.matches(c)).collect()
    }
}

/// Headline numbers for a set of cohort rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    /// Rows counted.
    pub total_players: usize,
    /// Players that converted.
    pub converters: usize,
    /// Players retained on day 7.
    pub retained_day7: usize,
    /// Mean spend per player.
    pub avg_spend: f64,
    /// Mean playtime in minutes.
    pub avg_engagement_minutes: f64,
}

/// Compute headline statistics, or `None` for an empty set.
#[must_use]
pub fn cohort_stats<'a, I>(cohorts: I) -> Option<CohortStats>
where
    I: IntoIterator<Item = &'a CohortRecord>,
{
    let totals: CohortTotals = cohorts.into_iter().collect();

    Some(CohortStats {
        total_players: totals.players,
        converters: totals.converters,
        retained_day7: totals.retained_day7,
        avg_spend: totals.average_spend()?,
        avg_engagement_minutes: totals.average_playtime()?,
    })
}

/// Per-variant cohort comparison row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantBreakdown {
    /// Variant label.
    pub variant: Variant,
    /// Players assigned.
    pub players: usize,
    /// Share converted.
    pub conversion_rate: f64,
    /// Share retained on day 7.
    pub retention_rate: f64,
    /// Mean spend.
    pub avg_spend: f64,
    /// Mean playtime in minutes.
    pub avg_engagement_minutes: f64,
}

/// Break cohorts down by the experiment's variants, in declaration order.
///
/// Only records of `experiment` are counted. Variants without any cohort
/// are omitted rather than reported with undefined rates.
#[must_use]
pub fn variant_breakdown<'a, I>(experiment: &ExperimentRecord, cohorts: I) -> Vec<VariantBreakdown>
where
    I: IntoIterator<Item = &'a CohortRecord>,
{
    let variants = experiment.variants();
    let mut totals = vec![CohortTotals::default(); variants.len()];

    for cohort in cohorts {
        if cohort.experiment_id() != experiment.experiment_id() {
            continue;
        }
        if let Some(slot) = variants.iter().position(|&v| v == cohort.variant()) {
            totals[slot].add(cohort);
        }
    }

    variants
        .iter()
        .zip(totals)
        .filter_map(|(&variant, totals)| {
            Some(VariantBreakdown {
                variant,
                players: totals.players,
                conversion_rate: totals.conversion_rate()?,
                retention_rate: totals.retention_day7_rate()?,
                avg_spend: totals.average_spend()?,
                avg_engagement_minutes: totals.average_playtime()?,
            })
        })
        .collect()
}

/// The first rows of a cohort table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPreview<'a> {
    /// Rows shown.
    pub rows: Vec<&'a CohortRecord>,
    /// Rows available before truncation.
    pub total: usize,
    /// Whether rows were cut off.
    pub truncated: bool,
}

/// Take the first `limit` rows.
#[must_use]
pub fn preview<'a>(cohorts: &[&'a CohortRecord], limit: usize) -> CohortPreview<'a> {
    let rows: Vec<&CohortRecord> = cohorts.iter().take(limit).copied().collect();
    CohortPreview {
        truncated: cohorts.len() > rows.len(),
        rows,
        total: cohorts.len(),
    }
}
