//! Cohort Record - per-player outcome row for one experiment variant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Variant;
use crate::{Error, Result};

/// Cohort Record represents one assigned player.
///
/// A player belongs to exactly one variant of exactly one experiment. The
/// retention flags, conversion flag, spend and playtime feed the aggregate
/// calculator in [`crate::metrics`]. Deserialization runs the same
/// validation as the builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawCohortRecord")]
pub struct CohortRecord {
    cohort_id: String,
    experiment_id: String,
    variant: Variant,
    player_id: String,
    assigned_at: DateTime<Utc>,
    retention_day1: bool,
    retention_day7: bool,
    retention_day30: bool,
    converted: bool,
    total_spend: f64,
    session_count: u32,
    playtime_minutes: u32,
}

impl CohortRecord {
    /// Create a builder for a cohort record.
    ///
    /// The cohort ID defaults to `cohort-{player_id}`.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        variant: Variant,
        player_id: impl Into<String>,
        assigned_at: DateTime<Utc>,
    ) -> CohortRecordBuilder {
        CohortRecordBuilder::new(experiment_id, variant, player_id, assigned_at)
    }

    /// Get the cohort row ID.
    #[must_use]
    pub fn cohort_id(&self) -> &str {
        &self.cohort_id
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the assigned variant.
    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Get the player ID.
    #[must_use]
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Get the assignment timestamp.
    #[must_use]
    pub const fn assigned_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }

    /// Whether the player returned on day 1.
    #[must_use]
    pub const fn retention_day1(&self) -> bool {
        self.retention_day1
    }

    /// Whether the player returned on day 7.
    #[must_use]
    pub const fn retention_day7(&self) -> bool {
        self.retention_day7
    }

    /// Whether the player returned on day 30.
    #[must_use]
    pub const fn retention_day30(&self) -> bool {
        self.retention_day30
    }

    /// Whether the player made a purchase.
    #[must_use]
    pub const fn converted(&self) -> bool {
        self.converted
    }

    /// Get cumulative spend.
    #[must_use]
    pub const fn total_spend(&self) -> f64 {
        self.total_spend
    }

    /// Get the number of sessions.
    #[must_use]
    pub const fn session_count(&self) -> u32 {
        self.session_count
    }

    /// Get total playtime in minutes.
    #[must_use]
    pub const fn playtime_minutes(&self) -> u32 {
        self.playtime_minutes
    }

    /// Check whether the record belongs to the given experiment and variant.
    #[must_use]
    pub fn belongs_to(&self, experiment_id: &str, variant: Variant) -> bool {
        self.variant == variant && self.experiment_id == experiment_id
    }
}

#[derive(Deserialize)]
struct RawCohortRecord {
    cohort_id: String,
    experiment_id: String,
    variant: Variant,
    player_id: String,
    assigned_at: DateTime<Utc>,
    retention_day1: bool,
    retention_day7: bool,
    retention_day30: bool,
    converted: bool,
    total_spend: f64,
    session_count: u32,
    playtime_minutes: u32,
}

impl TryFrom<RawCohortRecord> for CohortRecord {
    type Error = Error;

    fn try_from(raw: RawCohortRecord) -> Result<Self> {
        CohortRecordBuilder::new(raw.experiment_id, raw.variant, raw.player_id, raw.assigned_at)
            .cohort_id(raw.cohort_id)
            .retention(raw.retention_day1, raw.retention_day7, raw.retention_day30)
            .converted(raw.converted)
            .total_spend(raw.total_spend)
            .session_count(raw.session_count)
            .playtime_minutes(raw.playtime_minutes)
            .build()
    }
}

/// Builder for `CohortRecord`.
#[derive(Debug)]
pub struct CohortRecordBuilder {
    cohort_id: Option<String>,
    experiment_id: String,
    variant: Variant,
    player_id: String,
    assigned_at: DateTime<Utc>,
    retention_day1: bool,
    retention_day7: bool,
    retention_day30: bool,
    converted: bool,
    total_spend: f64,
    session_count: u32,
    playtime_minutes: u32,
}

impl CohortRecordBuilder {
    /// Create a new builder with required fields. All flags start false and
    /// all counters at zero.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        variant: Variant,
        player_id: impl Into<String>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cohort_id: None,
            experiment_id: experiment_id.into(),
            variant,
            player_id: player_id.into(),
            assigned_at,
            retention_day1: false,
            retention_day7: false,
            retention_day30: false,
            converted: false,
            total_spend: 0.0,
            session_count: 0,
            playtime_minutes: 0,
        }
    }

    /// Set an explicit cohort row ID.
    #[must_use]
    pub fn cohort_id(mut self, cohort_id: impl Into<String>) -> Self {
        self.cohort_id = Some(cohort_id.into());
        self
    }

    /// Set day-1/day-7/day-30 retention flags.
    #[must_use]
    pub const fn retention(mut self, day1: bool, day7: bool, day30: bool) -> Self {
        self.retention_day1 = day1;
        self.retention_day7 = day7;
        self.retention_day30 = day30;
        self
    }

    /// Set the conversion flag.
    #[must_use]
    pub const fn converted(mut self, converted: bool) -> Self {
        self.converted = converted;
        self
    }

    /// Set cumulative spend.
    #[must_use]
    pub const fn total_spend(mut self, total_spend: f64) -> Self {
        self.total_spend = total_spend;
        self
    }

    /// Set the session count.
    #[must_use]
    pub const fn session_count(mut self, session_count: u32) -> Self {
        self.session_count = session_count;
        self
    }

    /// Set playtime minutes.
    #[must_use]
    pub const fn playtime_minutes(mut self, playtime_minutes: u32) -> Self {
        self.playtime_minutes = playtime_minutes;
        self
    }

    /// Build the `CohortRecord`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if spend is negative or not finite.
    pub fn build(self) -> Result<CohortRecord> {
        if !self.total_spend.is_finite() || self.total_spend < 0.0 {
            return Err(Error::InvalidInput(format!(
                "player '{}' has invalid spend {}",
                self.player_id, self.total_spend
            )));
        }

        let cohort_id = self
            .cohort_id
            .unwrap_or_else(|| format!("cohort-{}", self.player_id));

        Ok(CohortRecord {
            cohort_id,
            experiment_id: self.experiment_id,
            variant: self.variant,
            player_id: self.player_id,
            assigned_at: self.assigned_at,
            retention_day1: self.retention_day1,
            retention_day7: self.retention_day7,
            retention_day30: self.retention_day30,
            converted: self.converted,
            total_spend: self.total_spend,
            session_count: self.session_count,
            playtime_minutes: self.playtime_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assigned() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cohort_record_builder() {
        let record = CohortRecord::builder("exp-001", Variant::B, "player-1", assigned())
            .retention(true, true, false)
            .converted(true)
            .total_spend(12.5)
            .session_count(4)
            .playtime_minutes(90)
            .build()
            .unwrap();

        assert_eq!(record.cohort_id(), "cohort-player-1");
        assert_eq!(record.variant(), Variant::B);
        assert!(record.retention_day7());
        assert!(!record.retention_day30());
        assert!((record.total_spend() - 12.5).abs() < f64::EPSILON);
        assert!(record.belongs_to("exp-001", Variant::B));
        assert!(!record.belongs_to("exp-001", Variant::A));
        assert!(!record.belongs_to("exp-002", Variant::B));
    }

    #[test]
    fn test_cohort_record_rejects_negative_spend() {
        let result = CohortRecord::builder("exp-001", Variant::A, "p", assigned())
            .total_spend(-1.0)
            .build();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_cohort_record_rejects_nan_spend() {
        let result = CohortRecord::builder("exp-001", Variant::A, "p", assigned())
            .total_spend(f64::NAN)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_cohort_record_serde_round_trip() {
        let record = CohortRecord::builder("exp-001", Variant::C, "p", assigned())
            .converted(true)
            .total_spend(1.0)
            .build()
            .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: CohortRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_cohort_record_deserialize_rejects_negative_spend() {
        let record = CohortRecord::builder("exp-001", Variant::A, "p", assigned())
            .total_spend(1.0)
            .build()
            .unwrap();
        let json = serde_json::to_string(&record)
            .unwrap()
            .replace("\"total_spend\":1.0", "\"total_spend\":-50.0");
        assert!(json.contains("-50.0"));

        let result = serde_json::from_str::<CohortRecord>(&json);
        assert!(result.is_err());
    }
}
