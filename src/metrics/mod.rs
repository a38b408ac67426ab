//! Aggregate metrics calculator
//!
//! Summarizes cohort and KPI records for one (experiment, variant) pair and
//! compares a treatment summary with the baseline.
//!
//! ## Semantics
//!
//! - Filtering selects records matching both experiment ID and variant
//! - No matching cohorts or KPI records → `None`, never `NaN`
//! - `churn_rate + retention_day7_rate == 1`
//! - Uplift is relative ARPDAU change in percent; a zero or missing
//!   baseline yields [`Uplift::Undefined`] (0 through [`compute_uplift`])
//!
//! All functions are pure over their inputs and safe to call from any
//! number of threads.

mod aggregate;
mod uplift;

pub use aggregate::{compute_aggregate, AggregateSummary, CohortTotals};
pub use uplift::{compute_uplift, uplift, Uplift};
