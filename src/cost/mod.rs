//! Usage ledger and cost/savings accounting.

pub mod model;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use model::{CostSummary, HourlyBucket, TierUsage, UsageDraft, UsageRecord};
pub use tracker::{CostTracker, start_purger};
