//! Inter-rater agreement
//!
//! Builds the per-team rating matrix and delegates the statistics to an
//! external agreement service.

mod calculator;
mod client;

use async_trait::async_trait;

use crate::error::QualitagResult;

pub use calculator::{AgreementCalculator, AgreementMatrix, TeamAgreement};
pub use client::HttpAgreementClient;

/// Nested list sent to the service: one cell per (rater, artifact) pair,
/// each cell the tag values that rater applied
pub type RatingPayload = Vec<Vec<Vec<String>>>;

/// External statistics service
#[async_trait]
pub trait AgreementService: Send + Sync {
    /// Krippendorff's alpha for the payload. `NaN` when undefined.
    async fn krippendorff_alpha(&self, payload: &RatingPayload) -> QualitagResult<f64>;

    /// Merge near-duplicate tag values into canonical ones
    async fn process_tags(&self, values: &[String]) -> QualitagResult<Vec<String>>;
}
