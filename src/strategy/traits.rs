//! Core strategy trait
//!
//! Defines the common interface that all bidding strategies must implement.

use crate::domain::{CampaignState, Decision, Opportunity};
use crate::error::Result;

/// Core trait that all bidding strategies must implement.
///
/// `decide` is pure computation and must not block. Business conditions map
/// to a no-bid decision with a reason; `Err` is reserved for
/// programmer-error-class failures.
pub trait BidStrategy: Send + Sync {
    /// Unique strategy identifier
    fn id(&self) -> &str;

    /// Decide whether and how much to bid
    fn decide(&self, opportunity: &Opportunity, campaign: &CampaignState) -> Result<Decision>;
}
