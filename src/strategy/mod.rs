//! Bidding strategies
//!
//! A strategy is a pure function from (opportunity, campaign snapshot) to a
//! decision. Several implementations coexist behind [`BidStrategy`] and are
//! picked by [`StrategyRouter`] from configuration.

pub mod paced_value;
pub mod router;
pub mod simple_value;
pub mod traits;

pub use paced_value::PacedValueStrategy;
pub use router::{StrategyKind, StrategyRouter};
pub use simple_value::{SimpleValueStrategy, ValueParams};
pub use traits::BidStrategy;
