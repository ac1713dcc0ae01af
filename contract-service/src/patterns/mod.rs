//! Recurring payment detection and liquidity projection.

pub mod detector;
pub mod forecast;
pub mod frequency;
pub mod grouping;
pub mod similarity;

pub use detector::{detect_patterns, lookback_start, DetectedPattern, LOOKBACK_DAYS};
pub use forecast::{project_cash_flows, ProjectedCashFlow};
