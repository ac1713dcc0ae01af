//! Background workers.

pub mod pattern_refresh;

pub use pattern_refresh::PatternRefreshWorker;
