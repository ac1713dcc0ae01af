//! Contract billing: price resolution, billing and recognition schedules,
//! contract term helpers and revenue aggregation.

pub mod forecast;
pub mod period;
pub mod price;
pub mod schedule;
pub mod temporal;

pub use price::{resolve_monthly_price, resolve_price, ResolvedPrice};
pub use schedule::{
    generate_schedule, ContractBundle, ScheduleAnchor, ScheduleEvent, ScheduleLine,
    ScheduleWindow,
};
