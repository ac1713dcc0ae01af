//! Invoice numbering and drafting from billing schedules.

pub mod generator;
pub mod numbering;

pub use generator::{draft_invoices, month_window};
pub use numbering::{has_counter_placeholder, next_number, render_number, AssignedNumber};
