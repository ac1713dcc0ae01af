//! Contract Service - Contract billing schedules, recurring payment detection
//! and invoice payment matching.

pub mod billing;
pub mod config;
pub mod error;
pub mod invoicing;
pub mod matching;
pub mod models;
pub mod patterns;
pub mod services;
pub mod startup;
pub mod workers;
