//! Adcaster - multi-tenant social media ad automation
//!
//! This library provides the core of the ad pipeline: product catalogs,
//! metered usage with prepaid balances, AI-assisted content assembly,
//! platform adapters, a schedule daemon, and engagement reporting.

pub mod analytics;
pub mod billing;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod generator;
pub mod logging;
pub mod platforms;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use billing::{BillingRates, UsageLedger};
pub use config::Config;
pub use db::Database;
pub use error::{AdcasterError, Result};
pub use scheduler::{ScheduleOutcome, SchedulerState, TickSummary};
pub use types::{AdFormat, Plan, Post, Product, ScheduleEntry, ScheduleStatus, Tenant};
