//! QuoteDesk - quoting ledger and sales analytics
//!
//! This library provides the record store for customers, products and quotes,
//! the quote ledger that keeps totals consistent, customer health scoring,
//! sales analytics, rule-based alerts and CSV batch imports.

pub mod alerts;
pub mod analytics;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod ledger;
pub mod model;
pub mod seed;
pub mod storage;

#[cfg(test)]
mod test_support;

/// Re-export commonly used types
pub use alerts::AlertEngine;
pub use analytics::Analytics;
pub use batch::BatchEngine;
pub use config::AppConfig;
pub use health::HealthEngine;
pub use ledger::QuoteLedger;
pub use storage::Database;

/// Library error and result types
pub use error::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "quotedesk";
