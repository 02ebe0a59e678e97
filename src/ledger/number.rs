//! Quote number allocation

use chrono::{DateTime, Utc};

/// Source of candidate quote numbers
///
/// Candidates need not be unique; the ledger retries on collision.
pub trait QuoteNumberSource: Send + Sync {
    /// Produce a candidate number for a quote created at `now`
    fn next_number(&self, now: DateTime<Utc>) -> String;
}

/// `QT-<yyyymmddHHMMSS>-<8 hex chars>` numbers with a random suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNumbers;

impl QuoteNumberSource for TimestampNumbers {
    fn next_number(&self, now: DateTime<Utc>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "QT-{}-{}",
            now.format("%Y%m%d%H%M%S"),
            suffix[..8].to_uppercase()
        )
    }
}
