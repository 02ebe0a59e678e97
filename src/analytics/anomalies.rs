//! Outlier quotes relative to their customer's usual deal size

use super::Analytics;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    UnusuallyHigh,
    UnusuallyLow,
}

impl AnomalyKind {
    pub fn description(&self) -> &'static str {
        match self {
            AnomalyKind::UnusuallyHigh => "Unusually high value",
            AnomalyKind::UnusuallyLow => "Unusually low value",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            AnomalyKind::UnusuallyHigh => "WARNING",
            AnomalyKind::UnusuallyLow => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub quote_id: i64,
    pub quote_number: String,
    pub amount: f64,
    pub customer_avg: f64,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    /// Set when there was too little history to look for outliers
    pub message: Option<String>,
}

impl<'a> Analytics<'a> {
    /// Flag quotes far above or below their customer's average total
    pub fn detect_anomalies(&self) -> Result<AnomalyReport> {
        let quotes = self.db.list_quotes(None)?;
        if quotes.len() < self.config.anomaly_min_quotes {
            return Ok(AnomalyReport {
                anomalies: Vec::new(),
                message: Some(format!(
                    "Need at least {} quotes",
                    self.config.anomaly_min_quotes
                )),
            });
        }

        let mut sums: HashMap<i64, (f64, usize)> = HashMap::new();
        for quote in &quotes {
            let entry = sums.entry(quote.customer_id).or_insert((0.0, 0));
            entry.0 += quote.total;
            entry.1 += 1;
        }

        let mut anomalies = Vec::new();
        for quote in &quotes {
            let Some(&(sum, count)) = sums.get(&quote.customer_id) else {
                continue;
            };
            let average = sum / count as f64;

            let kind = if quote.total > average * self.config.anomaly_high_multiplier {
                AnomalyKind::UnusuallyHigh
            } else if quote.total < average * self.config.anomaly_low_multiplier
                && quote.total > 0.0
            {
                AnomalyKind::UnusuallyLow
            } else {
                continue;
            };

            anomalies.push(Anomaly {
                quote_id: quote.id,
                quote_number: quote.quote_number.clone(),
                amount: quote.total,
                customer_avg: average,
                kind,
            });
        }

        tracing::debug!("Found {} anomalous quote(s)", anomalies.len());
        Ok(AnomalyReport {
            anomalies,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::model::QuoteStatus;
    use crate::storage::Database;
    use crate::test_support::{customer, product, quote};
    use chrono::Utc;

    #[test]
    fn test_needs_ten_quotes() {
        let db = Database::open_in_memory().unwrap();
        let config = AnalyticsConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        for _ in 0..9 {
            quote(&db, acme, item, 100.0, QuoteStatus::Sent, Utc::now());
        }

        let report = Analytics::new(&db, &config).detect_anomalies().unwrap();
        assert!(report.anomalies.is_empty());
        assert_eq!(report.message.as_deref(), Some("Need at least 10 quotes"));
    }

    #[test]
    fn test_flags_high_and_low_outliers() {
        let db = Database::open_in_memory().unwrap();
        let config = AnalyticsConfig::default();
        let now = Utc::now();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);

        for _ in 0..18 {
            quote(&db, acme, item, 1_000.0, QuoteStatus::Sent, now);
        }
        let high = quote(&db, acme, item, 60_000.0, QuoteStatus::Draft, now);
        let low = quote(&db, acme, item, 10.0, QuoteStatus::Rejected, now);

        let report = Analytics::new(&db, &config).detect_anomalies().unwrap();
        assert!(report.message.is_none());
        assert_eq!(report.anomalies.len(), 2);

        let high_hit = report.anomalies.iter().find(|a| a.quote_id == high).unwrap();
        assert_eq!(high_hit.kind, AnomalyKind::UnusuallyHigh);
        assert_eq!(high_hit.kind.severity(), "WARNING");
        assert!((high_hit.customer_avg - 78_010.0 / 20.0).abs() < 1e-9);

        let low_hit = report.anomalies.iter().find(|a| a.quote_id == low).unwrap();
        assert_eq!(low_hit.kind.description(), "Unusually low value");
    }

    #[test]
    fn test_zero_totals_are_not_low_outliers() {
        let db = Database::open_in_memory().unwrap();
        let config = AnalyticsConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        for _ in 0..10 {
            quote(&db, acme, item, 1_000.0, QuoteStatus::Sent, Utc::now());
        }
        let zero = quote(&db, acme, item, 0.0, QuoteStatus::Draft, Utc::now());

        let report = Analytics::new(&db, &config).detect_anomalies().unwrap();
        assert!(report.anomalies.iter().all(|a| a.quote_id != zero));
    }
}
