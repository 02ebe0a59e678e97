//! Sales analytics
//!
//! Read-only views over the record store. Computations that lack enough
//! history return low-information results rather than errors.

mod anomalies;
mod customers;
mod forecast;

pub use anomalies::{Anomaly, AnomalyKind, AnomalyReport};
pub use customers::{ChurnRisk, Recommendation, Segment, SegmentGroup};
pub use forecast::{
    Confidence, ForecastTrend, LinearFit, RevenueForecast, RevenueTrend, TrendDirection,
    TrendGranularity,
};

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::model::{QuoteStatus, QuoteSummary};
use crate::storage::{Database, ProductSales};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Headline sales metrics
#[derive(Debug, Clone, Serialize)]
pub struct SalesIntelligence {
    pub total_customers: usize,
    pub total_quotes: usize,
    /// Sum of realized quote totals
    pub total_value: f64,
    /// Accepted quotes as a percentage of all quotes
    pub win_rate: f64,
    pub average_deal_size: f64,
    pub top_customers: Vec<CustomerRevenue>,
    /// Realized revenue in the trailing window
    pub recent_value: f64,
    pub recent_window_days: i64,
    pub forecast: RevenueForecast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRevenue {
    pub customer_id: i64,
    pub customer_name: String,
    pub revenue: f64,
}

/// Distribution of realized deal sizes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealAnalysis {
    pub average_deal: f64,
    pub median_deal: f64,
    pub min_deal: f64,
    pub max_deal: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub total_deals: usize,
    pub total_revenue: f64,
    pub deals_above_avg: usize,
    pub deals_below_avg: usize,
}

/// Quote outcome counts and revenue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinMetrics {
    pub total_quotes: usize,
    pub draft_count: usize,
    pub sent_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub win_rate: f64,
    pub accepted_revenue: f64,
    pub sent_revenue: f64,
    pub avg_accepted_value: f64,
}

/// Analytics engine bound to a database and a reference time
pub struct Analytics<'a> {
    db: &'a Database,
    config: &'a AnalyticsConfig,
    now: DateTime<Utc>,
}

impl<'a> Analytics<'a> {
    pub fn new(db: &'a Database, config: &'a AnalyticsConfig) -> Self {
        Self {
            db,
            config,
            now: Utc::now(),
        }
    }

    /// Evaluate trailing windows relative to `now` instead of the wall clock
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn cutoff(&self, days: i64) -> DateTime<Utc> {
        self.now - Duration::days(days)
    }

    /// Summary of the whole book of business
    pub fn sales_intelligence(&self) -> Result<SalesIntelligence> {
        let customers = self.db.list_customers()?;
        let quotes = self.db.list_quotes(None)?;

        let total_value = realized_sum(&quotes);
        let accepted = count_status(&quotes, QuoteStatus::Accepted);
        let win_rate = if quotes.is_empty() {
            0.0
        } else {
            accepted as f64 / quotes.len() as f64 * 100.0
        };

        let recent_cutoff = self.cutoff(self.config.recent_window_days);
        let recent_value = quotes
            .iter()
            .filter(|q| q.created_at > recent_cutoff && q.status.is_realized())
            .map(|q| q.total)
            .sum();

        let mut top_customers = revenue_by_customer(&quotes);
        top_customers.truncate(self.config.top_customers);

        let forecast = self.forecast_revenue(self.config.summary_forecast_days)?;

        Ok(SalesIntelligence {
            total_customers: customers.len(),
            total_quotes: quotes.len(),
            total_value,
            win_rate,
            average_deal_size: total_value / accepted.max(1) as f64,
            top_customers,
            recent_value,
            recent_window_days: self.config.recent_window_days,
            forecast,
        })
    }

    /// Realized quantity, revenue and quote count per product
    pub fn product_performance(&self) -> Result<Vec<ProductSales>> {
        self.db.product_sales()
    }

    /// Statistics over realized quote totals; `None` when there are none
    pub fn deal_analysis(&self) -> Result<Option<DealAnalysis>> {
        let mut amounts: Vec<f64> = self
            .db
            .list_quotes(None)?
            .iter()
            .filter(|q| q.status.is_realized())
            .map(|q| q.total)
            .collect();

        if amounts.is_empty() {
            return Ok(None);
        }

        amounts.sort_by(f64::total_cmp);
        let n = amounts.len();
        let total: f64 = amounts.iter().sum();
        let mean = total / n as f64;
        let median = if n % 2 == 0 {
            (amounts[n / 2 - 1] + amounts[n / 2]) / 2.0
        } else {
            amounts[n / 2]
        };
        let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n as f64;

        Ok(Some(DealAnalysis {
            average_deal: mean,
            median_deal: median,
            min_deal: amounts[0],
            max_deal: amounts[n - 1],
            std_dev: variance.sqrt(),
            total_deals: n,
            total_revenue: total,
            deals_above_avg: amounts.iter().filter(|&&a| a > mean).count(),
            deals_below_avg: amounts.iter().filter(|&&a| a < mean).count(),
        }))
    }

    /// Counts per status and win rate
    pub fn win_metrics(&self) -> Result<WinMetrics> {
        let quotes = self.db.list_quotes(None)?;

        let accepted = count_status(&quotes, QuoteStatus::Accepted);
        let status_sum = |status: QuoteStatus| -> f64 {
            quotes
                .iter()
                .filter(|q| q.status == status)
                .map(|q| q.total)
                .sum()
        };
        let accepted_revenue = status_sum(QuoteStatus::Accepted);

        Ok(WinMetrics {
            total_quotes: quotes.len(),
            draft_count: count_status(&quotes, QuoteStatus::Draft),
            sent_count: count_status(&quotes, QuoteStatus::Sent),
            accepted_count: accepted,
            rejected_count: count_status(&quotes, QuoteStatus::Rejected),
            win_rate: if quotes.is_empty() {
                0.0
            } else {
                accepted as f64 / quotes.len() as f64 * 100.0
            },
            accepted_revenue,
            sent_revenue: status_sum(QuoteStatus::Sent),
            avg_accepted_value: if accepted > 0 {
                accepted_revenue / accepted as f64
            } else {
                0.0
            },
        })
    }
}

fn realized_sum(quotes: &[QuoteSummary]) -> f64 {
    quotes
        .iter()
        .filter(|q| q.status.is_realized())
        .map(|q| q.total)
        .sum()
}

fn count_status(quotes: &[QuoteSummary], status: QuoteStatus) -> usize {
    quotes.iter().filter(|q| q.status == status).count()
}

/// Realized revenue per customer, highest first; ties keep first-seen order
fn revenue_by_customer(quotes: &[QuoteSummary]) -> Vec<CustomerRevenue> {
    let mut totals: Vec<CustomerRevenue> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for quote in quotes.iter().filter(|q| q.status.is_realized()) {
        let slot = *index.entry(quote.customer_id).or_insert_with(|| {
            totals.push(CustomerRevenue {
                customer_id: quote.customer_id,
                customer_name: quote.customer_name.clone(),
                revenue: 0.0,
            });
            totals.len() - 1
        });
        totals[slot].revenue += quote.total;
    }

    totals.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    totals
}
