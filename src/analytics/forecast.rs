//! Revenue forecasting and trend detection

use super::Analytics;
use crate::error::{Error, Result};
use crate::model::QuoteSummary;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForecastTrend {
    Positive,
    Negative,
    Unknown,
}

/// Extrapolated revenue over a horizon of `days`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueForecast {
    pub days: i64,
    /// Sum of the predicted daily revenue, floored at zero
    pub forecast: f64,
    pub daily_average: f64,
    pub confidence: Confidence,
    pub trend: ForecastTrend,
}

impl RevenueForecast {
    fn insufficient(days: i64) -> Self {
        Self {
            days,
            forecast: 0.0,
            daily_average: 0.0,
            confidence: Confidence::Low,
            trend: ForecastTrend::Unknown,
        }
    }
}

/// Ordinary least-squares line through `(i, ys[i])`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn fit(ys: &[f64]) -> Result<Self> {
        if ys.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "a trend line needs at least 2 points, got {}",
                ys.len()
            )));
        }

        let n = ys.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = ys.iter().sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (i, y) in ys.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxx += dx * dx;
            sxy += dx * (y - y_mean);
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (i, y) in ys.iter().enumerate() {
            let predicted = intercept + slope * i as f64;
            ss_res += (y - predicted).powi(2);
            ss_tot += (y - y_mean).powi(2);
        }

        // a flat series is explained perfectly or not at all
        let r_squared = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(Self {
            slope,
            intercept,
            r_squared,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    Monthly,
    Weekly,
    Daily,
}

/// Direction of realized revenue over time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueTrend {
    pub direction: TrendDirection,
    /// Change of the later half's mean against the earlier half's
    pub trend_percent: f64,
    /// Change of the latest period against the one before it
    pub period_change: f64,
    pub latest_revenue: f64,
    pub previous_revenue: f64,
    pub periods_analyzed: usize,
    pub granularity: TrendGranularity,
}

/// Daily realized revenue keyed by calendar date (UTC)
fn daily_revenue(quotes: &[QuoteSummary]) -> BTreeMap<NaiveDate, f64> {
    let mut days = BTreeMap::new();
    for quote in quotes.iter().filter(|q| q.status.is_realized()) {
        *days.entry(quote.created_at.date_naive()).or_insert(0.0) += quote.total;
    }
    days
}

fn bucket_revenue(quotes: &[QuoteSummary], format: &str) -> Vec<f64> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
    for quote in quotes.iter().filter(|q| q.status.is_realized()) {
        *buckets
            .entry(quote.created_at.format(format).to_string())
            .or_insert(0.0) += quote.total;
    }
    buckets.into_values().collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

impl<'a> Analytics<'a> {
    /// Extrapolate daily realized revenue `days` into the future
    pub fn forecast_revenue(&self, days: i64) -> Result<RevenueForecast> {
        if days < 1 {
            return Err(Error::validation(format!(
                "forecast horizon must be at least 1 day, got {}",
                days
            )));
        }

        let quotes = self.db.list_quotes(None)?;
        if quotes.len() < self.config.forecast_min_quotes {
            return Ok(RevenueForecast::insufficient(days));
        }

        let series: Vec<f64> = daily_revenue(&quotes).into_values().collect();
        if series.len() < self.config.forecast_min_days {
            return Ok(RevenueForecast::insufficient(days));
        }

        let fit = match LinearFit::fit(&series) {
            Ok(fit) => fit,
            Err(e) => {
                tracing::debug!("Forecast skipped: {}", e);
                return Ok(RevenueForecast::insufficient(days));
            }
        };

        let start = series.len();
        let predicted: f64 = (start..start + days as usize)
            .map(|x| fit.predict(x as f64))
            .sum();
        let forecast = predicted.max(0.0);

        let confidence = if fit.r_squared > self.config.high_confidence_r2 {
            Confidence::High
        } else if fit.r_squared > self.config.medium_confidence_r2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Ok(RevenueForecast {
            days,
            forecast,
            daily_average: forecast / days as f64,
            confidence,
            trend: if fit.slope > 0.0 {
                ForecastTrend::Positive
            } else {
                ForecastTrend::Negative
            },
        })
    }

    /// Realized revenue trend by month, or by week or day when history is short
    pub fn revenue_trend(&self) -> Result<RevenueTrend> {
        let quotes = self.db.list_quotes(None)?;

        let mut granularity = TrendGranularity::Monthly;
        let mut revenues = bucket_revenue(&quotes, "%Y-%m");
        if revenues.len() < 2 {
            granularity = TrendGranularity::Weekly;
            revenues = bucket_revenue(&quotes, "%Y-W%U");
        }
        if revenues.len() < 2 {
            granularity = TrendGranularity::Daily;
            revenues = bucket_revenue(&quotes, "%Y-%m-%d");
        }

        if revenues.len() < 2 {
            return Ok(RevenueTrend {
                direction: TrendDirection::Up,
                trend_percent: 0.0,
                period_change: 0.0,
                latest_revenue: revenues.iter().sum(),
                previous_revenue: 0.0,
                periods_analyzed: 1,
                granularity,
            });
        }

        let (earlier, later) = revenues.split_at(revenues.len() / 2);
        let first_half = mean(earlier);
        let second_half = mean(later);

        let latest = revenues[revenues.len() - 1];
        let previous = revenues[revenues.len() - 2];

        Ok(RevenueTrend {
            direction: if second_half > first_half {
                TrendDirection::Up
            } else {
                TrendDirection::Down
            },
            trend_percent: percent_change(first_half, second_half),
            period_change: percent_change(previous, latest),
            latest_revenue: latest,
            previous_revenue: previous,
            periods_analyzed: revenues.len(),
            granularity,
        })
    }
}
