//! Customer health scoring
//!
//! A health score is a weighted composite of three components, each capped
//! at 100:
//! - engagement: points per quote on record
//! - spend: realized spend against a normalization amount
//! - growth: share of realized spend that falls in the recent window
//!
//! Scores are recomputed on demand and upserted; nothing maintains them
//! incrementally.

use crate::config::HealthConfig;
use crate::error::{Error, Result};
use crate::model::{HealthScore, Quote, RiskLevel};
use crate::storage::Database;
use chrono::{DateTime, Duration, Utc};

/// Score components before persistence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthComponents {
    pub engagement: f64,
    pub spend: f64,
    pub growth: f64,
    pub health: f64,
    pub risk: RiskLevel,
}

impl HealthComponents {
    /// Score a customer's quote history as of `now`
    pub fn from_quotes(quotes: &[Quote], config: &HealthConfig, now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(config.growth_window_days);

        let engagement = (quotes.len() as f64 * config.points_per_quote).min(100.0);

        let realized = quotes.iter().filter(|q| q.status.is_realized());
        let total_spend: f64 = realized.clone().map(|q| q.total).sum();
        let recent_spend: f64 = realized
            .filter(|q| q.created_at > cutoff)
            .map(|q| q.total)
            .sum();

        let spend = (total_spend / config.spend_normalization * 100.0).min(100.0);
        let growth = (recent_spend / (total_spend + 1.0) * 100.0).min(100.0);

        let health = config.engagement_weight * engagement
            + config.spend_weight * spend
            + config.growth_weight * growth;

        Self {
            engagement,
            spend,
            growth,
            health,
            risk: classify(health, config),
        }
    }
}

/// Map a health score to a risk level
pub fn classify(health: f64, config: &HealthConfig) -> RiskLevel {
    if health >= config.low_risk_min {
        RiskLevel::Low
    } else if health >= config.medium_risk_min {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Computes and persists customer health scores
pub struct HealthEngine<'a> {
    db: &'a Database,
    config: &'a HealthConfig,
    now: DateTime<Utc>,
}

impl<'a> HealthEngine<'a> {
    pub fn new(db: &'a Database, config: &'a HealthConfig) -> Self {
        Self {
            db,
            config,
            now: Utc::now(),
        }
    }

    /// Evaluate time windows relative to `now` instead of the wall clock
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Recompute one customer's health score and upsert it
    pub fn compute_health(&self, customer_id: i64) -> Result<HealthScore> {
        let customer = self
            .db
            .get_customer(customer_id)?
            .ok_or_else(|| Error::not_found("customer", customer_id))?;

        let quotes = self.db.quotes_for_customer(customer_id)?;
        let components = HealthComponents::from_quotes(&quotes, self.config, self.now);

        let score = HealthScore {
            customer_id,
            customer_name: Some(customer.name),
            engagement_score: components.engagement,
            spend_score: components.spend,
            growth_score: components.growth,
            health_score: components.health,
            risk_level: components.risk,
            last_calculated: self.now,
        };
        self.db.upsert_health_score(&score)?;

        tracing::debug!(
            "Health of customer {}: {:.1} ({})",
            customer_id,
            score.health_score,
            score.risk_level
        );
        Ok(score)
    }

    /// Recompute every customer's health score
    pub fn compute_health_batch(&self) -> Result<Vec<HealthScore>> {
        let customers = self.db.list_customers()?;
        let mut scores = Vec::with_capacity(customers.len());

        for customer in &customers {
            scores.push(self.compute_health(customer.id)?);
        }

        tracing::info!("Recomputed health scores for {} customer(s)", scores.len());
        Ok(scores)
    }
}
