//! Alert rules
//!
//! Each rule scans the record store and describes the notices it wants
//! raised. Delivery to users is done by the engine.

use super::format_currency;
use crate::config::AlertConfig;
use crate::error::Result;
use crate::model::{AlertSeverity, Role};
use crate::storage::Database;
use chrono::{DateTime, Datelike, Duration, Utc};

const MANAGEMENT: &[Role] = &[Role::Admin, Role::Manager];
const SALES_TEAM: &[Role] = &[Role::Admin, Role::Manager, Role::SalesRep];

/// What a rule sees when it runs
pub struct RuleContext<'a> {
    pub db: &'a Database,
    pub config: &'a AlertConfig,
    pub now: DateTime<Utc>,
}

/// An alert to deliver to every user holding one of `audience`
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotice {
    pub alert_type: &'static str,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub audience: &'static [Role],
}

/// Trait for alert rules
pub trait AlertRule: Send + Sync {
    /// Rule name
    fn name(&self) -> &str;

    /// Notices this rule raises against the current data
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<AlertNotice>>;
}

/// Collection of alert rules run together
pub struct AlertRules {
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertRules {
    /// Create the standard rule set
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(HighValueQuoteRule),
                Box::new(RevenueDropRule),
                Box::new(ChurnRiskRule),
            ],
        }
    }

    /// Add a rule to the set
    pub fn with_rule(mut self, rule: impl AlertRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn AlertRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }
}

impl Default for AlertRules {
    fn default() -> Self {
        Self::new()
    }
}

/// Large quotes created within the trailing window
pub struct HighValueQuoteRule;

impl AlertRule for HighValueQuoteRule {
    fn name(&self) -> &str {
        "high_value"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<AlertNotice>> {
        let cutoff = ctx.now - Duration::hours(ctx.config.high_value_window_hours);

        Ok(ctx
            .db
            .list_quotes(None)?
            .into_iter()
            .filter(|q| q.total >= ctx.config.high_value_threshold && q.created_at > cutoff)
            .map(|q| AlertNotice {
                alert_type: "high_value_quote",
                title: "High-Value Quote Created".to_string(),
                message: format!(
                    "Quote {} for {} worth {} has been created!",
                    q.quote_number,
                    q.customer_name,
                    format_currency(q.total)
                ),
                severity: AlertSeverity::Success,
                audience: MANAGEMENT,
            })
            .collect())
    }
}

/// Realized revenue this calendar month against last calendar month
pub struct RevenueDropRule;

impl AlertRule for RevenueDropRule {
    fn name(&self) -> &str {
        "revenue_drop"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<AlertNotice>> {
        let quotes = ctx.db.list_quotes(None)?;
        if quotes.len() < 2 {
            return Ok(Vec::new());
        }

        let today = ctx.now.date_naive();
        let Some(this_month_start) = today.with_day(1) else {
            return Ok(Vec::new());
        };
        let Some(last_month_end) = this_month_start.pred_opt() else {
            return Ok(Vec::new());
        };
        let Some(last_month_start) = last_month_end.with_day(1) else {
            return Ok(Vec::new());
        };

        let mut this_month = 0.0;
        let mut last_month = 0.0;
        for quote in quotes.iter().filter(|q| q.status.is_realized()) {
            let day = quote.created_at.date_naive();
            if day >= this_month_start {
                this_month += quote.total;
            } else if day >= last_month_start && day <= last_month_end {
                last_month += quote.total;
            }
        }

        if last_month <= 0.0 {
            return Ok(Vec::new());
        }

        let drop_percent = (last_month - this_month) / last_month * 100.0;
        if drop_percent <= ctx.config.revenue_drop_percent {
            return Ok(Vec::new());
        }

        Ok(vec![AlertNotice {
            alert_type: "revenue_drop",
            title: "Revenue Drop Detected".to_string(),
            message: format!(
                "Revenue has dropped {:.1}% compared to last month. Please review sales strategy.",
                drop_percent
            ),
            severity: AlertSeverity::Warning,
            audience: MANAGEMENT,
        }])
    }
}

/// Customers with history but no quote in the inactivity window
pub struct ChurnRiskRule;

impl AlertRule for ChurnRiskRule {
    fn name(&self) -> &str {
        "churn_risk"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<AlertNotice>> {
        let cutoff = ctx.now - Duration::days(ctx.config.churn_inactive_days);
        let mut notices = Vec::new();

        for customer in ctx.db.list_customers()? {
            let quotes = ctx.db.quotes_for_customer(customer.id)?;
            if quotes.is_empty() || quotes.iter().any(|q| q.created_at > cutoff) {
                continue;
            }

            notices.push(AlertNotice {
                alert_type: "churn_risk",
                title: format!("Customer At Risk: {}", customer.name),
                message: format!(
                    "Customer {} has had no activity in {} days. Consider outreach.",
                    customer.name, ctx.config.churn_inactive_days
                ),
                severity: AlertSeverity::Danger,
                audience: SALES_TEAM,
            });
        }

        Ok(notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuoteStatus;
    use crate::test_support::{customer, product, quote};
    use chrono::TimeZone;

    fn context<'a>(db: &'a Database, config: &'a AlertConfig, now: DateTime<Utc>) -> RuleContext<'a> {
        RuleContext { db, config, now }
    }

    #[test]
    fn test_high_value_window_and_threshold() {
        let db = Database::open_in_memory().unwrap();
        let config = AlertConfig::default();
        let now = Utc::now();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);

        quote(&db, acme, item, 5_000.0, QuoteStatus::Draft, now - Duration::minutes(5));
        quote(&db, acme, item, 4_999.0, QuoteStatus::Draft, now - Duration::minutes(5));
        quote(&db, acme, item, 9_000.0, QuoteStatus::Sent, now - Duration::hours(2));

        let notices = HighValueQuoteRule
            .evaluate(&context(&db, &config, now))
            .unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("for Acme worth $5,000.00"));
        assert_eq!(notices[0].severity, AlertSeverity::Success);
    }

    #[test]
    fn test_revenue_drop() {
        let db = Database::open_in_memory().unwrap();
        let config = AlertConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);

        let last_month = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap();
        quote(&db, acme, item, 10_000.0, QuoteStatus::Accepted, last_month);
        quote(&db, acme, item, 7_000.0, QuoteStatus::Sent, now);
        quote(&db, acme, item, 50_000.0, QuoteStatus::Draft, now);

        let notices = RevenueDropRule.evaluate(&context(&db, &config, now)).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].message,
            "Revenue has dropped 30.0% compared to last month. Please review sales strategy."
        );
    }

    #[test]
    fn test_no_revenue_drop_without_last_month() {
        let db = Database::open_in_memory().unwrap();
        let config = AlertConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);

        // January is two months back
        quote(&db, acme, item, 10_000.0, QuoteStatus::Accepted, now - Duration::days(60));
        quote(&db, acme, item, 1.0, QuoteStatus::Accepted, now);

        assert!(RevenueDropRule
            .evaluate(&context(&db, &config, now))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_small_drop_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let config = AlertConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);

        // December of the previous year
        quote(&db, acme, item, 10_000.0, QuoteStatus::Accepted, now - Duration::days(30));
        quote(&db, acme, item, 8_500.0, QuoteStatus::Accepted, now);

        assert!(RevenueDropRule
            .evaluate(&context(&db, &config, now))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_churn_risk_requires_history() {
        let db = Database::open_in_memory().unwrap();
        let config = AlertConfig::default();
        let now = Utc::now();
        let item = product(&db, "Widget", 1.0);

        let lapsed = customer(&db, "Lapsed");
        quote(&db, lapsed, item, 100.0, QuoteStatus::Sent, now - Duration::days(91));
        let active = customer(&db, "Active");
        quote(&db, active, item, 100.0, QuoteStatus::Sent, now - Duration::days(91));
        quote(&db, active, item, 100.0, QuoteStatus::Sent, now - Duration::days(3));
        customer(&db, "Prospect");

        let notices = ChurnRiskRule.evaluate(&context(&db, &config, now)).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Customer At Risk: Lapsed");
        assert_eq!(notices[0].audience, SALES_TEAM);
    }
}
