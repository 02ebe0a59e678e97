//! Alert rule engine
//!
//! Rules are stateless scans invoked on demand. Every notice a rule raises is
//! delivered as one alert per user in the rule's audience. Re-running a check
//! while its condition still holds raises the alert again.

mod rules;

pub use rules::{
    AlertNotice, AlertRule, AlertRules, ChurnRiskRule, HighValueQuoteRule, RevenueDropRule,
    RuleContext,
};

use crate::config::AlertConfig;
use crate::error::{Error, Result};
use crate::model::{AlertSeverity, QuoteStatus, Role};
use crate::storage::Database;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of running one rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub alert_ids: Vec<i64>,
    /// Set when the rule failed; other rules still run
    pub error: Option<String>,
}

/// Format an amount as dollars with thousands separators, e.g. `$12,345.60`
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Runs alert rules and fans notices out to users
pub struct AlertEngine<'a> {
    db: &'a Database,
    config: &'a AlertConfig,
    rules: AlertRules,
    now: DateTime<Utc>,
}

impl<'a> AlertEngine<'a> {
    pub fn new(db: &'a Database, config: &'a AlertConfig) -> Self {
        Self {
            db,
            config,
            rules: AlertRules::new(),
            now: Utc::now(),
        }
    }

    /// Replace the rule set
    pub fn with_rules(mut self, rules: AlertRules) -> Self {
        self.rules = rules;
        self
    }

    /// Evaluate windows relative to `now` instead of the wall clock
    pub fn as_of(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn context(&self) -> RuleContext<'_> {
        RuleContext {
            db: self.db,
            config: self.config,
            now: self.now,
        }
    }

    /// Run one rule and deliver its notices; returns the created alert ids
    pub fn run_rule(&self, rule: &dyn AlertRule) -> Result<Vec<i64>> {
        let notices = rule.evaluate(&self.context())?;

        let mut alert_ids = Vec::new();
        for notice in &notices {
            alert_ids.extend(self.deliver(notice)?);
        }

        if !alert_ids.is_empty() {
            tracing::info!(
                "Rule {} raised {} notice(s), {} alert(s)",
                rule.name(),
                notices.len(),
                alert_ids.len()
            );
        }
        Ok(alert_ids)
    }

    pub fn check_high_value_quotes(&self) -> Result<Vec<i64>> {
        self.run_rule(&HighValueQuoteRule)
    }

    pub fn check_revenue_drop(&self) -> Result<Vec<i64>> {
        self.run_rule(&RevenueDropRule)
    }

    pub fn check_churn_risk(&self) -> Result<Vec<i64>> {
        self.run_rule(&ChurnRiskRule)
    }

    /// Run every rule; a failing rule is reported and the rest still run
    pub fn run_all_checks(&self) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .map(|rule| match self.run_rule(rule) {
                Ok(alert_ids) => RuleOutcome {
                    rule: rule.name().to_string(),
                    alert_ids,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Alert rule {} failed: {}", rule.name(), e);
                    RuleOutcome {
                        rule: rule.name().to_string(),
                        alert_ids: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Alert management that a quote moved to `status`
    ///
    /// Only sent, accepted and rejected raise alerts.
    pub fn notify_status_change(&self, quote_id: i64, status: QuoteStatus) -> Result<Vec<i64>> {
        let quote = self
            .db
            .get_quote(quote_id)?
            .ok_or_else(|| Error::not_found("quote", quote_id))?;
        let customer = self
            .db
            .get_customer(quote.customer_id)?
            .ok_or_else(|| Error::not_found("customer", quote.customer_id))?;

        let (message, severity) = match status {
            QuoteStatus::Sent => (
                format!("Quote {} for {} has been sent!", quote.quote_number, customer.name),
                AlertSeverity::Info,
            ),
            QuoteStatus::Accepted => (
                format!("Quote {} from {} has been accepted!", quote.quote_number, customer.name),
                AlertSeverity::Success,
            ),
            QuoteStatus::Rejected => (
                format!("Quote {} from {} has been rejected.", quote.quote_number, customer.name),
                AlertSeverity::Danger,
            ),
            QuoteStatus::Draft => return Ok(Vec::new()),
        };

        self.deliver(&AlertNotice {
            alert_type: "quote_status_change",
            title: format!("Quote Status: {}", status.as_str().to_uppercase()),
            message,
            severity,
            audience: &[Role::Admin, Role::Manager],
        })
    }

    fn deliver(&self, notice: &AlertNotice) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for user in self.db.users_with_roles(notice.audience)? {
            ids.push(self.db.create_alert(
                user.id,
                notice.alert_type,
                &notice.title,
                &notice.message,
                notice.severity,
            )?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, product, quote};
    use chrono::Duration;

    struct FailingRule;

    impl AlertRule for FailingRule {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<Vec<AlertNotice>> {
            Err(Error::validation("broken rule"))
        }
    }

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("admin", "admin@example.com", Role::Admin).unwrap();
        db.create_user("manager", "manager@example.com", Role::Manager).unwrap();
        db.create_user("rep", "rep@example.com", Role::SalesRep).unwrap();
        db.create_user("viewer", "viewer@example.com", Role::Viewer).unwrap();
        db
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.5), "$999.50");
        assert_eq!(format_currency(5_000.0), "$5,000.00");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.0), "-$42.00");
    }

    #[test]
    fn test_high_value_alert_fans_out_to_management() {
        let db = setup();
        let config = AlertConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        quote(&db, acme, item, 12_000.0, QuoteStatus::Draft, Utc::now());

        let ids = AlertEngine::new(&db, &config)
            .check_high_value_quotes()
            .unwrap();
        assert_eq!(ids.len(), 2);

        let alerts = db.list_alerts().unwrap();
        assert!(alerts.iter().all(|a| a.alert_type == "high_value_quote"));
        assert!(alerts[0].message.contains("$12,000.00"));
    }

    #[test]
    fn test_churn_alert_reaches_sales_reps() {
        let db = setup();
        let config = AlertConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        quote(&db, acme, item, 100.0, QuoteStatus::Sent, Utc::now() - Duration::days(120));

        let ids = AlertEngine::new(&db, &config).check_churn_risk().unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_repeated_checks_duplicate_alerts() {
        let db = setup();
        let config = AlertConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        quote(&db, acme, item, 100.0, QuoteStatus::Sent, Utc::now() - Duration::days(120));

        let engine = AlertEngine::new(&db, &config);
        engine.check_churn_risk().unwrap();
        engine.check_churn_risk().unwrap();
        assert_eq!(db.list_alerts().unwrap().len(), 6);
    }

    #[test]
    fn test_status_change_alerts() {
        let db = setup();
        let config = AlertConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        let id = quote(&db, acme, item, 100.0, QuoteStatus::Accepted, Utc::now());
        let engine = AlertEngine::new(&db, &config);

        let ids = engine.notify_status_change(id, QuoteStatus::Accepted).unwrap();
        assert_eq!(ids.len(), 2);
        let alert = &db.list_alerts().unwrap()[0];
        assert_eq!(alert.title, "Quote Status: ACCEPTED");
        assert_eq!(alert.severity, AlertSeverity::Success);
        assert!(alert.message.ends_with("from Acme has been accepted!"));

        assert!(engine
            .notify_status_change(id, QuoteStatus::Draft)
            .unwrap()
            .is_empty());
        assert!(matches!(
            engine.notify_status_change(999, QuoteStatus::Sent),
            Err(Error::NotFound { entity: "quote", .. })
        ));
    }

    #[test]
    fn test_failing_rule_does_not_stop_others() {
        let db = setup();
        let config = AlertConfig::default();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        quote(&db, acme, item, 100.0, QuoteStatus::Sent, Utc::now() - Duration::days(120));

        let outcomes = AlertEngine::new(&db, &config)
            .with_rules(AlertRules::new().with_rule(FailingRule))
            .run_all_checks();

        assert_eq!(outcomes.len(), 4);
        let churn = outcomes.iter().find(|o| o.rule == "churn_risk").unwrap();
        assert_eq!(churn.alert_ids.len(), 3);
        let failing = outcomes.iter().find(|o| o.rule == "failing").unwrap();
        assert!(failing.error.as_deref().unwrap().contains("broken rule"));
    }
}
