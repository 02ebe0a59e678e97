//! Per-customer analytics: churn risk, lifetime value, segments, recommendations

use super::Analytics;
use crate::error::{Error, Result};
use crate::model::{Customer, Quote, QuoteStatus};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Rule-based churn estimate for one customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnRisk {
    pub customer_id: i64,
    pub customer_name: String,
    /// 0 (safe) to 100 (likely lost)
    pub risk: u8,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Segment {
    #[serde(rename = "VIP")]
    Vip,
    Growth,
    Active,
    Inactive,
}

impl Segment {
    /// Segments in priority order
    pub const ALL: [Segment; 4] = [
        Segment::Vip,
        Segment::Growth,
        Segment::Active,
        Segment::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Vip => "VIP",
            Segment::Growth => "Growth",
            Segment::Active => "Active",
            Segment::Inactive => "Inactive",
        }
    }

    /// Suggested sales action for the segment
    pub fn action(&self) -> &'static str {
        match self {
            Segment::Vip => "Premium support, upsell",
            Segment::Growth => "Nurture, expand",
            Segment::Active => "Regular engagement",
            Segment::Inactive => "Reactivation campaign",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentGroup {
    pub segment: Segment,
    pub customers: Vec<i64>,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    /// Number of similar customers' line items naming the product
    pub score: usize,
    pub reason: String,
}

fn realized_total(quotes: &[Quote]) -> f64 {
    quotes
        .iter()
        .filter(|q| q.status.is_realized())
        .map(|q| q.total)
        .sum()
}

impl<'a> Analytics<'a> {
    fn require_customer(&self, customer_id: i64) -> Result<Customer> {
        self.db
            .get_customer(customer_id)?
            .ok_or_else(|| Error::not_found("customer", customer_id))
    }

    /// Estimate how likely a customer is to stop buying
    pub fn predict_churn_risk(&self, customer_id: i64) -> Result<ChurnRisk> {
        let customer = self.require_customer(customer_id)?;
        let quotes = self.db.quotes_for_customer(customer_id)?;

        let (risk, reason) = self.churn_ladder(&quotes);
        Ok(ChurnRisk {
            customer_id,
            customer_name: customer.name,
            risk,
            reason: reason.to_string(),
        })
    }

    fn churn_ladder(&self, quotes: &[Quote]) -> (u8, &'static str) {
        if quotes.len() < 2 {
            return (30, "New customer - limited history");
        }

        let cutoff = self.cutoff(self.config.activity_window_days);
        let recent: Vec<&Quote> = quotes.iter().filter(|q| q.created_at > cutoff).collect();
        if recent.is_empty() {
            return (85, "No activity in 90 days");
        }

        let recent_total: f64 = recent.iter().map(|q| q.total).sum();
        let all_total: f64 = quotes.iter().map(|q| q.total).sum();
        let ratio = recent_total / (all_total + 1.0);

        if ratio < 0.2 {
            (60, "Declining engagement")
        } else if ratio < 0.5 {
            (40, "Moderate activity")
        } else {
            (15, "Strong engagement")
        }
    }

    /// Customers whose churn risk exceeds the reporting cut-off, riskiest first
    pub fn churn_overview(&self) -> Result<Vec<ChurnRisk>> {
        let mut at_risk = Vec::new();
        for customer in self.db.list_customers()? {
            let churn = self.predict_churn_risk(customer.id)?;
            if churn.risk > self.config.churn_report_cutoff {
                at_risk.push(churn);
            }
        }

        at_risk.sort_by(|a, b| b.risk.cmp(&a.risk));
        Ok(at_risk)
    }

    /// Realized value plus a three-year projection of the quarterly average
    pub fn calculate_clv(&self, customer_id: i64) -> Result<f64> {
        self.require_customer(customer_id)?;
        let quotes = self.db.quotes_for_customer(customer_id)?;
        if quotes.is_empty() {
            return Ok(0.0);
        }

        let total = realized_total(&quotes);
        let avg_quarterly = total / (quotes.len() as f64 / 4.0).max(1.0);
        Ok(total + avg_quarterly * 4.0 * 3.0)
    }

    /// Segment one customer by value, acceptance and recency
    pub fn segment_of(&self, customer_id: i64) -> Result<Segment> {
        self.require_customer(customer_id)?;
        let quotes = self.db.quotes_for_customer(customer_id)?;
        Ok(self.classify_segment(&quotes))
    }

    fn classify_segment(&self, quotes: &[Quote]) -> Segment {
        if quotes.is_empty() {
            return Segment::Inactive;
        }

        let ltv = realized_total(quotes);
        let accepted = quotes
            .iter()
            .filter(|q| q.status == QuoteStatus::Accepted)
            .count();
        let acceptance_rate = accepted as f64 / quotes.len() as f64;

        let cutoff = self.cutoff(self.config.activity_window_days);
        let recent = quotes.iter().any(|q| q.created_at > cutoff);

        if ltv > self.config.vip_min_value && acceptance_rate > self.config.vip_min_acceptance {
            Segment::Vip
        } else if ltv > self.config.growth_min_value && recent {
            Segment::Growth
        } else if recent {
            Segment::Active
        } else {
            Segment::Inactive
        }
    }

    /// Every customer placed in exactly one segment
    pub fn segment_customers(&self) -> Result<Vec<SegmentGroup>> {
        let mut groups: Vec<SegmentGroup> = Segment::ALL
            .iter()
            .map(|&segment| SegmentGroup {
                segment,
                customers: Vec::new(),
                action: segment.action(),
            })
            .collect();

        for customer in self.db.list_customers()? {
            let quotes = self.db.quotes_for_customer(customer.id)?;
            let segment = self.classify_segment(&quotes);
            if let Some(group) = groups.iter_mut().find(|g| g.segment == segment) {
                group.customers.push(customer.id);
            }
        }

        Ok(groups)
    }

    /// Products this customer has not been quoted, popular with similar spenders
    ///
    /// Similar spenders are realized quotes of other customers whose total is
    /// within 50% of this customer's lifetime quote total.
    pub fn recommend_products(&self, customer_id: i64, n: usize) -> Result<Vec<Recommendation>> {
        self.require_customer(customer_id)?;
        let own = self.db.quotes_for_customer(customer_id)?;

        if own.is_empty() {
            return Ok(self
                .db
                .list_products()?
                .into_iter()
                .take(n)
                .map(|p| Recommendation {
                    product_id: p.id,
                    name: p.name,
                    price: p.price,
                    score: 0,
                    reason: "Popular in catalogue".to_string(),
                })
                .collect());
        }

        let mut purchased = HashSet::new();
        for quote in &own {
            for item in self.db.quote_items(quote.id)? {
                purchased.insert(item.product_id);
            }
        }

        let customer_total: f64 = own.iter().map(|q| q.total).sum();
        let tolerance = customer_total * 0.5;

        let mut order: Vec<i64> = Vec::new();
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for quote in self.db.list_quotes(None)? {
            if quote.customer_id == customer_id || !quote.status.is_realized() {
                continue;
            }
            if (quote.total - customer_total).abs() >= tolerance {
                continue;
            }
            for item in self.db.quote_items(quote.id)? {
                if purchased.contains(&item.product_id) {
                    continue;
                }
                let count = counts.entry(item.product_id).or_insert_with(|| {
                    order.push(item.product_id);
                    0
                });
                *count += 1;
            }
        }

        order.sort_by(|a, b| counts[b].cmp(&counts[a]));

        let mut recommendations = Vec::new();
        for product_id in order.into_iter().take(n) {
            if let Some(product) = self.db.get_product(product_id)? {
                recommendations.push(Recommendation {
                    product_id,
                    name: product.name,
                    price: product.price,
                    score: counts[&product_id],
                    reason: "Popular with similar customers".to_string(),
                });
            }
        }

        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::storage::Database;
    use crate::test_support::{customer, product, quote};
    use chrono::{Duration, Utc};

    fn setup() -> (Database, AnalyticsConfig, i64) {
        let db = Database::open_in_memory().unwrap();
        let item = product(&db, "Widget", 1.0);
        (db, AnalyticsConfig::default(), item)
    }

    #[test]
    fn test_single_quote_is_new_customer() {
        let (db, config, item) = setup();
        let acme = customer(&db, "Acme");
        quote(&db, acme, item, 500.0, QuoteStatus::Sent, Utc::now());

        let churn = Analytics::new(&db, &config).predict_churn_risk(acme).unwrap();
        assert_eq!(churn.risk, 30);
        assert_eq!(churn.reason, "New customer - limited history");
    }

    #[test]
    fn test_stale_customer_is_high_risk() {
        let (db, config, item) = setup();
        let now = Utc::now();
        let acme = customer(&db, "Acme");
        quote(&db, acme, item, 500.0, QuoteStatus::Sent, now - Duration::days(120));
        quote(&db, acme, item, 500.0, QuoteStatus::Accepted, now - Duration::days(95));

        let churn = Analytics::new(&db, &config)
            .as_of(now)
            .predict_churn_risk(acme)
            .unwrap();
        assert_eq!(churn.risk, 85);
        assert_eq!(churn.reason, "No activity in 90 days");
    }

    #[test]
    fn test_churn_ladder_by_recent_share() {
        let (db, config, item) = setup();
        let now = Utc::now();
        let old = now - Duration::days(200);

        let declining = customer(&db, "Declining");
        quote(&db, declining, item, 9_000.0, QuoteStatus::Accepted, old);
        quote(&db, declining, item, 1_000.0, QuoteStatus::Draft, now);

        let moderate = customer(&db, "Moderate");
        quote(&db, moderate, item, 7_000.0, QuoteStatus::Accepted, old);
        quote(&db, moderate, item, 3_000.0, QuoteStatus::Rejected, now);

        let strong = customer(&db, "Strong");
        quote(&db, strong, item, 1_000.0, QuoteStatus::Accepted, old);
        quote(&db, strong, item, 9_000.0, QuoteStatus::Sent, now);

        let analytics = Analytics::new(&db, &config).as_of(now);
        assert_eq!(analytics.predict_churn_risk(declining).unwrap().risk, 60);
        assert_eq!(analytics.predict_churn_risk(moderate).unwrap().risk, 40);
        assert_eq!(analytics.predict_churn_risk(strong).unwrap().risk, 15);

        let overview = analytics.churn_overview().unwrap();
        let names: Vec<_> = overview.iter().map(|c| c.customer_name.as_str()).collect();
        assert_eq!(names, vec!["Declining"]);
    }

    #[test]
    fn test_churn_for_unknown_customer() {
        let (db, config, _) = setup();
        assert!(matches!(
            Analytics::new(&db, &config).predict_churn_risk(5),
            Err(Error::NotFound { entity: "customer", .. })
        ));
    }

    #[test]
    fn test_clv() {
        let (db, config, item) = setup();
        let now = Utc::now();
        let acme = customer(&db, "Acme");
        let analytics = Analytics::new(&db, &config);
        assert_eq!(analytics.calculate_clv(acme).unwrap(), 0.0);

        quote(&db, acme, item, 1_000.0, QuoteStatus::Accepted, now);
        quote(&db, acme, item, 500.0, QuoteStatus::Rejected, now);
        // two quotes: quarterly divisor is max(0.5, 1) = 1
        assert_eq!(analytics.calculate_clv(acme).unwrap(), 1_000.0 + 1_000.0 * 12.0);

        for _ in 0..6 {
            quote(&db, acme, item, 100.0, QuoteStatus::Draft, now);
        }
        // eight quotes: quarterly divisor is 2
        assert_eq!(analytics.calculate_clv(acme).unwrap(), 1_000.0 + 500.0 * 12.0);
    }

    #[test]
    fn test_vip_takes_priority_over_growth() {
        let (db, config, item) = setup();
        let now = Utc::now();

        let vip = customer(&db, "Vip");
        for amount in [50_000.0, 50_000.0, 30_000.0, 10_000.0, 10_000.0, 10_000.0, 10_000.0] {
            quote(&db, vip, item, amount, QuoteStatus::Accepted, now - Duration::days(3));
        }
        for _ in 0..3 {
            quote(&db, vip, item, 1_000.0, QuoteStatus::Rejected, now);
        }

        let growth = customer(&db, "Growth");
        quote(&db, growth, item, 25_000.0, QuoteStatus::Sent, now);

        let active = customer(&db, "Active");
        quote(&db, active, item, 100.0, QuoteStatus::Draft, now);

        let lapsed = customer(&db, "Lapsed");
        quote(&db, lapsed, item, 100.0, QuoteStatus::Accepted, now - Duration::days(180));

        let idle = customer(&db, "Idle");

        let analytics = Analytics::new(&db, &config).as_of(now);
        assert_eq!(analytics.segment_of(vip).unwrap(), Segment::Vip);
        assert_eq!(analytics.segment_of(growth).unwrap(), Segment::Growth);
        assert_eq!(analytics.segment_of(active).unwrap(), Segment::Active);
        assert_eq!(analytics.segment_of(lapsed).unwrap(), Segment::Inactive);
        assert_eq!(analytics.segment_of(idle).unwrap(), Segment::Inactive);

        let groups = analytics.segment_customers().unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].segment, Segment::Vip);
        assert_eq!(groups[0].customers, vec![vip]);
        assert_eq!(groups[0].action, "Premium support, upsell");
        let total: usize = groups.iter().map(|g| g.customers.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_recommendations_from_similar_spenders() {
        let (db, config, widget) = setup();
        let now = Utc::now();
        let gadget = product(&db, "Gadget", 1.0);
        let gizmo = product(&db, "Gizmo", 1.0);

        let acme = customer(&db, "Acme");
        quote(&db, acme, widget, 1_000.0, QuoteStatus::Accepted, now);

        let peer = customer(&db, "Peer");
        quote(&db, peer, gadget, 900.0, QuoteStatus::Accepted, now);
        quote(&db, peer, gadget, 1_200.0, QuoteStatus::Sent, now);
        quote(&db, peer, gizmo, 1_100.0, QuoteStatus::Accepted, now);
        quote(&db, peer, widget, 1_000.0, QuoteStatus::Accepted, now);
        // not similar enough, and not realized
        quote(&db, peer, gizmo, 10_000.0, QuoteStatus::Accepted, now);
        quote(&db, peer, gizmo, 1_000.0, QuoteStatus::Draft, now);

        let recs = Analytics::new(&db, &config)
            .recommend_products(acme, 5)
            .unwrap();
        let ranked: Vec<_> = recs.iter().map(|r| (r.name.as_str(), r.score)).collect();
        assert_eq!(ranked, vec![("Gadget", 2), ("Gizmo", 1)]);
    }

    #[test]
    fn test_recommendations_without_history() {
        let (db, config, _) = setup();
        product(&db, "Gadget", 1.0);
        let acme = customer(&db, "Acme");

        let recs = Analytics::new(&db, &config)
            .recommend_products(acme, 1)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].name, "Gadget");
    }
}
