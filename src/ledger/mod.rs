//! Quote ledger
//!
//! Every mutation of a quote or its line items goes through [`QuoteLedger`],
//! which keeps the persisted totals consistent:
//! - `subtotal` is the sum of the current line totals (0 with no items)
//! - `tax_amount = subtotal * tax_rate`
//! - `total = subtotal + tax_amount`
//!
//! The totals are rewritten in the same transaction as the mutation that
//! changed them.

mod number;

pub use number::{QuoteNumberSource, TimestampNumbers};

use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::model::QuoteStatus;
use crate::storage::{quotes, Database};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::time::Duration;

/// Derived totals of a quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuoteTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

impl QuoteTotals {
    /// Compute totals from line totals and a tax rate
    pub fn compute(line_totals: &[f64], tax_rate: f64) -> Self {
        let subtotal: f64 = line_totals.iter().sum();
        let tax_amount = subtotal * tax_rate;
        Self {
            subtotal,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}

/// Mutation interface for quotes and line items
pub struct QuoteLedger<'a> {
    db: &'a Database,
    config: LedgerConfig,
    numbers: Box<dyn QuoteNumberSource>,
    actor: Option<i64>,
}

impl<'a> QuoteLedger<'a> {
    pub fn new(db: &'a Database, config: &LedgerConfig) -> Self {
        Self {
            db,
            config: config.clone(),
            numbers: Box::new(TimestampNumbers),
            actor: None,
        }
    }

    /// Replace the quote number source
    pub fn with_number_source(mut self, source: impl QuoteNumberSource + 'static) -> Self {
        self.numbers = Box::new(source);
        self
    }

    /// Attribute audit entries to a user
    pub fn with_actor(mut self, user_id: i64) -> Self {
        self.actor = Some(user_id);
        self
    }

    /// Create an empty draft quote for a customer
    pub fn create_quote(&self, customer_id: i64, notes: Option<&str>) -> Result<i64> {
        self.create_quote_at(customer_id, notes, Utc::now())
    }

    /// Create an empty draft quote with an explicit creation time
    pub fn create_quote_at(
        &self,
        customer_id: i64,
        notes: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        if self.db.get_customer(customer_id)?.is_none() {
            return Err(Error::not_found("customer", customer_id));
        }

        let attempts = self.config.quote_number_retries.max(1);
        for attempt in 1..=attempts {
            let number = self.numbers.next_number(created_at);

            match quotes::insert_quote(
                self.db.conn(),
                &number,
                customer_id,
                notes,
                self.config.default_tax_rate,
                created_at,
            ) {
                Ok(quote_id) => {
                    tracing::info!("Created quote {} ({}) for customer {}", number, quote_id, customer_id);
                    self.audit("quote.created", quote_id, Some(&number));
                    return Ok(quote_id);
                }
                Err(e) if e.is_constraint_violation() => {
                    tracing::warn!(
                        "Quote number {} already taken (attempt {}/{})",
                        number,
                        attempt,
                        attempts
                    );
                    if attempt < attempts && self.config.retry_backoff_ms > 0 {
                        std::thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::GenerationExhausted { attempts })
    }

    /// Add a line item with an explicit unit price snapshot
    pub fn add_line_item(
        &self,
        quote_id: i64,
        product_id: i64,
        quantity: i64,
        unit_price: f64,
    ) -> Result<i64> {
        if quantity < 1 {
            return Err(Error::validation(format!(
                "quantity must be at least 1, got {}",
                quantity
            )));
        }
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(Error::validation(format!(
                "unit price must be non-negative, got {}",
                unit_price
            )));
        }

        let tx = self.db.transaction()?;
        ensure_quote(&tx, quote_id)?;
        if self.db.get_product(product_id)?.is_none() {
            return Err(Error::not_found("product", product_id));
        }

        let item_id = quotes::insert_item(&tx, quote_id, product_id, quantity, unit_price)?;
        recompute_totals(&tx, quote_id)?;
        tx.commit()?;

        self.audit(
            "quote.item_added",
            quote_id,
            Some(&format!("product {} x{} @ {:.2}", product_id, quantity, unit_price)),
        );
        Ok(item_id)
    }

    /// Add a product at its current catalogue price
    pub fn add_product(&self, quote_id: i64, product_id: i64, quantity: i64) -> Result<i64> {
        let product = self
            .db
            .get_product(product_id)?
            .ok_or_else(|| Error::not_found("product", product_id))?;
        self.add_line_item(quote_id, product_id, quantity, product.price)
    }

    /// Remove a line item from a quote
    ///
    /// Returns whether an item was removed. An item that is already gone (or
    /// belongs to another quote) is not an error; totals are recomputed
    /// either way.
    pub fn delete_line_item(&self, item_id: i64, quote_id: i64) -> Result<bool> {
        let tx = self.db.transaction()?;
        ensure_quote(&tx, quote_id)?;

        let removed = quotes::delete_item(&tx, item_id, quote_id)?;
        recompute_totals(&tx, quote_id)?;
        tx.commit()?;

        if removed {
            self.audit("quote.item_removed", quote_id, Some(&format!("item {}", item_id)));
        } else {
            tracing::debug!("Line item {} not present on quote {}", item_id, quote_id);
        }
        Ok(removed)
    }

    /// Persist a new status; any status may follow any other
    pub fn update_status(&self, quote_id: i64, status: QuoteStatus) -> Result<()> {
        if !quotes::set_status(self.db.conn(), quote_id, status, Utc::now())? {
            return Err(Error::not_found("quote", quote_id));
        }

        tracing::info!("Quote {} moved to {}", quote_id, status);
        self.audit("quote.status_changed", quote_id, Some(status.as_str()));
        Ok(())
    }

    /// Persist a new tax rate (fraction in `0..=1`) and recompute totals
    pub fn update_tax_rate(&self, quote_id: i64, tax_rate: f64) -> Result<()> {
        if !tax_rate.is_finite() || !(0.0..=1.0).contains(&tax_rate) {
            return Err(Error::validation(format!(
                "tax rate must be a fraction between 0 and 1, got {}",
                tax_rate
            )));
        }

        let tx = self.db.transaction()?;
        if !quotes::set_tax_rate(&tx, quote_id, tax_rate)? {
            return Err(Error::not_found("quote", quote_id));
        }
        recompute_totals(&tx, quote_id)?;
        tx.commit()?;

        self.audit("quote.tax_changed", quote_id, Some(&tax_rate.to_string()));
        Ok(())
    }

    /// Delete a quote and its line items; returns the number of items removed
    pub fn delete_quote(&self, quote_id: i64) -> Result<usize> {
        let tx = self.db.transaction()?;
        ensure_quote(&tx, quote_id)?;

        let items = quotes::delete_items_for_quote(&tx, quote_id)?;
        quotes::delete_quote_row(&tx, quote_id)?;
        tx.commit()?;

        tracing::info!("Deleted quote {} with {} item(s)", quote_id, items);
        self.audit("quote.deleted", quote_id, None);
        Ok(items)
    }

    fn audit(&self, action: &str, quote_id: i64, details: Option<&str>) {
        if let Err(e) = self
            .db
            .log_action(self.actor, action, Some("quote"), Some(quote_id), details)
        {
            tracing::warn!("Failed to record audit entry {}: {}", action, e);
        }
    }
}

fn ensure_quote(conn: &Connection, quote_id: i64) -> Result<f64> {
    quotes::tax_rate(conn, quote_id)?.ok_or_else(|| Error::not_found("quote", quote_id))
}

/// Recompute and persist the totals of a quote from its current items
fn recompute_totals(conn: &Connection, quote_id: i64) -> Result<QuoteTotals> {
    let tax_rate = ensure_quote(conn, quote_id)?;
    let totals = QuoteTotals::compute(&quotes::line_totals(conn, quote_id)?, tax_rate);

    quotes::write_totals(
        conn,
        quote_id,
        totals.subtotal,
        totals.tax_amount,
        totals.total,
        Utc::now(),
    )?;

    tracing::debug!(
        "Quote {} totals: subtotal {:.2}, tax {:.2}, total {:.2}",
        quote_id,
        totals.subtotal,
        totals.tax_amount,
        totals.total
    );
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCustomer, NewProduct};
    use std::collections::HashSet;

    struct FixedNumber;

    impl QuoteNumberSource for FixedNumber {
        fn next_number(&self, _now: DateTime<Utc>) -> String {
            "QT-FIXED".to_string()
        }
    }

    fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let customer = db
            .create_customer(&NewCustomer {
                name: "Acme Corporation".to_string(),
                email: "sales@acme.example".to_string(),
                ..Default::default()
            })
            .unwrap();
        let product = db
            .create_product(&NewProduct {
                name: "Consulting (Hourly)".to_string(),
                price: 150.0,
                ..Default::default()
            })
            .unwrap();
        (db, customer, product)
    }

    fn config() -> LedgerConfig {
        LedgerConfig {
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    fn assert_invariant(db: &Database, quote_id: i64) {
        let quote = db.get_quote(quote_id).unwrap().unwrap();
        let items: f64 = db
            .quote_items(quote_id)
            .unwrap()
            .iter()
            .map(|i| i.line_total)
            .sum();
        assert!((quote.subtotal - items).abs() < 1e-9);
        assert!((quote.tax_amount - quote.subtotal * quote.tax_rate).abs() < 1e-9);
        assert!((quote.total - (quote.subtotal + quote.tax_amount)).abs() < 1e-9);
    }

    #[test]
    fn test_new_quote_is_empty_draft() {
        let (db, customer, _) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let id = ledger.create_quote(customer, Some("first")).unwrap();

        let quote = db.get_quote(id).unwrap().unwrap();
        assert_eq!(quote.status, QuoteStatus::Draft);
        assert_eq!(quote.tax_rate, 0.10);
        assert_eq!(quote.total, 0.0);
        assert_eq!(quote.notes.as_deref(), Some("first"));
        assert!(quote.quote_number.starts_with("QT-"));
    }

    #[test]
    fn test_create_quote_for_unknown_customer() {
        let (db, _, _) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        assert!(matches!(
            ledger.create_quote(404, None),
            Err(Error::NotFound { entity: "customer", id: 404 })
        ));
    }

    #[test]
    fn test_totals_hold_after_every_mutation() {
        let (db, customer, product) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();

        let first = ledger.add_line_item(quote, product, 2, 150.0).unwrap();
        assert_invariant(&db, quote);
        ledger.add_line_item(quote, product, 3, 99.99).unwrap();
        assert_invariant(&db, quote);
        ledger.update_tax_rate(quote, 0.08).unwrap();
        assert_invariant(&db, quote);
        ledger.delete_line_item(first, quote).unwrap();
        assert_invariant(&db, quote);

        let stored = db.get_quote(quote).unwrap().unwrap();
        assert!((stored.subtotal - 299.97).abs() < 1e-9);
        assert!((stored.total - 299.97 * 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_unit_price_is_a_snapshot() {
        let (db, customer, product) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();
        ledger.add_product(quote, product, 4).unwrap();

        db.update_product_price(product, 500.0).unwrap();

        let items = db.quote_items(quote).unwrap();
        assert_eq!(items[0].unit_price, 150.0);
        assert_eq!(items[0].line_total, 600.0);
        assert_eq!(db.get_quote(quote).unwrap().unwrap().subtotal, 600.0);
    }

    #[test]
    fn test_invalid_line_items_are_rejected() {
        let (db, customer, product) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();

        assert!(matches!(
            ledger.add_line_item(quote, product, 0, 10.0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.add_line_item(quote, product, 1, -5.0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.add_line_item(quote, 999, 1, 5.0),
            Err(Error::NotFound { entity: "product", .. })
        ));
        assert!(matches!(
            ledger.add_line_item(999, product, 1, 5.0),
            Err(Error::NotFound { entity: "quote", .. })
        ));
        assert!(db.quote_items(quote).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_missing_item_is_not_an_error() {
        let (db, customer, product) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();
        let other = ledger.create_quote(customer, None).unwrap();
        let item = ledger.add_line_item(other, product, 1, 10.0).unwrap();

        assert!(!ledger.delete_line_item(12345, quote).unwrap());
        // an item of another quote is left alone
        assert!(!ledger.delete_line_item(item, quote).unwrap());
        assert_eq!(db.quote_items(other).unwrap().len(), 1);
        assert!(ledger.delete_line_item(item, other).unwrap());
    }

    #[test]
    fn test_status_transitions_are_unconstrained() {
        let (db, customer, _) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();

        for status in [
            QuoteStatus::Rejected,
            QuoteStatus::Sent,
            QuoteStatus::Accepted,
            QuoteStatus::Draft,
        ] {
            ledger.update_status(quote, status).unwrap();
            assert_eq!(db.get_quote(quote).unwrap().unwrap().status, status);
        }

        assert!(matches!(
            ledger.update_status(77, QuoteStatus::Sent),
            Err(Error::NotFound { entity: "quote", id: 77 })
        ));
    }

    #[test]
    fn test_tax_rate_validation() {
        let (db, customer, _) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();

        assert!(matches!(
            ledger.update_tax_rate(quote, -0.1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ledger.update_tax_rate(quote, f64::NAN),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_delete_quote_cascades_items() {
        let (db, customer, product) = setup();
        let ledger = QuoteLedger::new(&db, &config());
        let quote = ledger.create_quote(customer, None).unwrap();
        ledger.add_line_item(quote, product, 1, 10.0).unwrap();
        ledger.add_line_item(quote, product, 2, 10.0).unwrap();

        assert_eq!(ledger.delete_quote(quote).unwrap(), 2);
        assert!(db.get_quote(quote).unwrap().is_none());
        assert!(db.quote_items(quote).unwrap().is_empty());
        assert!(matches!(
            ledger.delete_quote(quote),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_collisions_exhaust_retries() {
        let (db, customer, _) = setup();
        let ledger = QuoteLedger::new(&db, &config()).with_number_source(FixedNumber);

        ledger.create_quote(customer, None).unwrap();
        assert!(matches!(
            ledger.create_quote(customer, None),
            Err(Error::GenerationExhausted { attempts: 5 })
        ));
        assert_eq!(db.get_stats().unwrap().quotes, 1);
    }

    #[test]
    fn test_many_quotes_get_unique_numbers() {
        let (db, customer, _) = setup();
        let ledger = QuoteLedger::new(&db, &config());

        let mut numbers = HashSet::new();
        for _ in 0..1000 {
            let id = ledger.create_quote(customer, None).unwrap();
            numbers.insert(db.get_quote(id).unwrap().unwrap().quote_number);
        }
        assert_eq!(numbers.len(), 1000);
    }

    #[test]
    fn test_mutations_are_audited() {
        let (db, customer, product) = setup();
        let user = db
            .create_user("auditor", "audit@example.com", crate::model::Role::Admin)
            .unwrap();
        let ledger = QuoteLedger::new(&db, &config()).with_actor(user);
        let quote = ledger.create_quote(customer, None).unwrap();
        ledger.add_line_item(quote, product, 1, 1.0).unwrap();

        let entries = db.audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.username.as_deref() == Some("auditor")));
        assert!(entries.iter().any(|e| e.action == "quote.item_added"));
    }
}
