//! Fixtures shared by unit tests

use crate::config::LedgerConfig;
use crate::ledger::QuoteLedger;
use crate::model::{NewCustomer, NewProduct, QuoteStatus};
use crate::storage::Database;
use chrono::{DateTime, Utc};

pub fn customer(db: &Database, name: &str) -> i64 {
    db.create_customer(&NewCustomer {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        ..Default::default()
    })
    .unwrap()
}

pub fn product(db: &Database, name: &str, price: f64) -> i64 {
    db.create_product(&NewProduct {
        name: name.to_string(),
        price,
        category: Some("General".to_string()),
        ..Default::default()
    })
    .unwrap()
}

/// Create an untaxed quote whose total equals `amount`
pub fn quote(
    db: &Database,
    customer_id: i64,
    product_id: i64,
    amount: f64,
    status: QuoteStatus,
    created_at: DateTime<Utc>,
) -> i64 {
    let ledger = QuoteLedger::new(
        db,
        &LedgerConfig {
            default_tax_rate: 0.0,
            retry_backoff_ms: 0,
            ..Default::default()
        },
    );
    let id = ledger.create_quote_at(customer_id, None, created_at).unwrap();
    ledger.add_line_item(id, product_id, 1, amount).unwrap();
    ledger.update_status(id, status).unwrap();
    id
}
