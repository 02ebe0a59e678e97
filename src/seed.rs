//! Demo data
//!
//! Seeding only fills tables that are still empty, so it is safe to run
//! against an existing database.

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::ledger::QuoteLedger;
use crate::model::{NewCustomer, NewProduct, QuoteStatus, Role};
use crate::storage::Database;
use chrono::{Duration, Utc};
use serde::Serialize;

const CUSTOMERS: &[(&str, &str, &str, &str)] = &[
    ("Acme Corporation", "john.smith@acme.com", "+1-555-0100", "Acme Corp"),
    ("TechStart Inc", "contact@techstart.com", "+1-555-0101", "TechStart"),
    ("Global Solutions Ltd", "info@globalsol.com", "+1-555-0102", "Global Solutions"),
    ("Innovation Hub", "sales@innovhub.com", "+1-555-0103", "Innovation Hub"),
    ("CloudFirst Industries", "contact@cloudfirst.com", "+1-555-0104", "CloudFirst"),
    ("DataStream Analytics", "david@datastream.com", "+1-555-0105", "DataStream"),
    ("SecureNet Systems", "admin@securenet.com", "+1-555-0106", "SecureNet"),
    ("FinanceFlow Corp", "procurement@financeflow.com", "+1-555-0107", "FinanceFlow"),
    ("RetailMax Solutions", "vendor@retailmax.com", "+1-555-0108", "RetailMax"),
    ("MediTech Health", "it@meditech.com", "+1-555-0109", "MediTech"),
    ("EduLearn Platform", "integration@edulearn.com", "+1-555-0110", "EduLearn"),
    ("TransLogic Shipping", "tech@translogic.com", "+1-555-0111", "TransLogic"),
];

const PRODUCTS: &[(&str, &str, f64, &str)] = &[
    ("Enterprise Software License (Per Year)", "Enterprise software license with full support and updates", 2999.00, "Software"),
    ("Professional Software License (Per Year)", "Professional tier with business hours support", 1499.00, "Software"),
    ("Standard Software License (Per Year)", "Basic tier with community support", 799.00, "Software"),
    ("Cloud Storage (1TB/Month)", "1TB monthly cloud storage with automatic backups", 49.99, "Cloud Storage"),
    ("Cloud Storage (5TB/Month)", "5TB monthly cloud storage with redundancy", 199.99, "Cloud Storage"),
    ("API Access (Standard Tier)", "Standard API tier with 1M requests/month", 199.00, "API"),
    ("API Access (Enterprise Tier)", "Enterprise tier with unlimited requests", 1999.00, "API"),
    ("24/7 Premium Support", "Round-the-clock premium technical support package", 499.00, "Support"),
    ("Business Hours Support", "Support during business hours (9AM-6PM EST)", 299.00, "Support"),
    ("Consulting Services (Hourly)", "Expert consulting services by senior architects", 150.00, "Consulting"),
    ("Full Data Migration Service", "Complete data migration with validation", 5000.00, "Services"),
    ("Comprehensive Security Audit", "Full security assessment and vulnerability analysis", 3500.00, "Security"),
    ("Cloud Infrastructure Setup", "Complete cloud infrastructure provisioning and configuration", 2500.00, "Infrastructure"),
    ("AI/ML Implementation Service", "Custom AI/ML solution implementation", 8500.00, "AI/ML"),
    ("DevOps Pipeline Setup", "Complete CI/CD pipeline implementation", 4500.00, "DevOps"),
    ("Web Application Development", "Full-stack web application development", 4200.00, "Development"),
];

const USERS: &[(&str, &str, Role)] = &[
    ("admin", "admin@quotedesk.local", Role::Admin),
    ("manager", "manager@quotedesk.local", Role::Manager),
    ("sales", "sales@quotedesk.local", Role::SalesRep),
];

struct DemoQuote {
    customer: usize,
    status: QuoteStatus,
    tax_rate: f64,
    age_days: i64,
    /// (product index, quantity)
    items: &'static [(usize, i64)],
}

const QUOTES: &[DemoQuote] = &[
    DemoQuote { customer: 0, status: QuoteStatus::Accepted, tax_rate: 0.08, age_days: 150, items: &[(0, 1), (7, 2), (9, 5)] },
    DemoQuote { customer: 0, status: QuoteStatus::Accepted, tax_rate: 0.08, age_days: 12, items: &[(13, 1), (10, 1)] },
    DemoQuote { customer: 1, status: QuoteStatus::Sent, tax_rate: 0.10, age_days: 40, items: &[(2, 2), (8, 1)] },
    DemoQuote { customer: 2, status: QuoteStatus::Accepted, tax_rate: 0.08, age_days: 75, items: &[(1, 3), (10, 1), (12, 2)] },
    DemoQuote { customer: 3, status: QuoteStatus::Draft, tax_rate: 0.10, age_days: 3, items: &[(11, 1)] },
    DemoQuote { customer: 4, status: QuoteStatus::Rejected, tax_rate: 0.08, age_days: 130, items: &[(4, 1), (7, 2)] },
    DemoQuote { customer: 5, status: QuoteStatus::Sent, tax_rate: 0.10, age_days: 20, items: &[(3, 3), (8, 1), (15, 2)] },
    DemoQuote { customer: 6, status: QuoteStatus::Accepted, tax_rate: 0.08, age_days: 95, items: &[(5, 1), (9, 4)] },
    DemoQuote { customer: 7, status: QuoteStatus::Draft, tax_rate: 0.10, age_days: 8, items: &[(6, 2), (14, 1)] },
    DemoQuote { customer: 8, status: QuoteStatus::Accepted, tax_rate: 0.08, age_days: 33, items: &[(6, 3), (11, 1), (13, 2)] },
    DemoQuote { customer: 9, status: QuoteStatus::Sent, tax_rate: 0.10, age_days: 5, items: &[(0, 1), (8, 2), (7, 1)] },
    DemoQuote { customer: 10, status: QuoteStatus::Draft, tax_rate: 0.08, age_days: 200, items: &[(9, 1)] },
    DemoQuote { customer: 11, status: QuoteStatus::Accepted, tax_rate: 0.10, age_days: 60, items: &[(1, 2), (10, 1), (14, 1)] },
    DemoQuote { customer: 2, status: QuoteStatus::Sent, tax_rate: 0.08, age_days: 1, items: &[(4, 3), (7, 1)] },
];

/// Number of rows inserted per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub customers: usize,
    pub products: usize,
    pub users: usize,
    pub quotes: usize,
}

/// Populate empty tables with demo customers, products, users and quotes
pub fn seed_demo_data(db: &Database, config: &LedgerConfig) -> Result<SeedReport> {
    let stats = db.get_stats()?;
    let mut report = SeedReport::default();

    if stats.customers == 0 {
        for (name, email, phone, company) in CUSTOMERS {
            db.create_customer(&NewCustomer {
                name: name.to_string(),
                email: email.to_string(),
                phone: Some(phone.to_string()),
                company: Some(company.to_string()),
            })?;
            report.customers += 1;
        }
    }

    if stats.products == 0 {
        for (name, description, price, category) in PRODUCTS {
            db.create_product(&NewProduct {
                name: name.to_string(),
                description: Some(description.to_string()),
                price: *price,
                category: Some(category.to_string()),
            })?;
            report.products += 1;
        }
    }

    if stats.users == 0 {
        for (username, email, role) in USERS {
            db.create_user(username, email, *role)?;
            report.users += 1;
        }
    }

    if stats.quotes == 0 {
        report.quotes = seed_quotes(db, config)?;
    }

    tracing::info!(
        "Seeded {} customer(s), {} product(s), {} user(s), {} quote(s)",
        report.customers,
        report.products,
        report.users,
        report.quotes
    );
    Ok(report)
}

fn seed_quotes(db: &Database, config: &LedgerConfig) -> Result<usize> {
    let customers = db.list_customers()?;
    let products = db.list_products()?;
    let ledger = QuoteLedger::new(db, config);
    let now = Utc::now();

    let mut created = 0;
    for demo in QUOTES {
        // demo rows refer to catalogue entries by position; skip when the
        // tables were seeded from elsewhere
        let Some(customer) = customers.iter().find(|c| c.name == CUSTOMERS[demo.customer].0) else {
            continue;
        };

        let quote_id = ledger.create_quote_at(
            customer.id,
            Some(&format!("Quote for {}", customer.name)),
            now - Duration::days(demo.age_days),
        )?;
        ledger.update_tax_rate(quote_id, demo.tax_rate)?;

        for &(product_index, quantity) in demo.items {
            if let Some(product) = products.iter().find(|p| p.name == PRODUCTS[product_index].0) {
                ledger.add_product(quote_id, product.id, quantity)?;
            }
        }

        ledger.update_status(quote_id, demo.status)?;
        created += 1;
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_fills_empty_database() {
        let db = Database::open_in_memory().unwrap();
        let report = seed_demo_data(&db, &LedgerConfig::default()).unwrap();

        assert_eq!(report.customers, CUSTOMERS.len());
        assert_eq!(report.products, PRODUCTS.len());
        assert_eq!(report.users, USERS.len());
        assert_eq!(report.quotes, QUOTES.len());

        let accepted = db.list_quotes(Some(QuoteStatus::Accepted)).unwrap();
        assert_eq!(accepted.len(), 6);
        assert!(accepted.iter().all(|q| q.total > 0.0));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db, &LedgerConfig::default()).unwrap();
        let second = seed_demo_data(&db, &LedgerConfig::default()).unwrap();

        assert_eq!(second, SeedReport::default());
        assert_eq!(db.get_stats().unwrap().quotes, QUOTES.len());
    }

    #[test]
    fn test_seed_keeps_existing_customers() {
        let db = Database::open_in_memory().unwrap();
        db.create_customer(&NewCustomer {
            name: "Existing".to_string(),
            email: "existing@example.com".to_string(),
            ..Default::default()
        })
        .unwrap();

        let report = seed_demo_data(&db, &LedgerConfig::default()).unwrap();
        assert_eq!(report.customers, 0);
        assert_eq!(report.quotes, 0);
        assert_eq!(db.list_customers().unwrap().len(), 1);
    }
}
