//! SQLite storage layer for QuoteDesk
//!
//! This module owns the relational tables:
//! - Customers and products
//! - Quotes and their line items
//! - Users, preferences, alerts and the audit trail
//! - Customer health scores
//!
//! Opening a database only ensures the schema exists; demo data is seeded
//! separately by [`crate::seed`].

mod health;
pub(crate) mod quotes;
mod schema;
mod users;

pub use quotes::{ProductSales, QuoteFilter};
pub use schema::SCHEMA;

use crate::error::{Error, Result};
use crate::model::{Customer, NewCustomer, NewProduct, Product};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;

        tracing::debug!("Opened database at {:?}", path);
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Ensure the database schema exists
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Begin a transaction; dropped without commit it rolls back
    pub(crate) fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ==================== Customers ====================

    /// Insert a customer, rejecting case-insensitive name collisions
    pub fn create_customer(&self, customer: &NewCustomer) -> Result<i64> {
        let name = customer.name.trim();
        if name.is_empty() {
            return Err(Error::validation("customer name is required"));
        }
        if customer.email.trim().is_empty() {
            return Err(Error::validation("customer email is required"));
        }
        if self.find_customer_by_name(name)?.is_some() {
            return Err(Error::DuplicateName {
                entity: "customer",
                name: name.to_string(),
            });
        }

        let result = self.conn.execute(
            "INSERT INTO customers (name, email, phone, company, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                customer.email.trim(),
                customer.phone,
                customer.company,
                Utc::now()
            ],
        );

        match result.map_err(Error::from) {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if e.is_constraint_violation() => Err(Error::DuplicateName {
                entity: "customer",
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Get a customer by ID
    pub fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let customer = self
            .conn
            .query_row(
                "SELECT id, name, email, phone, company FROM customers WHERE id = ?1",
                params![id],
                customer_from_row,
            )
            .optional()?;

        Ok(customer)
    }

    /// Find a customer by name, ignoring case
    pub fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        let customer = self
            .conn
            .query_row(
                "SELECT id, name, email, phone, company FROM customers WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                customer_from_row,
            )
            .optional()?;

        Ok(customer)
    }

    /// Get all customers ordered by name
    pub fn list_customers(&self) -> Result<Vec<Customer>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email, phone, company FROM customers ORDER BY name")?;

        let rows = stmt.query_map([], customer_from_row)?;

        let mut customers = Vec::new();
        for row in rows {
            customers.push(row?);
        }

        Ok(customers)
    }

    // ==================== Products ====================

    /// Insert a product, rejecting case-insensitive name collisions
    pub fn create_product(&self, product: &NewProduct) -> Result<i64> {
        let name = product.name.trim();
        if name.is_empty() {
            return Err(Error::validation("product name is required"));
        }
        if !product.price.is_finite() || product.price < 0.0 {
            return Err(Error::validation(format!(
                "product price must be non-negative, got {}",
                product.price
            )));
        }
        if self.find_product_by_name(name)?.is_some() {
            return Err(Error::DuplicateName {
                entity: "product",
                name: name.to_string(),
            });
        }

        let result = self.conn.execute(
            "INSERT INTO products (name, description, price, category, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                product.description,
                product.price,
                product.category,
                Utc::now()
            ],
        );

        match result.map_err(Error::from) {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if e.is_constraint_violation() => Err(Error::DuplicateName {
                entity: "product",
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Get a product by ID
    pub fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, name, description, price, category FROM products WHERE id = ?1",
                params![id],
                product_from_row,
            )
            .optional()?;

        Ok(product)
    }

    /// Find a product by name, ignoring case
    pub fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let product = self
            .conn
            .query_row(
                "SELECT id, name, description, price, category FROM products WHERE name = ?1 COLLATE NOCASE",
                params![name.trim()],
                product_from_row,
            )
            .optional()?;

        Ok(product)
    }

    /// Change the catalogue price; existing line items keep their snapshot
    pub fn update_product_price(&self, id: i64, price: f64) -> Result<()> {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::validation(format!(
                "product price must be non-negative, got {}",
                price
            )));
        }

        let count = self.conn.execute(
            "UPDATE products SET price = ?1 WHERE id = ?2",
            params![price, id],
        )?;
        if count == 0 {
            return Err(Error::not_found("product", id));
        }

        Ok(())
    }

    /// Get all products ordered by category, then name
    pub fn list_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, price, category FROM products ORDER BY category, name",
        )?;

        let rows = stmt.query_map([], product_from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }

        Ok(products)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(DatabaseStats {
            customers: count("customers")?,
            products: count("products")?,
            quotes: count("quotes")?,
            quote_items: count("quote_items")?,
            users: count("users")?,
            alerts: count("alerts")?,
            audit_entries: count("audit_logs")?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub customers: usize,
    pub products: usize,
    pub quotes: usize,
    pub quote_items: usize,
    pub users: usize,
    pub alerts: usize,
    pub audit_entries: usize,
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        company: row.get(4)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
    })
}
