//! CSV imports for customers, products and quotes

use super::{BatchEngine, ImportReport};
use crate::error::{Error, Result};
use crate::model::{NewCustomer, NewProduct};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;

pub const QUOTES_TEMPLATE: &str = "customer_name,product_name,quantity,notes\n\
Acme Corporation,Enterprise Software License (Per Year),1,Demo quote\n\
TechStart Inc,Cloud Storage (5TB/Month),2,\n";

pub const CUSTOMERS_TEMPLATE: &str = "name,email,phone,company\n\
New Customer Inc,contact@newcustomer.com,+1-555-9999,New Customer\n";

pub const PRODUCTS_TEMPLATE: &str = "name,price,category,description\n\
New Software License,999.00,Software,Annual license for new product\n";

const DEFAULT_CATEGORY: &str = "General";

/// Parsed CSV with a header lookup
struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<std::result::Result<StringRecord, csv::Error>>,
}

impl Table {
    fn parse(content: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        let rows = reader.records().collect();

        Ok(Self { columns, rows })
    }

    fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.columns.contains_key(**name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Field of a row; `""` when the column exists but the row is short
    fn field<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let index = *self.columns.get(column)?;
        Some(record.get(index).unwrap_or("").trim())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Rows are numbered as in a spreadsheet, the header being row 1
fn row_number(index: usize) -> usize {
    index + 2
}

impl<'a> BatchEngine<'a> {
    fn run_import<F>(&self, content: &str, required: &[&str], mut import_row: F) -> ImportReport
    where
        F: FnMut(&Table, &StringRecord) -> std::result::Result<(), String>,
    {
        let table = match Table::parse(content) {
            Ok(table) => table,
            Err(e) => return ImportReport::failed(format!("CSV parsing error: {}", e)),
        };

        let missing = table.missing(required);
        if !missing.is_empty() {
            return ImportReport::failed(format!("Missing columns: {}", missing.join(", ")));
        }

        let mut report = ImportReport::default();
        for (index, row) in table.rows.iter().enumerate() {
            let outcome = match row {
                Ok(record) => import_row(&table, record),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => report.success_count += 1,
                Err(message) => {
                    let message = format!("Row {}: {}", row_number(index), message);
                    tracing::warn!("Import rejected {}", message);
                    report.errors.push(message);
                }
            }
        }

        report
    }

    /// Create customers from `name,email[,phone,company]` rows
    pub fn import_customers(&self, content: &str) -> ImportReport {
        self.run_import(content, &["name", "email"], |table, record| {
            let name = table.field(record, "name").unwrap_or("");
            let email = table.field(record, "email").unwrap_or("");
            if name.is_empty() || email.is_empty() {
                return Err("Name and email required".to_string());
            }

            let customer = NewCustomer {
                name: name.to_string(),
                email: email.to_string(),
                phone: non_empty(table.field(record, "phone")),
                company: non_empty(table.field(record, "company")),
            };

            match self.db.create_customer(&customer) {
                Ok(_) => Ok(()),
                Err(Error::DuplicateName { .. }) => {
                    Err(format!("Customer '{}' already exists", name))
                }
                Err(e) => Err(e.to_string()),
            }
        })
    }

    /// Create products from `name,price[,category,description]` rows
    pub fn import_products(&self, content: &str) -> ImportReport {
        self.run_import(content, &["name", "price"], |table, record| {
            let name = table.field(record, "name").unwrap_or("");
            let raw_price = table.field(record, "price").unwrap_or("");
            let price: f64 = raw_price
                .parse()
                .map_err(|_| format!("Invalid price '{}'", raw_price))?;

            if name.is_empty() || !price.is_finite() || price < 0.0 {
                return Err("Invalid data".to_string());
            }

            let product = NewProduct {
                name: name.to_string(),
                description: non_empty(table.field(record, "description")),
                price,
                category: Some(
                    non_empty(table.field(record, "category"))
                        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                ),
            };

            match self.db.create_product(&product) {
                Ok(_) => Ok(()),
                Err(Error::DuplicateName { .. }) => {
                    Err(format!("Product '{}' already exists", name))
                }
                Err(e) => Err(e.to_string()),
            }
        })
    }

    /// Create one single-item quote per `customer_name,product_name,quantity[,notes]` row
    ///
    /// Customers and products are matched by name, ignoring case; the item is
    /// priced at the product's current price.
    pub fn import_quotes(&self, content: &str) -> ImportReport {
        self.run_import(
            content,
            &["customer_name", "product_name", "quantity"],
            |table, record| {
                let customer_name = table.field(record, "customer_name").unwrap_or("");
                let product_name = table.field(record, "product_name").unwrap_or("");
                let raw_quantity = table.field(record, "quantity").unwrap_or("");
                let quantity: i64 = raw_quantity
                    .parse()
                    .map_err(|_| format!("Invalid quantity '{}'", raw_quantity))?;

                if customer_name.is_empty() || product_name.is_empty() || quantity < 1 {
                    return Err("Invalid data".to_string());
                }

                let customer = self
                    .db
                    .find_customer_by_name(customer_name)
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("Customer '{}' not found", customer_name))?;
                let product = self
                    .db
                    .find_product_by_name(product_name)
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("Product '{}' not found", product_name))?;

                let notes = non_empty(table.field(record, "notes"));
                let quote_id = self
                    .ledger
                    .create_quote(customer.id, notes.as_deref())
                    .map_err(|e| e.to_string())?;

                if let Err(e) = self.ledger.add_product(quote_id, product.id, quantity) {
                    if let Err(cleanup) = self.ledger.delete_quote(quote_id) {
                        tracing::warn!("Failed to remove partial quote {}: {}", quote_id, cleanup);
                    }
                    return Err(e.to_string());
                }

                Ok(())
            },
        )
    }
}
