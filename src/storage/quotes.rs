//! Quote and line item tables
//!
//! Row-level writes are free functions over a `Connection` so the ledger can
//! compose them inside one transaction with the totals recomputation.

use super::Database;
use crate::error::Result;
use crate::model::{Quote, QuoteItem, QuoteStatus, QuoteSummary};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};

const QUOTE_COLUMNS: &str = "id, quote_number, customer_id, status, subtotal, tax_rate, \
                             tax_amount, total, notes, created_at, updated_at";

const SUMMARY_SELECT: &str = r#"
    SELECT q.id, q.quote_number, q.customer_id, c.name, q.status, q.total, q.created_at
    FROM quotes q
    JOIN customers c ON q.customer_id = c.id
"#;

/// Criteria for [`Database::filter_quotes`]; unset fields do not filter
#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub customer_id: Option<i64>,
    pub days_back: Option<i64>,
}

/// Per-product aggregate over realized quotes
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProductSales {
    pub product_id: i64,
    pub product_name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub revenue: f64,
    pub quote_count: i64,
}

// ==================== Row writes ====================

pub(crate) fn insert_quote(
    conn: &Connection,
    quote_number: &str,
    customer_id: i64,
    notes: Option<&str>,
    tax_rate: f64,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO quotes (
            quote_number, customer_id, status, subtotal, tax_rate, tax_amount,
            total, notes, created_at, updated_at
        ) VALUES (?1, ?2, 'draft', 0, ?3, 0, 0, ?4, ?5, ?5)
        "#,
        params![quote_number, customer_id, tax_rate, notes, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_item(
    conn: &Connection,
    quote_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: f64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO quote_items (quote_id, product_id, quantity, unit_price, line_total) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![quote_id, product_id, quantity, unit_price, quantity as f64 * unit_price],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete one item of a quote; returns whether a row was removed
pub(crate) fn delete_item(conn: &Connection, item_id: i64, quote_id: i64) -> Result<bool> {
    let count = conn.execute(
        "DELETE FROM quote_items WHERE id = ?1 AND quote_id = ?2",
        params![item_id, quote_id],
    )?;
    Ok(count > 0)
}

pub(crate) fn delete_items_for_quote(conn: &Connection, quote_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM quote_items WHERE quote_id = ?1",
        params![quote_id],
    )?)
}

pub(crate) fn delete_quote_row(conn: &Connection, quote_id: i64) -> Result<bool> {
    let count = conn.execute("DELETE FROM quotes WHERE id = ?1", params![quote_id])?;
    Ok(count > 0)
}

pub(crate) fn set_status(
    conn: &Connection,
    quote_id: i64,
    status: QuoteStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let count = conn.execute(
        "UPDATE quotes SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, quote_id],
    )?;
    Ok(count > 0)
}

pub(crate) fn set_tax_rate(conn: &Connection, quote_id: i64, tax_rate: f64) -> Result<bool> {
    let count = conn.execute(
        "UPDATE quotes SET tax_rate = ?1 WHERE id = ?2",
        params![tax_rate, quote_id],
    )?;
    Ok(count > 0)
}

pub(crate) fn tax_rate(conn: &Connection, quote_id: i64) -> Result<Option<f64>> {
    Ok(conn
        .query_row(
            "SELECT tax_rate FROM quotes WHERE id = ?1",
            params![quote_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn line_totals(conn: &Connection, quote_id: i64) -> Result<Vec<f64>> {
    let mut stmt = conn.prepare("SELECT line_total FROM quote_items WHERE quote_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![quote_id], |row| row.get(0))?;

    let mut totals = Vec::new();
    for row in rows {
        totals.push(row?);
    }
    Ok(totals)
}

pub(crate) fn write_totals(
    conn: &Connection,
    quote_id: i64,
    subtotal: f64,
    tax_amount: f64,
    total: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE quotes SET subtotal = ?1, tax_amount = ?2, total = ?3, updated_at = ?4 WHERE id = ?5",
        params![subtotal, tax_amount, total, now, quote_id],
    )?;
    Ok(())
}

// ==================== Queries ====================

impl Database {
    /// Get a quote by ID
    pub fn get_quote(&self, id: i64) -> Result<Option<Quote>> {
        let quote = self
            .conn
            .query_row(
                &format!("SELECT {} FROM quotes WHERE id = ?1", QUOTE_COLUMNS),
                params![id],
                quote_from_row,
            )
            .optional()?;

        Ok(quote)
    }

    /// Get a quote by its quote number
    pub fn get_quote_by_number(&self, quote_number: &str) -> Result<Option<Quote>> {
        let quote = self
            .conn
            .query_row(
                &format!("SELECT {} FROM quotes WHERE quote_number = ?1", QUOTE_COLUMNS),
                params![quote_number],
                quote_from_row,
            )
            .optional()?;

        Ok(quote)
    }

    /// Get all quotes of one customer, oldest first
    pub fn quotes_for_customer(&self, customer_id: i64) -> Result<Vec<Quote>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM quotes WHERE customer_id = ?1 ORDER BY created_at, id",
            QUOTE_COLUMNS
        ))?;

        let rows = stmt.query_map(params![customer_id], quote_from_row)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }

        Ok(quotes)
    }

    /// Get the line items of a quote with their product names
    pub fn quote_items(&self, quote_id: i64) -> Result<Vec<QuoteItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT qi.id, qi.quote_id, qi.product_id, p.name, qi.quantity, qi.unit_price, qi.line_total
            FROM quote_items qi
            JOIN products p ON qi.product_id = p.id
            WHERE qi.quote_id = ?1
            ORDER BY qi.id
            "#,
        )?;

        let rows = stmt.query_map(params![quote_id], |row| {
            Ok(QuoteItem {
                id: row.get(0)?,
                quote_id: row.get(1)?,
                product_id: row.get(2)?,
                product_name: row.get(3)?,
                quantity: row.get(4)?,
                unit_price: row.get(5)?,
                line_total: row.get(6)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(items)
    }

    /// List quotes newest first, optionally restricted to one status
    pub fn list_quotes(&self, status: Option<QuoteStatus>) -> Result<Vec<QuoteSummary>> {
        self.filter_quotes(&QuoteFilter {
            status,
            ..Default::default()
        })
    }

    /// List quotes matching every criterion set in `filter`, newest first
    pub fn filter_quotes(&self, filter: &QuoteFilter) -> Result<Vec<QuoteSummary>> {
        let mut sql = format!("{} WHERE 1=1", SUMMARY_SELECT);
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND q.status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(min) = filter.min_amount {
            sql.push_str(" AND q.total >= ?");
            values.push(Box::new(min));
        }
        if let Some(max) = filter.max_amount {
            sql.push_str(" AND q.total <= ?");
            values.push(Box::new(max));
        }
        if let Some(customer_id) = filter.customer_id {
            sql.push_str(" AND q.customer_id = ?");
            values.push(Box::new(customer_id));
        }
        if let Some(days) = filter.days_back {
            let cutoff = Utc::now() - Duration::days(days);
            sql.push_str(" AND q.created_at > ?");
            values.push(Box::new(cutoff));
        }

        sql.push_str(" ORDER BY q.created_at DESC, q.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), summary_from_row)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }

        Ok(quotes)
    }

    /// Search quote number, customer name and customer email
    pub fn search_quotes(&self, term: &str) -> Result<Vec<QuoteSummary>> {
        let pattern = format!("%{}%", term.trim());
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE q.quote_number LIKE ?1 OR c.name LIKE ?1 OR c.email LIKE ?1 \
             ORDER BY q.created_at DESC, q.id DESC",
            SUMMARY_SELECT
        ))?;

        let rows = stmt.query_map(params![pattern], summary_from_row)?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?);
        }

        Ok(quotes)
    }

    /// Quantity and revenue per product across realized quotes, best sellers first
    pub fn product_sales(&self) -> Result<Vec<ProductSales>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.name, p.category,
                   SUM(qi.quantity), SUM(qi.line_total), COUNT(DISTINCT qi.quote_id)
            FROM quote_items qi
            JOIN quotes q ON qi.quote_id = q.id
            JOIN products p ON qi.product_id = p.id
            WHERE q.status IN ('accepted', 'sent')
            GROUP BY p.id, p.name, p.category
            ORDER BY SUM(qi.line_total) DESC, p.id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ProductSales {
                product_id: row.get(0)?,
                product_name: row.get(1)?,
                category: row.get(2)?,
                quantity: row.get(3)?,
                revenue: row.get(4)?,
                quote_count: row.get(5)?,
            })
        })?;

        let mut sales = Vec::new();
        for row in rows {
            sales.push(row?);
        }

        Ok(sales)
    }
}

fn status_from_db(value: &str) -> QuoteStatus {
    value.parse().unwrap_or(QuoteStatus::Draft)
}

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<Quote> {
    let status: String = row.get(3)?;
    Ok(Quote {
        id: row.get(0)?,
        quote_number: row.get(1)?,
        customer_id: row.get(2)?,
        status: status_from_db(&status),
        subtotal: row.get(4)?,
        tax_rate: row.get(5)?,
        tax_amount: row.get(6)?,
        total: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<QuoteSummary> {
    let status: String = row.get(4)?;
    Ok(QuoteSummary {
        id: row.get(0)?,
        quote_number: row.get(1)?,
        customer_id: row.get(2)?,
        customer_name: row.get(3)?,
        status: status_from_db(&status),
        total: row.get(5)?,
        created_at: row.get(6)?,
    })
}
