//! Batch operations
//!
//! Bulk creation from CSV and bulk quote status/delete operations. A failing
//! row or id is recorded and the batch carries on.

mod import;
mod ops;

pub use import::{CUSTOMERS_TEMPLATE, PRODUCTS_TEMPLATE, QUOTES_TEMPLATE};

use crate::config::LedgerConfig;
use crate::ledger::QuoteLedger;
use crate::storage::Database;
use serde::Serialize;

/// Outcome of a CSV import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    /// One human-readable message per rejected row, e.g. `Row 3: ...`
    pub errors: Vec<String>,
}

impl ImportReport {
    fn failed(message: String) -> Self {
        Self {
            success_count: 0,
            errors: vec![message],
        }
    }
}

/// Outcome of a bulk quote operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Which table an import targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Customers,
    Products,
    Quotes,
}

impl ImportKind {
    /// Example CSV with the expected header
    pub fn template(&self) -> &'static str {
        match self {
            ImportKind::Customers => CUSTOMERS_TEMPLATE,
            ImportKind::Products => PRODUCTS_TEMPLATE,
            ImportKind::Quotes => QUOTES_TEMPLATE,
        }
    }
}

/// Runs batch imports and bulk quote operations
pub struct BatchEngine<'a> {
    db: &'a Database,
    ledger: QuoteLedger<'a>,
}

impl<'a> BatchEngine<'a> {
    pub fn new(db: &'a Database, config: &LedgerConfig) -> Self {
        Self {
            db,
            ledger: QuoteLedger::new(db, config),
        }
    }

    /// Import `content` as the given kind of record
    pub fn import(&self, kind: ImportKind, content: &str) -> ImportReport {
        let report = match kind {
            ImportKind::Customers => self.import_customers(content),
            ImportKind::Products => self.import_products(content),
            ImportKind::Quotes => self.import_quotes(content),
        };

        tracing::info!(
            "Imported {} {:?} row(s), {} rejected",
            report.success_count,
            kind,
            report.errors.len()
        );
        report
    }
}
