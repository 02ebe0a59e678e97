//! Bulk quote status changes and deletions

use super::{BatchEngine, BatchOutcome};
use crate::model::QuoteStatus;

impl<'a> BatchEngine<'a> {
    /// Move every listed quote to `status`; unknown ids count as failures
    pub fn batch_update_status(&self, quote_ids: &[i64], status: QuoteStatus) -> BatchOutcome {
        self.for_each(quote_ids, |id| {
            self.ledger.update_status(id, status)?;
            Ok(true)
        })
    }

    /// Mark draft quotes as sent; quotes in any other status count as failures
    pub fn batch_send_quotes(&self, quote_ids: &[i64]) -> BatchOutcome {
        self.for_each(quote_ids, |id| match self.db.get_quote(id)? {
            Some(quote) if quote.status == QuoteStatus::Draft => {
                self.ledger.update_status(id, QuoteStatus::Sent)?;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    /// Delete every listed quote with its items
    pub fn batch_delete_quotes(&self, quote_ids: &[i64]) -> BatchOutcome {
        self.for_each(quote_ids, |id| {
            self.ledger.delete_quote(id)?;
            Ok(true)
        })
    }

    fn for_each<F>(&self, quote_ids: &[i64], mut apply: F) -> BatchOutcome
    where
        F: FnMut(i64) -> crate::Result<bool>,
    {
        let mut outcome = BatchOutcome::default();
        for &id in quote_ids {
            match apply(id) {
                Ok(true) => outcome.succeeded += 1,
                Ok(false) => outcome.failed += 1,
                Err(e) => {
                    tracing::warn!("Batch operation on quote {} failed: {}", id, e);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::storage::Database;
    use crate::test_support::{customer, product, quote};
    use chrono::Utc;

    fn setup() -> (Database, Vec<i64>) {
        let db = Database::open_in_memory().unwrap();
        let acme = customer(&db, "Acme");
        let item = product(&db, "Widget", 1.0);
        let ids = vec![
            quote(&db, acme, item, 10.0, QuoteStatus::Draft, Utc::now()),
            quote(&db, acme, item, 20.0, QuoteStatus::Draft, Utc::now()),
            quote(&db, acme, item, 30.0, QuoteStatus::Accepted, Utc::now()),
        ];
        (db, ids)
    }

    #[test]
    fn test_send_only_drafts() {
        let (db, ids) = setup();
        let engine = BatchEngine::new(&db, &LedgerConfig::default());

        let outcome = engine.batch_send_quotes(&[ids[0], ids[1], ids[2], 999]);
        assert_eq!(outcome, BatchOutcome { succeeded: 2, failed: 2 });
        assert_eq!(db.get_quote(ids[0]).unwrap().unwrap().status, QuoteStatus::Sent);
        assert_eq!(db.get_quote(ids[2]).unwrap().unwrap().status, QuoteStatus::Accepted);
    }

    #[test]
    fn test_update_status() {
        let (db, ids) = setup();
        let engine = BatchEngine::new(&db, &LedgerConfig::default());

        let outcome = engine.batch_update_status(&[ids[1], ids[2], 404], QuoteStatus::Rejected);
        assert_eq!(outcome, BatchOutcome { succeeded: 2, failed: 1 });
        assert_eq!(db.list_quotes(Some(QuoteStatus::Rejected)).unwrap().len(), 2);
    }

    #[test]
    fn test_delete() {
        let (db, ids) = setup();
        let engine = BatchEngine::new(&db, &LedgerConfig::default());

        let outcome = engine.batch_delete_quotes(&[ids[0], ids[0], ids[2]]);
        assert_eq!(outcome, BatchOutcome { succeeded: 2, failed: 1 });
        assert_eq!(db.get_stats().unwrap().quotes, 1);
        assert_eq!(db.get_stats().unwrap().quote_items, 1);
    }
}
