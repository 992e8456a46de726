use fxhash::FxHashMap;
use redo_ingestion_connector::redo_types::{
    indexmap::IndexMap,
    log::debug,
    parking_lot::Mutex,
    types::{LogPosition, Scn, TransactionId},
};

use crate::connector::client::OperationCode;

/// A non rollback change kept until its transaction ends, so a later rollback row can be paired with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOperation {
    pub scn: Scn,
    pub row_id: Option<String>,
    pub operation_code: OperationCode,
    pub table_name: Option<String>,
    pub sql_redo: String,
    pub sql_undo: String,
    pub multi_row: bool,
}

#[derive(Debug, Default)]
struct Transactions {
    /// Pending operations per transaction in arrival order. Insertion order of the map is the eviction order.
    operations: IndexMap<TransactionId, Vec<CachedOperation>>,
    earliest_rollback: FxHashMap<TransactionId, LogPosition>,
}

/// Correlates rollback rows with the change they undo. Shared by the primary and the secondary session.
#[derive(Debug)]
pub struct TransactionCache {
    transactions: Mutex<Transactions>,
    capacity: usize,
}

impl TransactionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            transactions: Mutex::new(Transactions::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn put(&self, xid: TransactionId, operation: CachedOperation) {
        let mut transactions = self.transactions.lock();
        transactions
            .operations
            .entry(xid)
            .or_default()
            .push(operation);

        while transactions.operations.len() > self.capacity {
            let Some((evicted, operations)) = transactions.operations.shift_remove_index(0) else {
                break;
            };
            transactions.earliest_rollback.remove(&evicted);
            debug!(
                "Evicted {} cached operations of transaction {}",
                operations.len(),
                evicted
            );
        }
    }

    /// Takes the latest pending operation of `xid`, the one a rollback row undoes.
    ///
    /// Its position becomes the transaction's earliest rollback, the upper bound of any later catalog search.
    pub fn query_undo_log(&self, xid: &TransactionId) -> Option<CachedOperation> {
        let mut transactions = self.transactions.lock();
        let operations = transactions.operations.get_mut(xid)?;
        let operation = operations.pop()?;
        if operations.is_empty() {
            transactions.operations.shift_remove(xid);
        }
        transactions.earliest_rollback.insert(
            xid.clone(),
            LogPosition {
                scn: operation.scn,
                row_id: operation.row_id.clone(),
            },
        );
        Some(operation)
    }

    pub fn earliest_rollback_operation(&self, xid: &TransactionId) -> Option<LogPosition> {
        self.transactions.lock().earliest_rollback.get(xid).cloned()
    }

    /// Forgets everything about `xid`. Called on its commit or rollback.
    pub fn clean(&self, xid: &TransactionId) {
        let mut transactions = self.transactions.lock();
        transactions.operations.shift_remove(xid);
        transactions.earliest_rollback.remove(xid);
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::xid;

    fn operation(scn: Scn, row_id: &str, undo: &str) -> CachedOperation {
        CachedOperation {
            scn,
            row_id: Some(row_id.to_string()),
            operation_code: OperationCode::Update,
            table_name: Some("T".to_string()),
            sql_redo: String::new(),
            sql_undo: undo.to_string(),
            multi_row: false,
        }
    }

    #[test]
    fn test_latest_operation_is_undone_first() {
        let cache = TransactionCache::new(10);
        cache.put(xid("1.2.3"), operation(10, "AAA", "first"));
        cache.put(xid("1.2.3"), operation(11, "AAB", "second"));

        let undone = cache.query_undo_log(&xid("1.2.3")).unwrap();
        assert_eq!(undone.sql_undo, "second");
        assert_eq!(
            cache.earliest_rollback_operation(&xid("1.2.3")),
            Some(LogPosition::with_row_id(11, "AAB"))
        );

        assert_eq!(cache.query_undo_log(&xid("1.2.3")).unwrap().sql_undo, "first");
        assert!(cache.query_undo_log(&xid("1.2.3")).is_none());
        assert_eq!(
            cache.earliest_rollback_operation(&xid("1.2.3")),
            Some(LogPosition::with_row_id(10, "AAA"))
        );
    }

    #[test]
    fn test_clean_forgets_transaction() {
        let cache = TransactionCache::new(10);
        cache.put(xid("1.2.3"), operation(10, "AAA", "undo"));
        cache.put(xid("4.5.6"), operation(11, "AAB", "undo"));
        cache.query_undo_log(&xid("1.2.3"));
        cache.clean(&xid("1.2.3"));
        assert!(cache.earliest_rollback_operation(&xid("1.2.3")).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_oldest_transaction_is_evicted() {
        let cache = TransactionCache::new(2);
        cache.put(xid("1.1.1"), operation(10, "AAA", "a"));
        cache.put(xid("2.2.2"), operation(11, "AAB", "b"));
        cache.put(xid("1.1.1"), operation(12, "AAC", "c"));
        cache.put(xid("3.3.3"), operation(13, "AAD", "d"));
        assert_eq!(cache.len(), 2);
        assert!(cache.query_undo_log(&xid("1.1.1")).is_none());
        assert_eq!(cache.query_undo_log(&xid("3.3.3")).unwrap().sql_undo, "d");
    }
}
