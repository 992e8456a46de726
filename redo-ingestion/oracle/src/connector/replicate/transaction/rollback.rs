use std::sync::Arc;

use redo_ingestion_connector::redo_types::{
    log::{info, warn},
    types::LogPosition,
};

use crate::connector::{
    client::{ContentsQuery, LogMinerClient, LogMinerContent, OperationCode},
    replicate::session::{MiningSession, RollbackSearch, SessionConfig},
    Result,
};

use super::cache::{CachedOperation, TransactionCache};

/// Finds the change a rollback row undoes.
///
/// The transaction cache is asked first. When the change is no longer cached, a secondary
/// session scans older and older windows of the transaction's history, which refills the
/// cache, until the change shows up or the oldest available SCN is reached.
pub struct RollbackResolver<C: LogMinerClient> {
    session: Box<MiningSession<C>>,
    cache: Arc<TransactionCache>,
    search: RollbackSearch,
}

impl<C: LogMinerClient> RollbackResolver<C> {
    pub fn new(client: C, config: SessionConfig, cache: Arc<TransactionCache>) -> Self {
        let search = config.rollback_search;
        Self {
            session: Box::new(MiningSession::secondary(client, config, cache.clone())),
            cache,
            search,
        }
    }

    pub fn resolve(&mut self, rollback: &LogMinerContent) -> Result<Option<CachedOperation>> {
        if let Some(original) = self.cache.query_undo_log(&rollback.xid) {
            return Ok(Some(original));
        }

        let earliest = self
            .cache
            .earliest_rollback_operation(&rollback.xid)
            .unwrap_or_else(|| LogPosition {
                scn: rollback.scn,
                row_id: rollback.row_id.clone(),
            });
        let min_scn = self.session.live_client()?.min_scn()?;

        let mut end = earliest.scn;
        let mut attempt = 0;
        // Every iteration either returns or moves `end` strictly down, and `end` never drops below `min_scn`.
        while end >= min_scn {
            let start = end.saturating_sub(self.search.step(attempt)).max(min_scn);
            info!(
                "Searching SCN [{}, {}] for the change rolled back by transaction {}",
                start, end, rollback.xid
            );

            self.session.start_range(start, end.saturating_add(1))?;
            self.session.query(ContentsQuery::Transaction {
                xid: rollback.xid.clone(),
                table: rollback.table_name.clone(),
                start,
                end,
            })?;
            while self.session.next_until(Some(&earliest))? {}

            if let Some(original) = self.cache.query_undo_log(&rollback.xid) {
                return Ok(Some(original));
            }
            if start == min_scn {
                break;
            }
            end = start - 1;
            attempt += 1;
        }

        info!(
            "Reached oldest available SCN {} without finding the change rolled back by transaction {}",
            min_scn, rollback.xid
        );
        Ok(None)
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }
}

/// The statement that replaces a rollback row, taken from the change it undoes.
pub fn rollback_substitution(rollback: OperationCode, original: &CachedOperation) -> Option<String> {
    match (rollback, original.operation_code) {
        (OperationCode::Update, OperationCode::Update)
        | (OperationCode::Delete, OperationCode::Insert) => {
            Some(original.sql_undo.clone()).filter(|undo| !undo.is_empty())
        }
        (rollback, original_code) => {
            warn!(
                "Rollback {:?} at SCN {} cannot undo {:?}",
                rollback, original.scn, original_code
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original(operation_code: OperationCode, undo: &str) -> CachedOperation {
        CachedOperation {
            scn: 10,
            row_id: Some("AAA".to_string()),
            operation_code,
            table_name: Some("T".to_string()),
            sql_redo: String::new(),
            sql_undo: undo.to_string(),
            multi_row: false,
        }
    }

    #[test]
    fn test_substitution_rule() {
        let update = original(OperationCode::Update, "update T set X = 1 where ID = 5");
        assert_eq!(
            rollback_substitution(OperationCode::Update, &update).as_deref(),
            Some("update T set X = 1 where ID = 5")
        );
        let insert = original(OperationCode::Insert, "delete from T where ID = 5");
        assert_eq!(
            rollback_substitution(OperationCode::Delete, &insert).as_deref(),
            Some("delete from T where ID = 5")
        );
        assert_eq!(rollback_substitution(OperationCode::Delete, &update), None);
        assert_eq!(rollback_substitution(OperationCode::Update, &insert), None);
        assert_eq!(
            rollback_substitution(OperationCode::Update, &original(OperationCode::Update, "")),
            None
        );
    }
}
