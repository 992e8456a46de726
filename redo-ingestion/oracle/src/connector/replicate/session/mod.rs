use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use redo_ingestion_connector::redo_types::{
    log::{debug, error, info, trace, warn},
    models::ingestion_types::LogMinerConfig,
    types::{ChangeRecord, LogPosition, OperationType, Scn},
};
use regex::Regex;

use crate::connector::{
    client::{ContentsQuery, LogMinerClient, LogMinerContent, OperationCode, RowCursor},
    Error, Result,
};

use super::{
    log::{LogFile, LogFileCatalog},
    transaction::{
        cache::{CachedOperation, TransactionCache},
        csf::{self, AssembledRow, StatementAssembler},
        encoding::{needs_legacy_repair, repair_legacy_quotes},
        rollback::{rollback_substitution, RollbackResolver},
    },
};

mod state;

pub use state::{SessionState, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackSearch {
    pub base_step: Scn,
    pub step_increment: Scn,
}

impl RollbackSearch {
    /// Width of the `attempt`th backward window. Never zero, so every search terminates.
    pub fn step(&self, attempt: u64) -> Scn {
        self.base_step
            .saturating_add(self.step_increment.saturating_mul(attempt))
            .max(1)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum time between two range starts.
    pub range_quiescence: Duration,
    pub support_auto_add_log: bool,
    pub rollback_search: RollbackSearch,
}

impl From<&LogMinerConfig> for SessionConfig {
    fn from(config: &LogMinerConfig) -> Self {
        Self {
            range_quiescence: Duration::from_millis(config.range_quiescence_ms),
            support_auto_add_log: config.support_auto_add_log,
            rollback_search: RollbackSearch {
                base_step: config.rollback_search_base_step,
                step_increment: config.rollback_search_step_increment,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Reads windows forward and resolves rollback rows.
    Primary,
    /// Owned by a `RollbackResolver`, reads older windows to refill the transaction cache.
    Secondary,
}

/// One LogMiner session over one connection, read as a pull iterator of `ChangeRecord`s.
pub struct MiningSession<C: LogMinerClient> {
    client: C,
    config: SessionConfig,
    cache: Arc<TransactionCache>,
    role: Role,
    state: SharedState,
    /// The running LogMiner range, `None` when mining is not started.
    range: Option<(Scn, Option<Scn>)>,
    last_end: Option<Scn>,
    added_logs: Vec<LogFile>,
    cursor: Option<StatementAssembler<RowCursor>>,
    current: Option<ChangeRecord>,
    position: Option<LogPosition>,
    resume_after: Option<LogPosition>,
    last_range_start: Option<Instant>,
    last_error: Option<String>,
    resolver: Option<RollbackResolver<C>>,
    temporary_table: Regex,
}

impl<C: LogMinerClient> MiningSession<C> {
    pub fn new(client: C, config: SessionConfig, cache: Arc<TransactionCache>) -> Self {
        Self::with_role(client, config, cache, Role::Primary)
    }

    pub(crate) fn secondary(client: C, config: SessionConfig, cache: Arc<TransactionCache>) -> Self {
        Self::with_role(client, config, cache, Role::Secondary)
    }

    fn with_role(
        client: C,
        config: SessionConfig,
        cache: Arc<TransactionCache>,
        role: Role,
    ) -> Self {
        Self {
            client,
            config,
            cache,
            role,
            state: SharedState::default(),
            range: None,
            last_end: None,
            added_logs: vec![],
            cursor: None,
            current: None,
            position: None,
            resume_after: None,
            last_range_start: None,
            last_error: None,
            resolver: None,
            temporary_table: Regex::new(r"(?i)no sql_redo for temporary tables").unwrap(),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.client.connect()
    }

    /// Reconnects if the connection does not answer a ping. Returns whether it reconnected.
    pub fn check_and_reset_connection(&mut self) -> Result<bool> {
        if self.client.is_valid() {
            return Ok(false);
        }
        info!("Connection is not valid, reconnecting");
        self.range = None;
        self.client.connect()?;
        Ok(true)
    }

    /// The client, reconnected first if needed.
    pub fn live_client(&mut self) -> Result<&C> {
        self.check_and_reset_connection()?;
        Ok(&self.client)
    }

    /// Starts mining `[start, end]`, waiting out the quiescence interval since the previous start.
    pub fn start_range(&mut self, start: Scn, end: Scn) -> Result<()> {
        if start > end || (self.role == Role::Primary && self.last_end.is_some_and(|last| end < last)) {
            return Err(Error::InvalidRange { start, end });
        }

        self.cursor = None;
        self.current = None;
        self.state.set(SessionState::RangeLoading);
        match self.load_range(start, end) {
            Ok(()) => {
                self.state.set(SessionState::RangeLoaded);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn load_range(&mut self, start: Scn, end: Scn) -> Result<()> {
        self.check_and_reset_connection()?;
        self.wait_for_quiescence();

        let end_bound = (!self.config.support_auto_add_log).then_some(end);
        let started = Instant::now();
        self.client.start_log_miner(start, end_bound)?;
        self.range = Some((start, end_bound));
        self.last_end = Some(end);

        self.added_logs = self.client.list_added_files()?;
        info!(
            "Mining range [{}, {}] started in {:?} over {} log files",
            start,
            end,
            started.elapsed(),
            self.added_logs.len()
        );
        Ok(())
    }

    fn wait_for_quiescence(&mut self) {
        if let Some(last) = self.last_range_start {
            let elapsed = last.elapsed();
            if elapsed < self.config.range_quiescence {
                let remaining = self.config.range_quiescence - elapsed;
                debug!("Waiting {:?} before starting the next mining range", remaining);
                std::thread::sleep(remaining);
            }
        }
        self.last_range_start = Some(Instant::now());
    }

    /// Opens the row cursor over the loaded range.
    pub fn query(&mut self, query: ContentsQuery) -> Result<()> {
        let state = self.state.get();
        if state != SessionState::RangeLoaded {
            return Err(Error::InvalidState {
                operation: "query",
                state,
            });
        }

        match self.open_cursor(&query) {
            Ok(()) => {
                self.state.set(SessionState::Scanning);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn open_cursor(&mut self, query: &ContentsQuery) -> Result<()> {
        let range = self.range;
        if self.check_and_reset_connection()? {
            // The mining range belongs to the connection that was lost.
            if let Some((start, end)) = range {
                info!("Restarting mining range from {} after reconnect", start);
                self.client.start_log_miner(start, end)?;
                self.range = range;
            }
        }

        let started = Instant::now();
        let rows = self.client.query_contents(query)?;
        info!("Contents query opened in {:?}", started.elapsed());
        self.cursor = Some(csf::process(rows));
        Ok(())
    }

    /// Moves to the next change. Returns `false` once the range is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        self.next_until(None)
    }

    /// Like `advance`, but also stops at `end`: at the first row past its SCN, or at the row it names exactly.
    pub fn next_until(&mut self, end: Option<&LogPosition>) -> Result<bool> {
        match self.state.get() {
            SessionState::Scanning | SessionState::RowReady => {}
            SessionState::Exhausted => return Ok(false),
            state => {
                return Err(Error::InvalidState {
                    operation: "advance",
                    state,
                })
            }
        }

        self.state.set(SessionState::Scanning);
        self.current = None;
        match self.scan(end) {
            Ok(Some(record)) => {
                self.position = Some(record.position());
                self.current = Some(record);
                self.state.set(SessionState::RowReady);
                Ok(true)
            }
            Ok(None) => {
                self.cursor = None;
                self.state.set(SessionState::Exhausted);
                Ok(false)
            }
            Err(e) => self.fail(e),
        }
    }

    fn scan(&mut self, end: Option<&LogPosition>) -> Result<Option<ChangeRecord>> {
        loop {
            let Some(row) = self.cursor.as_mut().and_then(Iterator::next) else {
                return Ok(None);
            };
            let AssembledRow {
                mut content,
                fragments,
            } = row?;

            if content.operation_code.ends_transaction() {
                self.cache.clean(&content.xid);
                continue;
            }

            let Some(sql_redo) = content
                .sql_redo
                .take()
                .filter(|sql| !sql.trim().is_empty())
            else {
                continue;
            };
            if self.temporary_table.is_match(&sql_redo) {
                trace!("Skipping temporary table row at SCN {}", content.scn);
                continue;
            }

            if end.is_some_and(|end| reached_end(&content, end)) {
                return Ok(None);
            }
            if self.skip_resumed(&content) {
                continue;
            }

            let Some(operation) = content.operation_code.operation_type() else {
                trace!("Skipping {} row at SCN {}", content.operation, content.scn);
                continue;
            };
            if operation == OperationType::Ddl {
                return Ok(Some(change_record(content, operation, sql_redo)));
            }
            return Ok(Some(self.build_dml(content, operation, sql_redo, fragments > 1)));
        }
    }

    /// Drops rows up to and including the resume position.
    fn skip_resumed(&mut self, content: &LogMinerContent) -> bool {
        let Some(resume) = &self.resume_after else {
            return false;
        };
        if content.scn < resume.scn {
            return true;
        }
        if content.scn > resume.scn {
            self.resume_after = None;
            return false;
        }
        if resume.row_id.is_some() && resume.row_id == content.row_id {
            self.resume_after = None;
        }
        true
    }

    fn build_dml(
        &mut self,
        content: LogMinerContent,
        operation: OperationType,
        sql_redo: String,
        multi_row: bool,
    ) -> ChangeRecord {
        let mut sql_text = sql_redo;
        let mut multi_row = multi_row;
        if content.rollback
            && matches!(
                content.operation_code,
                OperationCode::Update | OperationCode::Delete
            )
        {
            if let Some(original) = self.resolve_rollback(&content) {
                match rollback_substitution(content.operation_code, &original) {
                    Some(undo) => {
                        sql_text = undo;
                        multi_row = original.multi_row;
                    }
                    None => warn!(
                        "No undo statement for rollback at SCN {}, emitting the logged statement",
                        content.scn
                    ),
                }
            }
        }

        if needs_legacy_repair(self.client.database_info(), multi_row) {
            if let Some(repaired) = repair_legacy_quotes(&sql_text, content.operation_code) {
                debug!("Repaired quotes of statement at SCN {}", content.scn);
                sql_text = repaired;
            }
        }

        if !content.rollback {
            self.cache.put(
                content.xid.clone(),
                CachedOperation {
                    scn: content.scn,
                    row_id: content.row_id.clone(),
                    operation_code: content.operation_code,
                    table_name: content.table_name.clone(),
                    sql_redo: sql_text.clone(),
                    sql_undo: content.sql_undo.clone().unwrap_or_default(),
                    multi_row,
                },
            );
        }
        change_record(content, operation, sql_text)
    }

    fn resolve_rollback(&mut self, content: &LogMinerContent) -> Option<CachedOperation> {
        if self.role == Role::Secondary {
            return None;
        }
        let resolver = self.resolver.get_or_insert_with(|| {
            RollbackResolver::new(
                self.client.detached(),
                self.config.clone(),
                self.cache.clone(),
            )
        });

        match resolver.resolve(content) {
            Ok(Some(original)) => Some(original),
            Ok(None) => {
                let error = Error::ResolutionFailure {
                    scn: content.scn,
                    xid: content.xid.clone(),
                };
                warn!("{}, emitting the logged statement", error);
                None
            }
            Err(e) => {
                warn!(
                    "Rollback resolution for transaction {} failed: {}",
                    content.xid, e
                );
                None
            }
        }
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        self.state.set(SessionState::Failed);
        self.last_error = Some(error.to_string());
        self.cursor = None;
        self.current = None;
        Err(error)
    }

    pub fn current(&self) -> Option<&ChangeRecord> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<ChangeRecord> {
        self.current.take()
    }

    /// Position of the last change handed out.
    pub fn current_position(&self) -> Option<&LogPosition> {
        self.position.as_ref()
    }

    /// Skips every row up to and including `position` in the next scans.
    pub fn resume(&mut self, position: LogPosition) {
        self.resume_after = Some(position.clone());
        self.position = Some(position);
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Handle for observing the state from another thread.
    pub fn state_handle(&self) -> SharedState {
        self.state.clone()
    }

    pub fn added_logs(&self) -> &[LogFile] {
        &self.added_logs
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Ends mining and drops everything tied to the current range, including the secondary session.
    pub fn stop(&mut self) {
        self.cursor = None;
        self.current = None;
        if self.range.take().is_some() {
            if let Err(e) = self.client.end_log_miner() {
                error!("Failed to end log miner: {}", e);
            }
        }
        self.added_logs.clear();
        self.last_end = None;
        if let Some(resolver) = self.resolver.as_mut() {
            resolver.stop();
        }
        self.state.set(SessionState::Initial);
    }
}

impl<C: LogMinerClient> Drop for MiningSession<C> {
    fn drop(&mut self) {
        if self.range.is_some() {
            self.stop();
        }
    }
}

fn reached_end(content: &LogMinerContent, end: &LogPosition) -> bool {
    let Some(row_id) = &content.row_id else {
        return false;
    };
    content.scn > end.scn || (content.scn == end.scn && end.row_id.as_ref() == Some(row_id))
}

fn change_record(
    content: LogMinerContent,
    operation: OperationType,
    sql_text: String,
) -> ChangeRecord {
    ChangeRecord {
        scn: content.scn,
        row_id: content.row_id,
        schema: content.seg_owner,
        table: content.table_name,
        operation,
        operation_name: content.operation,
        sql_text,
        sql_undo: content.sql_undo,
        timestamp: content.timestamp,
        transaction_id: content.xid,
        is_rollback: content.rollback,
    }
}
