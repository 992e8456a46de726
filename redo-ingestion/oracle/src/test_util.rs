use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use redo_ingestion_connector::redo_types::{
    chrono::{DateTime, TimeZone, Utc},
    parking_lot::Mutex,
    types::{Scn, TransactionId},
};

use crate::connector::{
    client::{ContentsQuery, DatabaseInfo, LogMinerClient, LogMinerContent, OperationCode, RowCursor},
    replicate::log::{LogFile, LogType},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartLogMiner { start: Scn, end: Option<Scn> },
    EndLogMiner,
    Query(ContentsQuery),
}

/// In memory stand in for `V$LOGMNR_CONTENTS` and the log file views, shared by every client of one test.
#[derive(Debug)]
pub struct MockDatabase {
    pub rows: Vec<LogMinerContent>,
    pub files: Vec<LogFile>,
    pub current_scn: Scn,
    pub min_scn: Scn,
    pub time_scn: Option<Scn>,
    pub info: DatabaseInfo,
    pub roles: Vec<String>,
    pub privileges: Vec<String>,
    /// The next contents query yields this many rows, then breaks the connection.
    pub fail_fetch_after: Option<usize>,
    pub calls: Vec<(usize, Call)>,
    pub connections: usize,
    next_client_id: usize,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self {
            rows: vec![],
            files: vec![],
            current_scn: 0,
            min_scn: 0,
            time_scn: None,
            info: DatabaseInfo {
                version: 19,
                encoding: "AL32UTF8".to_string(),
                cdb: false,
                rac: false,
            },
            roles: vec![],
            privileges: vec![],
            fail_fetch_after: None,
            calls: vec![],
            connections: 0,
            next_client_id: 1,
        }
    }
}

impl MockDatabase {
    /// Queries issued by client `id`.
    pub fn queries_of(&self, id: usize) -> Vec<&ContentsQuery> {
        self.calls
            .iter()
            .filter_map(|(client, call)| match call {
                Call::Query(query) if *client == id => Some(query),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MockClient {
    id: usize,
    database: Arc<Mutex<MockDatabase>>,
    alive: Arc<AtomicBool>,
    info: Option<DatabaseInfo>,
}

impl MockClient {
    pub fn database(&self) -> Arc<Mutex<MockDatabase>> {
        self.database.clone()
    }

    pub fn with_database<T>(&self, f: impl FnOnce(&mut MockDatabase) -> T) -> T {
        f(&mut self.database.lock())
    }

    fn require_connection(&self) -> Result<()> {
        if self.alive.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::Connectivity("ORA-03114: not connected to ORACLE".to_string()))
        }
    }

    fn record(&self, call: Call) {
        self.database.lock().calls.push((self.id, call));
    }
}

impl LogMinerClient for MockClient {
    fn connect(&mut self) -> Result<()> {
        let mut database = self.database.lock();
        database.connections += 1;
        self.info = Some(database.info.clone());
        self.alive.store(true, Ordering::Release);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn database_info(&self) -> Option<&DatabaseInfo> {
        self.info.as_ref()
    }

    fn detached(&self) -> Self {
        let mut database = self.database.lock();
        let id = database.next_client_id;
        database.next_client_id += 1;
        Self {
            id,
            database: self.database.clone(),
            alive: Arc::default(),
            info: None,
        }
    }

    fn start_log_miner(&self, start: Scn, end: Option<Scn>) -> Result<()> {
        self.require_connection()?;
        self.record(Call::StartLogMiner { start, end });
        Ok(())
    }

    fn end_log_miner(&self) -> Result<()> {
        self.record(Call::EndLogMiner);
        Ok(())
    }

    fn query_contents(&self, query: &ContentsQuery) -> Result<RowCursor> {
        self.require_connection()?;
        self.record(Call::Query(query.clone()));

        let mut database = self.database.lock();
        let rows = database
            .rows
            .iter()
            .filter(|row| matches_query(row, query))
            .cloned()
            .collect::<Vec<_>>();
        let fail_after = database.fail_fetch_after.take();
        let alive = self.alive.clone();
        Ok(Box::new(rows.into_iter().enumerate().map(
            move |(index, row)| {
                if fail_after == Some(index) {
                    alive.store(false, Ordering::Release);
                    Err(Error::Connectivity(
                        "ORA-03113: end-of-file on communication channel".to_string(),
                    ))
                } else {
                    Ok(row)
                }
            },
        )))
    }

    fn list_added_logs(&self) -> Result<Vec<LogFile>> {
        Ok(self.database.lock().files.clone())
    }

    fn list_log_files(&self, from: Scn, include_online: bool) -> Result<Vec<LogFile>> {
        Ok(self
            .database
            .lock()
            .files
            .iter()
            .filter(|file| file.next_change > from && (include_online || !file.is_online()))
            .cloned()
            .collect())
    }

    fn current_scn(&self) -> Result<Scn> {
        Ok(self.database.lock().current_scn)
    }

    fn min_scn(&self) -> Result<Scn> {
        Ok(self.database.lock().min_scn)
    }

    fn log_start_scn_by_time(&self, _time: DateTime<Utc>) -> Result<Option<Scn>> {
        Ok(self.database.lock().time_scn)
    }

    fn user_roles(&self) -> Result<Vec<String>> {
        Ok(self.database.lock().roles.clone())
    }

    fn user_privileges(&self) -> Result<Vec<String>> {
        Ok(self.database.lock().privileges.clone())
    }
}

fn matches_query(row: &LogMinerContent, query: &ContentsQuery) -> bool {
    match query {
        ContentsQuery::Range {
            start,
            end,
            schemas,
            tables,
        } => {
            row.scn >= *start
                && row.scn < *end
                && (row.operation_code.ends_transaction()
                    || (contains(schemas, &row.seg_owner) && contains(tables, &row.table_name)))
        }
        ContentsQuery::Transaction {
            xid,
            table,
            start,
            end,
        } => {
            row.xid == *xid
                && row.scn >= *start
                && row.scn <= *end
                && !row.rollback
                && matches!(
                    row.operation_code,
                    OperationCode::Insert | OperationCode::Update
                )
                && (table.is_none() || *table == row.table_name)
        }
    }
}

fn contains(filter: &[String], value: &Option<String>) -> bool {
    filter.is_empty() || value.as_ref().is_some_and(|value| filter.contains(value))
}

pub fn xid(value: &str) -> TransactionId {
    let mut parts = value.split('.');
    let mut next = || parts.next().unwrap().to_string();
    TransactionId::new(next(), next(), next())
}

/// A single fragment row of `HR.T` with row id `ROW<scn>`.
pub fn content(scn: Scn, operation_code: OperationCode, xid_value: &str, redo: &str) -> LogMinerContent {
    let operation = match operation_code {
        OperationCode::Insert => "INSERT",
        OperationCode::Delete => "DELETE",
        OperationCode::Update => "UPDATE",
        OperationCode::Ddl => "DDL",
        OperationCode::Start => "START",
        OperationCode::Commit => "COMMIT",
        OperationCode::Rollback => "ROLLBACK",
        OperationCode::Other(_) => "UNSUPPORTED",
    };
    LogMinerContent {
        scn,
        timestamp: Utc.timestamp_opt(1_700_000_000 + scn as i64, 0).unwrap(),
        operation: operation.to_string(),
        operation_code,
        seg_owner: Some("HR".to_string()),
        table_name: Some("T".to_string()),
        sql_redo: Some(redo.to_string()),
        sql_undo: None,
        csf: false,
        rollback: false,
        xid: xid(xid_value),
        row_id: Some(format!("ROW{scn}")),
    }
}

pub fn log_file(name: &str, thread: u32, (first_change, next_change): (Scn, Scn), log_type: LogType) -> LogFile {
    LogFile {
        name: name.to_string(),
        first_change,
        next_change,
        thread,
        size_bytes: 100,
        log_type,
        status: 0,
    }
}
