use redo_ingestion_connector::redo_types::{
    chrono::{DateTime, Utc},
    types::{OperationType, Scn, TransactionId},
};

use super::{replicate::log::LogFile, Result};

mod connection;

pub use self::connection::OracleClient;

/// Forward only cursor over `V$LOGMNR_CONTENTS` rows.
pub type RowCursor = Box<dyn Iterator<Item = Result<LogMinerContent>>>;

/// Blocking access to one database session that can run LogMiner.
pub trait LogMinerClient {
    /// Logs in (again) and prepares the session for mining.
    fn connect(&mut self) -> Result<()>;
    /// Cheap liveness probe. Never fails, an unusable connection is just invalid.
    fn is_valid(&self) -> bool;
    /// Facts gathered on the last successful `connect`.
    fn database_info(&self) -> Option<&DatabaseInfo>;
    /// An unconnected client with the same credentials.
    fn detached(&self) -> Self
    where
        Self: Sized;

    /// Starts mining `[start, end]`, or from `start` onwards with log files added automatically when `end` is `None`.
    fn start_log_miner(&self, start: Scn, end: Option<Scn>) -> Result<()>;
    fn end_log_miner(&self) -> Result<()>;
    fn query_contents(&self, query: &ContentsQuery) -> Result<RowCursor>;
    /// Log files attached to the running mining range.
    fn list_added_logs(&self) -> Result<Vec<LogFile>>;
    /// Log files that may contain `from` or later changes.
    fn list_log_files(&self, from: Scn, include_online: bool) -> Result<Vec<LogFile>>;

    fn current_scn(&self) -> Result<Scn>;
    /// Oldest SCN still covered by an available log file.
    fn min_scn(&self) -> Result<Scn>;
    /// First SCN of the log file covering `time`.
    fn log_start_scn_by_time(&self, time: DateTime<Utc>) -> Result<Option<Scn>>;

    fn user_roles(&self) -> Result<Vec<String>>;
    fn user_privileges(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Major version, e.g. `19`.
    pub version: u32,
    /// `NLS_CHARACTERSET`, e.g. `AL32UTF8`.
    pub encoding: String,
    pub cdb: bool,
    pub rac: bool,
}

impl DatabaseInfo {
    pub fn is_oracle10(&self) -> bool {
        self.version == 10
    }

    pub fn is_gbk(&self) -> bool {
        self.encoding.to_ascii_uppercase().contains("GBK")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentsQuery {
    /// Every change of `[start, end)`, optionally restricted to some owners and tables.
    Range {
        start: Scn,
        end: Scn,
        schemas: Vec<String>,
        tables: Vec<String>,
    },
    /// Inserts and updates of one transaction in `[start, end]` that were not rolled back.
    Transaction {
        xid: TransactionId,
        table: Option<String>,
        start: Scn,
        end: Scn,
    },
}

/// `OPERATION_CODE` of a mined row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    Insert,
    Delete,
    Update,
    Ddl,
    Start,
    Commit,
    Rollback,
    Other(u8),
}

impl From<u8> for OperationCode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Insert,
            2 => Self::Delete,
            3 => Self::Update,
            5 => Self::Ddl,
            6 => Self::Start,
            7 => Self::Commit,
            36 => Self::Rollback,
            other => Self::Other(other),
        }
    }
}

impl OperationCode {
    /// Operation exposed downstream, `None` for rows that never become a `ChangeRecord`.
    pub fn operation_type(self) -> Option<OperationType> {
        match self {
            OperationCode::Insert => Some(OperationType::Insert),
            OperationCode::Delete => Some(OperationType::Delete),
            OperationCode::Update => Some(OperationType::Update),
            OperationCode::Ddl => Some(OperationType::Ddl),
            OperationCode::Commit => Some(OperationType::Commit),
            OperationCode::Rollback => Some(OperationType::Rollback),
            OperationCode::Start | OperationCode::Other(_) => None,
        }
    }

    /// Transaction level markers: commit and rollback of a whole transaction.
    pub fn ends_transaction(self) -> bool {
        matches!(self, OperationCode::Commit | OperationCode::Rollback)
    }
}

/// One physical row of `V$LOGMNR_CONTENTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMinerContent {
    pub scn: Scn,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub operation_code: OperationCode,
    pub seg_owner: Option<String>,
    pub table_name: Option<String>,
    pub sql_redo: Option<String>,
    pub sql_undo: Option<String>,
    /// More fragments of this statement follow in the next row.
    pub csf: bool,
    pub rollback: bool,
    pub xid: TransactionId,
    pub row_id: Option<String>,
}
