use redo_ingestion_connector::redo_types::{
    thiserror,
    types::{Scn, TransactionId},
};

use self::replicate::session::SessionState;

/// `oracle`'s `ToSql` implementation for `&str` uses `NVARCHAR2` type, which Oracle expects to be UTF16 encoded by default.
/// Here we use `VARCHAR2` type instead, which Oracle expects to be UTF8 encoded by default.
/// This is a macro because it references a temporary `OracleType`.
macro_rules! str_to_sql {
    ($s:expr) => {
        // `s.len()` is the upper bound of `s.chars().count()`
        (
            &$s,
            &::oracle::sql_type::OracleType::Varchar2($s.len() as u32),
        )
    };
}

pub mod client;
pub mod position;
pub mod privilege;
pub mod replicate;
mod sql;

/// ORA codes of a lost, refused or killed session. Any other server error is final.
const NETWORK_ERROR_CODES: [i32; 19] = [
    28,    // session killed
    1012,  // not logged on
    1033,  // initialization or shutdown in progress
    1034,  // ORACLE not available
    1089,  // immediate shutdown in progress
    2396,  // maximum idle time exceeded
    3113,  // end-of-file on communication channel
    3114,  // not connected to ORACLE
    3135,  // connection lost contact
    3156,  // OCI call timed out
    12153, // not connected
    12170, // connect timeout
    12514, // listener does not know of service
    12528, // listener: all instances are blocking new connections
    12537, // connection closed
    12541, // no listener
    12543, // destination host unreachable
    12571, // packet writer failure
    25408, // can not safely replay call
];

/// Client side "not connected", "call timeout exceeded" and "connection closed" failures.
const NETWORK_DPI_ERRORS: [&str; 3] = ["DPI-1010", "DPI-1067", "DPI-1080"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("oracle error: {0:?}")]
    Oracle(#[from] oracle::Error),
    #[error("connection unusable: {0}")]
    Connectivity(String),
    #[error("missing privileges: {0}")]
    Permission(String),
    #[error("no log data available after SCN {0}")]
    RangeExhausted(Scn),
    #[error("cannot assemble statement at SCN {scn}: {reason}")]
    Assembly { scn: Scn, reason: String },
    #[error("no original change found for rollback in transaction {xid} at SCN {scn}")]
    ResolutionFailure { scn: Scn, xid: TransactionId },
    #[error("cannot {operation} while session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("invalid mining range [{start}, {end}]")]
    InvalidRange { start: Scn, end: Scn },
    #[error("read position `Scn` requires `start_scn`")]
    MissingStartScn,
    #[error("read position `Time` requires `start_time`")]
    MissingStartTime,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether reconnecting and restarting the current range may clear this error.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Connectivity(_) => true,
            Error::Oracle(oracle::Error::OciError(db_error)) => {
                NETWORK_ERROR_CODES.contains(&db_error.code())
            }
            // ODPI-C errors carry no ORA code.
            Error::Oracle(oracle::Error::DpiError(db_error)) => NETWORK_DPI_ERRORS
                .iter()
                .any(|prefix| db_error.message().starts_with(prefix)),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
