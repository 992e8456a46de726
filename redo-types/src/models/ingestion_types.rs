use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{ChangeRecord, Scn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Messages sent from a source to the pipeline.
pub enum IngestionMessage {
    /// One decoded row of the redo stream.
    Change(ChangeRecord),
    /// Every row up to (but excluding) `end_scn` has been emitted.
    WindowCompleted { end_scn: Scn },
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
pub struct OracleConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Service name of the root container (or of the whole database when it is not a CDB).
    pub sid: String,
    /// Owners whose changes are mined. Empty means every owner.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    /// Table names whose changes are mined. Empty means every table of the selected owners.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,
    #[serde(default)]
    pub log_miner: LogMinerConfig,
}

impl OracleConfig {
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.sid)
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone, Copy, Default)]
pub enum ReadPosition {
    /// Start from the oldest log file still available.
    All,
    /// Start from the current SCN.
    #[default]
    Current,
    /// Start from the log file covering `start_time`.
    Time,
    /// Start from `start_scn`.
    Scn,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct LogMinerConfig {
    /// Rows fetched per round trip when reading `V$LOGMNR_CONTENTS`. Default: 1000
    pub fetch_size: u32,
    /// Per statement timeout. Default: 300
    pub query_timeout_secs: u64,
    /// Upper bound of the summed log file sizes in one mining window. Default: 5 GiB
    pub max_log_file_size: u64,
    /// Minimum delay between two range starts. Default: 10000
    pub range_quiescence_ms: u64,
    /// Wait between polls when no new log data is available. Default: 1000
    pub poll_interval_ms: u64,
    /// Start mining with only a start SCN and let the database add log files.
    pub support_auto_add_log: bool,
    pub read_position: ReadPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_scn: Option<u64>,
    /// Milliseconds since unix epoch, used with `ReadPosition::Time`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    /// Number of open transactions kept for rollback correlation. Default: 10000
    pub transaction_cache_size: usize,
    /// SCN distance of the first backward search window for a rollback. Default: 5000
    pub rollback_search_base_step: u64,
    /// Growth of the backward search window per attempt. Default: 2000
    pub rollback_search_step_increment: u64,
}

impl Default for LogMinerConfig {
    fn default() -> Self {
        Self {
            fetch_size: 1000,
            query_timeout_secs: 300,
            max_log_file_size: 5 * 1024 * 1024 * 1024,
            range_quiescence_ms: 10_000,
            poll_interval_ms: 1000,
            support_auto_add_log: false,
            read_position: ReadPosition::default(),
            start_scn: None,
            start_time: None,
            transaction_cache_size: 10_000,
            rollback_search_base_step: 5000,
            rollback_search_step_increment: 2000,
        }
    }
}
