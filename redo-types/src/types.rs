use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System change number, the monotonically increasing position in the redo stream.
///
/// Oracle stores SCNs in 48 bits (the largest is `MAX_SCN`), so `u64` holds every value.
pub type Scn = u64;

/// `2^48 - 1`, the largest SCN Oracle issues.
pub const MAX_SCN: Scn = (1 << 48) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A cursor into the redo stream.
///
/// Ordering between positions only considers `scn`. `row_id` pins one row among the
/// several rows that can share a single SCN, and is only used to resume exactly.
pub struct LogPosition {
    pub scn: Scn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
}

impl LogPosition {
    pub fn new(scn: Scn) -> Self {
        Self { scn, row_id: None }
    }

    pub fn with_row_id(scn: Scn, row_id: impl Into<String>) -> Self {
        Self {
            scn,
            row_id: Some(row_id.into()),
        }
    }
}

impl Display for LogPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.row_id {
            Some(row_id) => write!(f, "{}/{}", self.scn, row_id),
            None => write!(f, "{}", self.scn),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Transaction identifier as the `(XIDUSN, XIDSLT, XIDSQN)` triple.
///
/// Only used as a correlation key, it carries no ordering.
pub struct TransactionId {
    pub usn: String,
    pub slot: String,
    pub sqn: String,
}

impl TransactionId {
    pub fn new(usn: impl Into<String>, slot: impl Into<String>, sqn: impl Into<String>) -> Self {
        Self {
            usn: usn.into(),
            slot: slot.into(),
            sqn: sqn.into(),
        }
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.usn, self.slot, self.sqn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Insert,
    Update,
    Delete,
    Ddl,
    Commit,
    Rollback,
}

impl Display for OperationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Ddl => "DDL",
            OperationType::Commit => "COMMIT",
            OperationType::Rollback => "ROLLBACK",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One logical (reassembled) row of the redo stream, as handed to the pipeline.
pub struct ChangeRecord {
    pub scn: Scn,
    pub row_id: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub operation: OperationType,
    /// The raw `OPERATION` column, e.g. `INSERT`, `DDL`, `UNSUPPORTED`.
    pub operation_name: String,
    /// SQL to apply downstream. For a resolved rollback this is the recovered undo statement.
    pub sql_text: String,
    /// The row's own undo text, if the log carried one.
    pub sql_undo: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub transaction_id: TransactionId,
    pub is_rollback: bool,
}

impl ChangeRecord {
    pub fn position(&self) -> LogPosition {
        LogPosition {
            scn: self.scn,
            row_id: self.row_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(LogPosition::new(42).to_string(), "42");
        assert_eq!(
            LogPosition::with_row_id(42, "AAADcjAAFAAAABoAAC").to_string(),
            "42/AAADcjAAFAAAABoAAC"
        );
    }

    #[test]
    fn test_position_json() {
        let position = LogPosition::with_row_id(7, "AAAB");
        let json = serde_json::to_string(&position).unwrap();
        assert_eq!(json, r#"{"scn":7,"row_id":"AAAB"}"#);
        let decoded: LogPosition = serde_json::from_str(r#"{"scn":7}"#).unwrap();
        assert_eq!(decoded, LogPosition::new(7));
    }

    #[test]
    fn test_max_scn_is_exact_in_json() {
        let position = LogPosition::new(MAX_SCN);
        let json = serde_json::to_string(&position).unwrap();
        assert_eq!(json, r#"{"scn":281474976710655}"#);
        assert_eq!(serde_json::from_str::<LogPosition>(&json).unwrap(), position);
    }

    #[test]
    fn test_transaction_id_display() {
        assert_eq!(TransactionId::new("1", "2", "3").to_string(), "1.2.3");
    }
}
