use oracle::{sql_type::FromSql, RowValue};

use super::{LogFile, LogType};

impl FromSql for LogType {
    fn from_sql(val: &oracle::SqlValue) -> oracle::Result<Self>
    where
        Self: Sized,
    {
        let v: String = val.get()?;
        Ok(v.as_str().into())
    }
}

impl From<&str> for LogType {
    /// `V$LOGMNR_LOGS.TYPE` only distinguishes `ARCHIVED` from anything still being written.
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("ARCHIVED") {
            Self::Archived
        } else {
            Self::Online
        }
    }
}

impl RowValue for LogFile {
    fn get(row: &oracle::Row) -> oracle::Result<Self> {
        let (name, first_change, next_change, thread, size_bytes, log_type, status) =
            <(String, u64, u64, u32, Option<u64>, LogType, Option<i32>) as RowValue>::get(row)?;
        Ok(LogFile {
            name,
            first_change,
            next_change,
            thread,
            size_bytes: size_bytes.unwrap_or_default(),
            log_type,
            status: status.unwrap_or_default(),
        })
    }
}
