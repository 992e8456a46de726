use std::collections::BTreeMap;

use redo_ingestion_connector::redo_types::types::Scn;

use crate::connector::{client::LogMinerClient, Result};

mod listing;
mod window;

pub use window::{Window, WindowPlanner};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogType {
    Online = 0,
    Archived = 1,
}

/// One physical redo log file, covering `[first_change, next_change)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub name: String,
    pub first_change: Scn,
    pub next_change: Scn,
    pub thread: u32,
    pub size_bytes: u64,
    pub log_type: LogType,
    pub status: i32,
}

impl LogFile {
    pub fn is_online(&self) -> bool {
        self.log_type == LogType::Online
    }

    fn same_file(&self, other: &LogFile) -> bool {
        self.name == other.name && self.first_change == other.first_change
    }
}

/// Log files per redo thread, each list ordered by `first_change`.
pub type ThreadLogs = BTreeMap<u32, Vec<LogFile>>;

pub fn group_by_thread(files: impl IntoIterator<Item = LogFile>) -> ThreadLogs {
    let mut logs = ThreadLogs::new();
    for file in files {
        logs.entry(file.thread).or_default().push(file);
    }
    for files in logs.values_mut() {
        files.sort_by_key(|file| (file.first_change, file.next_change));
        files.dedup_by(|a, b| a.same_file(b));
    }
    logs
}

/// Source of the log files a mining window is planned over.
pub trait LogFileCatalog {
    /// Files attached to the mining range that is currently running.
    fn list_added_files(&self) -> Result<Vec<LogFile>>;
    /// Files whose range may contain `from` or later changes.
    fn list_covering_files(&self, from: Scn, include_online: bool) -> Result<ThreadLogs>;
    /// The database's current SCN, the only safe end for a window that reads an online file.
    fn head_scn(&self) -> Result<Scn>;
}

impl<C: LogMinerClient> LogFileCatalog for C {
    fn list_added_files(&self) -> Result<Vec<LogFile>> {
        self.list_added_logs()
    }

    fn list_covering_files(&self, from: Scn, include_online: bool) -> Result<ThreadLogs> {
        let files = self.list_log_files(from, include_online)?;
        Ok(group_by_thread(
            files.into_iter().filter(|file| file.next_change > from),
        ))
    }

    fn head_scn(&self) -> Result<Scn> {
        self.current_scn()
    }
}
