use redo_ingestion_connector::redo_types::{
    log::{debug, info},
    types::Scn,
};

use crate::connector::Result;

use super::{LogFile, LogFileCatalog, ThreadLogs};

/// A planned mining range `[start_scn, end_scn)` and the files it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start_scn: Scn,
    pub end_scn: Scn,
    pub used_online_file: bool,
    pub files: Vec<LogFile>,
}

impl Window {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|file| file.size_bytes).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowPlanner {
    max_window_bytes: u64,
}

impl WindowPlanner {
    pub fn new(max_window_bytes: u64) -> Self {
        Self { max_window_bytes }
    }

    /// Plans the window starting at `start`, reading archived files only as long as they alone fill the window.
    pub fn next_window(
        &self,
        catalog: &impl LogFileCatalog,
        start: Scn,
        consumed: &[LogFile],
    ) -> Result<Option<Window>> {
        let archived = catalog.list_covering_files(start, false)?;
        if let Some(window) = self.plan(start, &archived, consumed, || catalog.head_scn())? {
            if window.total_bytes() >= self.max_window_bytes {
                return Ok(Some(window));
            }
        }

        let all = catalog.list_covering_files(start, true)?;
        let window = self.plan(start, &all, consumed, || catalog.head_scn())?;
        match &window {
            Some(window) => info!(
                "Planned window [{}, {}) over {} files ({} bytes, online: {})",
                window.start_scn,
                window.end_scn,
                window.files.len(),
                window.total_bytes(),
                window.used_online_file
            ),
            None => debug!("No log data after SCN {}", start),
        }
        Ok(window)
    }

    /// Advances every redo thread to a common end SCN until the size ceiling is reached.
    ///
    /// The end is always the smallest `next_change` among the threads' next files, so no thread
    /// is read past a point another thread has not reached yet. A window touching an online file
    /// ends at `head_scn` instead and reads every candidate file, because an online file's
    /// `next_change` is not final.
    pub fn plan(
        &self,
        start: Scn,
        logs: &ThreadLogs,
        consumed: &[LogFile],
        head_scn: impl FnOnce() -> Result<Scn>,
    ) -> Result<Option<Window>> {
        let candidates = logs
            .values()
            .map(|files| {
                files
                    .iter()
                    .filter(|file| {
                        // A file that covers no SCN is never read.
                        file.first_change < file.next_change
                            && file.next_change > start
                            && !consumed.iter().any(|done| done.same_file(file))
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|files| !files.is_empty())
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut next = vec![0; candidates.len()];
        let mut files = vec![];
        let mut bytes = 0;
        let mut end = None;
        while bytes < self.max_window_bytes {
            let Some(bound) = candidates
                .iter()
                .zip(&next)
                .filter_map(|(files, &index)| files.get(index))
                .map(|file| file.next_change)
                .min()
            else {
                break;
            };

            for (thread_files, index) in candidates.iter().zip(next.iter_mut()) {
                while let Some(file) = thread_files.get(*index) {
                    if file.first_change >= bound {
                        break;
                    }
                    bytes += file.size_bytes;
                    files.push((*file).clone());
                    *index += 1;
                }
            }
            end = Some(bound);
        }

        let Some(mut end) = end else {
            return Ok(None);
        };
        let used_online_file = files.iter().any(LogFile::is_online);
        if used_online_file {
            end = head_scn()?;
            files = candidates.into_iter().flatten().cloned().collect();
        }
        if end <= start {
            return Ok(None);
        }

        Ok(Some(Window {
            start_scn: start,
            end_scn: end,
            used_online_file,
            files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        connector::replicate::log::{group_by_thread, LogType},
        test_util::log_file,
    };

    struct StaticCatalog {
        files: Vec<LogFile>,
        head: Scn,
        head_calls: Cell<usize>,
    }

    impl LogFileCatalog for StaticCatalog {
        fn list_added_files(&self) -> Result<Vec<LogFile>> {
            Ok(vec![])
        }

        fn list_covering_files(&self, from: Scn, include_online: bool) -> Result<ThreadLogs> {
            Ok(group_by_thread(self.files.iter().cloned().filter(|file| {
                file.next_change > from && (include_online || !file.is_online())
            })))
        }

        fn head_scn(&self) -> Result<Scn> {
            self.head_calls.set(self.head_calls.get() + 1);
            Ok(self.head)
        }
    }

    fn catalog(files: Vec<LogFile>, head: Scn) -> StaticCatalog {
        StaticCatalog {
            files,
            head,
            head_calls: Cell::new(0),
        }
    }

    #[test]
    fn test_two_archived_files_fit_one_window() {
        let catalog = catalog(
            vec![
                log_file("1_10.arc", 1, (100, 200), LogType::Archived),
                log_file("1_11.arc", 1, (200, 300), LogType::Archived),
            ],
            1000,
        );
        let window = WindowPlanner::new(1000)
            .next_window(&catalog, 100, &[])
            .unwrap()
            .unwrap();
        assert_eq!(window.start_scn, 100);
        assert_eq!(window.end_scn, 300);
        assert!(!window.used_online_file);
        assert_eq!(window.files.len(), 2);
        assert_eq!(catalog.head_calls.get(), 0);
    }

    #[test]
    fn test_size_ceiling_bounds_window() {
        let catalog = catalog(
            vec![
                log_file("1_10.arc", 1, (100, 200), LogType::Archived),
                log_file("1_11.arc", 1, (200, 300), LogType::Archived),
                log_file("1_12.arc", 1, (300, 400), LogType::Archived),
            ],
            1000,
        );
        let window = WindowPlanner::new(150)
            .next_window(&catalog, 100, &[])
            .unwrap()
            .unwrap();
        assert_eq!(window.end_scn, 300);
        assert_eq!(window.total_bytes(), 200);
    }

    #[test]
    fn test_threads_advance_to_common_bound() {
        let logs = group_by_thread(vec![
            log_file("1_10.arc", 1, (100, 500), LogType::Archived),
            log_file("2_7.arc", 2, (100, 200), LogType::Archived),
            log_file("2_8.arc", 2, (200, 300), LogType::Archived),
        ]);
        let window = WindowPlanner::new(u64::MAX)
            .plan(100, &logs, &[], || unreachable!())
            .unwrap()
            .unwrap();
        // Thread 1 is still inside its only file, so the window stops where thread 2's data ends.
        assert_eq!(window.end_scn, 300);
        assert_eq!(window.files.len(), 3);
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let logs = group_by_thread(vec![
            log_file("1_10.arc", 1, (50, 100), LogType::Archived),
            log_file("1_11.arc", 1, (100, 100), LogType::Archived),
        ]);
        let window = WindowPlanner::new(u64::MAX)
            .plan(50, &logs, &[], || unreachable!())
            .unwrap()
            .unwrap();
        assert_eq!(window.end_scn, 100);
        assert_eq!(window.files.len(), 1);

        let logs = group_by_thread(vec![log_file("1_11.arc", 1, (100, 100), LogType::Archived)]);
        assert!(WindowPlanner::new(50)
            .plan(50, &logs, &[], || unreachable!())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_online_file_pins_end_to_head() {
        let catalog = catalog(
            vec![
                log_file("1_10.arc", 1, (100, 200), LogType::Archived),
                log_file("redo01.log", 1, (200, u64::MAX), LogType::Online),
            ],
            250,
        );
        let window = WindowPlanner::new(1000)
            .next_window(&catalog, 150, &[])
            .unwrap()
            .unwrap();
        assert!(window.used_online_file);
        assert_eq!(window.end_scn, 250);
        assert_eq!(window.files.len(), 2);
        assert_eq!(catalog.head_calls.get(), 1);
    }

    #[test]
    fn test_no_unconsumed_file() {
        let planner = WindowPlanner::new(1000);
        assert!(planner
            .next_window(&catalog(vec![], 100), 100, &[])
            .unwrap()
            .is_none());

        let done = log_file("1_10.arc", 1, (100, 200), LogType::Archived);
        let logs = group_by_thread(vec![done.clone()]);
        assert!(planner
            .plan(150, &logs, &[done], || unreachable!())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_windows_partition_the_scn_axis() {
        let files = (0..6)
            .map(|i| {
                log_file(
                    &format!("1_{i}.arc"),
                    1,
                    (100 + i * 100, 200 + i * 100),
                    LogType::Archived,
                )
            })
            .collect::<Vec<_>>();
        let catalog = catalog(files, 0);
        let planner = WindowPlanner::new(150);

        let mut start = 100;
        let mut ends = vec![];
        while let Some(window) = planner.next_window(&catalog, start, &[]).unwrap() {
            assert_eq!(window.start_scn, start);
            assert!(window.end_scn > start);
            ends.push(window.end_scn);
            start = window.end_scn;
        }
        assert_eq!(ends, vec![300, 500, 700]);
    }
}
