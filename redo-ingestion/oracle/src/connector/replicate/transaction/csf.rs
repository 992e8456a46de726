//! Handles the Continuation SQL flag in V$LOGMNR_CONTENTS.

use redo_ingestion_connector::redo_types::log::warn;

use crate::connector::{client::LogMinerContent, Error, Result};

/// One logical statement, rebuilt from `fragments` physical rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRow {
    pub content: LogMinerContent,
    pub fragments: usize,
}

impl AssembledRow {
    fn new(content: LogMinerContent) -> Self {
        Self {
            content,
            fragments: 1,
        }
    }

    pub fn is_multi_row(&self) -> bool {
        self.fragments > 1
    }

    fn append(&mut self, fragment: LogMinerContent) {
        concat(&mut self.content.sql_redo, fragment.sql_redo);
        concat(&mut self.content.sql_undo, fragment.sql_undo);
        self.content.csf = fragment.csf;
        self.fragments += 1;
    }
}

fn concat(previous: &mut Option<String>, current: Option<String>) {
    if let Some(current) = current {
        previous.get_or_insert_with(String::new).push_str(&current);
    }
}

/// Output items are guaranteed to have CSF = 0.
///
/// A statement whose fragments are cut off by the end of the cursor, or interleaved with another
/// transaction's row, is dropped with a warning and scanning goes on.
pub fn process<I: Iterator<Item = Result<LogMinerContent>>>(iterator: I) -> StatementAssembler<I> {
    StatementAssembler {
        iterator,
        pending: None,
    }
}

pub struct StatementAssembler<I> {
    iterator: I,
    pending: Option<AssembledRow>,
}

impl<I: Iterator<Item = Result<LogMinerContent>>> Iterator for StatementAssembler<I> {
    type Item = Result<AssembledRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let content = match self.iterator.next() {
                Some(Ok(content)) => content,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    if let Some(pending) = self.pending.take() {
                        drop_statement(&pending, "log rows ended before the last fragment");
                    }
                    return None;
                }
            };

            if let Some(mut pending) = self.pending.take() {
                if pending.content.xid == content.xid {
                    pending.append(content);
                    if pending.content.csf {
                        self.pending = Some(pending);
                        continue;
                    }
                    return Some(Ok(pending));
                }
                drop_statement(
                    &pending,
                    &format!("fragment interrupted by transaction {}", content.xid),
                );
            }

            if content.csf {
                self.pending = Some(AssembledRow::new(content));
            } else {
                return Some(Ok(AssembledRow::new(content)));
            }
        }
    }
}

fn drop_statement(pending: &AssembledRow, reason: &str) {
    let error = Error::Assembly {
        scn: pending.content.scn,
        reason: reason.to_string(),
    };
    warn!(
        "Dropping {} fragments of transaction {}: {}",
        pending.fragments, pending.content.xid, error
    );
}
