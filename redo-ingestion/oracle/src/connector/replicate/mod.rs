use std::{sync::Arc, time::Duration};

use redo_ingestion_connector::{
    blocking_retry_on_network_failure,
    redo_types::{
        log::{debug, error, info},
        models::ingestion_types::{IngestionMessage, OracleConfig},
        parking_lot::Mutex,
        types::{LogPosition, Scn},
    },
    Ingestor,
};

use crate::connector::{
    client::{ContentsQuery, LogMinerClient},
    Error, Result,
};

use self::{
    log::{LogFile, Window, WindowPlanner},
    session::MiningSession,
};

pub mod log;
pub mod session;
pub mod transaction;

/// Position of the last change sent to the ingestor, read by `serialize_state`.
pub type SharedPosition = Arc<Mutex<Option<LogPosition>>>;

/// Owners and tables whose changes are mined. Empty lists select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub schemas: Vec<String>,
    pub tables: Vec<String>,
}

impl From<&OracleConfig> for TableFilter {
    fn from(config: &OracleConfig) -> Self {
        Self {
            schemas: config.schemas.clone(),
            tables: config.tables.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowOutcome {
    Completed,
    IngestorClosed,
}

/// Mines window after window from `start`, until the ingestor is closed or a non connectivity error occurs.
///
/// A window that fails with a connectivity error is mined again after reconnecting. Changes that
/// were already sent are skipped on the second attempt.
pub fn log_miner_loop<C: LogMinerClient>(
    session: &mut MiningSession<C>,
    planner: &WindowPlanner,
    filter: &TableFilter,
    start: Scn,
    poll_interval: Duration,
    ingestor: &Ingestor,
    position: &SharedPosition,
) -> Result<()> {
    let mut start = start;
    let mut consumed: Vec<LogFile> = vec![];
    loop {
        if ingestor.is_closed() {
            info!("Ingestor closed, stopping log miner at SCN {}", start);
            session.stop();
            return Ok(());
        }

        let window = blocking_retry_on_network_failure!(
            "log window planning",
            session
                .live_client()
                .and_then(|client| planner.next_window(client, start, &consumed)),
            Error::is_connectivity,
            reconnect(session)
        )?;
        let Some(window) = window else {
            debug!("{}", Error::RangeExhausted(start));
            std::thread::sleep(poll_interval);
            continue;
        };

        let outcome = blocking_retry_on_network_failure!(
            "log window mining",
            mine_window(session, &window, filter, ingestor, position),
            Error::is_connectivity,
            reconnect(session)
        )?;
        let end = window.end_scn;
        if outcome == WindowOutcome::IngestorClosed
            || ingestor
                .blocking_handle_message(IngestionMessage::WindowCompleted { end_scn: end })
                .is_err()
        {
            info!("Ingestor closed, stopping log miner at SCN {}", end);
            session.stop();
            return Ok(());
        }

        consumed = window
            .files
            .into_iter()
            .filter(|file| file.next_change <= end)
            .collect();
        start = end;
    }
}

fn reconnect<C: LogMinerClient>(session: &mut MiningSession<C>) {
    if let Err(e) = session.check_and_reset_connection() {
        error!("Failed to reconnect: {}", e);
    }
}

fn mine_window<C: LogMinerClient>(
    session: &mut MiningSession<C>,
    window: &Window,
    filter: &TableFilter,
    ingestor: &Ingestor,
    position: &SharedPosition,
) -> Result<WindowOutcome> {
    if let Some(last) = session.current_position().cloned() {
        session.resume(last);
    }

    session.start_range(window.start_scn, window.end_scn)?;
    session.query(ContentsQuery::Range {
        start: window.start_scn,
        end: window.end_scn,
        schemas: filter.schemas.clone(),
        tables: filter.tables.clone(),
    })?;

    let mut changes = 0;
    while session.advance()? {
        let Some(record) = session.take_current() else {
            continue;
        };
        let record_position = record.position();
        if ingestor
            .blocking_handle_message(IngestionMessage::Change(record))
            .is_err()
        {
            return Ok(WindowOutcome::IngestorClosed);
        }
        *position.lock() = Some(record_position);
        changes += 1;
    }

    info!(
        "Window [{}, {}) produced {} changes",
        window.start_scn, window.end_scn, changes
    );
    Ok(WindowOutcome::Completed)
}
