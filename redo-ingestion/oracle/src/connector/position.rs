use redo_ingestion_connector::redo_types::{
    chrono::{TimeZone, Utc},
    log::info,
    models::ingestion_types::{LogMinerConfig, ReadPosition},
    types::{LogPosition, Scn},
};

use super::{client::LogMinerClient, Error, Result};

/// First SCN to mine. A checkpoint wins over the configured read position.
pub fn start_scn(
    client: &impl LogMinerClient,
    checkpoint: Option<&LogPosition>,
    config: &LogMinerConfig,
) -> Result<Scn> {
    if let Some(checkpoint) = checkpoint.filter(|checkpoint| checkpoint.scn != 0) {
        let scn = resume_scn(checkpoint);
        info!("Resuming after {} from SCN {}", checkpoint, scn);
        return Ok(scn);
    }

    let scn = match config.read_position {
        ReadPosition::All => client.min_scn()?,
        ReadPosition::Current => client.current_scn()?,
        ReadPosition::Time => {
            let millis = config.start_time.ok_or(Error::MissingStartTime)?;
            let time = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| Error::InvalidConfig(format!("start_time {millis} is out of range")))?;
            client
                .log_start_scn_by_time(time)?
                .ok_or_else(|| Error::InvalidConfig(format!("no log file covers {time}")))?
        }
        ReadPosition::Scn => config.start_scn.ok_or(Error::MissingStartScn)?,
    };
    info!("Starting from SCN {} ({:?})", scn, config.read_position);
    Ok(scn)
}

/// A position with a row id may have unsent rows left in its SCN, a bare SCN was sent completely.
pub fn resume_scn(position: &LogPosition) -> Scn {
    if position.row_id.is_some() {
        position.scn
    } else {
        position.scn + 1
    }
}
