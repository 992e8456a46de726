use std::{sync::Arc, time::Duration};

use connector::{
    client::{LogMinerClient, OracleClient},
    position::start_scn,
    privilege::check_privileges,
    replicate::{
        log::WindowPlanner, log_miner_loop, session::MiningSession,
        transaction::cache::TransactionCache, SharedPosition, TableFilter,
    },
};
use redo_ingestion_connector::{
    async_trait,
    redo_types::{
        errors::internal::BoxedError,
        log::info,
        models::ingestion_types::OracleConfig,
        node::SourceState,
        types::LogPosition,
    },
    tokio, Connector, Ingestor,
};

#[derive(Debug)]
pub struct OracleConnector {
    connection_name: String,
    config: OracleConfig,
    position: SharedPosition,
}

impl OracleConnector {
    pub fn new(connection_name: String, config: OracleConfig) -> Self {
        Self {
            connection_name,
            config,
            position: SharedPosition::default(),
        }
    }
}

#[async_trait]
impl Connector for OracleConnector {
    async fn validate_connection(&mut self) -> Result<(), BoxedError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut client = OracleClient::new(&config);
            client.connect()?;
            check_privileges(&client, &config.user)
        })
        .await??;
        info!("{}: connection validated", self.connection_name);
        Ok(())
    }

    async fn serialize_state(&self) -> Result<Vec<u8>, BoxedError> {
        Ok(SourceState::serialize(self.position.lock().as_ref())?)
    }

    async fn start(
        &mut self,
        ingestor: &Ingestor,
        last_checkpoint: SourceState,
    ) -> Result<(), BoxedError> {
        let checkpoint = match last_checkpoint {
            SourceState::NotStarted => None,
            SourceState::Restartable(position) => Some(position),
        };
        *self.position.lock() = checkpoint.clone();

        info!("{}: starting log miner", self.connection_name);
        let config = self.config.clone();
        let ingestor = ingestor.clone();
        let position = self.position.clone();
        tokio::task::spawn_blocking(move || replicate(config, checkpoint, &ingestor, &position))
            .await??;
        Ok(())
    }
}

fn replicate(
    config: OracleConfig,
    checkpoint: Option<LogPosition>,
    ingestor: &Ingestor,
    position: &SharedPosition,
) -> connector::Result<()> {
    let mut client = OracleClient::new(&config);
    client.connect()?;
    check_privileges(&client, &config.user)?;
    let start = start_scn(&client, checkpoint.as_ref(), &config.log_miner)?;

    let cache = Arc::new(TransactionCache::new(config.log_miner.transaction_cache_size));
    let mut session = MiningSession::new(client, (&config.log_miner).into(), cache);
    if let Some(checkpoint) = checkpoint {
        session.resume(checkpoint);
    }

    log_miner_loop(
        &mut session,
        &WindowPlanner::new(config.log_miner.max_log_file_size),
        &TableFilter::from(&config),
        start,
        Duration::from_millis(config.log_miner.poll_interval_ms),
        ingestor,
        position,
    )
}

pub mod connector;
#[cfg(test)]
mod test_util;
