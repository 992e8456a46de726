use std::fmt::Debug;

use redo_types::{errors::internal::BoxedError, node::SourceState};

mod ingestor;
pub mod utils;

pub use async_trait::async_trait;
pub use ingestor::{IngestionConfig, IngestionIterator, Ingestor, SendError};
pub use redo_types;
pub use tokio;

#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Checks that the source is reachable and that the configured user may mine its logs.
    async fn validate_connection(&mut self) -> Result<(), BoxedError>;

    /// Serializes the position of the last emitted change, so `start` can resume from it.
    async fn serialize_state(&self) -> Result<Vec<u8>, BoxedError>;

    /// Streams changes into `ingestor` until the receiving side is dropped or an unrecoverable error occurs.
    async fn start(
        &mut self,
        ingestor: &Ingestor,
        last_checkpoint: SourceState,
    ) -> Result<(), BoxedError>;
}
