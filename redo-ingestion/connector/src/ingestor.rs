use redo_types::models::ingestion_types::IngestionMessage;
use std::{
    error::Error,
    fmt::Display,
    sync::{atomic::AtomicUsize, Arc},
};
use tokio::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    forwarder_channel_cap: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            forwarder_channel_cap: 100000,
        }
    }
}

#[derive(Debug)]
/// `IngestionIterator` is the receiver side of a mpsc channel. The sender side is `Ingestor`.
pub struct IngestionIterator {
    pub receiver: Receiver<(usize, IngestionMessage)>,
}

impl Iterator for IngestionIterator {
    type Item = IngestionMessage;
    fn next(&mut self) -> Option<Self::Item> {
        let (_idx, msg) = self.receiver.blocking_recv()?;
        Some(msg)
    }
}

#[derive(Debug, Clone)]
/// `Ingestor` is the sender side of a spsc channel. The receiver side is `IngestionIterator`.
///
/// `IngestionMessage` is the message type that is sent over the channel.
pub struct Ingestor {
    msg_idx: Arc<AtomicUsize>,
    sender: Sender<(usize, IngestionMessage)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SendError;

impl Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ingestor receiver dropped")
    }
}

impl Error for SendError {}

impl Ingestor {
    pub fn initialize_channel(config: IngestionConfig) -> (Ingestor, IngestionIterator) {
        let (sender, receiver) = channel(config.forwarder_channel_cap);
        let ingestor = Self {
            sender,
            msg_idx: Arc::new(0.into()),
        };

        let iterator = IngestionIterator { receiver };
        (ingestor, iterator)
    }

    pub async fn handle_message(&self, message: IngestionMessage) -> Result<usize, SendError> {
        let idx = self
            .msg_idx
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
        self.sender
            .send((idx, message))
            .await
            .map_err(|_| SendError)?;
        Ok(idx)
    }

    pub fn blocking_handle_message(&self, message: IngestionMessage) -> Result<usize, SendError> {
        let idx = self
            .msg_idx
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
        self.sender
            .blocking_send((idx, message))
            .map_err(|_| SendError)?;
        Ok(idx)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
