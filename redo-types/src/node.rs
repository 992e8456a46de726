use serde::{Deserialize, Serialize};

use crate::{
    errors::types::{DeserializationError, SerializationError},
    types::LogPosition,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A source's ingestion state.
pub enum SourceState {
    /// This source hasn't been ingested.
    NotStarted,
    /// This source has some data ingested, and it can be restarted from the last emitted position.
    Restartable(LogPosition),
}

impl SourceState {
    pub fn serialize(position: Option<&LogPosition>) -> Result<Vec<u8>, SerializationError> {
        match position {
            Some(position) => Ok(serde_json::to_vec(position)?),
            None => Ok(vec![]),
        }
    }

    pub fn deserialize(state: &[u8]) -> Result<Self, DeserializationError> {
        if state.is_empty() {
            return Ok(SourceState::NotStarted);
        }
        Ok(SourceState::Restartable(serde_json::from_slice(state)?))
    }
}
