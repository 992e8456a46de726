pub mod config;
pub mod ingestion_types;
