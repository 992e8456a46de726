pub mod errors;
pub mod models;
pub mod node;
pub mod types;

// Re-exports
pub use chrono;
pub use indexmap;
pub use log;
pub use parking_lot;
pub use serde;
pub use serde_json;
pub use serde_yaml;
pub use thiserror;
pub use tracing;
