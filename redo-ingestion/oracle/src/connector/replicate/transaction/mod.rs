//! Turns physical log rows into the statements that are emitted: continuation rows are joined,
//! rollback rows are paired with the change they undo, and legacy quote damage is repaired.

pub mod cache;
pub mod csf;
pub mod encoding;
pub mod rollback;
