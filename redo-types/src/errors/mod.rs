pub mod internal;
pub mod types;
