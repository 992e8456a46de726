mod telemetry;
pub use telemetry::{init_telemetry, init_telemetry_closure};
