mod infra;
mod tracing;

pub mod health;

pub use infra::*;
pub use tracing::{init_tracing, Tracing};
