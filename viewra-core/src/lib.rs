pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod process;
pub mod resilience;
pub mod session;
pub mod telemetry;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
