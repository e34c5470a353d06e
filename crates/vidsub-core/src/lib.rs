//! vidsub core library
//!
//! Domain models, the error taxonomy, configuration and the injected
//! collaborators (clock, jitter source) shared by every vidsub crate.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, FixedJitter, JitterSource, ManualClock, RandomJitter, SystemClock};
pub use config::{BaseConfig, Config, VideoConfig};
pub use error::{ErrorMetadata, LogLevel, VideoError, VideoResult};
pub use storage_types::StorageBackend;
