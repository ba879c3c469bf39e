// Mockstream Core Library
// Mock event-stream delivery engine: chunking, timed sessions, HTTP delivery

pub mod chunk;
pub mod config;
pub mod delivery;
pub mod session;
pub mod store;
pub mod telemetry;

// Export core types
pub use chunk::split;
pub use config::ServerConfig;
pub use delivery::{DeliveryMode, DeliveryServer};
pub use session::{
    AbortReason, SessionFrame, SessionHandle, SessionReport, SessionStatus, SessionStream,
    StreamSession,
};
pub use store::{JsonFileStore, ValueStore};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockStreamError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, MockStreamError>;
