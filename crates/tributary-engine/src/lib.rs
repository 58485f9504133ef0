pub mod config;
pub mod engine;
pub mod error;
pub mod logging;

pub use config::EngineConfig;
pub use engine::{Component, RoyaltyEngine};
pub use error::{EngineError, Result};
pub use logging::init_logging;

// Re-export the component crates so embedders need a single dependency.
pub use tributary_access as access;
pub use tributary_escrow as escrow;
pub use tributary_graph as graph;
pub use tributary_receipts as receipts;
pub use tributary_splitter as splitter;
pub use tributary_token as token;
pub use tributary_types as types;
