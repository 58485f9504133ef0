pub mod directory;
pub mod error;
pub mod graph;

pub use directory::{AssetDirectory, MemoryAssetDirectory};
pub use error::{GraphError, Result};
pub use graph::{ContributorEdge, GraphEntry, ParentEdge, ProvenanceGraph};
