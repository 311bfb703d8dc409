//! Learning paths: prerequisite graphs, progress and catalogs

pub mod catalog;
pub mod graph;
pub mod progress;

pub use catalog::{Catalog, CatalogError, ImportSummary};
pub use graph::{topological_order, Edge, GraphError, NodeId};
pub use progress::{ProgressError, ProgressUpdate, SkillProgress, SkillStatus};
