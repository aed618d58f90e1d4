//! In-memory workflow graph.
//!
//! - `classify` -- injected kind/label keyword table -> `NodeClass`
//! - `document` -- lenient parsing of a JSON workflow document
//! - `model` -- `GraphModel` with adjacency indices and cycle detection

pub mod classify;
pub mod document;
pub mod model;

pub use classify::NodeClassifier;
pub use document::WorkflowDocument;
pub use model::GraphModel;
