//! Batch workflow: load inputs, then the snapshot, index and rolling stages

pub mod batch_orchestrator;

pub use batch_orchestrator::{pair_items, BatchItem, BatchOrchestrator, BatchRequest};
