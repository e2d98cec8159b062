pub mod batch;
pub mod core;
pub mod edgar;
pub mod market;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod resolver;
pub mod storage;
pub mod utils;

// Re-exports
pub use batch::{BatchOrchestrator, BatchRun, BatchUpdate, CancelHandle, ItemStatus};
pub use core::config::AnalyzerConfig;
pub use core::error::{ErrorKind, StageError};
pub use core::types::{CompanyIdentity, CompanyResult, FilingReference, PayoutEntry, Stage};
pub use pipeline::Analyzer;
pub use utils::progress::ProgressTracker;
