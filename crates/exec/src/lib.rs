//! Execution orchestrator: format/build/test phases for code snapshots
//! inside per-language sandboxes, with structured diagnostics.

pub mod demux;
pub mod diagnostics;
pub mod executor;
pub mod languages;
pub mod orchestrator;
pub mod sandbox;

pub use executor::{Language, LanguageExecutor};
pub use orchestrator::ExecutionOrchestrator;
