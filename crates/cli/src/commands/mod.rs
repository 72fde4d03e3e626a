//! Command handlers for the vsearch CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod create_index;
pub mod index_data;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use create_index::CreateIndexCommand;
pub use index_data::IndexDataCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
