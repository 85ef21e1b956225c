//! Split a single Python module into a package with one file per top-level definition

pub mod analyzers;
pub mod ast_builder;
pub mod config;
pub mod dirs;
pub mod error;
pub mod module_naming;
pub mod orchestrator;
pub mod parser;
pub mod partitioner;
pub mod pragma;
pub mod stdlib_detection;
pub mod types;
pub mod unit_graph;
pub mod visitors;
pub mod writer;

pub use config::Config;
pub use error::{SplitError, SplitWarning};
pub use orchestrator::{SplitReport, Splitter};
