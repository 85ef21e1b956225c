//! AST visitor implementations for pysplit
//!
//! This module contains the visitors that walk Python AST nodes to find which names a
//! top-level statement binds and which names it reads from module scope.

mod free_name_collector;
mod local_var_collector;
pub mod utils;

pub use free_name_collector::FreeNameCollector;
pub use local_var_collector::{
    LocalVarCollector, collect_function_global_declarations, collect_global_declarations,
};
