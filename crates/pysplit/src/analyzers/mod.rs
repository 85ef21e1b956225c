//! Static analysis of the parsed module
//!
//! - `statement_categorizer`: role of each top-level statement
//! - `import_analyzer`: module-scope imports and the names they bind
//! - `dependency_resolver`: where the free names of a statement group come from

pub mod dependency_resolver;
pub mod import_analyzer;
pub mod statement_categorizer;

pub use dependency_resolver::{DependencyResolver, ModuleBindings, Resolution};
pub use import_analyzer::{BindingRef, ImportId, ImportStatement, ImportTable};
pub use statement_categorizer::{StatementCategorizer, StatementKind};
