//! Module-scope import table
//!
//! Collects every import executed at module scope, either directly at top level or
//! inside an `if TYPE_CHECKING:` import block, and indexes the names each one binds.

use log::debug;
use ruff_python_ast::{Alias, Expr, Stmt};
use ruff_text_size::{Ranged, TextRange};

use super::statement_categorizer::StatementKind;
use crate::{
    parser::SourceModule,
    types::{FxIndexMap, StmtIndex},
};

/// Identifier of an import statement within an [`ImportTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportId(u32);

impl ImportId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// One alias of one import statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingRef {
    pub import: ImportId,
    pub alias_index: usize,
}

/// A name introduced into module scope by an import alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name the alias binds (`a` for `import a.b`, `y` for `from x import z as y`)
    pub bound_name: String,
    /// Module the alias resolves through, for `from` imports including the imported name
    pub qualified_name: String,
}

/// The `if TYPE_CHECKING:` guard an import sits under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheckingGuard {
    /// Source text of the guard's test expression
    pub test_source: String,
    /// Module-scope name the test reads (`TYPE_CHECKING` or `typing`)
    pub root_name: String,
}

/// A module-scope import statement
#[derive(Debug, Clone)]
pub struct ImportStatement {
    pub id: ImportId,
    /// Top-level statement holding the import (the guard for type-checking imports)
    pub stmt_index: StmtIndex,
    /// The `import` or `from` statement itself
    pub stmt: Stmt,
    pub range: TextRange,
    /// Module named by the statement; `None` for `from . import x`
    pub module: Option<String>,
    /// Relative import level, 0 for absolute imports
    pub level: u32,
    /// One entry per alias; `None` for `*`
    pub bindings: Vec<Option<ImportBinding>>,
    pub type_checking: Option<TypeCheckingGuard>,
}

impl ImportStatement {
    pub fn is_star(&self) -> bool {
        self.bindings.iter().any(Option::is_none)
    }

    pub fn is_future(&self) -> bool {
        self.module.as_deref() == Some("__future__") && self.level == 0
    }
}

/// All module-scope imports of a module, indexed by bound name
#[derive(Debug, Default)]
pub struct ImportTable {
    statements: Vec<ImportStatement>,
    by_name: FxIndexMap<String, Vec<BindingRef>>,
}

impl ImportTable {
    /// Collect the imports of `module`
    pub fn from_module(module: &SourceModule) -> Self {
        let mut table = Self::default();
        for (index, stmt, kind) in module.statements() {
            match kind {
                StatementKind::Import => table.add(index, stmt, None),
                StatementKind::TypeCheckingImports => {
                    let Stmt::If(stmt_if) = stmt else {
                        continue;
                    };
                    let guard = TypeCheckingGuard {
                        test_source: module.source()[stmt_if.test.range()].to_string(),
                        root_name: guard_root_name(&stmt_if.test),
                    };
                    for nested in &stmt_if.body {
                        table.add(index, nested, Some(guard.clone()));
                    }
                }
                _ => {}
            }
        }
        debug!(
            "Collected {} module-scope imports binding {} names",
            table.statements.len(),
            table.by_name.len()
        );
        table
    }

    fn add(&mut self, stmt_index: StmtIndex, stmt: &Stmt, guard: Option<TypeCheckingGuard>) {
        let id = ImportId::new(self.statements.len() as u32);
        let (module, level, bindings): (Option<String>, u32, Vec<Option<ImportBinding>>) =
            match stmt {
                Stmt::Import(import) => (
                    None,
                    0,
                    import
                        .names
                        .iter()
                        .map(|alias| Some(import_binding(alias)))
                        .collect(),
                ),
                Stmt::ImportFrom(import_from) => {
                    let module = import_from.module.as_ref().map(ToString::to_string);
                    let bindings = import_from
                        .names
                        .iter()
                        .map(|alias| from_import_binding(module.as_deref(), alias))
                        .collect();
                    (module, import_from.level, bindings)
                }
                _ => return,
            };

        let statement = ImportStatement {
            id,
            stmt_index,
            stmt: stmt.clone(),
            range: stmt.range(),
            module,
            level,
            bindings,
            type_checking: guard,
        };
        for (alias_index, binding) in statement.bindings.iter().enumerate() {
            if let Some(binding) = binding {
                self.by_name
                    .entry(binding.bound_name.clone())
                    .or_default()
                    .push(BindingRef {
                        import: id,
                        alias_index,
                    });
            }
        }
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[ImportStatement] {
        &self.statements
    }

    pub fn get(&self, id: ImportId) -> &ImportStatement {
        &self.statements[id.as_usize()]
    }

    /// Every alias binding `name`, in source order
    pub fn bindings_for(&self, name: &str) -> &[BindingRef] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn star_imports(&self) -> impl Iterator<Item = &ImportStatement> {
        self.statements.iter().filter(|statement| statement.is_star())
    }

    pub fn future_imports(&self) -> impl Iterator<Item = &ImportStatement> {
        self.statements.iter().filter(|statement| statement.is_future())
    }

    /// All alias references of a statement, star aliases included
    pub fn all_refs(&self, id: ImportId) -> impl Iterator<Item = BindingRef> + '_ {
        (0..self.get(id).bindings.len()).map(move |alias_index| BindingRef {
            import: id,
            alias_index,
        })
    }
}

fn import_binding(alias: &Alias) -> ImportBinding {
    let qualified_name = alias.name.to_string();
    let bound_name = match &alias.asname {
        Some(asname) => asname.to_string(),
        None => qualified_name
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    ImportBinding {
        bound_name,
        qualified_name,
    }
}

fn from_import_binding(module: Option<&str>, alias: &Alias) -> Option<ImportBinding> {
    if alias.name.as_str() == "*" {
        return None;
    }
    let bound_name = alias.asname.as_ref().unwrap_or(&alias.name).to_string();
    let qualified_name = match module {
        Some(module) => format!("{module}.{}", alias.name),
        None => alias.name.to_string(),
    };
    Some(ImportBinding {
        bound_name,
        qualified_name,
    })
}

fn guard_root_name(test: &Expr) -> String {
    match test {
        Expr::Attribute(attr) => guard_root_name(&attr.value),
        Expr::Name(name) => name.id.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn table_for(code: &str) -> (SourceModule, ImportTable) {
        let module =
            SourceModule::parse(Path::new("mod.py"), code.to_string()).expect("valid source");
        let table = ImportTable::from_module(&module);
        (module, table)
    }

    #[test]
    fn test_bound_names() {
        let (_, table) = table_for(
            r"
import os.path
import numpy as np
from collections import OrderedDict as OD, deque
from . import sibling
from ..pkg import helper
",
        );

        for name in ["os", "np", "OD", "deque", "sibling", "helper"] {
            assert_eq!(table.bindings_for(name).len(), 1, "missing {name}");
        }
        assert!(table.bindings_for("OrderedDict").is_empty());
        assert!(table.bindings_for("numpy").is_empty());

        let helper = table.get(table.bindings_for("helper")[0].import);
        assert_eq!(helper.level, 2);
        assert_eq!(helper.module.as_deref(), Some("pkg"));
    }

    #[test]
    fn test_rebinding_keeps_every_binding() {
        let (_, table) = table_for("import os\nimport os.path\n");
        let refs = table.bindings_for("os");
        assert_eq!(refs.len(), 2);
        assert!(refs[0].import < refs[1].import);
    }

    #[test]
    fn test_star_and_future_imports() {
        let (_, table) = table_for(
            "from __future__ import annotations\nfrom shapes import *\nimport sys\n",
        );
        assert_eq!(table.future_imports().count(), 1);
        let stars: Vec<_> = table.star_imports().collect();
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].module.as_deref(), Some("shapes"));
    }

    #[test]
    fn test_type_checking_imports() {
        let (_, table) = table_for(
            r"
import typing
if typing.TYPE_CHECKING:
    from pathlib import Path
",
        );
        let path = table.get(table.bindings_for("Path")[0].import);
        let guard = path.type_checking.as_ref().expect("guarded import");
        assert_eq!(guard.test_source, "typing.TYPE_CHECKING");
        assert_eq!(guard.root_name, "typing");
        assert_eq!(path.stmt_index, 1);
    }
}
