//! Statement categorizer for top-level Python statements
//!
//! Every statement at module scope gets exactly one [`StatementKind`]. The kind decides
//! where the partitioner sends the statement: imports are redistributed, definitions get
//! their own unit, the entry guard moves to `__main__`, and the module docstring and a
//! static `__all__` move to the package initializer.

use ruff_python_ast::{CmpOp, Expr, ExprCompare, Stmt, StmtAssign, StmtIf, helpers::is_docstring_stmt};

use crate::visitors::utils::{extract_string_list_from_expr, is_name, is_string_literal};

/// Role of a top-level statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `import x` or `from x import y`
    Import,
    /// `if TYPE_CHECKING:` whose body holds only imports
    TypeCheckingImports,
    /// `if __name__ == "__main__":`
    EntryGuard,
    FunctionDef,
    ClassDef,
    /// Module docstring
    Docstring,
    /// `__all__` declared as a literal list or tuple of strings
    DunderAll(Vec<String>),
    /// Any other module-level code
    Other,
}

impl StatementKind {
    pub fn is_definition(&self) -> bool {
        matches!(self, Self::FunctionDef | Self::ClassDef)
    }
}

/// Categorizer for the statements of a module body
#[derive(Debug, Default)]
pub struct StatementCategorizer;

impl StatementCategorizer {
    pub fn new() -> Self {
        Self
    }

    /// Categorize every statement of `body`, in order
    pub fn categorize(&self, body: &[Stmt]) -> Vec<StatementKind> {
        body.iter()
            .enumerate()
            .map(|(index, stmt)| self.categorize_statement(index, stmt))
            .collect()
    }

    fn categorize_statement(&self, index: usize, stmt: &Stmt) -> StatementKind {
        match stmt {
            Stmt::Import(_) | Stmt::ImportFrom(_) => StatementKind::Import,
            Stmt::FunctionDef(_) => StatementKind::FunctionDef,
            Stmt::ClassDef(_) => StatementKind::ClassDef,
            Stmt::If(stmt_if) if is_entry_guard(stmt_if) => StatementKind::EntryGuard,
            Stmt::If(stmt_if) if self.is_type_checking_import_block(stmt_if) => {
                StatementKind::TypeCheckingImports
            }
            Stmt::Assign(assign) => self
                .static_dunder_all(assign)
                .map_or(StatementKind::Other, StatementKind::DunderAll),
            _ if index == 0 && is_docstring_stmt(stmt) => StatementKind::Docstring,
            _ => StatementKind::Other,
        }
    }

    fn is_type_checking_import_block(&self, stmt_if: &StmtIf) -> bool {
        stmt_if.elif_else_clauses.is_empty()
            && is_type_checking_test(&stmt_if.test)
            && stmt_if
                .body
                .iter()
                .all(|stmt| matches!(stmt, Stmt::Import(_) | Stmt::ImportFrom(_)))
    }

    fn static_dunder_all(&self, assign: &StmtAssign) -> Option<Vec<String>> {
        let [target] = assign.targets.as_slice() else {
            return None;
        };
        if !is_name(target, "__all__") {
            return None;
        }
        extract_string_list_from_expr(&assign.value)
    }
}

/// Whether `test` compares `__name__` with `"__main__"`, in either operand order
pub fn is_entry_guard_test(test: &Expr) -> bool {
    let Expr::Compare(ExprCompare {
        left,
        ops,
        comparators,
        ..
    }) = test
    else {
        return false;
    };
    let ([CmpOp::Eq], [right]) = (&**ops, &**comparators) else {
        return false;
    };
    (is_name(left, "__name__") && is_string_literal(right, "__main__"))
        || (is_string_literal(left, "__main__") && is_name(right, "__name__"))
}

/// Whether `stmt_if` is a relocatable entry guard
///
/// A guard with `elif`/`else` branches also runs code when the module is imported, so it
/// does not qualify.
pub fn is_entry_guard(stmt_if: &StmtIf) -> bool {
    stmt_if.elif_else_clauses.is_empty() && is_entry_guard_test(&stmt_if.test)
}

/// Whether `test` is `TYPE_CHECKING` or `typing.TYPE_CHECKING`
pub fn is_type_checking_test(test: &Expr) -> bool {
    match test {
        Expr::Name(_) => is_name(test, "TYPE_CHECKING"),
        Expr::Attribute(attr) => {
            attr.attr.as_str() == "TYPE_CHECKING"
                && (is_name(&attr.value, "typing") || is_name(&attr.value, "typing_extensions"))
        }
        _ => false,
    }
}
