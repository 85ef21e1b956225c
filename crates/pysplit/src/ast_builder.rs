//! Factory functions for synthetic AST nodes
//!
//! Nodes that don't originate from the input (narrowed imports, sibling imports, the
//! generated `__all__`) are built here and rendered with `ruff_python_codegen`. All of
//! them carry `TextRange::default()` and `AtomicNodeIndex::dummy()`.

use ruff_python_ast::{
    Alias, AtomicNodeIndex, Expr, ExprContext, ExprList, ExprName, ExprStringLiteral,
    Identifier, Stmt, StmtAssign, StmtImport, StmtImportFrom, StringLiteral,
    StringLiteralFlags, StringLiteralValue, name::Name, str::Quote,
};
use ruff_text_size::TextRange;

/// Creates an alias node: `name` or `name as asname`
pub fn alias(name: &str, asname: Option<&str>) -> Alias {
    Alias {
        name: Identifier::new(name, TextRange::default()),
        asname: asname.map(|asname| Identifier::new(asname, TextRange::default())),
        range: TextRange::default(),
        node_index: AtomicNodeIndex::dummy(),
    }
}

/// Creates `import a, b as c`
pub fn import(names: Vec<Alias>) -> Stmt {
    Stmt::Import(StmtImport {
        names,
        range: TextRange::default(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates `from <dots><module> import names`
///
/// # Example
/// ```text
/// import_from(Some("foo"), vec![alias("bar", None)], 1)  =>  from .foo import bar
/// import_from(None, vec![alias("foo", None)], 1)         =>  from . import foo
/// ```
pub fn import_from(module: Option<&str>, names: Vec<Alias>, level: u32) -> Stmt {
    Stmt::ImportFrom(StmtImportFrom {
        module: module.map(|module| Identifier::new(module, TextRange::default())),
        names,
        level,
        range: TextRange::default(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates `from .unit import names` for a module of the same package
pub fn sibling_import<S: AsRef<str>>(unit: &str, names: &[S]) -> Stmt {
    import_from(
        Some(unit),
        names
            .iter()
            .map(|name| alias(name.as_ref(), None))
            .collect(),
        1,
    )
}

/// Rebuild an import keeping only the aliases at `keep`
///
/// Relative `from` imports move `extra_levels` levels up, since the statement now lives
/// in a module one package deeper than the original. Returns `None` for statements that
/// are not imports.
pub fn narrowed_import(stmt: &Stmt, keep: &[usize], extra_levels: u32) -> Option<Stmt> {
    let pick = |names: &[Alias]| -> Vec<Alias> {
        keep.iter()
            .filter_map(|&index| names.get(index))
            .map(|original| {
                alias(
                    original.name.as_str(),
                    original.asname.as_ref().map(Identifier::as_str),
                )
            })
            .collect()
    };

    match stmt {
        Stmt::Import(import_stmt) => Some(import(pick(&import_stmt.names))),
        Stmt::ImportFrom(import_from_stmt) => {
            let level = if import_from_stmt.level > 0 {
                import_from_stmt.level + extra_levels
            } else {
                0
            };
            Some(import_from(
                import_from_stmt.module.as_ref().map(Identifier::as_str),
                pick(&import_from_stmt.names),
                level,
            ))
        }
        _ => None,
    }
}

/// Creates a string literal expression quoted with `quote`
pub fn string_literal(value: &str, quote: Quote) -> Expr {
    Expr::StringLiteral(ExprStringLiteral {
        value: StringLiteralValue::single(StringLiteral {
            value: value.into(),
            flags: StringLiteralFlags::empty().with_quote_style(quote),
            range: TextRange::default(),
            node_index: AtomicNodeIndex::dummy(),
        }),
        range: TextRange::default(),
        node_index: AtomicNodeIndex::dummy(),
    })
}

/// Creates `target = ["a", "b", ...]`
pub fn string_list_assign<S: AsRef<str>>(target: &str, values: &[S], quote: Quote) -> Stmt {
    Stmt::Assign(StmtAssign {
        targets: vec![Expr::Name(ExprName {
            id: Name::new(target),
            ctx: ExprContext::Store,
            range: TextRange::default(),
            node_index: AtomicNodeIndex::dummy(),
        })],
        value: Box::new(Expr::List(ExprList {
            elts: values
                .iter()
                .map(|value| string_literal(value.as_ref(), quote))
                .collect(),
            ctx: ExprContext::Load,
            range: TextRange::default(),
            node_index: AtomicNodeIndex::dummy(),
        })),
        range: TextRange::default(),
        node_index: AtomicNodeIndex::dummy(),
    })
}
