//! Shared utilities for visitor implementations

use ruff_python_ast::{Expr, ExprList, ExprStringLiteral, ExprTuple};

/// Names declared by a static `__all__` list or tuple
///
/// Returns `None` when the expression is not a list/tuple or any element is not a string
/// literal, since the declaration can then only be known at runtime.
pub fn extract_string_list_from_expr(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::List(ExprList { elts, .. }) | Expr::Tuple(ExprTuple { elts, .. }) => elts
            .iter()
            .map(|elt| match elt {
                Expr::StringLiteral(ExprStringLiteral { value, .. }) => {
                    Some(value.to_str().to_string())
                }
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Whether `expr` is the bare name `name`
pub fn is_name(expr: &Expr, name: &str) -> bool {
    matches!(expr, Expr::Name(expr_name) if expr_name.id.as_str() == name)
}

/// Whether `expr` is the string literal `value`
pub fn is_string_literal(expr: &Expr, value: &str) -> bool {
    matches!(expr, Expr::StringLiteral(literal) if literal.value.to_str() == value)
}
