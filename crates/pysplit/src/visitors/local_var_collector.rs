//! Local binding collector that respects global and nonlocal declarations
//!
//! This visitor traverses a block in source order and collects every name the block
//! binds in its own scope: assignment targets, loop and `with` targets, exception names,
//! walrus targets, match captures, nested imports and nested `def`/`class` names.
//! Names declared `global` are excluded, names declared `nonlocal` are included.

use ruff_python_ast::visitor::source_order::{self, SourceOrderVisitor};
use ruff_python_ast::{ExceptHandler, Expr, Pattern, Stmt};

use crate::types::FxIndexSet;

/// Visitor that collects the names a block binds in its own scope
#[derive(Debug)]
pub struct LocalVarCollector<'a> {
    /// Set to collect local variables
    local_vars: &'a mut FxIndexSet<String>,
    /// Set of global variables to exclude from local collection
    global_vars: &'a FxIndexSet<String>,
}

impl<'a> LocalVarCollector<'a> {
    /// Create a new local variable collector
    pub fn new(
        local_vars: &'a mut FxIndexSet<String>,
        global_vars: &'a FxIndexSet<String>,
    ) -> Self {
        Self {
            local_vars,
            global_vars,
        }
    }

    /// Collect local variables from a list of statements
    pub fn collect_from_stmts(&mut self, stmts: &'a [Stmt]) {
        source_order::walk_body(self, stmts);
    }

    /// Names bound by `stmts`, with no global declarations to honor
    pub fn bindings_of(stmts: &[Stmt]) -> FxIndexSet<String> {
        let mut local_vars = FxIndexSet::default();
        let global_vars = FxIndexSet::default();
        LocalVarCollector::new(&mut local_vars, &global_vars).collect_from_stmts(stmts);
        local_vars
    }

    fn insert_if_not_global(&mut self, var_name: &str) {
        if !self.global_vars.contains(var_name) {
            self.local_vars.insert(var_name.to_string());
        }
    }

    /// Extract variable names from an assignment target
    fn collect_from_target(&mut self, target: &Expr) {
        match target {
            Expr::Name(name) => {
                self.insert_if_not_global(&name.id);
            }
            Expr::Tuple(tuple) => {
                for elt in &tuple.elts {
                    self.collect_from_target(elt);
                }
            }
            Expr::List(list) => {
                for elt in &list.elts {
                    self.collect_from_target(elt);
                }
            }
            Expr::Starred(starred) => {
                self.collect_from_target(&starred.value);
            }
            _ => {}
        }
    }
}

impl<'a> SourceOrderVisitor<'a> for LocalVarCollector<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Assign(assign) => {
                for target in &assign.targets {
                    self.collect_from_target(target);
                }
                // The value may hold walrus targets
                self.visit_expr(&assign.value);
            }
            Stmt::AnnAssign(ann_assign) => {
                self.collect_from_target(&ann_assign.target);
                if let Some(value) = &ann_assign.value {
                    self.visit_expr(value);
                }
            }
            Stmt::AugAssign(aug_assign) => {
                self.collect_from_target(&aug_assign.target);
                self.visit_expr(&aug_assign.value);
            }
            Stmt::For(for_stmt) => {
                self.collect_from_target(&for_stmt.target);
                source_order::walk_stmt(self, stmt);
            }
            Stmt::With(with_stmt) => {
                for item in &with_stmt.items {
                    if let Some(ref optional_vars) = item.optional_vars {
                        self.collect_from_target(optional_vars);
                    }
                }
                source_order::walk_stmt(self, stmt);
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    match &alias.asname {
                        Some(asname) => self.insert_if_not_global(asname.as_str()),
                        None => {
                            // `import a.b.c` binds `a`
                            let root = alias.name.split('.').next().unwrap_or_default();
                            self.insert_if_not_global(root);
                        }
                    }
                }
            }
            Stmt::ImportFrom(import_from) => {
                for alias in &import_from.names {
                    let bound = alias.asname.as_ref().unwrap_or(&alias.name);
                    if bound.as_str() != "*" {
                        self.insert_if_not_global(bound.as_str());
                    }
                }
            }
            Stmt::FunctionDef(func_def) => {
                // Don't walk into the function body - only the current scope is collected
                self.insert_if_not_global(&func_def.name);
            }
            Stmt::ClassDef(class_def) => {
                self.insert_if_not_global(&class_def.name);
            }
            Stmt::TypeAlias(type_alias) => {
                self.collect_from_target(&type_alias.name);
            }
            Stmt::Nonlocal(nonlocal_stmt) => {
                // Nonlocal names are owned by an enclosing function, never the module
                for name in &nonlocal_stmt.names {
                    self.insert_if_not_global(name);
                }
            }
            _ => {
                source_order::walk_stmt(self, stmt);
            }
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Named(named) => {
                self.collect_from_target(&named.target);
                self.visit_expr(&named.value);
            }
            // Comprehensions, lambdas and their targets live in their own scope
            Expr::Lambda(_)
            | Expr::ListComp(_)
            | Expr::SetComp(_)
            | Expr::DictComp(_)
            | Expr::Generator(_) => {}
            _ => source_order::walk_expr(self, expr),
        }
    }

    fn visit_pattern(&mut self, pattern: &'a Pattern) {
        match pattern {
            Pattern::MatchAs(match_as) => {
                if let Some(name) = &match_as.name {
                    self.insert_if_not_global(name);
                }
            }
            Pattern::MatchStar(match_star) => {
                if let Some(name) = &match_star.name {
                    self.insert_if_not_global(name);
                }
            }
            Pattern::MatchMapping(match_mapping) => {
                if let Some(rest) = &match_mapping.rest {
                    self.insert_if_not_global(rest);
                }
            }
            _ => {}
        }
        source_order::walk_pattern(self, pattern);
    }

    fn visit_except_handler(&mut self, handler: &'a ExceptHandler) {
        let ExceptHandler::ExceptHandler(eh) = handler;
        if let Some(ref name) = eh.name {
            self.insert_if_not_global(name);
        }
        source_order::walk_except_handler(self, handler);
    }
}

/// Collect the names declared `global` directly in `body`
///
/// Nested functions and classes carry their own declarations and are skipped.
pub fn collect_global_declarations(body: &[Stmt]) -> FxIndexSet<String> {
    struct GlobalCollector {
        names: FxIndexSet<String>,
    }

    impl<'a> SourceOrderVisitor<'a> for GlobalCollector {
        fn visit_stmt(&mut self, stmt: &'a Stmt) {
            match stmt {
                Stmt::Global(global) => {
                    self.names
                        .extend(global.names.iter().map(ToString::to_string));
                }
                Stmt::FunctionDef(_) | Stmt::ClassDef(_) => {}
                _ => source_order::walk_stmt(self, stmt),
            }
        }

        fn visit_expr(&mut self, _expr: &'a Expr) {}
    }

    let mut collector = GlobalCollector {
        names: FxIndexSet::default(),
    };
    source_order::walk_body(&mut collector, body);
    collector.names
}

/// Collect the names declared `global` by any function nested in `body`
pub fn collect_function_global_declarations(body: &[Stmt]) -> FxIndexSet<String> {
    #[derive(Default)]
    struct FunctionGlobalCollector {
        function_depth: usize,
        names: FxIndexSet<String>,
    }

    impl<'a> SourceOrderVisitor<'a> for FunctionGlobalCollector {
        fn visit_stmt(&mut self, stmt: &'a Stmt) {
            match stmt {
                Stmt::Global(global) if self.function_depth > 0 => {
                    self.names
                        .extend(global.names.iter().map(ToString::to_string));
                }
                Stmt::FunctionDef(_) => {
                    self.function_depth += 1;
                    source_order::walk_stmt(self, stmt);
                    self.function_depth -= 1;
                }
                _ => source_order::walk_stmt(self, stmt),
            }
        }

        fn visit_expr(&mut self, _expr: &'a Expr) {}
    }

    let mut collector = FunctionGlobalCollector::default();
    source_order::walk_body(&mut collector, body);
    collector.names
}
