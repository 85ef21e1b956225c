//! Free name collector for top-level statements
//!
//! Walks a statement the way the interpreter would evaluate it from module scope and
//! records every identifier loaded from that module scope: names read in decorators,
//! default values, annotations, class bases, and anywhere in nested bodies that no
//! enclosing function, lambda or comprehension binds.
//!
//! Python's scoping rules that matter here:
//! - a function's locals are decided by the whole body, not by statement order
//! - `global` in a function makes the name refer to module scope again
//! - class bodies do not leak their bindings into methods or comprehensions
//! - comprehension targets only exist inside the comprehension

use ruff_python_ast::{
    Comprehension, Expr, ExprContext, Parameters, Stmt, TypeParam, TypeParams,
    visitor::source_order::{self, SourceOrderVisitor},
};
use rustc_hash::FxHashSet;

use super::local_var_collector::{LocalVarCollector, collect_global_declarations};
use crate::types::FxIndexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Class,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bound: FxHashSet<String>,
    globals: FxHashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bound: FxHashSet::default(),
            globals: FxHashSet::default(),
        }
    }
}

/// Visitor that collects names a statement reads from module scope
#[derive(Debug, Default)]
pub struct FreeNameCollector {
    scopes: Vec<Scope>,
    free_names: FxIndexSet<String>,
}

impl FreeNameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the module-scope names read by `body`, in first-use order
    ///
    /// Names that `body` itself binds at module scope are still reported: whether such a
    /// binding satisfies the read depends on which unit the statements end up in, and that
    /// is for the caller to decide.
    pub fn collect_from_body(body: &[Stmt]) -> FxIndexSet<String> {
        let mut visitor = Self::new();
        visitor.visit_body(body);
        visitor.free_names
    }

    /// Collect the module-scope names read by a single statement
    pub fn collect_from_stmt(stmt: &Stmt) -> FxIndexSet<String> {
        Self::collect_from_body(std::slice::from_ref(stmt))
    }

    fn is_free(&self, name: &str) -> bool {
        let innermost = self.scopes.len().saturating_sub(1);
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            // Class scope is only visible from the class body itself
            if scope.kind == ScopeKind::Class && depth != innermost {
                continue;
            }
            if scope.globals.contains(name) {
                return true;
            }
            if scope.bound.contains(name) {
                return false;
            }
        }
        true
    }

    fn track_load(&mut self, name: &str) {
        if self.is_free(name) && !self.free_names.contains(name) {
            self.free_names.insert(name.to_string());
        }
    }

    /// Push a function-like scope whose locals are decided by `body`
    fn push_block_scope(&mut self, kind: ScopeKind, body: &[Stmt]) {
        let globals = collect_global_declarations(body);
        let mut locals = FxIndexSet::default();
        LocalVarCollector::new(&mut locals, &globals).collect_from_stmts(body);

        let mut scope = Scope::new(kind);
        scope.bound.extend(locals);
        scope.globals.extend(globals);
        self.scopes.push(scope);
    }

    fn push_type_param_scope(&mut self, type_params: Option<&TypeParams>) -> bool {
        let Some(type_params) = type_params else {
            return false;
        };
        let mut scope = Scope::new(ScopeKind::Function);
        for type_param in &type_params.type_params {
            let name = match type_param {
                TypeParam::TypeVar(type_var) => &type_var.name,
                TypeParam::ParamSpec(param_spec) => &param_spec.name,
                TypeParam::TypeVarTuple(var_tuple) => &var_tuple.name,
            };
            scope.bound.insert(name.to_string());
        }
        self.scopes.push(scope);
        self.visit_type_params(type_params);
        true
    }

    /// Default values are evaluated in the enclosing scope when the `def` runs
    fn visit_parameter_defaults(&mut self, parameters: &Parameters) {
        for param in parameters
            .posonlyargs
            .iter()
            .chain(&parameters.args)
            .chain(&parameters.kwonlyargs)
        {
            if let Some(default) = &param.default {
                self.visit_expr(default);
            }
        }
    }

    fn visit_parameter_annotations(&mut self, parameters: &Parameters) {
        for param in parameters
            .posonlyargs
            .iter()
            .chain(&parameters.args)
            .chain(&parameters.kwonlyargs)
        {
            if let Some(annotation) = &param.parameter.annotation {
                self.visit_expr(annotation);
            }
        }
        for param in parameters.vararg.iter().chain(&parameters.kwarg) {
            if let Some(annotation) = &param.annotation {
                self.visit_expr(annotation);
            }
        }
    }

    fn bind_parameters(&mut self, parameters: &Parameters) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        for param in parameters
            .posonlyargs
            .iter()
            .chain(&parameters.args)
            .chain(&parameters.kwonlyargs)
        {
            scope.bound.insert(param.parameter.name.to_string());
        }
        for param in parameters.vararg.iter().chain(&parameters.kwarg) {
            scope.bound.insert(param.name.to_string());
        }
    }

    /// Visit a comprehension: the first iterable belongs to the enclosing scope,
    /// everything else sees the comprehension targets
    fn visit_comprehension_scope<'a>(
        &mut self,
        generators: &'a [Comprehension],
        elements: &[&'a Expr],
    ) {
        let Some((first, rest)) = generators.split_first() else {
            return;
        };
        self.visit_expr(&first.iter);

        let mut scope = Scope::new(ScopeKind::Comprehension);
        for generator in generators {
            collect_target_names(&generator.target, &mut scope.bound);
        }
        self.scopes.push(scope);

        for condition in &first.ifs {
            self.visit_expr(condition);
        }
        for generator in rest {
            self.visit_expr(&generator.iter);
            for condition in &generator.ifs {
                self.visit_expr(condition);
            }
        }
        for element in elements {
            self.visit_expr(element);
        }
        self.scopes.pop();
    }
}

fn collect_target_names(target: &Expr, names: &mut FxHashSet<String>) {
    match target {
        Expr::Name(name) => {
            names.insert(name.id.to_string());
        }
        Expr::Tuple(tuple) => {
            for elt in &tuple.elts {
                collect_target_names(elt, names);
            }
        }
        Expr::List(list) => {
            for elt in &list.elts {
                collect_target_names(elt, names);
            }
        }
        Expr::Starred(starred) => collect_target_names(&starred.value, names),
        _ => {}
    }
}

impl<'a> SourceOrderVisitor<'a> for FreeNameCollector {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::FunctionDef(func) => {
                // Decorators and defaults run in the enclosing scope
                for decorator in &func.decorator_list {
                    self.visit_expr(&decorator.expression);
                }
                self.visit_parameter_defaults(&func.parameters);

                let has_type_params = self.push_type_param_scope(func.type_params.as_deref());
                self.visit_parameter_annotations(&func.parameters);
                if let Some(returns) = &func.returns {
                    self.visit_expr(returns);
                }

                self.push_block_scope(ScopeKind::Function, &func.body);
                self.bind_parameters(&func.parameters);
                self.visit_body(&func.body);
                self.scopes.pop();

                if has_type_params {
                    self.scopes.pop();
                }
            }
            Stmt::ClassDef(class) => {
                for decorator in &class.decorator_list {
                    self.visit_expr(&decorator.expression);
                }

                let has_type_params = self.push_type_param_scope(class.type_params.as_deref());
                for base in class.bases() {
                    self.visit_expr(base);
                }
                for keyword in class.keywords() {
                    self.visit_expr(&keyword.value);
                }

                self.push_block_scope(ScopeKind::Class, &class.body);
                self.visit_body(&class.body);
                self.scopes.pop();

                if has_type_params {
                    self.scopes.pop();
                }
            }
            Stmt::TypeAlias(type_alias) => {
                let has_type_params =
                    self.push_type_param_scope(type_alias.type_params.as_deref());
                self.visit_expr(&type_alias.value);
                if has_type_params {
                    self.scopes.pop();
                }
            }
            // `x += 1` reads `x` before storing it
            Stmt::AugAssign(aug_assign) => {
                if let Expr::Name(name) = &*aug_assign.target {
                    self.track_load(&name.id);
                }
                source_order::walk_stmt(self, stmt);
            }
            // Bindings were decided when the enclosing scope was pushed
            Stmt::Global(_) | Stmt::Nonlocal(_) | Stmt::Import(_) | Stmt::ImportFrom(_) => {}
            _ => source_order::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Name(name) => {
                if name.ctx == ExprContext::Load {
                    self.track_load(&name.id);
                }
            }
            Expr::Lambda(lambda) => {
                if let Some(parameters) = &lambda.parameters {
                    self.visit_parameter_defaults(parameters);
                }
                self.scopes.push(Scope::new(ScopeKind::Function));
                if let Some(parameters) = &lambda.parameters {
                    self.bind_parameters(parameters);
                }
                self.visit_expr(&lambda.body);
                self.scopes.pop();
            }
            Expr::ListComp(comp) => {
                self.visit_comprehension_scope(&comp.generators, &[&*comp.elt]);
            }
            Expr::SetComp(comp) => {
                self.visit_comprehension_scope(&comp.generators, &[&*comp.elt]);
            }
            Expr::Generator(generator) => {
                self.visit_comprehension_scope(&generator.generators, &[&*generator.elt]);
            }
            Expr::DictComp(comp) => {
                self.visit_comprehension_scope(&comp.generators, &[&*comp.key, &*comp.value]);
            }
            _ => source_order::walk_expr(self, expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use ruff_python_parser::parse_module;

    use super::*;

    fn parse_and_collect(code: &str) -> FxIndexSet<String> {
        let parsed = parse_module(code).expect("Failed to parse");
        FreeNameCollector::collect_from_body(&parsed.into_syntax().body)
    }

    #[test]
    fn test_basic_name_usage() {
        let used = parse_and_collect(
            r"
def foo():
    return os.getcwd()
",
        );
        assert!(used.contains("os"));
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn test_parameters_and_locals_shadow() {
        let used = parse_and_collect(
            r"
def foo(json, *args, path=default_path, **kwargs):
    os = 'shadow'
    result = json.dumps(os)
    return result, args, kwargs, path
",
        );
        assert!(used.contains("default_path"));
        assert!(!used.contains("json"));
        assert!(!used.contains("os"));
        assert!(!used.contains("result"));
    }

    #[test]
    fn test_locals_decided_by_whole_body() {
        // `value` is local even though it is read before the assignment
        let used = parse_and_collect(
            r"
def foo():
    print(value)
    value = 1
",
        );
        assert!(used.contains("print"));
        assert!(!used.contains("value"));
    }

    #[test]
    fn test_global_declaration_makes_name_free() {
        let used = parse_and_collect(
            r"
def bump():
    global counter
    counter += 1
",
        );
        assert!(used.contains("counter"));
    }

    #[test]
    fn test_annotations_decorators_and_bases_counted() {
        let used = parse_and_collect(
            r"
@register(Registry)
class Model(Base, metaclass=Meta):
    field: Field = default_field()

    def save(self, path: Path) -> Result:
        pass
",
        );
        for name in [
            "register",
            "Registry",
            "Base",
            "Meta",
            "Field",
            "default_field",
            "Path",
            "Result",
        ] {
            assert!(used.contains(name), "missing {name}");
        }
        assert!(!used.contains("self"));
        assert!(!used.contains("field"));
    }

    #[test]
    fn test_class_scope_not_visible_in_methods() {
        let used = parse_and_collect(
            r"
class Config:
    timeout = 5
    doubled = timeout * 2

    def get(self):
        return timeout
",
        );
        // Read from the class body is satisfied, read from the method is not
        assert!(used.contains("timeout"));
        assert!(!used.contains("doubled"));
    }

    #[test]
    fn test_comprehension_targets_are_scoped() {
        let used = parse_and_collect(
            r"
def squares(items):
    return {k: v * factor for k, v in items if k not in excluded}
",
        );
        assert!(used.contains("factor"));
        assert!(used.contains("excluded"));
        assert!(!used.contains("k"));
        assert!(!used.contains("v"));
        assert!(!used.contains("items"));
    }

    #[test]
    fn test_lambda_and_nested_functions() {
        let used = parse_and_collect(
            r"
def outer(x):
    def inner(y):
        return x + y + offset
    key = lambda item: item.rank + bias
    return sorted([inner(1)], key=key)
",
        );
        assert!(used.contains("offset"));
        assert!(used.contains("bias"));
        assert!(used.contains("sorted"));
        assert!(!used.contains("x"));
        assert!(!used.contains("inner"));
        assert!(!used.contains("item"));
    }

    #[test]
    fn test_nested_import_shadows_module_import() {
        let used = parse_and_collect(
            r"
def load():
    import json
    return json.loads(data)
",
        );
        assert!(!used.contains("json"));
        assert!(used.contains("data"));
    }

    #[test]
    fn test_type_params_bound() {
        let used = parse_and_collect(
            r"
def first[T: Bound](items: list[T]) -> T:
    return items[0]
",
        );
        assert!(used.contains("Bound"));
        assert!(used.contains("list"));
        assert!(!used.contains("T"));
    }

    #[test]
    fn test_store_and_del_contexts_ignored() {
        let used = parse_and_collect("target = 1\ndel target\n");
        assert!(used.is_empty());
    }

    #[test]
    fn test_augmented_assignment_reads_target() {
        let used = parse_and_collect(
            r"
__all__ += ['extra']

def count():
    total = 0
    total += 1
    return total
",
        );
        assert!(used.contains("__all__"));
        assert!(!used.contains("total"));
    }
}
