//! Dependency resolution for groups of top-level statements
//!
//! Given the statements that will share one output file, works out where every name they
//! read from module scope comes from: a module-scope import, a statement that lands in
//! another file, a builtin, or nowhere the analysis can see.

use log::debug;
use ruff_python_stdlib::builtins::is_python_builtin;
use rustc_hash::FxHashSet;

use super::{
    import_analyzer::{BindingRef, ImportTable},
    statement_categorizer::StatementKind,
};
use crate::{
    parser::SourceModule,
    types::{FxIndexMap, FxIndexSet, StmtIndex},
    visitors::{FreeNameCollector, LocalVarCollector, collect_function_global_declarations},
};

/// Module attributes the interpreter sets on every module
pub const MODULE_DUNDERS: &[&str] = &[
    "__name__",
    "__file__",
    "__doc__",
    "__spec__",
    "__loader__",
    "__package__",
    "__builtins__",
    "__path__",
    "__cached__",
    "__annotations__",
    "__dict__",
];

/// Names bound at module scope by statements other than imports
#[derive(Debug, Default)]
pub struct ModuleBindings {
    by_name: FxIndexMap<String, Vec<StmtIndex>>,
}

impl ModuleBindings {
    pub fn from_module(module: &SourceModule) -> Self {
        let mut by_name: FxIndexMap<String, Vec<StmtIndex>> = FxIndexMap::default();
        for (index, stmt, kind) in module.statements() {
            if matches!(
                kind,
                StatementKind::Import
                    | StatementKind::TypeCheckingImports
                    | StatementKind::EntryGuard
                    | StatementKind::Docstring
            ) {
                continue;
            }
            for name in LocalVarCollector::bindings_of(std::slice::from_ref(stmt)) {
                by_name.entry(name).or_default().push(index);
            }
        }
        Self { by_name }
    }

    /// Statements binding `name`, in source order
    pub fn binders(&self, name: &str) -> &[StmtIndex] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every module-scope name with the statement that binds it last
    pub fn final_binders(&self) -> impl Iterator<Item = (&str, StmtIndex)> {
        self.by_name
            .iter()
            .filter_map(|(name, binders)| Some((name.as_str(), *binders.last()?)))
    }
}

/// Where the names read by a group of statements come from
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Import aliases the group needs, in first-use order
    pub imports: FxIndexSet<BindingRef>,
    /// Names provided by statements outside the group, with the providing statement
    pub module_refs: FxIndexMap<String, StmtIndex>,
    /// Names nothing could be found for
    pub unresolved: FxIndexSet<String>,
    /// Names functions of the group declare `global` while statements outside the group
    /// bind them
    pub global_rebinds: FxIndexSet<String>,
}

impl Resolution {
    /// Whether star imports were attached to cover unresolved names
    pub fn relies_on_star_imports(&self, imports: &ImportTable) -> bool {
        self.imports
            .iter()
            .any(|binding| imports.get(binding.import).bindings[binding.alias_index].is_none())
    }
}

/// Outcome of looking a name up among module-level statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleBinding {
    /// Bound by a statement of the same group
    Local,
    /// Bound by a statement that will live in another file
    External(StmtIndex),
}

/// Resolves free names of statement groups against a module's imports and bindings
#[derive(Debug)]
pub struct DependencyResolver<'a> {
    module: &'a SourceModule,
    imports: &'a ImportTable,
    bindings: &'a ModuleBindings,
    python_minor: u8,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        module: &'a SourceModule,
        imports: &'a ImportTable,
        bindings: &'a ModuleBindings,
        python_minor: u8,
    ) -> Self {
        Self {
            module,
            imports,
            bindings,
            python_minor,
        }
    }

    /// Resolve the statements `group`, given in source order
    pub fn resolve(&self, group: &[StmtIndex]) -> Resolution {
        let members: FxHashSet<StmtIndex> = group.iter().copied().collect();
        let group_bindings: FxHashSet<String> = group
            .iter()
            .flat_map(|&index| {
                LocalVarCollector::bindings_of(std::slice::from_ref(self.module.stmt(index)))
            })
            .collect();
        let mut resolution = Resolution::default();

        for &index in group {
            let free_names = FreeNameCollector::collect_from_stmt(self.module.stmt(index));
            for name in &free_names {
                self.resolve_name(name, index, &members, &group_bindings, &mut resolution);
            }

            let stmt = std::slice::from_ref(self.module.stmt(index));
            for name in collect_function_global_declarations(stmt) {
                let bound_elsewhere = self
                    .bindings
                    .binders(&name)
                    .iter()
                    .any(|binder| !members.contains(binder));
                if bound_elsewhere {
                    resolution.global_rebinds.insert(name);
                }
            }
        }

        self.attach_future_imports(&mut resolution);
        self.attach_type_checking_guards(&mut resolution);
        if !resolution.unresolved.is_empty() {
            self.attach_star_imports(&mut resolution);
        }
        resolution
    }

    fn resolve_name(
        &self,
        name: &str,
        at: StmtIndex,
        members: &FxHashSet<StmtIndex>,
        group_bindings: &FxHashSet<String>,
        resolution: &mut Resolution,
    ) {
        let import_refs = self.imports.bindings_for(name);
        resolution.imports.extend(import_refs.iter().copied());

        match self.module_binding(name, at, members) {
            Some(ModuleBinding::Local) => return,
            Some(ModuleBinding::External(binder)) => {
                // An import executed after the binding wins at runtime
                let rebound_by_import = import_refs
                    .iter()
                    .any(|binding| self.imports.get(binding.import).stmt_index > binder);
                if !rebound_by_import {
                    resolution.module_refs.insert(name.to_string(), binder);
                }
                return;
            }
            None => {}
        }

        // Bindings of code that is not importable, such as the entry guard body
        if group_bindings.contains(name) {
            return;
        }

        if import_refs.is_empty() && !self.is_implicit(name) {
            debug!("No binding found for '{name}' read by statement {at}");
            resolution.unresolved.insert(name.to_string());
        }
    }

    /// Decide which module-level statement a read of `name` at statement `at` sees
    ///
    /// A binding in the same group satisfies the read when it precedes it, or when no
    /// other group binds the name earlier. Otherwise the read goes to the last earlier
    /// binding elsewhere, or, for reads that only run later (function bodies), to the
    /// last binding overall.
    fn module_binding(
        &self,
        name: &str,
        at: StmtIndex,
        members: &FxHashSet<StmtIndex>,
    ) -> Option<ModuleBinding> {
        let binders = self.bindings.binders(name);
        let first_own = binders.iter().copied().find(|index| members.contains(index));
        let last_external_before = binders
            .iter()
            .copied()
            .rev()
            .find(|index| !members.contains(index) && *index < at);

        if let Some(first_own) = first_own {
            let binds_before_use = first_own < at
                || (first_own == at && self.module.kind(at).is_definition());
            return match last_external_before {
                Some(external) if !binds_before_use => Some(ModuleBinding::External(external)),
                _ => Some(ModuleBinding::Local),
            };
        }

        last_external_before
            .or_else(|| binders.last().copied())
            .map(ModuleBinding::External)
    }

    fn is_implicit(&self, name: &str) -> bool {
        MODULE_DUNDERS.contains(&name) || is_python_builtin(name, self.python_minor, false)
    }

    fn attach_future_imports(&self, resolution: &mut Resolution) {
        for statement in self.imports.future_imports() {
            resolution.imports.extend(self.imports.all_refs(statement.id));
        }
    }

    /// Guarded imports also need whatever the guard's test reads
    fn attach_type_checking_guards(&self, resolution: &mut Resolution) {
        let roots: FxIndexSet<String> = resolution
            .imports
            .iter()
            .filter_map(|binding| self.imports.get(binding.import).type_checking.as_ref())
            .map(|guard| guard.root_name.clone())
            .collect();
        for root in roots {
            resolution
                .imports
                .extend(self.imports.bindings_for(&root).iter().copied());
        }
    }

    /// Star imports cannot be enumerated, so any group with unresolved names gets all of them
    fn attach_star_imports(&self, resolution: &mut Resolution) {
        for statement in self.imports.star_imports() {
            resolution.imports.extend(self.imports.all_refs(statement.id));
        }
    }
}
