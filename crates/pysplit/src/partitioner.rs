//! Partitioning of top-level statements into output units
//!
//! Every top-level statement is assigned to exactly one place: a definition unit, a
//! pragma group, the leftover unit, the entry unit, or the synthesized initializer.
//! Imports are the exception, they are copied into whichever units read their names.

use log::debug;
use ruff_python_ast::Stmt;
use ruff_text_size::Ranged;
use rustc_hash::FxHashMap;

use crate::{
    analyzers::{
        BindingRef, DependencyResolver, ImportStatement, ImportTable, ModuleBindings, Resolution,
        StatementKind, dependency_resolver::MODULE_DUNDERS,
    },
    error::SplitWarning,
    module_naming::{INIT_MODULE, MAIN_MODULE, UnitNamer},
    parser::SourceModule,
    pragma::{PragmaMarker, find_pragmas, group_at},
    stdlib_detection::is_stdlib_without_side_effects,
    types::{FxIndexMap, FxIndexSet, StmtIndex},
    unit_graph::UnitGraph,
    visitors::{FreeNameCollector, LocalVarCollector},
};

/// What produced an output unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// One top-level function or class (and any redefinitions of the same name)
    Definition,
    /// Code following a `# pragma: newfile(...)` marker
    PragmaGroup,
    /// Module-level code that belongs to no definition
    Leftover,
    /// Body of the entry guard, written to `__main__.py`
    Entry,
}

/// A planned output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    pub module_name: String,
    pub kind: UnitKind,
    /// Statements written to the unit, in source order
    pub statements: Vec<StmtIndex>,
    /// Import aliases written to the unit, in source order
    pub imports: Vec<BindingRef>,
    /// Names imported from other units, keyed by unit module name
    pub sibling_imports: FxIndexMap<String, Vec<String>>,
    /// Statement of this unit each sibling-imported name is imported right before, so
    /// the import runs where the input had bound the name; `None` imports it after the
    /// unit's last statement
    pub sibling_anchors: FxIndexMap<String, Option<StmtIndex>>,
    /// Names no binding could be found for
    pub unresolved: FxIndexSet<String>,
    /// Names the initializer imports from this unit
    pub exports: Vec<String>,
}

impl OutputUnit {
    pub fn new(module_name: String, kind: UnitKind) -> Self {
        Self {
            module_name,
            kind,
            statements: Vec::new(),
            imports: Vec::new(),
            sibling_imports: FxIndexMap::default(),
            sibling_anchors: FxIndexMap::default(),
            unresolved: FxIndexSet::default(),
            exports: Vec::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.py", self.module_name)
    }
}

/// One `from .unit import ...` line of the initializer
///
/// A unit without names is imported as `from . import unit` so that its code still runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitImport {
    pub unit: String,
    pub names: Vec<String>,
}

/// The synthesized `__init__.py`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializerPlan {
    /// Module docstring of the input
    pub docstring: Option<StmtIndex>,
    /// Static `__all__` declarations of the input
    pub dunder_all: Vec<StmtIndex>,
    /// `__future__` imports of the input
    pub future_imports: Vec<BindingRef>,
    /// Unit imports, in the order the units' code appeared in the input
    pub unit_imports: Vec<UnitImport>,
    /// Generated `__all__`, when the input declares none
    pub all_names: Option<Vec<String>>,
}

impl InitializerPlan {
    /// Every re-exported name with the unit providing it
    pub fn reexports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.unit_imports.iter().flat_map(|import| {
            import
                .names
                .iter()
                .map(move |name| (name.as_str(), import.unit.as_str()))
        })
    }
}

/// Knobs of the partitioning pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOptions {
    pub leftover_module: String,
    pub honor_pragmas: bool,
    pub keep_unused_imports: bool,
    pub emit_all: bool,
    pub warn_unresolved: bool,
    pub python_minor: u8,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            leftover_module: "_globals".to_string(),
            honor_pragmas: true,
            keep_unused_imports: true,
            emit_all: true,
            warn_unresolved: true,
            python_minor: 10,
        }
    }
}

/// The complete plan for one input file
#[derive(Debug)]
pub struct SplitPlan {
    pub imports: ImportTable,
    /// Units in output order: units in order of their first statement, then the entry unit
    pub units: Vec<OutputUnit>,
    pub initializer: InitializerPlan,
    /// Import aliases nothing reads that were left out of the package
    pub dropped_imports: Vec<BindingRef>,
    pub warnings: Vec<SplitWarning>,
}

impl SplitPlan {
    pub fn unit(&self, module_name: &str) -> Option<&OutputUnit> {
        self.units.iter().find(|unit| unit.module_name == module_name)
    }

    pub fn entry(&self) -> Option<&OutputUnit> {
        self.units.iter().find(|unit| unit.kind == UnitKind::Entry)
    }
}

/// Where a top-level statement ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Unit(usize),
    Initializer,
    Redistributed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum UnitKey {
    Definition(String),
    Group(String),
    Leftover,
    Entry,
}

/// Plans how a module is split
#[derive(Debug)]
pub struct Partitioner<'a> {
    module: &'a SourceModule,
    options: &'a PartitionOptions,
}

impl<'a> Partitioner<'a> {
    pub fn new(module: &'a SourceModule, options: &'a PartitionOptions) -> Self {
        Self { module, options }
    }

    pub fn plan(&self) -> SplitPlan {
        let imports = ImportTable::from_module(self.module);
        let bindings = ModuleBindings::from_module(self.module);
        let mut warnings = self.module.warnings().to_vec();

        let (mut units, owners, mut initializer) = self.assign_statements();

        let resolver =
            DependencyResolver::new(self.module, &imports, &bindings, self.options.python_minor);
        let unit_names: Vec<String> = units.iter().map(|unit| unit.module_name.clone()).collect();
        for unit in &mut units {
            let resolution = resolver.resolve(&unit.statements);
            self.apply_resolution(unit, resolution, &owners, &unit_names, &imports, &mut warnings);
        }

        let declared_all = self.declared_all();
        let dropped_imports = self.place_unused_imports(&imports, &declared_all, &mut units);
        self.plan_exports(&bindings, &imports, &declared_all, &owners, &mut units);

        units.sort_by_cached_key(|unit| {
            let first = unit.statements.first().copied().or_else(|| {
                unit.imports
                    .iter()
                    .map(|binding| imports.get(binding.import).stmt_index)
                    .min()
            });
            (unit.kind == UnitKind::Entry, first)
        });

        initializer.future_imports = imports
            .future_imports()
            .flat_map(|statement| imports.all_refs(statement.id))
            .collect();
        initializer.unit_imports = units
            .iter()
            .filter(|unit| unit.kind != UnitKind::Entry)
            .map(|unit| UnitImport {
                unit: unit.module_name.clone(),
                names: unit.exports.clone(),
            })
            .collect();
        // A dynamic `__all__` is re-exported from the unit that builds it
        let unit_exports_all = units
            .iter()
            .any(|unit| unit.exports.iter().any(|name| name == "__all__"));
        if initializer.dunder_all.is_empty() && !unit_exports_all && self.options.emit_all {
            let names: Vec<String> = initializer
                .reexports()
                .map(|(name, _)| name)
                .filter(|name| !name.starts_with('_'))
                .map(ToString::to_string)
                .collect();
            initializer.all_names = Some(names);
        }

        for cycle in UnitGraph::from_units(&units).cycles() {
            debug!("Circular import between units: {}", cycle.join(" -> "));
            warnings.push(SplitWarning::ImportCycle { units: cycle });
        }

        SplitPlan {
            imports,
            units,
            initializer,
            dropped_imports,
            warnings,
        }
    }

    /// Assign every top-level statement to its owner
    fn assign_statements(&self) -> (Vec<OutputUnit>, Vec<Owner>, InitializerPlan) {
        let pragmas: Vec<PragmaMarker> = if self.options.honor_pragmas {
            find_pragmas(self.module)
        } else {
            Vec::new()
        };
        let mut namer = UnitNamer::new([
            INIT_MODULE,
            MAIN_MODULE,
            self.options.leftover_module.as_str(),
        ]);
        let mut units: Vec<OutputUnit> = Vec::new();
        let mut unit_index: FxHashMap<UnitKey, usize> = FxHashMap::default();
        let mut owners = Vec::with_capacity(self.module.body().len());
        let mut initializer = InitializerPlan::default();
        let dynamic_all = self.all_is_dynamic();

        for (index, stmt, kind) in self.module.statements() {
            let (key, unit_kind, desired_name) = match kind {
                StatementKind::Import | StatementKind::TypeCheckingImports => {
                    owners.push(Owner::Redistributed);
                    continue;
                }
                StatementKind::Docstring => {
                    initializer.docstring = Some(index);
                    owners.push(Owner::Initializer);
                    continue;
                }
                StatementKind::DunderAll(_) if !dynamic_all => {
                    initializer.dunder_all.push(index);
                    owners.push(Owner::Initializer);
                    continue;
                }
                StatementKind::EntryGuard => (UnitKey::Entry, UnitKind::Entry, MAIN_MODULE),
                _ => match group_at(&pragmas, stmt.start()) {
                    Some(marker) => (
                        UnitKey::Group(marker.module_name.clone()),
                        UnitKind::PragmaGroup,
                        marker.module_name.as_str(),
                    ),
                    None => match definition_name(stmt) {
                        Some(name) => (
                            UnitKey::Definition(name.to_string()),
                            UnitKind::Definition,
                            name,
                        ),
                        None => (
                            UnitKey::Leftover,
                            UnitKind::Leftover,
                            self.options.leftover_module.as_str(),
                        ),
                    },
                },
            };

            let position = *unit_index.entry(key).or_insert_with(|| {
                let module_name = match unit_kind {
                    UnitKind::Entry | UnitKind::Leftover => desired_name.to_string(),
                    UnitKind::Definition | UnitKind::PragmaGroup => namer.claim(desired_name),
                };
                units.push(OutputUnit::new(module_name, unit_kind));
                units.len() - 1
            });
            units[position].statements.push(index);
            owners.push(Owner::Unit(position));
        }

        debug!(
            "Assigned {} statements to {} units",
            owners.len(),
            units.len()
        );
        (units, owners, initializer)
    }

    fn apply_resolution(
        &self,
        unit: &mut OutputUnit,
        resolution: Resolution,
        owners: &[Owner],
        unit_names: &[String],
        imports: &ImportTable,
        warnings: &mut Vec<SplitWarning>,
    ) {
        let relies_on_star = resolution.relies_on_star_imports(imports);

        let mut refs: Vec<BindingRef> = resolution.imports.into_iter().collect();
        refs.sort_unstable();
        unit.imports = refs;

        let mut unresolved = resolution.unresolved;
        for (name, binder) in resolution.module_refs {
            match owners[binder] {
                Owner::Unit(position) if unit_names[position] == unit.module_name => {}
                Owner::Unit(position) => {
                    let anchor = unit
                        .statements
                        .iter()
                        .copied()
                        .find(|&index| index > binder);
                    debug!(
                        "'{name}' read by unit '{}' comes from unit '{}'",
                        unit.module_name, unit_names[position]
                    );
                    unit.sibling_anchors.insert(name.clone(), anchor);
                    unit.sibling_imports
                        .entry(unit_names[position].clone())
                        .or_default()
                        .push(name);
                }
                // The initializer only keeps `__all__` when no unit reads it
                Owner::Initializer | Owner::Redistributed => {
                    debug!(
                        "'{name}' read by unit '{}' is not bound in any unit",
                        unit.module_name
                    );
                    unresolved.insert(name);
                }
            }
        }

        for name in &resolution.global_rebinds {
            debug!(
                "Unit '{}' rebinds '{name}' of another unit through `global`",
                unit.module_name
            );
            warnings.push(SplitWarning::GlobalRebinding {
                unit: unit.module_name.clone(),
                name: name.clone(),
            });
        }

        if self.options.warn_unresolved && !relies_on_star {
            for name in &unresolved {
                debug!("Unresolved name '{name}' in unit '{}'", unit.module_name);
                warnings.push(SplitWarning::UnresolvedName {
                    unit: unit.module_name.clone(),
                    name: name.clone(),
                });
            }
        }
        unit.unresolved = unresolved;
    }

    /// Whether code other than static `__all__` declarations reads or rebinds `__all__`
    ///
    /// Such an `__all__` is module state like any other and stays with the code using it.
    fn all_is_dynamic(&self) -> bool {
        self.module.statements().any(|(_, stmt, kind)| {
            !matches!(kind, StatementKind::DunderAll(_))
                && (FreeNameCollector::collect_from_stmt(stmt).contains("__all__")
                    || LocalVarCollector::bindings_of(std::slice::from_ref(stmt))
                        .contains("__all__"))
        })
    }

    /// Names listed by static `__all__` declarations
    fn declared_all(&self) -> FxIndexSet<String> {
        self.module
            .statements()
            .filter_map(|(_, _, kind)| match kind {
                StatementKind::DunderAll(names) => Some(names.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Give imports no unit reads a home, or drop them
    ///
    /// Returns the dropped aliases.
    fn place_unused_imports(
        &self,
        imports: &ImportTable,
        declared_all: &FxIndexSet<String>,
        units: &mut Vec<OutputUnit>,
    ) -> Vec<BindingRef> {
        let used: FxIndexSet<BindingRef> = units
            .iter()
            .flat_map(|unit| unit.imports.iter().copied())
            .collect();
        let mut homeless = Vec::new();
        let mut dropped = Vec::new();

        for statement in imports.statements() {
            if statement.is_future() {
                continue;
            }
            for binding in imports.all_refs(statement.id) {
                let bound_name = statement.bindings[binding.alias_index]
                    .as_ref()
                    .map(|import| import.bound_name.as_str());
                let exported = statement.type_checking.is_none()
                    && bound_name.is_some_and(|name| declared_all.contains(name));
                if used.contains(&binding) && !exported {
                    continue;
                }

                let keep = exported
                    || (statement.type_checking.is_none()
                        && self.options.keep_unused_imports
                        && !self.is_side_effect_free(statement, binding.alias_index));
                if keep {
                    homeless.push(binding);
                } else {
                    debug!(
                        "Dropping unused import '{}' on line {}",
                        bound_name.unwrap_or("*"),
                        self.module.line_of(statement.stmt_index)
                    );
                    dropped.push(binding);
                }
            }
        }

        if !homeless.is_empty() {
            let leftover = match units.iter().position(|unit| unit.kind == UnitKind::Leftover) {
                Some(position) => position,
                None => {
                    units.push(OutputUnit::new(
                        self.options.leftover_module.clone(),
                        UnitKind::Leftover,
                    ));
                    units.len() - 1
                }
            };
            let unit = &mut units[leftover];
            for binding in homeless {
                if !unit.imports.contains(&binding) {
                    unit.imports.push(binding);
                }
            }
            unit.imports.sort_unstable();
        }
        dropped
    }

    fn is_side_effect_free(&self, statement: &ImportStatement, alias_index: usize) -> bool {
        if statement.level > 0 {
            return false;
        }
        let module = match (&statement.stmt, &statement.bindings[alias_index]) {
            (Stmt::Import(_), Some(binding)) => binding.qualified_name.as_str(),
            _ => statement.module.as_deref().unwrap_or_default(),
        };
        is_stdlib_without_side_effects(module, self.options.python_minor)
    }

    /// Decide which names each unit provides to the initializer
    ///
    /// Definitions are always re-exported; other module-level bindings when public or
    /// listed in `__all__`. A name bound in several units comes from the last one.
    fn plan_exports(
        &self,
        bindings: &ModuleBindings,
        imports: &ImportTable,
        declared_all: &FxIndexSet<String>,
        owners: &[Owner],
        units: &mut [OutputUnit],
    ) {
        let mut exported: FxIndexSet<&str> = FxIndexSet::default();
        for (name, binder) in bindings.final_binders() {
            let Owner::Unit(position) = owners[binder] else {
                continue;
            };
            if units[position].kind == UnitKind::Entry {
                continue;
            }
            if self.module.kind(binder).is_definition()
                || is_public(name)
                || declared_all.contains(name)
            {
                units[position].exports.push(name.to_string());
                exported.insert(name);
            }
        }

        // Names in `__all__` that only an import binds are provided by the leftover unit
        let Some(leftover) = units.iter_mut().find(|unit| unit.kind == UnitKind::Leftover) else {
            return;
        };
        for name in declared_all {
            if exported.contains(name.as_str()) {
                continue;
            }
            let imported_here = imports
                .bindings_for(name)
                .iter()
                .any(|binding| leftover.imports.contains(binding));
            if imported_here {
                leftover.exports.push(name.clone());
            }
        }
    }
}

/// Name of a top-level function or class
fn definition_name(stmt: &Stmt) -> Option<&str> {
    match stmt {
        Stmt::FunctionDef(function_def) => Some(function_def.name.as_str()),
        Stmt::ClassDef(class_def) => Some(class_def.name.as_str()),
        _ => None,
    }
}

/// Whether a module-level binding is part of the package's interface
fn is_public(name: &str) -> bool {
    if name.starts_with("__") && name.ends_with("__") && name.len() > 4 {
        return !MODULE_DUNDERS.contains(&name);
    }
    !name.starts_with('_')
}
