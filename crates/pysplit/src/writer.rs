//! Rendering and persisting the planned package
//!
//! Statements keep their exact source text. Only imports that had to be narrowed or
//! relocated, sibling imports, and the generated `__all__` go through
//! `ruff_python_codegen`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use ruff_python_ast::{Stmt, StmtIf};
use ruff_python_codegen::{Generator, Stylist};
use ruff_python_parser::TokenKind;
use ruff_text_size::{Ranged, TextRange, TextSize};

use crate::{
    analyzers::{BindingRef, ImportStatement},
    ast_builder,
    error::{Result, SplitError},
    module_naming::INIT_MODULE,
    parser::SourceModule,
    partitioner::{InitializerPlan, OutputUnit, SplitPlan, UnitKind},
    pragma::is_pragma_line,
    types::{FxIndexMap, StmtIndex},
};

/// A generated file, relative to the package directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub file_name: String,
    pub contents: String,
}

/// Render every file of `plan`: the initializer first, then units in plan order
pub fn render_plan(module: &SourceModule, plan: &SplitPlan) -> Vec<RenderedFile> {
    let writer = UnitWriter::new(module, plan);
    let mut files = Vec::with_capacity(plan.units.len() + 1);
    files.push(RenderedFile {
        file_name: format!("{INIT_MODULE}.py"),
        contents: writer.render_initializer(&plan.initializer),
    });
    for unit in &plan.units {
        files.push(RenderedFile {
            file_name: unit.file_name(),
            contents: writer.render_unit(unit),
        });
    }
    files
}

/// Replace `package_dir` with a directory holding `files`
///
/// Returns the paths written. Refuses to touch a directory that contains `input`.
pub fn write_package(
    files: &[RenderedFile],
    package_dir: &Path,
    input: &Path,
) -> Result<Vec<PathBuf>> {
    if package_dir.exists() {
        let canonical_dir = package_dir
            .canonicalize()
            .map_err(SplitError::io("resolve", package_dir))?;
        let canonical_input = input
            .canonicalize()
            .map_err(SplitError::io("resolve", input))?;
        if canonical_input.starts_with(&canonical_dir) {
            return Err(SplitError::InvalidInput(format!(
                "output directory {} contains the input file {}",
                package_dir.display(),
                input.display()
            )));
        }
        debug!("Removing existing {}", package_dir.display());
        fs::remove_dir_all(package_dir).map_err(SplitError::io("remove", package_dir))?;
    }
    fs::create_dir_all(package_dir).map_err(SplitError::io("create directory", package_dir))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = package_dir.join(&file.file_name);
        fs::write(&path, &file.contents).map_err(SplitError::io("write", &path))?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Renders units of one plan against the input's source text and style
struct UnitWriter<'a> {
    module: &'a SourceModule,
    plan: &'a SplitPlan,
    stylist: Stylist<'a>,
    /// End of the comment block at the top of the file
    header_end: TextSize,
}

impl<'a> UnitWriter<'a> {
    fn new(module: &'a SourceModule, plan: &'a SplitPlan) -> Self {
        let stylist = Stylist::from_tokens(module.parsed().tokens(), module.source());
        Self {
            module,
            plan,
            stylist,
            header_end: header_comment_end(module.source()),
        }
    }

    fn eol(&self) -> &str {
        self.stylist.line_ending().as_str()
    }

    fn generate(&self, stmt: &Stmt) -> String {
        Generator::from(&self.stylist).stmt(stmt)
    }

    fn render_initializer(&self, initializer: &InitializerPlan) -> String {
        let source = self.module.source();
        let mut sections = Vec::new();

        let mut head = String::new();
        let header = &source[TextRange::new(TextSize::default(), self.header_end)];
        for line in header.lines().filter(|line| !is_pragma_line(line)) {
            head.push_str(line.trim_end());
            head.push_str(self.eol());
        }
        if let Some(docstring) = initializer.docstring {
            head.push_str(&source[self.module.stmt(docstring).range()]);
            head.push_str(self.eol());
        }
        if !head.is_empty() {
            sections.push(head);
        }

        let mut imports = self.render_imports(&initializer.future_imports);
        for unit_import in &initializer.unit_imports {
            let stmt = if unit_import.names.is_empty() {
                ast_builder::import_from(
                    None,
                    vec![ast_builder::alias(&unit_import.unit, None)],
                    1,
                )
            } else {
                ast_builder::sibling_import(&unit_import.unit, &unit_import.names)
            };
            imports.push(self.generate(&stmt));
        }
        if !imports.is_empty() {
            sections.push(self.join_lines(&imports));
        }

        if !initializer.dunder_all.is_empty() {
            let declarations: Vec<String> = initializer
                .dunder_all
                .iter()
                .map(|&index| self.statement_text(index))
                .collect();
            sections.push(self.join_lines(&declarations));
        } else if let Some(names) = &initializer.all_names
            && !names.is_empty()
        {
            let all = ast_builder::string_list_assign("__all__", names, self.stylist.quote());
            sections.push(self.generate(&all) + self.eol());
        }

        self.join_sections(&sections, 1)
    }

    fn render_unit(&self, unit: &OutputUnit) -> String {
        let mut anchored = self.sibling_import_lines(unit);
        let mut imports = self.render_imports(&unit.imports);
        if let Some(lines) = anchored.shift_remove(&unit.statements.first().copied()) {
            imports.extend(lines);
        }
        let body = self.render_body(unit, &anchored);

        let leads_with_definition = unit
            .statements
            .first()
            .is_some_and(|&index| self.module.kind(index).is_definition());
        let mut sections = Vec::new();
        if !imports.is_empty() {
            sections.push(self.join_lines(&imports));
        }
        if !body.is_empty() {
            sections.push(body);
        }
        self.join_sections(&sections, if leads_with_definition { 2 } else { 1 })
    }

    /// Sibling import lines keyed by the unit statement they are written before
    fn sibling_import_lines(
        &self,
        unit: &OutputUnit,
    ) -> FxIndexMap<Option<StmtIndex>, Vec<String>> {
        let mut grouped: FxIndexMap<Option<StmtIndex>, FxIndexMap<&str, Vec<&str>>> =
            FxIndexMap::default();
        for (sibling, names) in &unit.sibling_imports {
            for name in names {
                let anchor = unit
                    .sibling_anchors
                    .get(name)
                    .copied()
                    .unwrap_or_else(|| unit.statements.first().copied());
                grouped
                    .entry(anchor)
                    .or_default()
                    .entry(sibling.as_str())
                    .or_default()
                    .push(name.as_str());
            }
        }

        grouped
            .into_iter()
            .map(|(anchor, siblings)| {
                let lines = siblings
                    .iter()
                    .map(|(sibling, names)| {
                        self.generate(&ast_builder::sibling_import(sibling, names))
                    })
                    .collect();
                (anchor, lines)
            })
            .collect()
    }

    /// Import lines for `bindings`: `__future__` first, then plain imports in source
    /// order, then type-checking imports under their guards
    fn render_imports(&self, bindings: &[BindingRef]) -> Vec<String> {
        let mut grouped: FxIndexMap<usize, (&ImportStatement, Vec<usize>)> =
            FxIndexMap::default();
        let mut sorted = bindings.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for binding in sorted {
            let statement = self.plan.imports.get(binding.import);
            grouped
                .entry(binding.import.as_usize())
                .or_insert_with(|| (statement, Vec::new()))
                .1
                .push(binding.alias_index);
        }

        let mut future = Vec::new();
        let mut plain = Vec::new();
        let mut guarded: FxIndexMap<&str, Vec<String>> = FxIndexMap::default();
        for (statement, aliases) in grouped.values() {
            let Some(line) = self.render_import(statement, aliases) else {
                continue;
            };
            match &statement.type_checking {
                Some(guard) => guarded
                    .entry(guard.test_source.as_str())
                    .or_default()
                    .push(line),
                None if statement.is_future() => future.push(line),
                None => plain.push(line),
            }
        }

        let indent = self.stylist.indentation().as_str();
        let mut lines = future;
        lines.extend(plain);
        for (test, guarded_lines) in guarded {
            let mut block = format!("if {test}:");
            for line in guarded_lines {
                block.push_str(self.eol());
                block.push_str(indent);
                block.push_str(&line);
            }
            lines.push(block);
        }
        lines
    }

    fn render_import(&self, statement: &ImportStatement, aliases: &[usize]) -> Option<String> {
        let complete = aliases.len() == statement.bindings.len();
        if complete && statement.level == 0 && statement.type_checking.is_none() {
            return Some(self.module.source()[statement.range].to_string());
        }
        ast_builder::narrowed_import(&statement.stmt, aliases, 1).map(|stmt| self.generate(&stmt))
    }

    /// The unit's statements in source order, with each remaining sibling import written
    /// before the statement it is anchored to or after the last one
    fn render_body(
        &self,
        unit: &OutputUnit,
        anchored: &FxIndexMap<Option<StmtIndex>, Vec<String>>,
    ) -> String {
        let mut out = String::new();
        let mut previous: Option<StmtIndex> = None;
        for &index in &unit.statements {
            if let Some(previous) = previous {
                let blank_lines = if unit.kind == UnitKind::Entry {
                    1
                } else {
                    self.blank_lines_between(previous, index)
                };
                let separator = self.eol().repeat(blank_lines + 1);
                out.push_str(&separator);
                if let Some(lines) = anchored.get(&Some(index)) {
                    out.push_str(&lines.join(self.eol()));
                    out.push_str(&separator);
                }
            }
            if unit.kind == UnitKind::Entry {
                out.push_str(&self.entry_text(index));
            } else {
                out.push_str(&self.statement_text(index));
            }
            previous = Some(index);
        }

        let Some(last) = previous else {
            return out;
        };
        out.push_str(self.eol());
        if let Some(lines) = anchored.get(&None) {
            let blank_lines = if self.module.kind(last).is_definition() { 2 } else { 1 };
            out.push_str(&self.eol().repeat(blank_lines));
            out.push_str(&self.join_lines(lines));
        }
        out
    }

    /// An entry guard with its body moved to module level when that keeps every line
    /// intact, verbatim otherwise
    fn entry_text(&self, index: StmtIndex) -> String {
        let Stmt::If(stmt_if) = self.module.stmt(index) else {
            return self.statement_text(index);
        };
        match self.unwrapped_guard_body(stmt_if) {
            Some(body) => self.leading_comments(index) + &body,
            None => {
                debug!(
                    "Keeping the entry guard on line {} verbatim",
                    self.module.line_of(index)
                );
                self.statement_text(index)
            }
        }
    }

    fn unwrapped_guard_body(&self, stmt_if: &StmtIf) -> Option<String> {
        let source = self.module.source();
        let first = stmt_if.body.first()?;
        let header_end = line_end(source, stmt_if.test.end());

        // `if __name__ == "__main__": main()`
        if first.start() < header_end {
            let text = &source[TextRange::new(first.start(), stmt_if.end())];
            return (!text.contains('\n')).then(|| text.to_string());
        }

        let body_start = next_line_start(source, header_end);
        let body_end = line_end(source, stmt_if.end());
        let body_range = TextRange::new(body_start, body_end);
        let spans_lines = self
            .module
            .parsed()
            .tokens()
            .iter()
            .filter(|token| body_range.contains_range(token.range()))
            .filter(|token| {
                !matches!(
                    token.kind(),
                    TokenKind::Newline | TokenKind::NonLogicalNewline
                )
            })
            .any(|token| source[token.range()].contains('\n'));
        if spans_lines {
            return None;
        }

        let body = &source[body_range];
        let indent: String = body
            .lines()
            .find(|line| !line.trim().is_empty())?
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();
        let mut dedented = Vec::new();
        for line in body.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                dedented.push("");
            } else {
                dedented.push(line.strip_prefix(indent.as_str())?);
            }
        }
        Some(dedented.join(self.eol()))
    }

    /// Source text of a top-level statement with its leading and trailing comments
    fn statement_text(&self, index: StmtIndex) -> String {
        let source = self.module.source();
        let stmt = self.module.stmt(index);
        let mut text = self.leading_comments(index);
        text.push_str(&source[stmt.range()]);

        let rest_of_line = &source[TextRange::new(stmt.end(), line_end(source, stmt.end()))];
        if rest_of_line.trim_start().starts_with('#') {
            text.push_str(rest_of_line.trim_end());
        }
        text
    }

    /// Unindented comment lines between the previous statement and this one
    fn leading_comments(&self, index: StmtIndex) -> String {
        let source = self.module.source();
        let start = self.module.stmt(index).start();
        let lower = match index.checked_sub(1) {
            Some(previous) => {
                next_line_start(source, line_end(source, self.module.stmt(previous).end()))
            }
            None => self.header_end,
        };
        if lower >= start {
            return String::new();
        }

        let mut comments = String::new();
        for line in source[TextRange::new(lower, start)].lines() {
            if line.starts_with('#') && !is_pragma_line(line) {
                comments.push_str(line.trim_end());
                comments.push_str(self.eol());
            }
        }
        comments
    }

    fn blank_lines_between(&self, previous: StmtIndex, next: StmtIndex) -> usize {
        if self.module.kind(previous).is_definition() || self.module.kind(next).is_definition() {
            return 2;
        }
        if next == previous + 1 {
            let gap = TextRange::new(
                self.module.stmt(previous).end(),
                self.module.stmt(next).start(),
            );
            let had_blank_line = self.module.source()[gap]
                .lines()
                .skip(1)
                .any(|line| line.trim().is_empty());
            return usize::from(had_blank_line);
        }
        1
    }

    fn join_lines(&self, lines: &[String]) -> String {
        let mut out = lines.join(self.eol());
        out.push_str(self.eol());
        out
    }

    /// Join sections that each end with a line ending
    fn join_sections(&self, sections: &[String], blank_lines: usize) -> String {
        sections.join(&self.eol().repeat(blank_lines))
    }
}

/// Offset of the line ending that terminates the line holding `offset`
fn line_end(source: &str, offset: TextSize) -> TextSize {
    let start = offset.to_usize().min(source.len());
    let end = source[start..]
        .find('\n')
        .map_or(source.len(), |newline| start + newline);
    let end = if end > start && source.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    };
    TextSize::try_from(end).unwrap_or(offset)
}

/// Offset of the line following the line ending at `line_end`
fn next_line_start(source: &str, line_end: TextSize) -> TextSize {
    let rest = &source[line_end.to_usize().min(source.len())..];
    let skip = if rest.starts_with("\r\n") {
        2
    } else {
        usize::from(rest.starts_with('\n'))
    };
    line_end + TextSize::try_from(skip).unwrap_or_default()
}

/// End of the comment block opening the file (shebang, license header)
fn header_comment_end(source: &str) -> TextSize {
    let mut end = 0;
    for line in source.split_inclusive('\n') {
        if !line.starts_with('#') || is_pragma_line(line) {
            break;
        }
        end += line.len();
    }
    TextSize::try_from(end).unwrap_or_default()
}
