//! Parsing of the input file into classified top-level statements

use std::path::Path;

use log::debug;
use ruff_python_ast::{ModModule, Stmt};
use ruff_python_parser::{Parsed, parse_module};
use ruff_text_size::{Ranged, TextSize};

use crate::{
    analyzers::statement_categorizer::{StatementCategorizer, StatementKind, is_entry_guard_test},
    error::{Result, SplitError, SplitWarning},
    types::StmtIndex,
};

/// A parsed input file
///
/// Immutable once built. Statement indices handed out by [`SourceModule::statements`]
/// are stable and are how every later stage refers to a statement.
#[derive(Debug)]
pub struct SourceModule {
    source: String,
    parsed: Parsed<ModModule>,
    kinds: Vec<StatementKind>,
    warnings: Vec<SplitWarning>,
}

impl SourceModule {
    /// Read and parse the file at `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(SplitError::io("read", path))?;
        Self::parse(path, source)
    }

    /// Parse `source`, reporting errors against `path`
    pub fn parse(path: &Path, source: String) -> Result<Self> {
        let parsed = match parse_module(&source) {
            Ok(parsed) => parsed,
            Err(err) => {
                let (line, column) = line_column(&source, err.location.start());
                return Err(SplitError::Parse {
                    path: path.to_path_buf(),
                    line,
                    column,
                    message: err.error.to_string(),
                });
            }
        };

        let kinds = StatementCategorizer::new().categorize(&parsed.syntax().body);
        let mut warnings = Vec::new();
        for (stmt, kind) in parsed.syntax().body.iter().zip(&kinds) {
            if let (Stmt::If(stmt_if), StatementKind::Other) = (stmt, kind)
                && is_entry_guard_test(&stmt_if.test)
            {
                let (line, _) = line_column(&source, stmt.start());
                debug!("Entry guard on line {line} has elif/else branches, not relocating it");
                warnings.push(SplitWarning::EntryGuardNotRelocated { line });
            }
        }

        debug!(
            "Parsed {} with {} top-level statements",
            path.display(),
            kinds.len()
        );

        Ok(Self {
            source,
            parsed,
            kinds,
            warnings,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parsed(&self) -> &Parsed<ModModule> {
        &self.parsed
    }

    pub fn body(&self) -> &[Stmt] {
        &self.parsed.syntax().body
    }

    pub fn stmt(&self, index: StmtIndex) -> &Stmt {
        &self.body()[index]
    }

    pub fn kind(&self, index: StmtIndex) -> &StatementKind {
        &self.kinds[index]
    }

    /// All top-level statements with their index and kind, in source order
    pub fn statements(&self) -> impl Iterator<Item = (StmtIndex, &Stmt, &StatementKind)> {
        self.body()
            .iter()
            .zip(&self.kinds)
            .enumerate()
            .map(|(index, (stmt, kind))| (index, stmt, kind))
    }

    /// Warnings raised while classifying statements
    pub fn warnings(&self) -> &[SplitWarning] {
        &self.warnings
    }

    /// 1-based line of a statement's first character
    pub fn line_of(&self, index: StmtIndex) -> usize {
        line_column(&self.source, self.stmt(index).start()).0
    }
}

/// 1-based line and column (in characters) of `offset` in `source`
pub fn line_column(source: &str, offset: TextSize) -> (usize, usize) {
    let prefix = source.get(..offset.to_usize()).unwrap_or(source);
    let line = prefix.bytes().filter(|&byte| byte == b'\n').count() + 1;
    let line_start = prefix.rfind('\n').map_or(0, |newline| newline + 1);
    let column = prefix[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_parse_classifies_statements() {
        let module = SourceModule::parse(
            Path::new("sample.py"),
            "import os\n\ndef foo():\n    return os.getcwd()\n".to_string(),
        )
        .expect("valid source");

        let kinds: Vec<_> = module.statements().map(|(_, _, kind)| kind.clone()).collect();
        assert_eq!(kinds, vec![StatementKind::Import, StatementKind::FunctionDef]);
        assert_eq!(module.line_of(1), 3);
        assert!(module.warnings().is_empty());
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = SourceModule::parse(
            Path::new("broken.py"),
            "x = 1\ndef broken(:\n    pass\n".to_string(),
        )
        .expect_err("invalid source");

        match err {
            SplitError::Parse { path, line, .. } => {
                assert_eq!(path, PathBuf::from("broken.py"));
                assert_eq!(line, 2);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_guard_with_else_is_reported() {
        let module = SourceModule::parse(
            Path::new("guard.py"),
            "if __name__ == '__main__':\n    run()\nelse:\n    setup()\n".to_string(),
        )
        .expect("valid source");

        assert_eq!(module.kind(0), &StatementKind::Other);
        assert_eq!(
            module.warnings(),
            &[SplitWarning::EntryGuardNotRelocated { line: 1 }]
        );
    }

    #[test]
    fn test_line_column_counts_characters() {
        let source = "a = 'é'\nbb = 2\n";
        assert_eq!(line_column(source, TextSize::from(0)), (1, 1));
        assert_eq!(line_column(source, TextSize::from(11)), (2, 3));
    }
}
