#![allow(clippy::disallowed_methods)]

use std::{fs, path::Path};

use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use pysplit::{
    Config, SplitError, SplitWarning, Splitter, parser::SourceModule, partitioner::UnitKind,
};
use ruff_python_parser::parse_module;
use ruff_text_size::Ranged;
use tempfile::TempDir;

const EXAMPLE: &str = r#"import os

def foo():
    return os.getcwd()

def bar():
    return 1

if __name__ == "__main__":
    print(foo())
"#;

const INVENTORY: &str = r#""""Inventory helpers."""
from __future__ import annotations

import json
import logging
from dataclasses import dataclass, field

log = logging.getLogger(__name__)
DEFAULT_QUANTITY = 1


@dataclass
class Item:
    name: str
    quantity: int = DEFAULT_QUANTITY
    tags: list[str] = field(default_factory=list)


class Inventory:
    def __init__(self) -> None:
        self.items: dict[str, Item] = {}

    def add(self, item: Item) -> None:
        log.debug("adding %s", item.name)
        self.items[item.name] = item

    def dump(self) -> str:
        return json.dumps({name: item.quantity for name, item in self.items.items()})


def load(raw: str) -> Inventory:
    inventory = Inventory()
    for name, quantity in json.loads(raw).items():
        inventory.add(Item(name, quantity))
    return inventory


if __name__ == "__main__":
    import sys

    print(load(sys.stdin.read()).dump())
"#;

fn write_input(dir: &TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("write input");
    path
}

fn read(package: &Path, file: &str) -> String {
    fs::read_to_string(package.join(file)).unwrap_or_else(|err| panic!("read {file}: {err}"))
}

fn listing(package: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(package)
        .expect("read package dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

#[test]
fn test_example_split() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "tool.py", EXAMPLE);

    let splitter = Splitter::new(Config::default()).expect("valid config");
    let report = splitter.split_file(&input).expect("split succeeds");

    let package = temp_dir.path().join("tool");
    assert_eq!(report.package_dir, package);
    assert!(report.warnings.is_empty());
    assert_eq!(
        listing(&package),
        vec!["__init__.py", "__main__.py", "bar.py", "foo.py"]
    );

    assert_snapshot!(read(&package, "foo.py"), @r"
    import os


    def foo():
        return os.getcwd()
    ");
    assert_snapshot!(read(&package, "bar.py"), @r"
    def bar():
        return 1
    ");
    assert_snapshot!(read(&package, "__init__.py"), @r#"
    from .foo import foo
    from .bar import bar

    __all__ = ["foo", "bar"]
    "#);
    assert_snapshot!(read(&package, "__main__.py"), @r"
    from .foo import foo

    print(foo())
    ");

    // The input is left alone
    assert_eq!(fs::read_to_string(&input).expect("read input"), EXAMPLE);
}

#[test]
fn test_split_realistic_module() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "inventory.py", INVENTORY);

    let report = Splitter::new(Config::default())
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");
    let package = report.package_dir.clone();

    assert_eq!(
        listing(&package),
        vec![
            "Inventory.py",
            "Item.py",
            "__init__.py",
            "__main__.py",
            "_globals.py",
            "load.py"
        ]
    );
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    assert_snapshot!(read(&package, "_globals.py"), @r"
    from __future__ import annotations
    import logging

    log = logging.getLogger(__name__)
    DEFAULT_QUANTITY = 1
    ");
    assert_snapshot!(read(&package, "Item.py"), @r"
    from __future__ import annotations
    from dataclasses import dataclass, field
    from ._globals import DEFAULT_QUANTITY


    @dataclass
    class Item:
        name: str
        quantity: int = DEFAULT_QUANTITY
        tags: list[str] = field(default_factory=list)
    ");
    assert_snapshot!(read(&package, "Inventory.py"), @r#"
    from __future__ import annotations
    import json
    from .Item import Item
    from ._globals import log


    class Inventory:
        def __init__(self) -> None:
            self.items: dict[str, Item] = {}

        def add(self, item: Item) -> None:
            log.debug("adding %s", item.name)
            self.items[item.name] = item

        def dump(self) -> str:
            return json.dumps({name: item.quantity for name, item in self.items.items()})
    "#);
    assert_snapshot!(read(&package, "__main__.py"), @r"
    from __future__ import annotations
    from .load import load

    import sys

    print(load(sys.stdin.read()).dump())
    ");
    assert_snapshot!(read(&package, "__init__.py"), @r#"
    """Inventory helpers."""

    from __future__ import annotations
    from ._globals import log, DEFAULT_QUANTITY
    from .Item import Item
    from .Inventory import Inventory
    from .load import load

    __all__ = ["log", "DEFAULT_QUANTITY", "Item", "Inventory", "load"]
    "#);
}

#[test]
fn test_generated_files_are_valid_python() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "inventory.py", INVENTORY);

    let report = Splitter::new(Config::default())
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");

    for path in &report.files_written {
        let source = fs::read_to_string(path).expect("read generated file");
        assert!(
            parse_module(&source).is_ok(),
            "{} is not valid Python:\n{source}",
            path.display()
        );
    }
}

#[test]
fn test_every_statement_is_placed() {
    let splitter = Splitter::new(Config::default()).expect("valid config");
    let files = splitter
        .render_source(Path::new("inventory.py"), INVENTORY.to_string())
        .expect("renders");
    let combined: String = files.iter().map(|file| file.contents.as_str()).collect();

    let parsed = parse_module(INVENTORY).expect("valid source");
    for stmt in &parsed.syntax().body {
        if stmt.is_import_stmt() || stmt.is_import_from_stmt() || stmt.is_if_stmt() {
            continue;
        }
        let text = &INVENTORY[stmt.range()];
        let occurrences = combined.matches(text).count();
        assert_eq!(occurrences, 1, "statement placed {occurrences} times:\n{text}");
    }
}

/// Definition units of `source`, in plan order
fn definition_units(splitter: &Splitter, path: &str, source: &str) -> Vec<String> {
    let module = SourceModule::parse(Path::new(path), source.to_string()).expect("valid source");
    splitter
        .plan(&module)
        .units
        .into_iter()
        .filter(|unit| unit.kind == UnitKind::Definition)
        .map(|unit| unit.module_name)
        .collect()
}

#[test]
fn test_resplit_is_idempotent() {
    let splitter = Splitter::new(Config::default()).expect("valid config");
    let files = splitter
        .render_source(Path::new("inventory.py"), INVENTORY.to_string())
        .expect("renders");

    // Glue the units back into one module, dropping the imports between them
    let concatenated: String = files
        .iter()
        .filter(|file| !matches!(file.file_name.as_str(), "__init__.py" | "__main__.py"))
        .flat_map(|file| file.contents.lines())
        .filter(|line| !line.starts_with("from .") && !line.starts_with("from __future__"))
        .map(|line| format!("{line}\n"))
        .collect();

    let original = definition_units(&splitter, "inventory.py", INVENTORY);
    assert_eq!(original, vec!["Item", "Inventory", "load"]);
    assert_eq!(
        definition_units(&splitter, "inventory.py", &concatenated),
        original
    );
}

#[test]
fn test_resplit_replaces_package() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "inventory.py", INVENTORY);
    let splitter = Splitter::new(Config::default()).expect("valid config");

    let first = splitter.split_file(&input).expect("first split");
    let first_contents: Vec<String> = first
        .files_written
        .iter()
        .map(|path| fs::read_to_string(path).expect("read"))
        .collect();

    fs::write(first.package_dir.join("stale.py"), "# left over").expect("write stale file");
    let second = splitter.split_file(&input).expect("second split");
    let second_contents: Vec<String> = second
        .files_written
        .iter()
        .map(|path| fs::read_to_string(path).expect("read"))
        .collect();

    assert_eq!(first.files_written, second.files_written);
    assert_eq!(first_contents, second_contents);
    assert!(!second.package_dir.join("stale.py").exists());
}

#[test]
fn test_parse_error_writes_nothing() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "broken.py", "def broken(:\n    pass\n");

    let result = Splitter::new(Config::default())
        .expect("valid config")
        .split_file(&input);

    match result {
        Err(SplitError::Parse { path, line, .. }) => {
            assert_eq!(path, input);
            assert_eq!(line, 1);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert!(!temp_dir.path().join("broken").exists());
}

#[test]
fn test_missing_input_is_an_io_error() {
    let temp_dir = TempDir::new().expect("temp dir");
    let result = Splitter::new(Config::default())
        .expect("valid config")
        .split_file(&temp_dir.path().join("absent.py"));

    assert!(matches!(result, Err(SplitError::Io { action: "read", .. })));
}

#[test]
fn test_output_dir_setting() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(&temp_dir, "tool.py", EXAMPLE);
    let config = Config {
        output_dir: Some(temp_dir.path().join("build")),
        ..Config::default()
    };

    let report = Splitter::new(config)
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");

    assert_eq!(report.package_dir, temp_dir.path().join("build").join("tool"));
    assert!(report.package_dir.join("__init__.py").is_file());
}

#[test]
fn test_unresolved_names_reported() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = write_input(
        &temp_dir,
        "partial.py",
        "def run():\n    return helper() + 1\n",
    );

    let report = Splitter::new(Config::default())
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");

    assert_eq!(
        report.warnings,
        vec![SplitWarning::UnresolvedName {
            unit: "run".to_string(),
            name: "helper".to_string(),
        }]
    );

    let quiet = Config {
        warn_unresolved: false,
        ..Config::default()
    };
    let report = Splitter::new(quiet)
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");
    assert!(report.warnings.is_empty());
}

#[test]
fn test_star_imports_go_where_names_are_unresolved() {
    let splitter = Splitter::new(Config::default()).expect("valid config");
    let files = splitter
        .render_source(
            Path::new("shapes.py"),
            r"from geometry import *

def area(shape):
    return shape_area(shape)

def double(x):
    return 2 * x
"
            .to_string(),
        )
        .expect("renders");

    let file = |name: &str| {
        files
            .iter()
            .find(|file| file.file_name == name)
            .map(|file| file.contents.clone())
            .unwrap_or_default()
    };
    assert!(file("area.py").starts_with("from geometry import *\n"));
    assert!(!file("double.py").contains("import"));
}
