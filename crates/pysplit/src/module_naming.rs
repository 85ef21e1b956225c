//! Module names for generated files

use cow_utils::CowUtils;
use ruff_python_stdlib::{identifiers::is_identifier, keyword::is_keyword};
use rustc_hash::FxHashSet;

/// Package initializer module
pub const INIT_MODULE: &str = "__init__";
/// Module run by `python -m <package>`
pub const MAIN_MODULE: &str = "__main__";

/// Turn `name` into an importable module name
///
/// A trailing `.py` is dropped, characters that cannot appear in an identifier become
/// `_`, and names that would start with a digit or collide with a keyword get an extra
/// underscore.
pub fn sanitize_module_name(name: &str) -> String {
    let name = name.strip_suffix(".py").unwrap_or(name);
    if is_identifier(name) && !is_keyword(name) {
        return name.to_string();
    }

    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    if is_keyword(&sanitized) {
        sanitized.push('_');
    }
    sanitized
}

/// Hands out unique module names within one package
///
/// Uniqueness is case-insensitive so the package survives checkout on case-insensitive
/// filesystems.
#[derive(Debug, Default)]
pub struct UnitNamer {
    taken: FxHashSet<String>,
}

impl UnitNamer {
    /// Create a namer with `reserved` names already taken
    pub fn new<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        let mut namer = Self::default();
        for name in reserved {
            namer.taken.insert(name.cow_to_lowercase().into_owned());
        }
        namer
    }

    /// Claim a module name derived from `desired`
    pub fn claim(&mut self, desired: &str) -> String {
        let base = sanitize_module_name(desired);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(candidate.cow_to_lowercase().into_owned()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_module_name() {
        assert_eq!(sanitize_module_name("foo"), "foo");
        assert_eq!(sanitize_module_name("database.py"), "database");
        assert_eq!(sanitize_module_name("math-operations.py"), "math_operations");
        assert_eq!(sanitize_module_name("2fa"), "_2fa");
        assert_eq!(sanitize_module_name("class"), "class_");
        assert_eq!(sanitize_module_name(""), "_");
    }

    #[test]
    fn test_unit_namer_disambiguates() {
        let mut namer = UnitNamer::new([INIT_MODULE, MAIN_MODULE, "_globals"]);
        assert_eq!(namer.claim("Parser"), "Parser");
        assert_eq!(namer.claim("parser"), "parser_2");
        assert_eq!(namer.claim("__main__"), "__main___2");
        assert_eq!(namer.claim("_globals"), "_globals_2");
        assert_eq!(namer.claim("parser"), "parser_3");
    }
}
