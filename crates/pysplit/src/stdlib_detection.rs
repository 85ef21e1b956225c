//! Standard library detection
//!
//! Decides whether an unused import can be dropped from the package without changing what
//! importing it does.

use ruff_python_stdlib::sys;

/// Check if a module name belongs to the Python standard library
///
/// Submodules are recognized through their top-level package (`os.path` through `os`).
/// `python_minor` is the minor version of Python 3 (10 for Python 3.10).
pub fn is_stdlib_module(module_name: &str, python_minor: u8) -> bool {
    // Not part of ruff's database
    if module_name == "__future__" {
        return true;
    }
    if sys::is_known_standard_library(python_minor, module_name) {
        return true;
    }
    module_name
        .split('.')
        .next()
        .is_some_and(|top_level| sys::is_known_standard_library(python_minor, top_level))
}

/// Check if importing a module is known to have no observable effect beyond binding it
pub fn is_stdlib_without_side_effects(module_name: &str, python_minor: u8) -> bool {
    if !is_stdlib_module(module_name, python_minor) {
        return false;
    }

    let top_level = module_name.split('.').next().unwrap_or(module_name);
    !matches!(
        top_level,
        // Print or open something on import
        "antigravity"
            | "this"
            | "__hello__"
            | "__phello__"
            | "webbrowser"
            // Rewrite sys.path and friends
            | "site"
            | "sitecustomize"
            | "usercustomize"
            // Touch terminal state
            | "readline"
            | "rlcompleter"
            // May initialize a display
            | "turtle"
            | "tkinter"
            // Global interpreter state
            | "locale"
            | "logging"
            | "warnings"
            | "encodings"
            | "faulthandler"
            | "tracemalloc"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_stdlib_module() {
        assert!(is_stdlib_module("__future__", 10));
        assert!(is_stdlib_module("os", 10));
        assert!(is_stdlib_module("json", 10));
        assert!(is_stdlib_module("os.path", 10));
        assert!(is_stdlib_module("collections.abc", 10));

        assert!(!is_stdlib_module("numpy", 10));
        assert!(!is_stdlib_module("requests", 10));
        assert!(!is_stdlib_module("my_module", 10));
    }

    #[test]
    fn test_version_specific_modules() {
        assert!(is_stdlib_module("tomllib", 11));
        assert!(!is_stdlib_module("tomllib", 10));
    }

    #[test]
    fn test_is_stdlib_without_side_effects() {
        assert!(is_stdlib_without_side_effects("os", 10));
        assert!(is_stdlib_without_side_effects("typing", 10));
        assert!(is_stdlib_without_side_effects("collections.abc", 10));

        assert!(!is_stdlib_without_side_effects("antigravity", 10));
        assert!(!is_stdlib_without_side_effects("logging", 10));
        assert!(!is_stdlib_without_side_effects("logging.config", 10));
        assert!(!is_stdlib_without_side_effects("requests", 10));
    }
}
