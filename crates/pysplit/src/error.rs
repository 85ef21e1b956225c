//! Error and warning types shared by every stage of a split
//!
//! Fatal conditions are [`SplitError`] values and abort the run. Conditions that static
//! analysis of a dynamic language cannot settle are [`SplitWarning`] values; they are
//! collected on the plan and reported after the files have been written.

use std::{
    fmt,
    io,
    path::{Path, PathBuf},
};

/// Fatal failure of a split run
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// The input is not valid Python
    #[error("failed to parse {}:{line}:{column}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Reading the input or writing the package failed
    #[error("failed to {action} {}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configuration file or override could not be used
    #[error("invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// The input path cannot be split into a package
    #[error("{0}")]
    InvalidInput(String),
}

impl SplitError {
    /// Build a mapper turning an [`io::Error`] into [`SplitError::Io`] for `path`
    pub fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = SplitError> = std::result::Result<T, E>;

/// Non-fatal finding produced while planning a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitWarning {
    /// A free name matched no import, definition, module-level binding or builtin
    UnresolvedName { unit: String, name: String },
    /// Generated units import each other at module level
    ImportCycle { units: Vec<String> },
    /// An entry guard carries `elif`/`else` branches and stays with module-level code
    EntryGuardNotRelocated { line: usize },
    /// A function declares `global` a name bound in another unit; its assignments only
    /// rebind the copy imported into its own unit
    GlobalRebinding { unit: String, name: String },
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedName { unit, name } => {
                write!(f, "unresolved name '{name}' in unit '{unit}'")
            }
            Self::ImportCycle { units } => {
                write!(f, "circular import between units: {}", units.join(" -> "))
            }
            Self::EntryGuardNotRelocated { line } => write!(
                f,
                "entry guard on line {line} has elif/else branches and was kept with \
                 module-level code"
            ),
            Self::GlobalRebinding { unit, name } => write!(
                f,
                "unit '{unit}' declares '{name}' global but the name is bound in another unit; \
                 its assignments will not be seen there"
            ),
        }
    }
}
