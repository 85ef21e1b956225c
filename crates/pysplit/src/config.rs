//! Configuration
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. the user configuration file (`<config dir>/pysplit/pysplit.toml`)
//! 3. the project configuration next to the input: `pysplit.toml`, or the
//!    `[tool.pysplit]` table of `pyproject.toml`
//! 4. a configuration file named on the command line
//! 5. `PYSPLIT_*` environment variables
//! 6. command line flags
//!
//! Every layer except the defaults is a [`ConfigOverrides`] that only sets the keys it
//! names.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    dirs::{CONFIG_FILE_NAME, user_config_file},
    error::{Result, SplitError},
    module_naming::{INIT_MODULE, MAIN_MODULE, sanitize_module_name},
    partitioner::PartitionOptions,
};

/// Environment variable overriding [`Config::output_dir`]
pub const ENV_OUTPUT_DIR: &str = "PYSPLIT_OUTPUT_DIR";
/// Environment variable overriding [`Config::target_version`]
pub const ENV_TARGET_VERSION: &str = "PYSPLIT_TARGET_VERSION";
/// Environment variable overriding [`Config::leftover_module`]
pub const ENV_LEFTOVER_MODULE: &str = "PYSPLIT_LEFTOVER_MODULE";

const PYPROJECT_FILE_NAME: &str = "pyproject.toml";

/// Resolved settings of a split run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Directory the package directory is created in; the input's directory when unset
    pub output_dir: Option<PathBuf>,
    /// Module name of the unit holding module-level code
    pub leftover_module: String,
    /// Whether `# pragma: newfile(...)` markers group code
    pub honor_pragmas: bool,
    /// Whether imports nothing reads are kept (in the leftover unit)
    pub keep_unused_imports: bool,
    /// Whether the initializer gets a generated `__all__` when the input declares none
    pub emit_all: bool,
    /// Python version the input targets, such as `py310`
    pub target_version: String,
    /// Whether unresolved names are reported
    pub warn_unresolved: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            leftover_module: "_globals".to_string(),
            honor_pragmas: true,
            keep_unused_imports: true,
            emit_all: true,
            target_version: "py310".to_string(),
            warn_unresolved: true,
        }
    }
}

/// One configuration layer; unset keys leave the layer below untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub leftover_module: Option<String>,
    pub honor_pragmas: Option<bool>,
    pub keep_unused_imports: Option<bool>,
    pub emit_all: Option<bool>,
    pub target_version: Option<String>,
    pub warn_unresolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PyProject {
    tool: Option<PyProjectTool>,
}

#[derive(Debug, Deserialize)]
struct PyProjectTool {
    pysplit: Option<ConfigOverrides>,
}

impl ConfigOverrides {
    /// Read a `pysplit.toml` file
    ///
    /// A relative `output-dir` is taken relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(SplitError::io("read", path))?;
        let overrides: Self = toml::from_str(&contents).map_err(|err| SplitError::Config {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        })?;
        Ok(overrides.anchored_at(path))
    }

    /// Read the `[tool.pysplit]` table of a `pyproject.toml`, if there is one
    pub fn from_pyproject(path: &Path) -> Result<Option<Self>> {
        let contents = fs::read_to_string(path).map_err(SplitError::io("read", path))?;
        let pyproject: PyProject = toml::from_str(&contents).map_err(|err| SplitError::Config {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        })?;
        Ok(pyproject
            .tool
            .and_then(|tool| tool.pysplit)
            .map(|overrides| overrides.anchored_at(path)))
    }

    /// Collect overrides from environment variables, read through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            output_dir: non_empty(ENV_OUTPUT_DIR).map(PathBuf::from),
            leftover_module: non_empty(ENV_LEFTOVER_MODULE),
            target_version: non_empty(ENV_TARGET_VERSION),
            ..Self::default()
        }
    }

    fn anchored_at(mut self, file: &Path) -> Self {
        if let Some(parent) = file.parent() {
            self.output_dir = self.output_dir.map(|dir| {
                if dir.is_relative() {
                    parent.join(dir)
                } else {
                    dir
                }
            });
        }
        self
    }
}

impl Config {
    /// Load the configuration for splitting `input`
    ///
    /// `explicit` is a configuration file named by the user and must exist. Environment
    /// variables are read from the process environment.
    pub fn load(input: &Path, explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_env(input, explicit, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with environment variables read through `lookup`
    pub fn load_with_env(
        input: &Path,
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_file) = user_config_file().filter(|file| file.is_file()) {
            debug!("Loading user configuration from {}", user_file.display());
            config.apply(ConfigOverrides::from_file(&user_file)?);
        }

        if let Some(project) = Self::project_overrides(input)? {
            config.apply(project);
        }

        if let Some(explicit) = explicit {
            if !explicit.is_file() {
                return Err(SplitError::Config {
                    path: explicit.to_path_buf(),
                    message: "configuration file does not exist".to_string(),
                });
            }
            debug!("Loading configuration from {}", explicit.display());
            config.apply(ConfigOverrides::from_file(explicit)?);
        }

        config.apply(ConfigOverrides::from_env(lookup));
        Ok(config)
    }

    /// `pysplit.toml` next to the input, else `[tool.pysplit]` in `pyproject.toml`
    fn project_overrides(input: &Path) -> Result<Option<ConfigOverrides>> {
        let Some(dir) = input.parent() else {
            return Ok(None);
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };

        let project_file = dir.join(CONFIG_FILE_NAME);
        if project_file.is_file() {
            debug!("Loading project configuration from {}", project_file.display());
            return ConfigOverrides::from_file(&project_file).map(Some);
        }
        let pyproject = dir.join(PYPROJECT_FILE_NAME);
        if pyproject.is_file() {
            debug!("Checking {} for [tool.pysplit]", pyproject.display());
            return ConfigOverrides::from_pyproject(&pyproject);
        }
        Ok(None)
    }

    /// Apply the keys `overrides` sets
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            output_dir,
            leftover_module,
            honor_pragmas,
            keep_unused_imports,
            emit_all,
            target_version,
            warn_unresolved,
        } = overrides;

        if output_dir.is_some() {
            self.output_dir = output_dir;
        }
        if let Some(leftover_module) = leftover_module {
            self.leftover_module = leftover_module;
        }
        if let Some(honor_pragmas) = honor_pragmas {
            self.honor_pragmas = honor_pragmas;
        }
        if let Some(keep_unused_imports) = keep_unused_imports {
            self.keep_unused_imports = keep_unused_imports;
        }
        if let Some(emit_all) = emit_all {
            self.emit_all = emit_all;
        }
        if let Some(target_version) = target_version {
            self.target_version = target_version;
        }
        if let Some(warn_unresolved) = warn_unresolved {
            self.warn_unresolved = warn_unresolved;
        }
    }

    /// Minor version of Python 3 named by `target_version`
    ///
    /// Accepts `py310`, `py3.10`, `3.10` and `310`.
    pub fn python_minor(&self) -> Result<u8> {
        parse_python_minor(&self.target_version).ok_or_else(|| SplitError::Config {
            path: PathBuf::from("target-version"),
            message: format!(
                "unsupported target version '{}', expected a Python 3 version such as py310",
                self.target_version
            ),
        })
    }

    /// Check the settings and turn them into partitioning options
    pub fn partition_options(&self) -> Result<PartitionOptions> {
        let leftover_module = sanitize_module_name(&self.leftover_module);
        if leftover_module != self.leftover_module
            || leftover_module == INIT_MODULE
            || leftover_module == MAIN_MODULE
        {
            return Err(SplitError::Config {
                path: PathBuf::from("leftover-module"),
                message: format!(
                    "'{}' cannot be used as the leftover module name",
                    self.leftover_module
                ),
            });
        }

        Ok(PartitionOptions {
            leftover_module,
            honor_pragmas: self.honor_pragmas,
            keep_unused_imports: self.keep_unused_imports,
            emit_all: self.emit_all,
            warn_unresolved: self.warn_unresolved,
            python_minor: self.python_minor()?,
        })
    }
}

fn parse_python_minor(version: &str) -> Option<u8> {
    let version = version.trim();
    let version = version.strip_prefix("py").unwrap_or(version);
    let minor = match version.split_once('.') {
        Some(("3", minor)) => minor,
        Some(_) => return None,
        None => version.strip_prefix('3')?,
    };
    if minor.is_empty() || !minor.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    minor.parse().ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_python_minor() {
        assert_eq!(parse_python_minor("py310"), Some(10));
        assert_eq!(parse_python_minor("py38"), Some(8));
        assert_eq!(parse_python_minor("py3.12"), Some(12));
        assert_eq!(parse_python_minor("3.9"), Some(9));
        assert_eq!(parse_python_minor("313"), Some(13));

        assert_eq!(parse_python_minor("py27"), None);
        assert_eq!(parse_python_minor("2.7"), None);
        assert_eq!(parse_python_minor("py3"), None);
        assert_eq!(parse_python_minor("latest"), None);
    }

    #[test]
    fn test_overrides_only_touch_named_keys() {
        let mut config = Config::default();
        config.apply(ConfigOverrides {
            emit_all: Some(false),
            ..ConfigOverrides::default()
        });

        assert_eq!(
            config,
            Config {
                emit_all: false,
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_project_file_and_env_layering() {
        let temp_dir = TempDir::new().expect("temp dir");
        let input = temp_dir.path().join("module.py");
        fs::write(&input, "x = 1\n").expect("write input");
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "leftover-module = \"_state\"\ntarget-version = \"py38\"\noutput-dir = \"out\"\n",
        )
        .expect("write project config");

        let config = Config::load_with_env(&input, None, |key| {
            (key == ENV_TARGET_VERSION).then(|| "py312".to_string())
        })
        .expect("config loads");

        assert_eq!(config.leftover_module, "_state");
        assert_eq!(config.target_version, "py312");
        assert_eq!(config.output_dir, Some(temp_dir.path().join("out")));
    }

    #[test]
    fn test_pyproject_tool_table() {
        let temp_dir = TempDir::new().expect("temp dir");
        let input = temp_dir.path().join("module.py");
        fs::write(
            temp_dir.path().join(PYPROJECT_FILE_NAME),
            "[project]\nname = \"demo\"\n\n[tool.pysplit]\nhonor-pragmas = false\n",
        )
        .expect("write pyproject");

        let config = Config::load_with_env(&input, None, no_env).expect("config loads");

        assert!(!config.honor_pragmas);
        assert!(config.keep_unused_imports);
    }

    #[test]
    fn test_pyproject_without_tool_table_is_ignored() {
        let temp_dir = TempDir::new().expect("temp dir");
        let input = temp_dir.path().join("module.py");
        fs::write(
            temp_dir.path().join(PYPROJECT_FILE_NAME),
            "[project]\nname = \"demo\"\n",
        )
        .expect("write pyproject");

        let config = Config::load_with_env(&input, None, no_env).expect("config loads");

        assert_eq!(config.honor_pragmas, Config::default().honor_pragmas);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp_dir = TempDir::new().expect("temp dir");
        let input = temp_dir.path().join("module.py");
        let missing = temp_dir.path().join("missing.toml");

        let result = Config::load_with_env(&input, Some(&missing), no_env);

        assert!(matches!(result, Err(SplitError::Config { .. })));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().expect("temp dir");
        let file = temp_dir.path().join("custom.toml");
        fs::write(&file, "leftover = \"_x\"\n").expect("write config");

        let result = ConfigOverrides::from_file(&file);

        assert!(matches!(result, Err(SplitError::Config { path, .. }) if path == file));
    }

    #[test]
    fn test_partition_options_validation() {
        let options = Config::default()
            .partition_options()
            .expect("defaults are valid");
        assert_eq!(options, PartitionOptions::default());

        for leftover_module in ["__main__", "my-globals", "class"] {
            let config = Config {
                leftover_module: leftover_module.to_string(),
                ..Config::default()
            };
            assert!(
                config.partition_options().is_err(),
                "{leftover_module} should be rejected"
            );
        }

        let config = Config {
            target_version: "py27".to_string(),
            ..Config::default()
        };
        assert!(config.partition_options().is_err());
    }
}
