#![allow(unsafe_code)]

use std::fs;

use pretty_assertions::assert_eq;
use pysplit::{
    Config, Splitter,
    config::{ENV_LEFTOVER_MODULE, ENV_OUTPUT_DIR, ENV_TARGET_VERSION},
};
use serial_test::serial;
use tempfile::TempDir;

struct EnvGuard(&'static [&'static str]);

impl EnvGuard {
    fn set(vars: &'static [&'static str], values: &[&str]) -> Self {
        for (key, value) in vars.iter().zip(values) {
            // SAFETY: tests touching the environment run serially
            unsafe { std::env::set_var(key, value) };
        }
        Self(vars)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            // SAFETY: tests touching the environment run serially
            unsafe { std::env::remove_var(key) };
        }
    }
}

#[test]
#[serial]
fn test_environment_overrides_project_config() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = temp_dir.path().join("app.py");
    fs::write(&input, "STATE = {}\n\ndef run():\n    return STATE\n").expect("write input");
    fs::write(
        temp_dir.path().join("pysplit.toml"),
        "leftover-module = \"_project\"\ntarget-version = \"py39\"\n",
    )
    .expect("write project config");
    let out_dir = temp_dir.path().join("out");
    let out_value = out_dir.to_string_lossy().into_owned();

    let _guard = EnvGuard::set(
        &[ENV_LEFTOVER_MODULE, ENV_OUTPUT_DIR],
        &["_state", out_value.as_str()],
    );
    let config = Config::load(&input, None).expect("config loads");

    assert_eq!(config.leftover_module, "_state");
    assert_eq!(config.target_version, "py39");
    assert_eq!(config.output_dir.as_deref(), Some(out_dir.as_path()));

    let report = Splitter::new(config)
        .expect("valid config")
        .split_file(&input)
        .expect("split succeeds");
    assert_eq!(report.package_dir, out_dir.join("app"));
    assert!(report.package_dir.join("_state.py").is_file());
    assert_eq!(
        fs::read_to_string(report.package_dir.join("run.py")).expect("read run.py"),
        "from ._state import STATE\n\n\ndef run():\n    return STATE\n"
    );
}

#[test]
#[serial]
fn test_invalid_target_version_from_environment() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = temp_dir.path().join("app.py");

    let _guard = EnvGuard::set(&[ENV_TARGET_VERSION], &["py2"]);
    let config = Config::load(&input, None).expect("config loads");

    assert!(Splitter::new(config).is_err());
}

#[test]
#[serial]
fn test_empty_environment_values_are_ignored() {
    let temp_dir = TempDir::new().expect("temp dir");
    let input = temp_dir.path().join("app.py");

    let _guard = EnvGuard::set(&[ENV_LEFTOVER_MODULE], &[""]);
    let config = Config::load(&input, None).expect("config loads");

    assert_eq!(config.leftover_module, Config::default().leftover_module);
}
