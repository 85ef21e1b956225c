//! Runs a split from input file to written package

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ruff_python_stdlib::identifiers::is_identifier;

use crate::{
    config::Config,
    error::{Result, SplitError, SplitWarning},
    parser::SourceModule,
    partitioner::{PartitionOptions, Partitioner, SplitPlan},
    writer::{RenderedFile, render_plan, write_package},
};

/// Outcome of a successful split
#[derive(Debug)]
pub struct SplitReport {
    pub package_dir: PathBuf,
    /// Files written, initializer first
    pub files_written: Vec<PathBuf>,
    pub warnings: Vec<SplitWarning>,
    /// Number of unused import aliases left out of the package
    pub dropped_imports: usize,
}

/// Splits Python modules into packages
#[derive(Debug)]
pub struct Splitter {
    config: Config,
    options: PartitionOptions,
}

impl Splitter {
    /// Create a splitter, rejecting invalid settings
    pub fn new(config: Config) -> Result<Self> {
        let options = config.partition_options()?;
        Ok(Self { config, options })
    }

    /// Plan the split of a parsed module
    pub fn plan(&self, module: &SourceModule) -> SplitPlan {
        Partitioner::new(module, &self.options).plan()
    }

    /// Parse `source` and render the package it splits into, without touching the disk
    pub fn render_source(&self, path: &Path, source: String) -> Result<Vec<RenderedFile>> {
        let module = SourceModule::parse(path, source)?;
        let plan = self.plan(&module);
        Ok(render_plan(&module, &plan))
    }

    /// Directory the package for `input` is written to
    pub fn package_dir(&self, input: &Path) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                SplitError::InvalidInput(format!(
                    "cannot derive a package name from {}",
                    input.display()
                ))
            })?;
        if !is_identifier(stem) {
            warn!("Package name '{stem}' is not a valid Python identifier");
        }

        let parent = match &self.config.output_dir {
            Some(output_dir) => output_dir.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new("")),
        };
        Ok(parent.join(stem))
    }

    /// Split the file at `input` into a package directory
    ///
    /// An existing package directory is replaced. Nothing is written when the input fails
    /// to parse. A write failure part way through leaves the files written so far.
    pub fn split_file(&self, input: &Path) -> Result<SplitReport> {
        let package_dir = self.package_dir(input)?;
        let module = SourceModule::from_path(input)?;
        let plan = self.plan(&module);
        debug!(
            "Planned {} units for {}",
            plan.units.len(),
            input.display()
        );

        let files = render_plan(&module, &plan);
        let files_written = write_package(&files, &package_dir, input)?;
        info!(
            "Split {} into {} files in {}",
            input.display(),
            files_written.len(),
            package_dir.display()
        );
        for warning in &plan.warnings {
            warn!("{warning}");
        }

        Ok(SplitReport {
            package_dir,
            files_written,
            warnings: plan.warnings,
            dropped_imports: plan.dropped_imports.len(),
        })
    }
}
