//! Command-line interface

pub mod output;
pub mod selector;

use crate::host::HostConfig;
use clap::Parser;
use selector::StepSelector;
use std::ffi::OsString;
use std::path::PathBuf;

/// Build a pipeline directory and run its steps
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeliner")]
#[command(version = "0.1.0")]
#[command(about = "Builds a pipeline directory and runs its steps", long_about = None)]
pub struct Cli {
    /// Pipeline directory (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the rustc executable
    #[arg(long)]
    pub rustc: Option<PathBuf>,

    /// Path to the engine library pipelines compile against
    #[arg(long)]
    pub engine_lib: Option<PathBuf>,

    /// Directory holding the engine's compiled dependencies (repeatable)
    #[arg(long = "deps-dir")]
    pub deps_dir: Vec<PathBuf>,

    /// Step to run: `N` for one step, `N*` for N and every later step
    #[arg(short, long)]
    pub step: Option<StepSelector>,

    /// List the steps and exit
    #[arg(short, long)]
    pub list: bool,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// The pipeline directory to build
    pub fn pipeline_path(&self) -> std::io::Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir(),
        }
    }

    /// Host configuration from the environment, overridden by flags
    pub fn host_config(&self) -> HostConfig {
        let mut config = HostConfig::from_env();
        if let Some(rustc) = &self.rustc {
            config = config.with_rustc(rustc);
        }
        if let Some(lib) = &self.engine_lib {
            config = config.with_engine_library(lib);
        }
        if !self.deps_dir.is_empty() {
            config = config.with_dependency_dirs(self.deps_dir.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["pipeliner"]).unwrap();
        assert!(cli.path.is_none());
        assert!(cli.step.is_none());
        assert!(!cli.list);
        assert!(cli.pipeline_path().is_ok());
    }

    #[test]
    fn test_parse_step_and_overrides() {
        let cli = Cli::try_parse_from([
            "pipeliner",
            "/pipelines/nightly",
            "--step",
            "2*",
            "--engine-lib",
            "/opt/pipeliner/libpipeliner.rlib",
            "--deps-dir",
            "/opt/pipeliner/deps",
            "--deps-dir",
            "/opt/extra",
        ])
        .unwrap();

        assert_eq!(cli.path, Some(PathBuf::from("/pipelines/nightly")));
        assert_eq!(cli.step, Some(StepSelector { index: 2, to_end: true }));

        let config = cli.host_config();
        assert_eq!(
            config.engine_library,
            PathBuf::from("/opt/pipeliner/libpipeliner.rlib")
        );
        assert_eq!(config.dependency_dirs.len(), 2);
    }

    #[test]
    fn test_gibberish_step_rejected() {
        assert!(Cli::try_parse_from(["pipeliner", "--step", "soon"]).is_err());
    }
}
