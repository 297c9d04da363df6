//! Host configuration: where the compiler and the engine library live

use std::path::{Path, PathBuf};

/// File name of the engine library that pipelines compile against
pub const ENGINE_LIBRARY_FILE: &str = "libpipeliner.rlib";

/// Crate name pipeline sources use to reach the engine
pub const ENGINE_CRATE_NAME: &str = "pipeliner";

/// Configuration for building and loading pipelines
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Path to the rustc executable
    pub rustc: PathBuf,

    /// The engine's own rlib, holding the Pipeline contract
    pub engine_library: PathBuf,

    /// Directories holding the engine's compiled dependencies
    pub dependency_dirs: Vec<PathBuf>,

    /// Optimization level passed to the compiler
    pub opt_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            rustc: PathBuf::from("rustc"),
            engine_library: exe_dir.join(ENGINE_LIBRARY_FILE),
            dependency_dirs: vec![exe_dir.join("deps")],
            opt_level: "2".to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults, overridden by `PIPELINER_RUSTC`, `PIPELINER_ENGINE_LIB` and
    /// `PIPELINER_DEPS_DIR` (a path list) when set
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(rustc) = std::env::var_os("PIPELINER_RUSTC") {
            config.rustc = PathBuf::from(rustc);
        }
        if let Some(lib) = std::env::var_os("PIPELINER_ENGINE_LIB") {
            config.engine_library = PathBuf::from(lib);
        }
        if let Some(dirs) = std::env::var_os("PIPELINER_DEPS_DIR") {
            config.dependency_dirs = std::env::split_paths(&dirs).collect();
        }

        config
    }

    pub fn with_rustc(mut self, rustc: impl Into<PathBuf>) -> Self {
        self.rustc = rustc.into();
        self
    }

    pub fn with_engine_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_library = path.into();
        self
    }

    pub fn with_dependency_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.dependency_dirs = dirs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_builder() {
        let config = HostConfig::default()
            .with_rustc("/opt/rust/bin/rustc")
            .with_engine_library("/opt/pipeliner/libpipeliner.rlib")
            .with_dependency_dirs(vec![PathBuf::from("/opt/pipeliner/deps")]);

        assert_eq!(config.rustc, PathBuf::from("/opt/rust/bin/rustc"));
        assert_eq!(config.engine_library, PathBuf::from("/opt/pipeliner/libpipeliner.rlib"));
        assert_eq!(config.dependency_dirs.len(), 1);
        assert_eq!(config.opt_level, "2");
    }

    #[test]
    fn test_default_engine_library_next_to_executable() {
        let config = HostConfig::default();
        assert!(config.engine_library.ends_with(ENGINE_LIBRARY_FILE));
    }
}
