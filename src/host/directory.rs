//! Pipeline directory layout and source discovery

use crate::core::pipeline::pipeline_name;
use crate::host::HostError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extension of step-definition source files
pub const SOURCE_EXTENSION: &str = "rs";

/// Manifest listing external libraries, one path per line
pub const MANIFEST_FILE: &str = "libraries.txt";

/// Older manifest name, read when `libraries.txt` is absent
pub const LEGACY_MANIFEST_FILE: &str = "assemblies.txt";

/// Scratch directory the compiler writes its generated crate into
pub const BUILD_DIR: &str = ".build";

/// A step-definition source read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub file_name: String,
    pub contents: String,
}

/// A directory holding one pipeline's sources, manifest and settings
#[derive(Debug, Clone)]
pub struct PipelineDirectory {
    path: PathBuf,
    name: String,
}

impl PipelineDirectory {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(HostError::NotADirectory(path));
        }
        let name = pipeline_name(&path);
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name of the pipeline, also the artifact's base name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deterministic location of the built unit: `<dir>/<name>.<dll ext>`
    pub fn artifact_path(&self) -> PathBuf {
        self.path
            .join(format!("{}.{}", self.name, std::env::consts::DLL_EXTENSION))
    }

    pub fn build_dir(&self) -> PathBuf {
        self.path.join(BUILD_DIR)
    }

    /// The manifest file in use, if any
    pub fn manifest_path(&self) -> Option<PathBuf> {
        [MANIFEST_FILE, LEGACY_MANIFEST_FILE]
            .iter()
            .map(|name| self.path.join(name))
            .find(|p| p.is_file())
    }

    /// Top-level `*.rs` files, sorted by path
    pub fn sources(&self) -> Result<Vec<PathBuf>, HostError> {
        let entries = std::fs::read_dir(&self.path).map_err(|e| HostError::io(&self.path, e))?;

        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HostError::io(&self.path, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                sources.push(path);
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Read every source; an empty set is an error rather than an empty build
    pub fn read_sources(&self) -> Result<Vec<SourceFile>, HostError> {
        let sources = self.sources()?;
        if sources.is_empty() {
            return Err(HostError::NoSources(self.path.clone()));
        }

        sources
            .iter()
            .map(|path| {
                let contents = std::fs::read_to_string(path).map_err(|e| HostError::io(path, e))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(SourceFile {
                    file_name,
                    contents,
                })
            })
            .collect()
    }
}

/// Newest modification time among `files`; `None` when there are none
pub fn latest_modification(files: &[PathBuf]) -> Result<Option<SystemTime>, HostError> {
    let mut latest = None;
    for file in files {
        let modified = modified_time(file)?;
        if latest.map_or(true, |l| modified > l) {
            latest = Some(modified);
        }
    }
    Ok(latest)
}

pub(crate) fn modified_time(path: &Path) -> Result<SystemTime, HostError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| HostError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_are_top_level_rs_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("steps.rs"), "").unwrap();
        std::fs::write(dir.path().join("a_helpers.rs"), "").unwrap();
        std::fs::write(dir.path().join("settings.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("inner.rs"), "").unwrap();

        let pipeline = PipelineDirectory::new(dir.path()).unwrap();
        let names: Vec<_> = pipeline
            .sources()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_helpers.rs", "steps.rs"]);
    }

    #[test]
    fn test_no_sources_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineDirectory::new(dir.path()).unwrap();
        assert!(matches!(pipeline.read_sources(), Err(HostError::NoSources(_))));
    }

    #[test]
    fn test_artifact_path_uses_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nightly");
        std::fs::create_dir(&root).unwrap();

        let pipeline = PipelineDirectory::new(&root).unwrap();
        assert_eq!(pipeline.name(), "nightly");
        assert_eq!(
            pipeline.artifact_path(),
            root.join(format!("nightly.{}", std::env::consts::DLL_EXTENSION))
        );
    }

    #[test]
    fn test_manifest_falls_back_to_legacy_name() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PipelineDirectory::new(dir.path()).unwrap();
        assert!(pipeline.manifest_path().is_none());

        std::fs::write(dir.path().join(LEGACY_MANIFEST_FILE), "").unwrap();
        assert_eq!(pipeline.manifest_path(), Some(dir.path().join(LEGACY_MANIFEST_FILE)));

        std::fs::write(dir.path().join(MANIFEST_FILE), "").unwrap();
        assert_eq!(pipeline.manifest_path(), Some(dir.path().join(MANIFEST_FILE)));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineDirectory::new(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, HostError::NotADirectory(_)));
    }
}
