//! Reference resolver: the base libraries plus the pipeline's manifest

use crate::host::config::{HostConfig, ENGINE_CRATE_NAME};
use crate::host::directory::PipelineDirectory;
use crate::host::HostError;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Something the compiler needs to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A crate made available under `crate_name`
    Extern { crate_name: String, path: PathBuf },
    /// A directory searched for the dependencies of extern crates
    SearchDir(PathBuf),
    /// An external shared library listed in the manifest
    Library(PathBuf),
}

impl Reference {
    pub fn path(&self) -> &Path {
        match self {
            Reference::Extern { path, .. } => path,
            Reference::SearchDir(path) => path,
            Reference::Library(path) => path,
        }
    }
}

/// The full, de-duplicated reference list for one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReferences {
    pub references: Vec<Reference>,
}

impl ResolvedReferences {
    /// Manifest libraries, in manifest order
    pub fn libraries(&self) -> Vec<PathBuf> {
        self.references
            .iter()
            .filter_map(|r| match r {
                Reference::Library(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every referenced path that is absent from disk
    pub fn missing(&self) -> Vec<PathBuf> {
        self.references
            .iter()
            .map(Reference::path)
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }

    fn push(&mut self, reference: Reference) {
        if !self.references.iter().any(|r| r.path() == reference.path()) {
            self.references.push(reference);
        }
    }
}

/// Library paths listed in manifest text: trimmed, blank lines and lines
/// without the platform library suffix dropped, order kept, duplicates removed
pub fn parse_manifest(content: &str) -> Vec<PathBuf> {
    let mut libraries: Vec<PathBuf> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || !line.ends_with(std::env::consts::DLL_SUFFIX) {
            continue;
        }
        let path = PathBuf::from(line);
        if !libraries.contains(&path) {
            libraries.push(path);
        }
    }
    libraries
}

/// External libraries declared by the pipeline's manifest, if it has one
pub fn explicit_libraries(dir: &PipelineDirectory) -> Result<Vec<PathBuf>, HostError> {
    match dir.manifest_path() {
        Some(manifest) => {
            let content =
                std::fs::read_to_string(&manifest).map_err(|e| HostError::io(&manifest, e))?;
            Ok(parse_manifest(&content))
        }
        None => Ok(Vec::new()),
    }
}

/// Assemble the base references and the manifest libraries, failing with
/// every missing path before any compiler runs
pub fn resolve_references(
    dir: &PipelineDirectory,
    config: &HostConfig,
) -> Result<ResolvedReferences, HostError> {
    let mut resolved = ResolvedReferences::default();

    resolved.push(Reference::Extern {
        crate_name: ENGINE_CRATE_NAME.to_string(),
        path: config.engine_library.clone(),
    });
    for dep_dir in &config.dependency_dirs {
        resolved.push(Reference::SearchDir(dep_dir.clone()));
    }
    for library in explicit_libraries(dir)? {
        resolved.push(Reference::Library(library));
    }

    let missing = resolved.missing();
    if !missing.is_empty() {
        for path in &missing {
            error!(
                pipeline = dir.name(),
                "Unable to load reference '{}' in Pipeline: {}",
                path.display(),
                dir.path().display()
            );
        }
        return Err(HostError::ReferenceMissing {
            pipeline: dir.name().to_string(),
            paths: missing,
        });
    }

    info!(pipeline = dir.name(), "Loading references:");
    for reference in &resolved.references {
        info!("\t{}", reference.path().display());
    }

    Ok(resolved)
}
