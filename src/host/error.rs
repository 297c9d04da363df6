//! Build, load and discovery errors

use crate::host::compiler::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that end a build-and-load attempt
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Pipeline directory {} does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("No step-definition sources (*.rs) found in {}", .0.display())]
    NoSources(PathBuf),

    #[error("Unable to find {} reference(s) for pipeline {pipeline}: {}", .paths.len(), join_paths(.paths))]
    ReferenceMissing { pipeline: String, paths: Vec<PathBuf> },

    #[error("Compilation of {pipeline} failed with {} error(s)", .diagnostics.len())]
    Compile {
        pipeline: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("No type implementing the Pipeline contract was found in {}", .0.display())]
    NoPipelineType(PathBuf),

    #[error("This pipeline contains more than one Pipeline type: {}, pipeline: {}", .types.join(", "), .pipeline.display())]
    MultiplePipelineTypes { pipeline: PathBuf, types: Vec<String> },

    #[error("Unable to load library '{library}' required for pipeline {pipeline}, please add a reference to '{manifest}' in the root of the pipeline")]
    DependencyResolution {
        library: String,
        pipeline: String,
        manifest: &'static str,
    },

    #[error("Failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("Failed to construct pipeline type {type_name}: {source}")]
    Construct {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Io {
            path: path.into(),
            source,
        }
    }
}
