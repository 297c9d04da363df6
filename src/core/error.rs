//! Step-level error types

use crate::data::DataError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving what a step needs to run
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Unable to find {step} in {pipeline}")]
    StepNotFound { step: String, pipeline: String },

    #[error("No settings loaded for pipeline {pipeline}, expecting: {}", .expected.display())]
    ConfigurationMissing { pipeline: String, expected: PathBuf },

    #[error("Connection '{connection}' is not defined in the settings for pipeline {pipeline}")]
    ConnectionNotFound { connection: String, pipeline: String },

    #[error("Failed to write audit record {}: {source}", .path.display())]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}
