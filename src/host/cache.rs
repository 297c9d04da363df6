//! Build cache gate: rebuild only when a source is newer than the artifact

use crate::host::directory::{latest_modification, modified_time, PipelineDirectory};
use crate::host::HostError;
use chrono::{DateTime, Local};
use std::time::SystemTime;
use tracing::debug;

/// Whether the cached artifact can be loaded as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    /// No artifact has been built yet
    Missing,
    /// The artifact is older than the newest source
    Stale {
        artifact: SystemTime,
        latest_source: SystemTime,
    },
    /// The artifact is at least as new as every source
    Fresh {
        artifact: SystemTime,
        latest_source: SystemTime,
    },
}

impl BuildDecision {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, BuildDecision::Fresh { .. })
    }
}

/// Compare the artifact against the newest source in `dir`
pub fn check(dir: &PipelineDirectory) -> Result<BuildDecision, HostError> {
    let sources = dir.sources()?;
    let latest_source =
        latest_modification(&sources)?.ok_or_else(|| HostError::NoSources(dir.path().to_path_buf()))?;

    let artifact_path = dir.artifact_path();
    if !artifact_path.is_file() {
        debug!(pipeline = dir.name(), "No build artifact at {}", artifact_path.display());
        return Ok(BuildDecision::Missing);
    }

    let artifact = modified_time(&artifact_path)?;
    debug!(
        pipeline = dir.name(),
        artifact = %DateTime::<Local>::from(artifact),
        latest_source = %DateTime::<Local>::from(latest_source),
        "Comparing build artifact with sources"
    );

    if artifact < latest_source {
        Ok(BuildDecision::Stale {
            artifact,
            latest_source,
        })
    } else {
        Ok(BuildDecision::Fresh {
            artifact,
            latest_source,
        })
    }
}

/// True when no artifact exists or it predates the newest source
pub fn needs_rebuild(dir: &PipelineDirectory) -> Result<bool, HostError> {
    Ok(check(dir)?.needs_rebuild())
}
