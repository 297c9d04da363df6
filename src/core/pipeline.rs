//! The Pipeline contract and the shared state every pipeline carries

use crate::core::{
    audit::AuditLog,
    config::{ConnectionDefinition, PipelineSettings, SETTINGS_FILE},
    error::StepError,
    step::Step,
};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::error;

/// Qualified name of the Pipeline contract. Unit types declaring this as
/// their immediate base are pipeline candidates.
pub const PIPELINE_CONTRACT: &str = "pipeliner::Pipeline";

/// Directory (under the pipeline directory) holding SQL step files
pub const SQL_DIR: &str = "Sql";

/// The contract a type inside a built unit satisfies to be runnable
pub trait Pipeline: Send + 'static {
    /// Construct the pipeline rooted at `path`
    fn new(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Name, location and settings of the pipeline
    fn base(&self) -> &PipelineBase;

    /// Ordered steps; position is the step index
    fn steps(&self) -> &[Step];

    fn name(&self) -> &str {
        self.base().name()
    }
}

/// Derive the display name of a pipeline from its directory
pub fn pipeline_name(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| resolved.display().to_string())
}

/// State shared by every pipeline: where it lives and what it connects to
#[derive(Debug, Clone)]
pub struct PipelineBase {
    name: String,
    path: PathBuf,
    settings: Option<PipelineSettings>,
}

impl PipelineBase {
    /// Create the base for the pipeline at `path`, loading `settings.json`.
    ///
    /// A missing or unreadable settings file is logged and leaves settings
    /// unset; steps that never touch a connection still run.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = pipeline_name(&path);
        let settings_path = path.join(SETTINGS_FILE);

        let settings = match PipelineSettings::from_file(&settings_path) {
            Ok(settings) => Some(settings),
            Err(e) => {
                error!(
                    pipeline = %name,
                    path = %settings_path.display(),
                    "Unable to find settings file for Pipeline: {}, expecting: {} ({})",
                    name,
                    settings_path.display(),
                    e
                );
                None
            }
        };

        Self {
            name,
            path,
            settings,
        }
    }

    /// Create a base with explicit settings, skipping `settings.json`
    pub fn with_settings(path: impl AsRef<Path>, settings: Option<PipelineSettings>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: pipeline_name(&path),
            path,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Option<&PipelineSettings> {
        self.settings.as_ref()
    }

    /// Shared workbook directory, two levels above the pipeline
    pub fn workbook_path(&self) -> PathBuf {
        self.path.join("..").join("..").join("Workbooks")
    }

    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(&self.path)
    }

    /// Resolve a connection by name from the loaded settings
    pub fn connection(&self, name: &str) -> Result<&ConnectionDefinition, StepError> {
        let settings = self.settings.as_ref().ok_or_else(|| StepError::ConfigurationMissing {
            pipeline: self.name.clone(),
            expected: self.path.join(SETTINGS_FILE),
        })?;

        settings
            .connection(name)
            .ok_or_else(|| StepError::ConnectionNotFound {
                connection: name.to_string(),
                pipeline: self.name.clone(),
            })
    }

    /// Build a SQL step from `Sql/<filename>`; the step is named after the
    /// file stem.
    pub fn sql_file_step(&self, connection: &str, filename: &str) -> anyhow::Result<Step> {
        let sql_path = self.path.join(SQL_DIR).join(filename);

        let loaded = (|| {
            let step_name = sql_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .context("SQL file has no name")?;
            let sql = std::fs::read_to_string(&sql_path)
                .with_context(|| format!("Failed to read {}", sql_path.display()))?;
            Ok::<_, anyhow::Error>((step_name, sql))
        })();

        match loaded {
            Ok((step_name, sql)) => Ok(Step::sql(step_name, connection, sql)),
            Err(e) => {
                error!(
                    pipeline = %self.name,
                    file = filename,
                    "sql_file_step failed: {:#}",
                    e
                );
                Err(e)
            }
        }
    }
}
