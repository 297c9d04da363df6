//! Pipeline settings loaded from `settings.json`

use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::Result;

/// Name of the settings file in the root of a pipeline directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Top-level pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Named data connections available to steps
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
}

/// A named data connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    /// Name steps use to refer to this connection
    pub name: String,

    /// Driver-specific connection string, e.g. `sqlite://warehouse.db`
    #[serde(alias = "connectionString")]
    pub connection_string: String,
}

impl PipelineSettings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: PipelineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for connection in &self.connections {
            if connection.name.trim().is_empty() {
                anyhow::bail!("Connection with an empty name: {}", connection.connection_string);
            }
            if !seen.insert(connection.name.as_str()) {
                anyhow::bail!("Duplicate connection name: {}", connection.name);
            }
        }
        Ok(())
    }

    /// Look up a connection by name
    pub fn connection(&self, name: &str) -> Option<&ConnectionDefinition> {
        self.connections.iter().find(|c| c.name == name)
    }
}
