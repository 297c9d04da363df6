//! Audit records of the command text each step last ran

use std::io;
use std::path::{Path, PathBuf};

/// Directory (under the pipeline directory) holding audit records
pub const LAST_RUN_DIR: &str = "LastRun";

/// Writes `LastRun/<step>.<ext>` files, one per step, overwritten every run
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Audit log for the pipeline rooted at `pipeline_dir`
    pub fn new(pipeline_dir: &Path) -> Self {
        Self {
            dir: pipeline_dir.join(LAST_RUN_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the audit record for a step. Path separators in the step
    /// name become `_`, so the record always lands directly in `LastRun/`.
    pub fn path_for(&self, step: &str, extension: &str) -> PathBuf {
        let file: String = step
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.{}", file, extension))
    }

    /// Persist `text` verbatim as the latest record for `step`
    pub fn record(&self, step: &str, extension: &str, text: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(step, extension);
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Read back the latest record for `step`
    pub fn read(&self, step: &str, extension: &str) -> io::Result<String> {
        std::fs::read_to_string(self.path_for(step, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creates_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(dir.path());
        assert!(!audit.dir().exists());

        let path = audit.record("load_users", "sql", "SELECT 1").unwrap();
        assert_eq!(path, dir.path().join("LastRun").join("load_users.sql"));
        assert_eq!(audit.read("load_users", "sql").unwrap(), "SELECT 1");

        audit.record("load_users", "sql", "SELECT 2\r\nGO\r\n").unwrap();
        assert_eq!(audit.read("load_users", "sql").unwrap(), "SELECT 2\r\nGO\r\n");
    }

    #[test]
    fn test_step_name_cannot_leave_last_run() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::new(&dir.path().join("nightly"));

        for step in ["../../escape", "/etc/cron", "..\\up", "reports/daily"] {
            let path = audit.record(step, "sql", "SELECT 1").unwrap();
            assert_eq!(path.parent().unwrap(), audit.dir(), "{}", step);
            assert_eq!(audit.read(step, "sql").unwrap(), "SELECT 1");
        }
        assert!(!dir.path().join("escape.sql").exists());
        assert_eq!(
            audit.path_for("../../escape", "sql"),
            audit.dir().join(".._.._escape.sql")
        );
    }
}
