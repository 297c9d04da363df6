//! Test utility functions for pipeliner

#![allow(dead_code)]

use pipeliner::core::config::{ConnectionDefinition, PipelineSettings};
use pipeliner::data::{Connector, DataConnection, DataError, ResultSet, SqlValue};
use pipeliner::{Pipeline, PipelineBase, Step};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Connection name every test pipeline's settings define
pub const WAREHOUSE: &str = "warehouse";

/// Mock connector that records every submitted exec-unit
#[derive(Clone, Default)]
pub struct RecordingConnector {
    submitted: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any exec-unit containing `fragment`
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connector for RecordingConnector {
    fn open(&self, _definition: &ConnectionDefinition) -> Result<Box<dyn DataConnection>, DataError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingConnection {
            submitted: self.submitted.clone(),
            fail_on: self.fail_on.clone(),
            closed: self.closed.clone(),
        }))
    }
}

struct RecordingConnection {
    submitted: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl DataConnection for RecordingConnection {
    fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> Result<u64, DataError> {
        self.submitted.lock().unwrap().push(sql.to_string());
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(DataError::Command(format!("rejected: {}", sql)))
            }
            _ => Ok(1),
        }
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, DataError> {
        self.execute(sql, params)?;
        Ok(ResultSet::default())
    }
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A pipeline whose steps are handed in by the test
pub struct ScriptedPipeline {
    base: PipelineBase,
    steps: Vec<Step>,
}

impl ScriptedPipeline {
    pub fn with_steps(path: &Path, steps: Vec<Step>) -> Self {
        Self {
            base: PipelineBase::new(path),
            steps,
        }
    }
}

impl Pipeline for ScriptedPipeline {
    fn new(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::with_steps(path, Vec::new()))
    }

    fn base(&self) -> &PipelineBase {
        &self.base
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// A step that bumps `counter` each time it runs and returns `succeed`
pub fn counting_step(name: &str, counter: &Arc<AtomicUsize>, succeed: bool) -> Step {
    let counter = counter.clone();
    Step::new(name, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(succeed)
    })
}

pub fn counters(n: usize) -> Vec<Arc<AtomicUsize>> {
    (0..n).map(|_| Arc::new(AtomicUsize::new(0))).collect()
}

pub fn counts(counters: &[Arc<AtomicUsize>]) -> Vec<usize> {
    counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
}

/// A pipeline directory named `name` with a `settings.json` defining the
/// warehouse connection
pub fn pipeline_dir(name: &str) -> (TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(name);
    std::fs::create_dir(&dir).unwrap();

    let settings = PipelineSettings {
        connections: vec![ConnectionDefinition {
            name: WAREHOUSE.to_string(),
            connection_string: "sqlite::memory:".to_string(),
        }],
    };
    std::fs::write(
        dir.join("settings.json"),
        serde_json::to_string_pretty(&settings).unwrap(),
    )
    .unwrap();

    (root, dir)
}

/// In-memory sink for a test's log output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a debug-level subscriber and return what it logged
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

/// Whether any single log line mentions every fragment
pub fn logged_together(logs: &str, fragments: &[&str]) -> bool {
    logs.lines().any(|line| fragments.iter().all(|f| line.contains(f)))
}
