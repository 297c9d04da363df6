//! Compiler adapter: turns pipeline sources into a loadable unit

use crate::host::directory::SourceFile;
use crate::host::references::{Reference, ResolvedReferences};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Severity of a compiler diagnostic that fails the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    InternalCompilerError,
}

/// Where a diagnostic points in the pipeline's sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

/// A single build error reported by the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: None,
            level: DiagnosticLevel::Error,
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}:{}:{}: ", location.file, location.line, location.column)?;
        }
        match self.level {
            DiagnosticLevel::Error => write!(f, "error")?,
            DiagnosticLevel::InternalCompilerError => write!(f, "internal compiler error")?,
        }
        if let Some(code) = &self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Deserialize)]
struct RawDiagnostic {
    #[serde(rename = "$message_type", default)]
    message_type: Option<String>,
    message: String,
    level: String,
    #[serde(default)]
    code: Option<RawCode>,
    #[serde(default)]
    spans: Vec<RawSpan>,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RawSpan {
    file_name: String,
    line_start: usize,
    column_start: usize,
    #[serde(default)]
    is_primary: bool,
}

/// Build-failing diagnostics from rustc's `--error-format=json` stream.
/// Warnings, notes and the trailing "aborting" summary are skipped.
pub fn parse_diagnostics(stderr: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for line in stderr.lines().filter(|l| l.trim_start().starts_with('{')) {
        let raw: RawDiagnostic = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        if raw.message_type.as_deref().is_some_and(|t| t != "diagnostic") {
            continue;
        }

        let level = match raw.level.as_str() {
            "error" => DiagnosticLevel::Error,
            "error: internal compiler error" => DiagnosticLevel::InternalCompilerError,
            other => {
                debug!(level = other, "compiler: {}", raw.message);
                continue;
            }
        };
        if raw.message.starts_with("aborting due to") {
            continue;
        }

        let location = raw
            .spans
            .iter()
            .find(|s| s.is_primary)
            .or_else(|| raw.spans.first())
            .map(|s| SourceLocation {
                file: s.file_name.clone(),
                line: s.line_start,
                column: s.column_start,
            });

        diagnostics.push(Diagnostic {
            code: raw.code.map(|c| c.code),
            level,
            message: raw.message,
            location,
        });
    }

    diagnostics
}

/// Everything a compiler needs to produce one pipeline's unit
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub crate_name: String,
    pub sources: Vec<SourceFile>,
    pub references: ResolvedReferences,
    pub output: PathBuf,
    pub build_dir: PathBuf,
}

/// A successfully produced loadable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
}

pub trait Compiler {
    fn compile(&self, request: &CompileRequest) -> Result<BuildArtifact, Vec<Diagnostic>>;
}

/// Compiles pipeline sources into a cdylib with `rustc`
#[derive(Debug, Clone)]
pub struct RustcCompiler {
    rustc: PathBuf,
    opt_level: String,
}

impl RustcCompiler {
    pub fn new(rustc: impl Into<PathBuf>, opt_level: impl Into<String>) -> Self {
        Self {
            rustc: rustc.into(),
            opt_level: opt_level.into(),
        }
    }

    /// Copy the sources into the build directory and write a crate root
    /// declaring one module per source file
    fn write_crate(&self, request: &CompileRequest) -> std::io::Result<PathBuf> {
        let src_dir = request.build_dir.join("src");
        std::fs::create_dir_all(&src_dir)?;

        for source in &request.sources {
            std::fs::write(src_dir.join(&source.file_name), &source.contents)?;
        }

        let root = src_dir.join("__pipeline_root.rs");
        std::fs::write(&root, crate_root(&request.sources))?;
        Ok(root)
    }

    fn command(&self, request: &CompileRequest, root: &Path) -> Command {
        let mut cmd = Command::new(&self.rustc);
        cmd.arg(root)
            .args(["--crate-type", "cdylib"])
            .args(["--edition", "2021"])
            .arg("--error-format=json")
            .arg("--crate-name")
            .arg(sanitize_crate_name(&request.crate_name))
            .arg("-C")
            .arg(format!("opt-level={}", self.opt_level))
            .arg("-o")
            .arg(&request.output);

        for reference in &request.references.references {
            match reference {
                Reference::Extern { crate_name, path } => {
                    cmd.arg("--extern")
                        .arg(format!("{}={}", crate_name, path.display()));
                }
                Reference::SearchDir(dir) => {
                    cmd.arg("-L").arg(format!("dependency={}", dir.display()));
                }
                Reference::Library(path) => {
                    cmd.arg("-C").arg(format!("link-arg={}", path.display()));
                }
            }
        }

        cmd
    }
}

impl Default for RustcCompiler {
    fn default() -> Self {
        Self::new("rustc", "2")
    }
}

impl Compiler for RustcCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<BuildArtifact, Vec<Diagnostic>> {
        let root = self.write_crate(request).map_err(|e| {
            vec![Diagnostic::error(format!(
                "Failed to write build sources to {}: {}",
                request.build_dir.display(),
                e
            ))]
        })?;

        let mut cmd = self.command(request, &root);
        debug!("Running {:?}", cmd);
        info!(
            pipeline = %request.crate_name,
            sources = request.sources.len(),
            "Compiling pipeline"
        );

        let output = cmd.output().map_err(|e| {
            vec![Diagnostic::error(format!(
                "Failed to run compiler {}: {}",
                self.rustc.display(),
                e
            ))]
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            // Surface warnings at debug level
            parse_diagnostics(&stderr);
            return Ok(BuildArtifact {
                path: request.output.clone(),
            });
        }

        let mut diagnostics = parse_diagnostics(&stderr);
        if diagnostics.is_empty() {
            let message = stderr.trim();
            diagnostics.push(Diagnostic::error(if message.is_empty() {
                format!("Compiler exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }
        Err(diagnostics)
    }
}

/// Generated crate root: one `#[path]` module per source file
pub fn crate_root(sources: &[SourceFile]) -> String {
    let mut root = String::from("#![allow(dead_code)]\n\n");
    for source in sources {
        let stem = source
            .file_name
            .strip_suffix(".rs")
            .unwrap_or(&source.file_name);
        root.push_str(&format!(
            "#[path = \"{}\"]\nmod {};\n",
            source.file_name,
            sanitize_crate_name(stem)
        ));
    }
    root
}

/// Map an arbitrary name onto a valid Rust identifier
pub fn sanitize_crate_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
