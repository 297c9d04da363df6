//! Pipeline host: build, load and discover a pipeline from its directory
//!
//! The host runs the build cache gate, resolves references, compiles stale
//! sources, loads the resulting unit against its pre-loaded libraries and
//! constructs the single pipeline type it declares.

pub mod cache;
pub mod compiler;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod references;
pub mod unit;

pub use cache::{BuildDecision, needs_rebuild};
pub use compiler::{BuildArtifact, CompileRequest, Compiler, Diagnostic, DiagnosticLevel, RustcCompiler};
pub use config::HostConfig;
pub use directory::PipelineDirectory;
pub use discovery::discover_pipeline;
pub use error::HostError;
pub use loader::{DeclareUnitFn, DependencyResolver, InstallDispatchFn, LoadedUnit, ModuleLoader};
pub use references::{resolve_references, Reference, ResolvedReferences};
pub use unit::{PipelineConstructor, TypeDescriptor, UnitTypes};

use crate::core::Pipeline;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Builds and holds one pipeline.
///
/// Field order matters: the pipeline drops before the unit whose code it
/// runs.
pub struct PipelineHost<C: Compiler = RustcCompiler> {
    pipeline: Option<Box<dyn Pipeline>>,
    unit: Option<LoadedUnit>,
    directory: PipelineDirectory,
    config: HostConfig,
    compiler: C,
}

impl PipelineHost<RustcCompiler> {
    pub fn new(path: impl AsRef<Path>, config: HostConfig) -> Result<Self, HostError> {
        let compiler = RustcCompiler::new(&config.rustc, config.opt_level.clone());
        Self::with_compiler(path, config, compiler)
    }
}

impl<C: Compiler> PipelineHost<C> {
    pub fn with_compiler(
        path: impl AsRef<Path>,
        config: HostConfig,
        compiler: C,
    ) -> Result<Self, HostError> {
        Ok(Self {
            pipeline: None,
            unit: None,
            directory: PipelineDirectory::new(path)?,
            config,
            compiler,
        })
    }

    pub fn directory(&self) -> &PipelineDirectory {
        &self.directory
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The constructed pipeline, once `build` or `load_static` succeeded
    pub fn pipeline(&self) -> Option<&dyn Pipeline> {
        self.pipeline.as_deref()
    }

    pub fn unit(&self) -> Option<&LoadedUnit> {
        self.unit.as_ref()
    }

    /// Make sure an up-to-date artifact exists, compiling when the cache
    /// gate says so. Returns the artifact and the references it was
    /// resolved against.
    pub fn ensure_artifact(&self) -> Result<(PathBuf, ResolvedReferences), HostError> {
        let decision = cache::check(&self.directory)?;
        let references = resolve_references(&self.directory, &self.config)?;

        if decision.needs_rebuild() {
            info!(pipeline = self.directory.name(), "Changes detected, building pipeline");
            let artifact = self.compile(&references)?;
            info!(pipeline = self.directory.name(), "Build complete: {}", artifact.path.display());
            Ok((artifact.path, references))
        } else {
            info!(pipeline = self.directory.name(), "No changes detected, loading pipeline");
            Ok((self.directory.artifact_path(), references))
        }
    }

    /// Compile the directory's sources; a failed build removes the artifact
    pub fn compile(&self, references: &ResolvedReferences) -> Result<BuildArtifact, HostError> {
        let request = CompileRequest {
            crate_name: self.directory.name().to_string(),
            sources: self.directory.read_sources()?,
            references: references.clone(),
            output: self.directory.artifact_path(),
            build_dir: self.directory.build_dir(),
        };

        self.compiler.compile(&request).map_err(|diagnostics| {
            for diagnostic in &diagnostics {
                error!(pipeline = self.directory.name(), "{}", diagnostic);
            }
            self.remove_artifact();
            HostError::Compile {
                pipeline: self.directory.name().to_string(),
                diagnostics,
            }
        })
    }

    /// Build if needed, load the unit and construct its pipeline
    pub fn build(&mut self) -> Result<&dyn Pipeline, HostError> {
        let (artifact, references) = self.ensure_artifact()?;

        let loader = ModuleLoader::new(self.directory.name());
        let unit = loader.load(&artifact, &references.libraries())?;
        self.install(unit)
    }

    /// Use a unit linked into this process instead of building one
    pub fn load_static(&mut self, declare: DeclareUnitFn) -> Result<&dyn Pipeline, HostError> {
        let libraries = references::explicit_libraries(&self.directory)?;

        let loader = ModuleLoader::new(self.directory.name());
        let unit = loader.load_static(declare, self.directory.path(), &libraries)?;
        self.install(unit)
    }

    fn install(&mut self, unit: LoadedUnit) -> Result<&dyn Pipeline, HostError> {
        self.pipeline = None;
        self.unit = None;

        let pipeline = discover_pipeline(unit.types(), self.directory.path())?;
        info!(
            pipeline = pipeline.name(),
            steps = pipeline.steps().len(),
            "Pipeline loaded"
        );

        self.unit = Some(unit);
        Ok(&**self.pipeline.insert(pipeline))
    }

    fn remove_artifact(&self) {
        let artifact = self.directory.artifact_path();
        if artifact.exists() {
            if let Err(e) = std::fs::remove_file(&artifact) {
                error!(
                    pipeline = self.directory.name(),
                    "Failed to remove stale artifact {}: {}",
                    artifact.display(),
                    e
                );
            }
        }
    }
}
