//! Module loader with closed-world dependency resolution

use crate::host::directory::MANIFEST_FILE;
use crate::host::unit::{Dispatch, UnitTypes};
use crate::host::HostError;
use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Symbol every built unit exports to declare its types
pub const DECLARE_UNIT_SYMBOL: &[u8] = b"pipeliner_declare_unit";

/// Signature of the declaration entry point
pub type DeclareUnitFn = fn(&mut UnitTypes);

/// Symbol a built unit exports to adopt the host's log dispatcher
pub const INSTALL_DISPATCH_SYMBOL: &[u8] = b"pipeliner_install_dispatch";

/// Signature of the dispatch hand-over entry point
pub type InstallDispatchFn = fn(&Dispatch);

/// Normalized name of a library: file stem without a `lib` prefix, so
/// `/opt/libs/libreport.so`, `libreport.so` and `report` all agree
pub fn library_name(reference: &str) -> String {
    let file = Path::new(reference)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| reference.to_string());

    let stem = [
        std::env::consts::DLL_SUFFIX,
        ".so",
        ".dylib",
        ".dll",
    ]
    .iter()
    .find_map(|suffix| file.strip_suffix(suffix))
    .unwrap_or(&file);

    stem.strip_prefix("lib").unwrap_or(stem).to_string()
}

/// Serves dependency lookups from the libraries pre-loaded for one unit,
/// and from nothing else
#[derive(Debug, Default)]
pub struct DependencyResolver {
    entries: Vec<(String, PathBuf)>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-loaded library. A second library with the same name
    /// never replaces the first; returns false when it was ignored.
    pub fn register(&mut self, path: &Path) -> bool {
        let name = library_name(&path.to_string_lossy());
        if let Some((_, existing)) = self.entries.iter().find(|(n, _)| *n == name) {
            if existing != path {
                warn!(
                    library = %name,
                    kept = %existing.display(),
                    ignored = %path.display(),
                    "Library already registered, keeping the first"
                );
            }
            return false;
        }
        self.entries.push((name, path.to_path_buf()));
        true
    }

    pub fn resolve(&self, reference: &str) -> Option<&Path> {
        let name = library_name(reference);
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loaded unit and the libraries it was loaded against.
///
/// The libraries stay open for as long as this value lives; anything built
/// from the unit's types must be dropped first.
pub struct LoadedUnit {
    types: UnitTypes,
    source: PathBuf,
    artifact: Option<Library>,
    libraries: Vec<Library>,
}

impl LoadedUnit {
    pub fn types(&self) -> &UnitTypes {
        &self.types
    }

    /// Artifact path, or the pipeline directory for statically linked units
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_dynamic(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }
}

impl std::fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("types", &self.types)
            .field("source", &self.source)
            .field("dynamic", &self.is_dynamic())
            .field("libraries", &self.libraries.len())
            .finish()
    }
}

/// Loads one pipeline's unit
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    pipeline: String,
}

impl ModuleLoader {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }

    /// Load `artifact` after every explicit library has been loaded
    pub fn load(&self, artifact: &Path, explicit: &[PathBuf]) -> Result<LoadedUnit, HostError> {
        let (libraries, resolver) = self.preload(explicit)?;

        info!(pipeline = %self.pipeline, "Loading unit {}", artifact.display());
        let library = open_library(artifact)?;

        // SAFETY: the symbol is generated by `export_unit!` with this exact
        // signature; the library outlives the copied pointer inside LoadedUnit.
        let declare: DeclareUnitFn = unsafe {
            let symbol = library
                .get::<DeclareUnitFn>(DECLARE_UNIT_SYMBOL)
                .map_err(|e| HostError::Load {
                    path: artifact.to_path_buf(),
                    message: format!("missing unit entry point: {}", e),
                })?;
            *symbol
        };

        // SAFETY: generated by `export_unit!` next to the declaration entry
        // point, with this exact signature.
        let install = unsafe {
            library
                .get::<InstallDispatchFn>(INSTALL_DISPATCH_SYMBOL)
                .ok()
                .map(|symbol| *symbol)
        };
        match install {
            Some(install) => tracing::dispatcher::get_default(|dispatch| install(dispatch)),
            None => warn!(
                pipeline = %self.pipeline,
                "Unit {} does not accept a log dispatcher; its step logs are lost",
                artifact.display()
            ),
        }

        let types = self.declare(declare, &resolver)?;
        Ok(LoadedUnit {
            types,
            source: artifact.to_path_buf(),
            artifact: Some(library),
            libraries,
        })
    }

    /// Load a unit linked into this process, resolving its dependencies
    /// against `explicit` the same way a built unit is
    pub fn load_static(
        &self,
        declare: DeclareUnitFn,
        source: &Path,
        explicit: &[PathBuf],
    ) -> Result<LoadedUnit, HostError> {
        let (libraries, resolver) = self.preload(explicit)?;
        let types = self.declare(declare, &resolver)?;
        Ok(LoadedUnit {
            types,
            source: source.to_path_buf(),
            artifact: None,
            libraries,
        })
    }

    fn preload(&self, explicit: &[PathBuf]) -> Result<(Vec<Library>, DependencyResolver), HostError> {
        let mut resolver = DependencyResolver::new();
        let mut libraries = Vec::with_capacity(explicit.len());

        for path in explicit {
            if resolver.register(path) {
                debug!(pipeline = %self.pipeline, "Pre-loading {}", path.display());
                libraries.push(open_library(path)?);
            }
        }

        Ok((libraries, resolver))
    }

    fn declare(
        &self,
        declare: DeclareUnitFn,
        resolver: &DependencyResolver,
    ) -> Result<UnitTypes, HostError> {
        let mut types = UnitTypes::new();
        declare(&mut types);

        for dependency in types.dependencies() {
            match resolver.resolve(dependency) {
                Some(path) => debug!(
                    pipeline = %self.pipeline,
                    "Resolved {} to {}",
                    dependency,
                    path.display()
                ),
                None => {
                    return Err(HostError::DependencyResolution {
                        library: dependency.clone(),
                        pipeline: self.pipeline.clone(),
                        manifest: MANIFEST_FILE,
                    })
                }
            }
        }

        debug!(
            pipeline = %self.pipeline,
            types = types.types().len(),
            "Unit declared"
        );
        Ok(types)
    }
}

/// Open a shared library so its symbols are visible to libraries opened later
#[cfg(unix)]
pub fn open_library(path: &Path) -> Result<Library, HostError> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    // SAFETY: loading runs the library's initializers; pipeline libraries
    // are trusted code chosen by the pipeline author.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }
        .map(Library::from)
        .map_err(|e| HostError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(not(unix))]
pub fn open_library(path: &Path) -> Result<Library, HostError> {
    // SAFETY: as above
    unsafe { Library::new(path) }.map_err(|e| HostError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
