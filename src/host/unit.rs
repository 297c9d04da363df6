//! The type table a built unit declares when it is loaded

use crate::core::{Pipeline, PIPELINE_CONTRACT};
use std::fmt;
use std::path::Path;

pub use tracing::Dispatch;

/// Constructs a pipeline rooted at a directory
pub type PipelineConstructor = fn(&Path) -> anyhow::Result<Box<dyn Pipeline>>;

/// One type declared by a unit, with its immediate base
#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub base: String,
    pub constructor: Option<PipelineConstructor>,
}

impl TypeDescriptor {
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

fn construct<T: Pipeline>(path: &Path) -> anyhow::Result<Box<dyn Pipeline>> {
    Ok(Box::new(T::new(path)?))
}

/// Everything a unit declares: its types and the libraries it needs
#[derive(Debug, Clone, Default)]
pub struct UnitTypes {
    types: Vec<TypeDescriptor>,
    dependencies: Vec<String>,
}

impl UnitTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `T` as a direct implementation of the Pipeline contract
    pub fn declare_pipeline<T: Pipeline>(&mut self) -> &mut Self {
        self.types.push(TypeDescriptor {
            name: std::any::type_name::<T>().to_string(),
            base: PIPELINE_CONTRACT.to_string(),
            constructor: Some(construct::<T>),
        });
        self
    }

    /// Declare `T` as built on another pipeline type named `base`
    pub fn declare_derived<T: Pipeline>(&mut self, base: &str) -> &mut Self {
        self.types.push(TypeDescriptor {
            name: std::any::type_name::<T>().to_string(),
            base: base.to_string(),
            constructor: Some(construct::<T>),
        });
        self
    }

    /// Declare a non-constructible type
    pub fn declare_type(&mut self, name: &str, base: &str) -> &mut Self {
        self.types.push(TypeDescriptor {
            name: name.to_string(),
            base: base.to_string(),
            constructor: None,
        });
        self
    }

    /// Record that the unit needs `library` to be loaded first
    pub fn requires(&mut self, library: &str) -> &mut Self {
        if !self.dependencies.iter().any(|d| d == library) {
            self.dependencies.push(library.to_string());
        }
        self
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Route this copy of `tracing` to the host's subscriber.
///
/// A built unit links its own `tracing`, whose global dispatcher starts out
/// empty. The loader hands over its current dispatcher before the unit
/// declares anything.
pub fn adopt_dispatch(dispatch: &Dispatch) {
    if tracing::dispatcher::set_global_default(dispatch.clone()).is_err() {
        tracing::debug!("Unit already has a log subscriber");
    }
}

/// Export the entry points of a pipeline unit: type declaration, and log
/// dispatch hand-over.
///
/// ```ignore
/// pipeliner::export_unit!(|unit| {
///     unit.requires("libreporting.so").declare_pipeline::<Nightly>();
/// });
/// ```
#[macro_export]
macro_rules! export_unit {
    ($($declare:tt)+) => {
        #[no_mangle]
        pub fn pipeliner_declare_unit(unit: &mut $crate::host::UnitTypes) {
            let declare: fn(&mut $crate::host::UnitTypes) = $($declare)+;
            declare(unit);
        }

        #[no_mangle]
        pub fn pipeliner_install_dispatch(dispatch: &$crate::host::unit::Dispatch) {
            $crate::host::unit::adopt_dispatch(dispatch);
        }
    };
}

/// Export a unit declaring each listed type as a pipeline
#[macro_export]
macro_rules! export_pipeline {
    ($($pipeline:ty),+ $(,)?) => {
        $crate::export_unit!(|unit| {
            $( unit.declare_pipeline::<$pipeline>(); )+
        });
    };
}
