//! Pipeline type discovery over a unit's declared types

use crate::core::{Pipeline, PIPELINE_CONTRACT};
use crate::host::unit::{TypeDescriptor, UnitTypes};
use crate::host::HostError;
use std::path::Path;
use tracing::{error, info};

/// Types whose immediate base is the Pipeline contract
pub fn pipeline_candidates(unit: &UnitTypes) -> Vec<&TypeDescriptor> {
    unit.types()
        .iter()
        .filter(|t| t.base == PIPELINE_CONTRACT)
        .collect()
}

/// Find the single pipeline type in `unit` and construct it at `path`
pub fn discover_pipeline(unit: &UnitTypes, path: &Path) -> Result<Box<dyn Pipeline>, HostError> {
    let candidates = pipeline_candidates(unit);

    let descriptor = match candidates.as_slice() {
        [] => {
            error!("No Pipeline type found in {}", path.display());
            return Err(HostError::NoPipelineType(path.to_path_buf()));
        }
        [single] => *single,
        many => {
            let types: Vec<String> = many.iter().map(|t| t.name.clone()).collect();
            error!(
                "This pipeline contains more than one Pipeline type: {}, pipeline: {}",
                types.join(", "),
                path.display()
            );
            return Err(HostError::MultiplePipelineTypes {
                pipeline: path.to_path_buf(),
                types,
            });
        }
    };

    let constructor = descriptor.constructor.ok_or_else(|| HostError::Construct {
        type_name: descriptor.name.clone(),
        source: anyhow::anyhow!("type declares no path constructor"),
    })?;

    info!("Constructing pipeline type {}", descriptor.name);
    constructor(path).map_err(|source| HostError::Construct {
        type_name: descriptor.name.clone(),
        source,
    })
}
