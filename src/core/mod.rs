//! Core domain models for pipelines
//!
//! This module defines the Pipeline contract that authored units implement,
//! the steps they expose, and the settings and audit records that surround
//! a run.

pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod fault;
pub mod pipeline;
pub mod state;
pub mod step;

pub use audit::AuditLog;
pub use config::{ConnectionDefinition, PipelineSettings};
pub use error::StepError;
pub use fault::StepPanic;
pub use pipeline::*;
pub use state::*;
pub use step::*;
