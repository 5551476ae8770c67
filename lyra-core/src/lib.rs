//! Lyra Core
//!
//! The reconciliation engine of the lyra resource orchestrator: typed
//! resource kinds, template encoding, reference resolution, live-state
//! diffing, transactional apply with a rollback journal, and export of
//! existing resources back into templates.

pub mod applier;
pub mod differ;
pub mod error;
pub mod exporter;
pub mod ids;
pub mod kind;
pub mod plan;
pub mod platform;
pub mod resolver;
pub mod resource;
pub mod service;
pub mod template;

pub use applier::{Applier, ApplyOutcome};
pub use differ::Differ;
pub use error::{Error, Result, ValidationDefect};
pub use exporter::{ExportOpts, Exporter, OrgExportFilter, ResourceToClone};
pub use ids::{IdGenerator, PlatformId, RandomIdGenerator, TimeSource, WallClock};
pub use kind::Kind;
pub use plan::{
    ApplyOpts, DiffIdentifier, DiffSet, ImpactSummary, ResourceDiff, StateStatus, Summary,
    SummaryEntry,
};
pub use resolver::{resolve, ResolvedTemplate};
pub use resource::{Association, EnvRefValue, EnvReference, SecretField, StackResource, Status};
pub use service::{ServiceError, ServiceResult, Services};
pub use template::{ResourceSpec, Template, TemplateFormat, TemplateObject, API_VERSION};
