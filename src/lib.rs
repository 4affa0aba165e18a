/*!
 * Lane Adaptor Library
 * Generic glue between user processing units and a multi-lane,
 * multi-granularity event-processing pipeline
 *
 * The adaptor keeps one private unit instance per concurrent lane,
 * dispatches lifecycle transitions in strict per-lane order, registers and
 * resolves product dependencies once, and commits produced data into scope
 * containers transactionally. The scheduler, registry storage engine, and
 * concrete scope containers are external collaborators behind the narrow
 * interfaces defined here.
 */

pub mod core;
pub mod dispatch;
pub mod lanes;
pub mod products;
pub mod registry;
pub mod scope;
pub mod unit;

// Re-exports
pub use crate::core::errors::{
    AdaptorError, ConfigurationError, LanePhase, LifecycleViolation, LookupError, ResourceError,
};
pub use crate::core::types::{
    AdaptorResult, ContainerId, FileBlock, LaneId, LuminosityBlockIndex, ModuleDescription,
    ProductHandle, ProductId, RunIndex, ScopeKind,
};
pub use dispatch::{DispatchStats, JobState, ModuleAdaptor};
pub use lanes::LaneInstanceTable;
pub use products::ProductRegistrationResolver;
pub use registry::{HandleResolver, InMemoryRegistry, ProductDescription, ProductRegistry};
pub use scope::{
    CommitGateway, EventContainer, EventContext, LumiContainer, MemEvent, MemLumi, MemRun,
    ProductData, RunContainer,
};
pub use unit::{ProductDeclarations, StreamUnit};
