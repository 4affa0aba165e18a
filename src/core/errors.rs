/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::{ContainerId, LaneId, ScopeKind};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Product declaration errors, detected at registration before scheduling starts
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigurationError {
    #[error("duplicate product '{label}' ({type_name}) for {scope} scope")]
    #[diagnostic(
        code(registration::duplicate_product),
        help("Another module already declared a product with this label, type, and scope. Relabel one of them.")
    )]
    DuplicateProduct {
        label: String,
        type_name: String,
        scope: ScopeKind,
    },

    #[error("invalid product declaration: {0}")]
    #[diagnostic(
        code(registration::invalid_declaration),
        help("Check the module's produced/consumed declarations for empty labels or types.")
    )]
    InvalidDeclaration(String),
}

/// Handle resolution errors, detected at setup before any event is processed
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LookupError {
    #[error("required product '{label}' ({type_name}) not resolvable in {scope} scope")]
    #[diagnostic(
        code(lookup::unresolved_required_product),
        help("A must-consume product has no matching registry entry. Verify the upstream producer is configured.")
    )]
    UnresolvedRequiredProduct {
        label: String,
        type_name: String,
        scope: ScopeKind,
    },
}

/// Serializable phase of a lane's lifecycle, used in violation diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanePhase {
    Unstarted,
    StreamActive,
    RunOpen,
    LumiOpen,
    StreamEnded,
}

impl std::fmt::Display for LanePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LanePhase::Unstarted => "unstarted",
            LanePhase::StreamActive => "stream_active",
            LanePhase::RunOpen => "run_open",
            LanePhase::LumiOpen => "lumi_open",
            LanePhase::StreamEnded => "stream_ended",
        };
        f.write_str(s)
    }
}

/// Entry point invoked out of the allowed state-machine order
///
/// None of these are retried; the scheduler decides whether the fault aborts
/// the whole job or only the affected scope.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LifecycleViolation {
    #[error("job already started")]
    #[diagnostic(
        code(lifecycle::job_already_started),
        help("do_begin_job must be called exactly once per job.")
    )]
    JobAlreadyStarted,

    #[error("job not started")]
    #[diagnostic(
        code(lifecycle::job_not_started),
        help("Call do_begin_job before any lane-scoped entry point.")
    )]
    JobNotStarted,

    #[error("job already ended")]
    #[diagnostic(
        code(lifecycle::job_already_ended),
        help("No entry point may run after do_end_job; a repeated do_end_job is also rejected.")
    )]
    JobAlreadyEnded,

    #[error("job still active: {active_lanes} lane(s) have not ended their stream")]
    #[diagnostic(
        code(lifecycle::job_still_active),
        help("Every lane must reach stream end before do_end_job.")
    )]
    JobStillActive { active_lanes: usize },

    #[error("lane instances already created")]
    #[diagnostic(
        code(lifecycle::lanes_already_created),
        help("create may run again only after teardown.")
    )]
    LanesAlreadyCreated,

    #[error("invalid lane count {requested} (allowed 1..={max})")]
    #[diagnostic(
        code(lifecycle::lane_count_invalid),
        help("The scheduler must request at least one lane and at most the compiled cap.")
    )]
    LaneCountInvalid { requested: u32, max: u32 },

    #[error("lane {lane} out of range (lane count {count})")]
    #[diagnostic(
        code(lifecycle::lane_out_of_range),
        help("Lane identifiers are dense in [0, lane_count).")
    )]
    LaneOutOfRange { lane: LaneId, count: u32 },

    #[error("hook '{hook}' not allowed for lane {lane} in phase {from}")]
    #[diagnostic(
        code(lifecycle::invalid_transition),
        help("The per-lane order is begin-run, begin-lumi, events, end-lumi, end-run.")
    )]
    InvalidTransition {
        lane: LaneId,
        from: LanePhase,
        hook: String,
    },

    #[error("lane {lane} scope index mismatch: expected {expected}, got {got}")]
    #[diagnostic(
        code(lifecycle::scope_index_mismatch),
        help("An end hook must name the same run/lumi index its begin hook opened.")
    )]
    ScopeIndexMismatch {
        lane: LaneId,
        expected: u32,
        got: u32,
    },

    #[error("scope container {container} committed twice")]
    #[diagnostic(
        code(lifecycle::double_commit),
        help("commit must be the last operation on a scope container instance.")
    )]
    DoubleCommit { container: ContainerId },

    #[error("product handles for {scope} scope not resolved")]
    #[diagnostic(
        code(lifecycle::resolution_incomplete),
        help("update_lookup for this scope must complete before any get or commit referencing it.")
    )]
    ResolutionIncomplete { scope: ScopeKind },

    #[error("produced slot {slot} out of range ({declared} declared)")]
    #[diagnostic(
        code(lifecycle::product_slot_out_of_range),
        help("A unit may only stage products it declared for the event scope.")
    )]
    ProductSlotOutOfRange { slot: usize, declared: usize },

    #[error("produced slot {slot} staged twice in one event")]
    #[diagnostic(
        code(lifecycle::product_already_staged),
        help("Each declared product may be staged at most once per event.")
    )]
    ProductAlreadyStaged { slot: usize },

    #[error("fork resources already released")]
    #[diagnostic(
        code(lifecycle::fork_already_released),
        help("pre_fork_release must run exactly once before the process replicates.")
    )]
    ForkAlreadyReleased,

    #[error("fork resources not released")]
    #[diagnostic(
        code(lifecycle::fork_not_released),
        help("post_fork_reacquire is only valid in a child after pre_fork_release ran in the parent.")
    )]
    ForkNotReleased,
}

/// Fork resource hand-off errors; fatal to the affected child process
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ResourceError {
    #[error("pre-fork release failed: {reason}")]
    #[diagnostic(
        code(fork::release_failed),
        help("A unit instance could not drop a process-exclusive resource before fork.")
    )]
    ReleaseFailed { reason: String },

    #[error("post-fork reacquire failed for child {child_index}/{child_count}: {reason}")]
    #[diagnostic(
        code(fork::reacquire_failed),
        help("The child could not rebuild its resource shard; this child must abort.")
    )]
    ReacquireFailed {
        child_index: u32,
        child_count: u32,
        reason: String,
    },
}

/// Unified adaptor error type with miette diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum AdaptorError {
    #[error("configuration error: {0}")]
    #[diagnostic(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("lookup error: {0}")]
    #[diagnostic(transparent)]
    Lookup(#[from] LookupError),

    #[error("lifecycle violation: {0}")]
    #[diagnostic(transparent)]
    Lifecycle(#[from] LifecycleViolation),

    #[error("resource error: {0}")]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display_names_lane_and_phase() {
        let v = LifecycleViolation::InvalidTransition {
            lane: 3,
            from: LanePhase::StreamActive,
            hook: "do_event".into(),
        };
        let msg = v.to_string();
        assert!(msg.contains("lane 3"));
        assert!(msg.contains("stream_active"));
        assert!(msg.contains("do_event"));
    }

    #[test]
    fn test_unified_error_from_conversions() {
        let err: AdaptorError = LifecycleViolation::JobNotStarted.into();
        assert!(matches!(err, AdaptorError::Lifecycle(_)));

        let err: AdaptorError = ConfigurationError::InvalidDeclaration("empty label".into()).into();
        assert!(matches!(err, AdaptorError::Configuration(_)));
    }

    #[test]
    fn test_errors_serialize_with_tag() {
        let v = LifecycleViolation::DoubleCommit { container: 9 };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["error_type"], "double_commit");
    }
}
