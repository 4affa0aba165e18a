/*!
 * Lifecycle States
 * Global job state and per-lane scope state with checked transitions
 */

use crate::core::errors::{LanePhase, LifecycleViolation};
use crate::core::types::{LaneId, LuminosityBlockIndex, RunIndex};
use serde::{Deserialize, Serialize};

/// Global job state, shared across all lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unstarted,
    Active,
    Ended,
}

/// Per-lane lifecycle state
///
/// Per lane, run and lumi scopes nest strictly:
/// begin-run, (begin-lumi, events, end-lumi)*, end-run. States across lanes
/// are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Unstarted,
    StreamActive,
    RunOpen { run: RunIndex },
    LumiOpen { run: RunIndex, lumi: LuminosityBlockIndex },
    StreamEnded,
}

impl LaneState {
    pub fn phase(&self) -> LanePhase {
        match self {
            LaneState::Unstarted => LanePhase::Unstarted,
            LaneState::StreamActive => LanePhase::StreamActive,
            LaneState::RunOpen { .. } => LanePhase::RunOpen,
            LaneState::LumiOpen { .. } => LanePhase::LumiOpen,
            LaneState::StreamEnded => LanePhase::StreamEnded,
        }
    }

    fn reject(self, lane: LaneId, hook: &str) -> LifecycleViolation {
        LifecycleViolation::InvalidTransition {
            lane,
            from: self.phase(),
            hook: hook.to_string(),
        }
    }

    pub fn begin_stream(self, lane: LaneId) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::Unstarted => Ok(LaneState::StreamActive),
            other => Err(other.reject(lane, "do_begin_stream")),
        }
    }

    pub fn begin_run(self, lane: LaneId, run: RunIndex) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::StreamActive => Ok(LaneState::RunOpen { run }),
            other => Err(other.reject(lane, "do_stream_begin_run")),
        }
    }

    pub fn end_run(self, lane: LaneId, run: RunIndex) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::RunOpen { run: open } if open == run => Ok(LaneState::StreamActive),
            LaneState::RunOpen { run: open } => Err(LifecycleViolation::ScopeIndexMismatch {
                lane,
                expected: open,
                got: run,
            }),
            other => Err(other.reject(lane, "do_stream_end_run")),
        }
    }

    pub fn begin_lumi(
        self,
        lane: LaneId,
        lumi: LuminosityBlockIndex,
    ) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::RunOpen { run } => Ok(LaneState::LumiOpen { run, lumi }),
            other => Err(other.reject(lane, "do_stream_begin_luminosity_block")),
        }
    }

    pub fn end_lumi(
        self,
        lane: LaneId,
        lumi: LuminosityBlockIndex,
    ) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::LumiOpen { run, lumi: open } if open == lumi => {
                Ok(LaneState::RunOpen { run })
            }
            LaneState::LumiOpen { lumi: open, .. } => Err(LifecycleViolation::ScopeIndexMismatch {
                lane,
                expected: open,
                got: lumi,
            }),
            other => Err(other.reject(lane, "do_stream_end_luminosity_block")),
        }
    }

    /// Events leave the lane state unchanged but require an open lumi
    pub fn event(self, lane: LaneId) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::LumiOpen { .. } => Ok(self),
            other => Err(other.reject(lane, "do_event")),
        }
    }

    pub fn end_stream(self, lane: LaneId) -> Result<LaneState, LifecycleViolation> {
        match self {
            LaneState::StreamActive => Ok(LaneState::StreamEnded),
            other => Err(other.reject(lane, "do_end_stream")),
        }
    }
}
