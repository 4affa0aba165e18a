/*!
 * Stream Unit
 * Capability contract implemented by each concrete processing unit kind
 *
 * The adaptor operates purely through this trait and never sees unit
 * internals. One instance exists per lane, exclusively owned by the lane
 * instance table.
 */

use crate::core::errors::ResourceError;
use crate::core::types::{FileBlock, LaneId, LuminosityBlockIndex, RunIndex};
use crate::registry::ProductDescription;
use crate::scope::{EventContext, LumiContainer, RunContainer};

/// Product declarations for one unit kind
///
/// Separates produced descriptions from must/may-consume descriptions.
/// Produced event-scope descriptions define the staging slots handed to the
/// produce hook, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ProductDeclarations {
    produces: Vec<ProductDescription>,
    must_consume: Vec<ProductDescription>,
    may_consume: Vec<ProductDescription>,
}

impl ProductDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn produces(mut self, description: ProductDescription) -> Self {
        self.produces.push(description);
        self
    }

    #[must_use]
    pub fn must_consume(mut self, description: ProductDescription) -> Self {
        self.must_consume.push(description);
        self
    }

    #[must_use]
    pub fn may_consume(mut self, description: ProductDescription) -> Self {
        self.may_consume.push(description);
        self
    }

    pub fn produced(&self) -> &[ProductDescription] {
        &self.produces
    }

    pub fn required(&self) -> &[ProductDescription] {
        &self.must_consume
    }

    pub fn optional(&self) -> &[ProductDescription] {
        &self.may_consume
    }
}

/// One user-authored data-producing processing unit
///
/// `setup_run`, `setup_luminosity_block`, the two summary hooks, and
/// `produce` are the required capability set; file-boundary and fork hooks
/// default to no-ops. Run and lumi indices identify per-scope cached state,
/// since multiple runs or lumi blocks may be simultaneously in flight across
/// lanes.
pub trait StreamUnit: Send + 'static {
    /// Products this unit kind produces and consumes; read once at
    /// registration, before any instance exists
    fn declarations() -> ProductDeclarations
    where
        Self: Sized;

    /// Lane activity is about to start for this instance
    fn begin_stream(&mut self, _lane: LaneId) {}

    /// Lane activity has finished for this instance
    fn end_stream(&mut self, _lane: LaneId) {}

    /// A run scope identified by `run` opened on this instance's lane
    fn setup_run(&mut self, run: RunIndex);

    /// A luminosity block identified by `lumi` opened on this instance's lane
    fn setup_luminosity_block(&mut self, lumi: LuminosityBlockIndex);

    /// Write run summary data before the run container is finalized
    fn stream_end_run_summary(&mut self, container: &mut dyn RunContainer, run: RunIndex);

    /// Write lumi summary data before the lumi container is finalized
    fn stream_end_luminosity_block_summary(
        &mut self,
        container: &mut dyn LumiContainer,
        lumi: LuminosityBlockIndex,
    );

    /// Process one event: fetch inputs and stage produced items
    fn produce(&mut self, event: &mut EventContext<'_>);

    fn on_open_input_file(&mut self, _file: &FileBlock) {}

    fn on_close_input_file(&mut self, _file: &FileBlock) {}

    /// Drop any resource the operating system cannot share across a fork
    fn pre_fork_release(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Rebuild this child's resource shard from `(child_index, child_count)`
    fn post_fork_reacquire(
        &mut self,
        _child_index: u32,
        _child_count: u32,
    ) -> Result<(), ResourceError> {
        Ok(())
    }
}
