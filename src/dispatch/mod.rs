/*!
 * Lifecycle Dispatcher
 * Entry points invoked by the external scheduler, one unit instance per lane
 *
 * Every entry point is tagged with a lane identifier and, where applicable,
 * a scope container and scope index. The dispatcher selects the lane's unit
 * instance, invokes the unit hook, and routes produced data through the
 * commit gateway before returning control to the scheduler.
 */

mod state;
mod stats;

pub use state::{JobState, LaneState};
pub use stats::{AtomicDispatchStats, DispatchStats};

use crate::core::errors::{AdaptorError, LifecycleViolation, ResourceError};
use crate::core::types::{
    AdaptorResult, FileBlock, LaneId, LuminosityBlockIndex, ModuleDescription, ProductHandle,
    RunIndex, ScopeKind,
};
use crate::lanes::LaneInstanceTable;
use crate::products::ProductRegistrationResolver;
use crate::registry::{HandleResolver, ProductRegistry};
use crate::scope::{CommitGateway, EventContainer, EventContext, LumiContainer, RunContainer};
use crate::unit::StreamUnit;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};

/// Generic adaptor turning a [`StreamUnit`] kind into a schedulable entity
///
/// Owns one unit instance per concurrent lane and dispatches lifecycle
/// transitions into it in strict per-lane order. Calls for different lanes
/// may arrive on different threads; calls on one lane never overlap (the
/// scheduler's contract, re-checked here through the per-lane state
/// machine).
pub struct ModuleAdaptor<T: StreamUnit> {
    description: ModuleDescription,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    lanes: LaneInstanceTable<T>,
    lane_states: RwLock<Vec<Mutex<LaneState>>>,
    products: RwLock<ProductRegistrationResolver>,
    gateway: CommitGateway,
    job: Mutex<JobState>,
    fork_released: Mutex<bool>,
    stats: AtomicDispatchStats,
}

impl<T: StreamUnit> std::fmt::Debug for ModuleAdaptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleAdaptor")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<T: StreamUnit> ModuleAdaptor<T> {
    /// Construct the adaptor and declare its products to the shared registry
    ///
    /// Registration happens here, once, before resolution; the configuration
    /// object that parameterizes unit construction is captured by `factory`.
    pub fn new<F>(
        description: ModuleDescription,
        registry: &mut dyn ProductRegistry,
        factory: F,
    ) -> AdaptorResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let products = ProductRegistrationResolver::register_products(T::declarations(), registry)
            .map_err(|e| {
                error!("module {} registration failed: {}", description, e);
                AdaptorError::from(e)
            })?;
        info!("Module adaptor {} constructed", description);
        Ok(Self {
            description,
            factory: Box::new(factory),
            lanes: LaneInstanceTable::new(),
            lane_states: RwLock::new(Vec::new()),
            products: RwLock::new(products),
            gateway: CommitGateway::new(),
            job: Mutex::new(JobState::Unstarted),
            fork_released: Mutex::new(false),
            stats: AtomicDispatchStats::new(),
        })
    }

    /// Immutable identity of this adaptor instance
    pub fn module_description(&self) -> &ModuleDescription {
        &self.description
    }

    /// Resolve consumed-product handles for one scope kind
    ///
    /// Runs once per scope, before scheduling begins.
    pub fn update_lookup(
        &self,
        scope: ScopeKind,
        resolver: &dyn HandleResolver,
    ) -> AdaptorResult<()> {
        if *self.job.lock() != JobState::Unstarted {
            return Err(self.fail(LifecycleViolation::JobAlreadyStarted.into()));
        }
        self.products
            .write()
            .update_lookup(scope, resolver)
            .map_err(|e| self.fail(e.into()))
    }

    /// Cached must-consume handles for `scope`
    pub fn items_to_get(&self, scope: ScopeKind) -> Vec<ProductHandle> {
        self.products.read().items_to_get(scope).to_vec()
    }

    /// Cached may-consume handles for `scope`; absent sentinels included
    pub fn items_may_get(&self, scope: ScopeKind) -> Vec<ProductHandle> {
        self.products.read().items_may_get(scope).to_vec()
    }

    /// Point-in-time dispatch statistics
    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot(self.lanes.lane_count())
    }

    /// Start the job: create one unit instance per lane, exactly once
    ///
    /// Happens-before every lane-scoped call on every lane.
    pub fn do_begin_job(&self, lane_count: u32) -> AdaptorResult<()> {
        let mut job = self.job.lock();
        match *job {
            JobState::Unstarted => {}
            JobState::Active => return Err(self.fail(LifecycleViolation::JobAlreadyStarted.into())),
            JobState::Ended => return Err(self.fail(LifecycleViolation::JobAlreadyEnded.into())),
        }

        self.lanes
            .create(lane_count, || (self.factory)())
            .map_err(|e| self.fail(e.into()))?;
        *self.lane_states.write() = (0..lane_count)
            .map(|_| Mutex::new(LaneState::Unstarted))
            .collect();
        *job = JobState::Active;
        info!(
            "module {}: job started with {} lane(s)",
            self.description, lane_count
        );
        Ok(())
    }

    /// End the job after every lane's final call
    ///
    /// A repeated call is a violation, not a silent success.
    pub fn do_end_job(&self) -> AdaptorResult<()> {
        let mut job = self.job.lock();
        match *job {
            JobState::Active => {}
            JobState::Unstarted => return Err(self.fail(LifecycleViolation::JobNotStarted.into())),
            JobState::Ended => return Err(self.fail(LifecycleViolation::JobAlreadyEnded.into())),
        }

        let states = self.lane_states.read();
        let active_lanes = states
            .iter()
            .filter(|slot| *slot.lock() != LaneState::StreamEnded)
            .count();
        if active_lanes > 0 {
            return Err(self.fail(LifecycleViolation::JobStillActive { active_lanes }.into()));
        }
        drop(states);

        *job = JobState::Ended;
        info!("module {}: job ended", self.description);
        Ok(())
    }

    /// Begin lane activity for `lane`
    pub fn do_begin_stream(&self, lane: LaneId) -> AdaptorResult<()> {
        self.transition(lane, |state| state.begin_stream(lane))?;
        self.with_unit(lane, |unit| unit.begin_stream(lane))?;
        self.stats.inc_streams_started();
        debug!("module {}: lane {} stream began", self.description, lane);
        Ok(())
    }

    /// End lane activity for `lane`; its run/lumi stack must be empty
    pub fn do_end_stream(&self, lane: LaneId) -> AdaptorResult<()> {
        self.transition(lane, |state| state.end_stream(lane))?;
        self.with_unit(lane, |unit| unit.end_stream(lane))?;
        self.stats.inc_streams_ended();
        debug!("module {}: lane {} stream ended", self.description, lane);
        Ok(())
    }

    /// Open run `run` on `lane` and let the unit set up per-run cached state
    pub fn do_stream_begin_run(&self, lane: LaneId, run: RunIndex) -> AdaptorResult<()> {
        self.transition(lane, |state| state.begin_run(lane, run))?;
        self.with_unit(lane, |unit| unit.setup_run(run))?;
        self.stats.inc_runs_opened();
        debug!("module {}: lane {} opened run {}", self.description, lane, run);
        Ok(())
    }

    /// Close run `run` on `lane`: summary hook, then the one commit
    pub fn do_stream_end_run(
        &self,
        lane: LaneId,
        container: &mut dyn RunContainer,
        run: RunIndex,
    ) -> AdaptorResult<()> {
        self.transition(lane, |state| state.end_run(lane, run))?;
        self.require_resolved(ScopeKind::Run)?;
        self.with_unit(lane, |unit| unit.stream_end_run_summary(container, run))?;
        self.gateway
            .commit_run(container)
            .map_err(|e| self.fail(e.into()))?;
        self.stats.inc_runs_closed();
        debug!("module {}: lane {} closed run {}", self.description, lane, run);
        Ok(())
    }

    /// Open luminosity block `lumi` on `lane`
    pub fn do_stream_begin_luminosity_block(
        &self,
        lane: LaneId,
        lumi: LuminosityBlockIndex,
    ) -> AdaptorResult<()> {
        self.transition(lane, |state| state.begin_lumi(lane, lumi))?;
        self.with_unit(lane, |unit| unit.setup_luminosity_block(lumi))?;
        self.stats.inc_lumis_opened();
        debug!(
            "module {}: lane {} opened lumi {}",
            self.description, lane, lumi
        );
        Ok(())
    }

    /// Close luminosity block `lumi` on `lane`: summary hook, then commit
    pub fn do_stream_end_luminosity_block(
        &self,
        lane: LaneId,
        container: &mut dyn LumiContainer,
        lumi: LuminosityBlockIndex,
    ) -> AdaptorResult<()> {
        self.transition(lane, |state| state.end_lumi(lane, lumi))?;
        self.require_resolved(ScopeKind::LuminosityBlock)?;
        self.with_unit(lane, |unit| {
            unit.stream_end_luminosity_block_summary(container, lumi)
        })?;
        self.gateway
            .commit_lumi(container)
            .map_err(|e| self.fail(e.into()))?;
        self.stats.inc_lumis_closed();
        debug!(
            "module {}: lane {} closed lumi {}",
            self.description, lane, lumi
        );
        Ok(())
    }

    /// Process one event on `lane` and commit everything it produced
    ///
    /// The staged items become visible in the event container all at once;
    /// the commit is the last operation this module performs on the
    /// container.
    pub fn do_event(&self, lane: LaneId, container: &mut dyn EventContainer) -> AdaptorResult<()> {
        self.transition(lane, |state| state.event(lane))?;
        self.require_resolved(ScopeKind::Event)?;

        let products = self.products.read();
        let produced_ids = products.produced_ids(ScopeKind::Event);

        let staged = self.with_unit(lane, |unit| {
            let mut ctx = EventContext::new(
                &*container,
                products.items_to_get(ScopeKind::Event),
                products.items_may_get(ScopeKind::Event),
                &produced_ids,
            );
            unit.produce(&mut ctx);
            ctx.take_staged()
        })?;
        drop(products);

        self.gateway
            .commit_event(container, staged)
            .map_err(|e| self.fail(e.into()))?;
        self.stats.inc_events();
        Ok(())
    }

    /// An input file opened; fan out to every lane instance
    pub fn on_open_input_file(&self, file: &FileBlock) -> AdaptorResult<()> {
        self.require_active()?;
        self.lanes.for_each(|_, unit| unit.on_open_input_file(file));
        debug!(
            "module {}: input file '{}' opened",
            self.description, file.file_name
        );
        Ok(())
    }

    /// An input file closed; fan out to every lane instance
    pub fn on_close_input_file(&self, file: &FileBlock) -> AdaptorResult<()> {
        self.require_active()?;
        self.lanes.for_each(|_, unit| unit.on_close_input_file(file));
        debug!(
            "module {}: input file '{}' closed",
            self.description, file.file_name
        );
        Ok(())
    }

    /// Release process-exclusive resources before the process forks
    ///
    /// Must run exactly once; afterwards no adaptor state beyond plain data
    /// may be assumed valid in a child until reacquire.
    pub fn pre_fork_release(&self) -> AdaptorResult<()> {
        self.require_active()?;
        let mut released = self.fork_released.lock();
        if *released {
            return Err(self.fail(LifecycleViolation::ForkAlreadyReleased.into()));
        }

        self.lanes
            .try_for_each(|_, unit| unit.pre_fork_release())
            .map_err(|e| self.fail(e.into()))?;
        *released = true;
        info!("module {}: fork resources released", self.description);
        Ok(())
    }

    /// Rebuild this child's resource shard after the fork
    ///
    /// Called once per child; the reacquired state is a function only of
    /// `(child_index, child_count)`. Failure is fatal to this child.
    pub fn post_fork_reacquire(&self, child_index: u32, child_count: u32) -> AdaptorResult<()> {
        self.require_active()?;
        let mut released = self.fork_released.lock();
        if !*released {
            return Err(self.fail(LifecycleViolation::ForkNotReleased.into()));
        }
        if child_count == 0 || child_index >= child_count {
            return Err(self.fail(
                ResourceError::ReacquireFailed {
                    child_index,
                    child_count,
                    reason: "child index out of range".into(),
                }
                .into(),
            ));
        }

        self.lanes
            .try_for_each(|_, unit| unit.post_fork_reacquire(child_index, child_count))
            .map_err(|e| self.fail(e.into()))?;
        *released = false;
        info!(
            "module {}: fork resources reacquired for child {}/{}",
            self.description, child_index, child_count
        );
        Ok(())
    }

    /// Destroy every lane instance; valid after the job ended
    pub fn teardown(&self) -> AdaptorResult<u32> {
        match *self.job.lock() {
            JobState::Ended | JobState::Unstarted => {}
            JobState::Active => {
                return Err(self.fail(
                    LifecycleViolation::JobStillActive {
                        active_lanes: self.lanes.lane_count() as usize,
                    }
                    .into(),
                ))
            }
        }
        self.lane_states.write().clear();
        Ok(self.lanes.teardown())
    }

    /// Resolution for `scope` must precede any get or commit referencing it
    fn require_resolved(&self, scope: ScopeKind) -> AdaptorResult<()> {
        if !self.products.read().is_resolved(scope) {
            return Err(self.fail(LifecycleViolation::ResolutionIncomplete { scope }.into()));
        }
        Ok(())
    }

    fn require_active(&self) -> AdaptorResult<()> {
        match *self.job.lock() {
            JobState::Active => Ok(()),
            JobState::Unstarted => Err(self.fail(LifecycleViolation::JobNotStarted.into())),
            JobState::Ended => Err(self.fail(LifecycleViolation::JobAlreadyEnded.into())),
        }
    }

    /// Apply a checked per-lane state transition
    fn transition(
        &self,
        lane: LaneId,
        f: impl FnOnce(LaneState) -> Result<LaneState, LifecycleViolation>,
    ) -> AdaptorResult<()> {
        self.require_active()?;
        let states = self.lane_states.read();
        let slot = states.get(lane as usize).ok_or_else(|| {
            self.fail(
                LifecycleViolation::LaneOutOfRange {
                    lane,
                    count: states.len() as u32,
                }
                .into(),
            )
        })?;
        let mut state = slot.lock();
        *state = f(*state).map_err(|e| self.fail(e.into()))?;
        Ok(())
    }

    fn with_unit<R>(&self, lane: LaneId, f: impl FnOnce(&mut T) -> R) -> AdaptorResult<R> {
        self.lanes.with(lane, f).map_err(|e| self.fail(e.into()))
    }

    /// Surface a fault with the module identity attached to the diagnostic
    fn fail(&self, err: AdaptorError) -> AdaptorError {
        if matches!(err, AdaptorError::Lifecycle(_)) {
            self.stats.inc_violations();
        }
        error!("module {} fault: {}", self.description, err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InMemoryRegistry, ProductDescription};
    use crate::scope::{MemEvent, MemLumi, MemRun};
    use crate::unit::ProductDeclarations;

    struct CountingUnit {
        events: u32,
    }

    impl StreamUnit for CountingUnit {
        fn declarations() -> ProductDeclarations {
            ProductDeclarations::new().produces(ProductDescription::new(
                "count",
                "EventCount",
                ScopeKind::Event,
            ))
        }

        fn setup_run(&mut self, _run: RunIndex) {}

        fn setup_luminosity_block(&mut self, _lumi: LuminosityBlockIndex) {}

        fn stream_end_run_summary(&mut self, _container: &mut dyn RunContainer, _run: RunIndex) {}

        fn stream_end_luminosity_block_summary(
            &mut self,
            _container: &mut dyn LumiContainer,
            _lumi: LuminosityBlockIndex,
        ) {
        }

        fn produce(&mut self, event: &mut EventContext<'_>) {
            self.events += 1;
            event.put(0, self.events).unwrap();
        }
    }

    fn adaptor() -> ModuleAdaptor<CountingUnit> {
        let mut registry = InMemoryRegistry::new();
        ModuleAdaptor::new(
            ModuleDescription::new("counter", "CountingUnit", 1),
            &mut registry,
            || CountingUnit { events: 0 },
        )
        .unwrap()
    }

    #[test]
    fn test_full_single_lane_pass() {
        let adaptor = adaptor();
        adaptor.do_begin_job(1).unwrap();
        adaptor.do_begin_stream(0).unwrap();
        adaptor.do_stream_begin_run(0, 10).unwrap();
        adaptor.do_stream_begin_luminosity_block(0, 100).unwrap();

        let mut event = MemEvent::new();
        adaptor.do_event(0, &mut event).unwrap();
        assert_eq!(event.len(), 1);

        let mut lumi = MemLumi::new(100);
        adaptor
            .do_stream_end_luminosity_block(0, &mut lumi, 100)
            .unwrap();
        assert!(lumi.is_complete());

        let mut run = MemRun::new(10);
        adaptor.do_stream_end_run(0, &mut run, 10).unwrap();
        assert!(run.is_complete());

        adaptor.do_end_stream(0).unwrap();
        adaptor.do_end_job().unwrap();

        let stats = adaptor.stats();
        assert_eq!(stats.events_processed, 1);
        assert_eq!(stats.runs_opened, 1);
        assert_eq!(stats.runs_closed, 1);
        assert_eq!(stats.violations, 0);
    }

    #[test]
    fn test_repeated_begin_and_end_job_rejected() {
        let adaptor = adaptor();
        adaptor.do_begin_job(1).unwrap();
        assert!(matches!(
            adaptor.do_begin_job(1).unwrap_err(),
            AdaptorError::Lifecycle(LifecycleViolation::JobAlreadyStarted)
        ));

        adaptor.do_begin_stream(0).unwrap();
        adaptor.do_end_stream(0).unwrap();
        adaptor.do_end_job().unwrap();
        assert!(matches!(
            adaptor.do_end_job().unwrap_err(),
            AdaptorError::Lifecycle(LifecycleViolation::JobAlreadyEnded)
        ));
    }

    #[test]
    fn test_lane_calls_require_active_job() {
        let adaptor = adaptor();
        assert!(matches!(
            adaptor.do_begin_stream(0).unwrap_err(),
            AdaptorError::Lifecycle(LifecycleViolation::JobNotStarted)
        ));
    }

    #[test]
    fn test_end_job_with_active_lane_rejected() {
        let adaptor = adaptor();
        adaptor.do_begin_job(2).unwrap();
        adaptor.do_begin_stream(0).unwrap();
        adaptor.do_begin_stream(1).unwrap();
        adaptor.do_end_stream(0).unwrap();

        let err = adaptor.do_end_job().unwrap_err();
        assert!(matches!(
            err,
            AdaptorError::Lifecycle(LifecycleViolation::JobStillActive { active_lanes: 1 })
        ));
    }

    #[test]
    fn test_update_lookup_after_job_start_rejected() {
        let adaptor = adaptor();
        let registry = InMemoryRegistry::new();
        adaptor.do_begin_job(1).unwrap();

        let err = adaptor
            .update_lookup(ScopeKind::Event, &registry)
            .unwrap_err();
        assert!(matches!(
            err,
            AdaptorError::Lifecycle(LifecycleViolation::JobAlreadyStarted)
        ));
    }

    #[test]
    fn test_violations_counted_in_stats() {
        let adaptor = adaptor();
        adaptor.do_begin_job(1).unwrap();
        adaptor.do_begin_stream(0).unwrap();

        let mut event = MemEvent::new();
        assert!(adaptor.do_event(0, &mut event).is_err()); // no open lumi
        assert_eq!(adaptor.stats().violations, 1);
    }

    #[test]
    fn test_teardown_after_end_job() {
        let adaptor = adaptor();
        adaptor.do_begin_job(2).unwrap();
        assert!(adaptor.teardown().is_err()); // job still active

        for lane in 0..2 {
            adaptor.do_begin_stream(lane).unwrap();
            adaptor.do_end_stream(lane).unwrap();
        }
        adaptor.do_end_job().unwrap();
        assert_eq!(adaptor.teardown().unwrap(), 2);
    }
}
