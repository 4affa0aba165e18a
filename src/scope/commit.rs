/*!
 * Commit Gateway
 * Transactional insertion of produced data into scope containers
 */

use super::{EventContainer, LumiContainer, ProductData, RunContainer};
use crate::core::errors::LifecycleViolation;
use crate::core::types::{ContainerId, ProductId};
use dashmap::DashSet;
use log::debug;

/// Gateway through which all produced data reaches a scope container
///
/// Tracks every container instance this module has committed so a second
/// commit on the same instance is rejected before any mutation happens,
/// regardless of how the first attempt went.
#[derive(Debug, Default)]
pub struct CommitGateway {
    committed: DashSet<ContainerId>,
}

impl CommitGateway {
    pub fn new() -> Self {
        Self {
            committed: DashSet::new(),
        }
    }

    /// Commit all staged event products in one indivisible step
    ///
    /// Either every item becomes visible to downstream consumers or none do.
    pub fn commit_event(
        &self,
        container: &mut dyn EventContainer,
        items: Vec<(ProductId, ProductData)>,
    ) -> Result<(), LifecycleViolation> {
        self.claim(container.container_id())?;
        let count = items.len();
        container.absorb(items);
        debug!(
            "Committed {} item(s) to event container {}",
            count,
            container.container_id()
        );
        Ok(())
    }

    /// Mark a run container complete; summary data is already in place
    pub fn commit_run(&self, container: &mut dyn RunContainer) -> Result<(), LifecycleViolation> {
        self.claim(container.container_id())?;
        container.mark_complete();
        debug!("Marked run container {} complete", container.container_id());
        Ok(())
    }

    /// Mark a luminosity block container complete
    pub fn commit_lumi(&self, container: &mut dyn LumiContainer) -> Result<(), LifecycleViolation> {
        self.claim(container.container_id())?;
        container.mark_complete();
        debug!("Marked lumi container {} complete", container.container_id());
        Ok(())
    }

    /// Number of container instances committed so far
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    // Claim happens before any container mutation, so a rejected second
    // commit leaves the container untouched.
    fn claim(&self, id: ContainerId) -> Result<(), LifecycleViolation> {
        if !self.committed.insert(id) {
            return Err(LifecycleViolation::DoubleCommit { container: id });
        }
        Ok(())
    }
}
