/*!
 * Lane Instance Table
 * Exclusive per-lane ownership of user-unit instances
 *
 * The table performs no logic beyond ownership and indexed lookup; unit
 * construction side effects belong to the caller-supplied factory.
 */

use crate::core::errors::LifecycleViolation;
use crate::core::limits::MAX_LANES;
use crate::core::types::LaneId;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};

struct Inner<T> {
    slots: Vec<Mutex<T>>,
    created: bool,
}

/// Fixed-size owning arena keyed by [`LaneId`]
///
/// Populated exactly once per create/teardown cycle; each slot is guarded by
/// its own lock so different lanes never contend. Calls on one lane are
/// sequential by the scheduler's contract, so lane locks are uncontended.
pub struct LaneInstanceTable<T> {
    inner: RwLock<Inner<T>>,
}

impl<T> LaneInstanceTable<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                slots: Vec::new(),
                created: false,
            }),
        }
    }

    /// Populate exactly `lane_count` slots by invoking `factory` once per slot
    ///
    /// A second create before teardown is rejected.
    pub fn create<F>(&self, lane_count: u32, mut factory: F) -> Result<(), LifecycleViolation>
    where
        F: FnMut() -> T,
    {
        if lane_count == 0 || lane_count > MAX_LANES {
            return Err(LifecycleViolation::LaneCountInvalid {
                requested: lane_count,
                max: MAX_LANES,
            });
        }

        let mut inner = self.inner.write();
        if inner.created {
            return Err(LifecycleViolation::LanesAlreadyCreated);
        }

        let mut slots = Vec::with_capacity(lane_count as usize);
        for lane in 0..lane_count {
            slots.push(Mutex::new(factory()));
            debug!("Created unit instance for lane {}", lane);
        }
        inner.slots = slots;
        inner.created = true;
        info!("Lane instance table populated with {} lane(s)", lane_count);
        Ok(())
    }

    /// Number of lanes, zero before create and after teardown
    pub fn lane_count(&self) -> u32 {
        self.inner.read().slots.len() as u32
    }

    pub fn is_created(&self) -> bool {
        self.inner.read().created
    }

    /// Run `f` against the lane's exclusively owned instance
    pub fn with<R>(&self, lane: LaneId, f: impl FnOnce(&mut T) -> R) -> Result<R, LifecycleViolation> {
        let inner = self.inner.read();
        let count = inner.slots.len() as u32;
        let slot = inner
            .slots
            .get(lane as usize)
            .ok_or(LifecycleViolation::LaneOutOfRange { lane, count })?;
        let result = f(&mut slot.lock());
        Ok(result)
    }

    /// Run `f` against every lane instance in lane order
    pub fn for_each(&self, mut f: impl FnMut(LaneId, &mut T)) {
        let inner = self.inner.read();
        for (lane, slot) in inner.slots.iter().enumerate() {
            f(lane as LaneId, &mut slot.lock());
        }
    }

    /// Like [`for_each`](Self::for_each) but stops at the first error
    pub fn try_for_each<E>(
        &self,
        mut f: impl FnMut(LaneId, &mut T) -> Result<(), E>,
    ) -> Result<(), E> {
        let inner = self.inner.read();
        for (lane, slot) in inner.slots.iter().enumerate() {
            f(lane as LaneId, &mut slot.lock())?;
        }
        Ok(())
    }

    /// Destroy every owned instance; the table may be re-created afterwards
    ///
    /// This is the defined destruction point for unit instances, used at
    /// adaptor teardown and fork-driven recreation.
    pub fn teardown(&self) -> u32 {
        let mut inner = self.inner.write();
        let count = inner.slots.len() as u32;
        inner.slots.clear();
        inner.created = false;
        if count > 0 {
            info!("Lane instance table torn down ({} instance(s) dropped)", count);
        }
        count
    }
}

impl<T> Default for LaneInstanceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_populates_distinct_instances() {
        let table: LaneInstanceTable<Vec<u8>> = LaneInstanceTable::new();
        table.create(4, Vec::new).unwrap();
        assert_eq!(table.lane_count(), 4);

        // Pairwise-distinct: compare slot addresses
        let mut addrs = Vec::new();
        for lane in 0..4 {
            let addr = table.with(lane, |v| v as *mut Vec<u8> as usize).unwrap();
            addrs.push(addr);
        }
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 4);
    }

    #[test]
    fn test_factory_invoked_once_per_lane() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        let mut calls = 0;
        table
            .create(3, || {
                calls += 1;
                calls
            })
            .unwrap();
        assert_eq!(calls, 3);

        // Instances carry their construction order
        assert_eq!(table.with(0, |v| *v).unwrap(), 1);
        assert_eq!(table.with(2, |v| *v).unwrap(), 3);
    }

    #[test]
    fn test_second_create_rejected() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        table.create(2, || 0).unwrap();

        let err = table.create(2, || 0).unwrap_err();
        assert!(matches!(err, LifecycleViolation::LanesAlreadyCreated));
    }

    #[test]
    fn test_create_after_teardown_allowed() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        table.create(2, || 0).unwrap();
        assert_eq!(table.teardown(), 2);
        assert_eq!(table.lane_count(), 0);

        table.create(3, || 1).unwrap();
        assert_eq!(table.lane_count(), 3);
    }

    #[test]
    fn test_out_of_range_lane_rejected() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        table.create(2, || 0).unwrap();

        let err = table.with(2, |_| ()).unwrap_err();
        assert!(matches!(
            err,
            LifecycleViolation::LaneOutOfRange { lane: 2, count: 2 }
        ));
    }

    #[test]
    fn test_zero_and_excessive_lane_counts_rejected() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        assert!(matches!(
            table.create(0, || 0).unwrap_err(),
            LifecycleViolation::LaneCountInvalid { .. }
        ));
        assert!(matches!(
            table.create(MAX_LANES + 1, || 0).unwrap_err(),
            LifecycleViolation::LaneCountInvalid { .. }
        ));
    }

    #[test]
    fn test_for_each_visits_lanes_in_order() {
        let table: LaneInstanceTable<u32> = LaneInstanceTable::new();
        table.create(3, || 0).unwrap();

        let mut seen = Vec::new();
        table.for_each(|lane, _| seen.push(lane));
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
