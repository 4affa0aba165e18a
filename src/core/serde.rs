/*!
 * Serde Helpers
 * Skip-serializing predicates for compact snapshots
 */

#[inline]
pub fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

#[inline]
pub fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
