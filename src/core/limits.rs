/*!
 * Limits and Constants
 * Centralized location for adaptor-wide limits and thresholds
 */

/// Maximum number of concurrent lanes one adaptor will manage.
/// Lane state is allocated eagerly per lane, so an absurd request is
/// rejected instead of silently exhausting memory.
pub const MAX_LANES: u32 = 4096;

/// Maximum products a single module may declare per scope kind.
/// Keeps the cached handle lists small enough for linear scans.
pub const MAX_PRODUCTS_PER_SCOPE: usize = 1024;
