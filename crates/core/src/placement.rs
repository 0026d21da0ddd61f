//! Placement filter: which anvils can host a new server.
//!
//! Pure and total. A descriptor with missing or zero capacity simply fails
//! the predicate; nothing here returns an error.

use serde::{Deserialize, Serialize};

use crate::capacity::{ByteCount, CapacityDescriptor};

/// Resources requested for a new server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub cpu_cores: u32,
    pub memory_bytes: ByteCount,
    pub storage_bytes: ByteCount,
}

/// Whether a single anvil can satisfy `want`.
///
/// The disk must fit in one storage pool; an anvil without any pool never
/// qualifies.
pub fn qualifies(pool: &CapacityDescriptor, want: &PlacementRequest) -> bool {
    let Some(largest_free) = pool.storage.largest_free() else {
        return false;
    };
    want.cpu_cores <= pool.cpu.available_cores()
        && want.memory_bytes <= pool.memory.available
        && want.storage_bytes <= largest_free
}

/// Anvils able to host `want`, in input order.
pub fn filter<'a>(
    pools: &'a [CapacityDescriptor],
    want: &PlacementRequest,
) -> Vec<&'a CapacityDescriptor> {
    pools.iter().filter(|pool| qualifies(pool, want)).collect()
}

/// Order qualifying anvils best-first.
///
/// Most available memory wins; ties go to the larger single storage pool,
/// then to input order (the sort is stable).
pub fn rank<'a>(mut candidates: Vec<&'a CapacityDescriptor>) -> Vec<&'a CapacityDescriptor> {
    candidates.sort_by(|a, b| {
        b.memory
            .available
            .cmp(&a.memory.available)
            .then_with(|| b.storage.largest_free().cmp(&a.storage.largest_free()))
    });
    candidates
}
