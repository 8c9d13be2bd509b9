//! Stable percentage bucketing.
//!
//! A determinator is hashed with CRC32 and compared against a threshold
//! that scales linearly with the percentage. The same determinator always
//! lands in the same bucket, so raising the percentage only ever adds
//! determinators to the active set.

/// Largest percentage a flag can carry.
pub const MAX_PERCENTAGE: u8 = 100;

/// Decide whether `determinator` falls inside the first `percentage`
/// percent of the hash space.
pub fn decide(determinator: &[u8], percentage: u8) -> bool {
    // Full rollout includes hash u32::MAX, which `h < threshold(100)` would miss.
    if percentage >= MAX_PERCENTAGE {
        return true;
    }
    crc32fast::hash(determinator) < threshold(percentage)
}

/// Decision for an optional determinator. Without a stable identity to
/// bucket on, only a fully rolled-out flag is active.
pub fn decide_for(determinator: Option<&[u8]>, percentage: u8) -> bool {
    match determinator {
        Some(d) => decide(d, percentage),
        None => percentage >= MAX_PERCENTAGE,
    }
}

/// `percentage * (2^32 - 1) / 100`, computed in 64 bits.
fn threshold(percentage: u8) -> u32 {
    let scaled = u64::from(percentage.min(MAX_PERCENTAGE)) * u64::from(u32::MAX) / 100;
    scaled as u32
}
