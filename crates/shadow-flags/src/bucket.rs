//! Stable rollout bucketing
//!
//! An actor's bucket is a pure function of the flag key and the actor id,
//! identical across calls, processes and platforms.

/// Number of rollout buckets; percentages address them directly
pub const BUCKET_COUNT: u64 = 100;

/// Compute the rollout bucket (0..100) of `actor` for `operation_key`
///
/// Blake3 over `operation_key`, a NUL separator and `actor`; the first eight
/// digest bytes read little-endian, reduced modulo 100.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rollout_bucket(operation_key: &str, actor: &str) -> u8 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(operation_key.as_bytes());
    hasher.update(&[0]);
    hasher.update(actor.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % BUCKET_COUNT) as u8
}

/// Whether `actor` falls inside a `percentage` rollout of `operation_key`
#[inline]
#[must_use]
pub fn in_rollout(operation_key: &str, actor: &str, percentage: u8) -> bool {
    rollout_bucket(operation_key, actor) < percentage
}
