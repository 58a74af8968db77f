//! Block size derivation from the L1 instruction-cache capacity.
//!
//! The tile edge for both cache-aware strategies is
//! `K = floor(sqrt(Z / 2))`, where `Z` is the L1 instruction-cache size in
//! bytes. A missing or non-positive reading falls back to
//! [`DEFAULT_BLOCK_SIZE`]; `K` is never 0, since a zero threshold would make
//! the recursive strategy split forever.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, warn};

use crate::DEFAULT_BLOCK_SIZE;

/// Source of the cache capacity reading.
pub trait CacheQuery {
    /// L1 instruction-cache capacity in bytes, or `None` if unavailable.
    ///
    /// Non-positive values are treated the same as `None`.
    fn l1_icache_bytes(&self) -> Option<i64>;
}

/// Reads the cache capacity from the executing machine.
///
/// Tries CPUID on x86 targets, then Linux sysfs if CPUID gave no positive size.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareCache;

/// A fixed cache reading, for tests and manual tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCache(pub i64);

impl CacheQuery for FixedCache {
    fn l1_icache_bytes(&self) -> Option<i64> {
        Some(self.0)
    }
}

impl CacheQuery for HardwareCache {
    fn l1_icache_bytes(&self) -> Option<i64> {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let cpuid = cache_size::cache_size(1, cache_size::CacheType::Instruction);
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let cpuid = None;

        #[cfg(target_os = "linux")]
        let sysfs = || scan_l1_icache(Path::new(SYSFS_CPU0_CACHE));
        #[cfg(not(target_os = "linux"))]
        let sysfs = || None;

        first_positive(cpuid, sysfs)
    }
}

/// Use `primary` if it is a positive reading, otherwise ask `fallback`.
fn first_positive(
    primary: Option<usize>,
    fallback: impl FnOnce() -> Option<usize>,
) -> Option<i64> {
    let positive = |bytes: usize| i64::try_from(bytes).ok().filter(|&b| b > 0);
    primary
        .and_then(positive)
        .or_else(|| fallback().and_then(positive))
}

#[cfg(target_os = "linux")]
const SYSFS_CPU0_CACHE: &str = "/sys/devices/system/cpu/cpu0/cache";

/// Find the level-1 instruction cache under a sysfs `cache` directory.
///
/// `index*` entries are read in order until one has no `level` file. Entries
/// with a missing `type` or an unreadable `size` are skipped.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn scan_l1_icache(root: &Path) -> Option<usize> {
    for idx in 0..8 {
        let base = root.join(format!("index{idx}"));
        let Ok(level) = fs::read_to_string(base.join("level")) else {
            break;
        };
        let Ok(ctype) = fs::read_to_string(base.join("type")) else {
            continue;
        };
        if level.trim() != "1" || ctype.trim() != "Instruction" {
            continue;
        }
        if let Some(bytes) = fs::read_to_string(base.join("size"))
            .ok()
            .and_then(|size| parse_sysfs_size(size.trim()))
        {
            return Some(bytes);
        }
    }
    None
}

/// Parse sysfs cache sizes such as `32K`, `1M` or `512`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_sysfs_size(s: &str) -> Option<usize> {
    if let Some(kb) = s.strip_suffix('K') {
        kb.parse::<usize>().ok()?.checked_mul(1024)
    } else if let Some(mb) = s.strip_suffix('M') {
        mb.parse::<usize>().ok()?.checked_mul(1024 * 1024)
    } else {
        s.parse::<usize>().ok()
    }
}

/// `floor(sqrt(capacity / 2))`, clamped to at least [`DEFAULT_BLOCK_SIZE`].
///
/// Non-positive capacities yield [`DEFAULT_BLOCK_SIZE`].
pub fn block_size_from_capacity(capacity: i64) -> usize {
    if capacity <= 0 {
        return DEFAULT_BLOCK_SIZE;
    }
    let half = (capacity / 2) as u64;
    (isqrt(half) as usize).max(DEFAULT_BLOCK_SIZE)
}

/// Integer square root (largest `r` with `r * r <= x`).
fn isqrt(x: u64) -> u64 {
    if x < 2 {
        return x;
    }
    // Float estimate, then fix up rounding in either direction.
    let mut r = (x as f64).sqrt() as u64;
    while r.checked_mul(r).map_or(true, |sq| sq > x) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= x) {
        r += 1;
    }
    r
}

/// Resolve the block size from a cache reading.
///
/// Never returns 0. A degenerate reading is logged and replaced by
/// [`DEFAULT_BLOCK_SIZE`] rather than reported as an error.
pub fn resolve_block_size(query: &dyn CacheQuery) -> usize {
    match query.l1_icache_bytes() {
        Some(z) if z > 0 => {
            let k = block_size_from_capacity(z);
            debug!("Z = {z}, K = {k}");
            k
        }
        reading => {
            warn!(
                "unusable L1 instruction cache reading {reading:?}, using K = {DEFAULT_BLOCK_SIZE}"
            );
            DEFAULT_BLOCK_SIZE
        }
    }
}

static HARDWARE_BLOCK_SIZE: OnceLock<usize> = OnceLock::new();

/// Block size for the executing machine, queried once per process.
pub fn hardware_block_size() -> usize {
    *HARDWARE_BLOCK_SIZE.get_or_init(|| resolve_block_size(&HardwareCache))
}
