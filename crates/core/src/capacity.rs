//! Capacity descriptors for anvils (placement candidates).
//!
//! Memory and storage sizes routinely exceed 2^53, the largest integer an
//! IEEE-754 double represents exactly. They are held as [`ByteCount`]
//! (`u128`, saturating past its range) and all comparisons and ratios are
//! computed on integers.
//! Conversion to `f64` happens only in the display helpers.

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Largest integer an `f64` holds exactly (2^53 - 1).
const MAX_EXACT_F64: f64 = 9_007_199_254_740_991.0;

/// Basis points in 100%.
const BASIS_POINTS: u128 = 10_000;

// ---------------------------------------------------------------------------
// ByteCount
// ---------------------------------------------------------------------------

/// An exact byte quantity.
///
/// Deserializes from a JSON integer or a decimal string. Serializes as a
/// decimal string so JavaScript readers cannot round it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCount(u128);

impl ByteCount {
    pub const ZERO: ByteCount = ByteCount(0);

    pub const fn new(bytes: u128) -> Self {
        Self(bytes)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, rhs: ByteCount) -> ByteCount {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// `self / whole` in basis points (1/100 of a percent), rounded down.
    ///
    /// `None` when `whole` is zero.
    pub fn basis_points_of(self, whole: ByteCount) -> Option<u128> {
        if whole.0 == 0 {
            return None;
        }
        let bp = match self.0.checked_mul(BASIS_POINTS) {
            Some(scaled) => scaled / whole.0,
            // Only reachable for values near u128::MAX; trade a little
            // precision in the divisor instead of overflowing.
            None => self.0 / (whole.0 / BASIS_POINTS).max(1),
        };
        Some(bp)
    }

    /// Human-readable binary size such as `"1.50 TiB"`, for display only.
    pub fn human(self) -> String {
        const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
        let mut unit = 0;
        let mut scale: u128 = 1;
        while unit + 1 < UNITS.len() && self.0 / scale >= 1024 {
            scale *= 1024;
            unit += 1;
        }
        if unit == 0 {
            return format!("{} B", self.0);
        }
        let whole = self.0 / scale;
        let hundredths = (self.0 % scale) * 100 / scale;
        format!("{whole}.{hundredths:02} {}", UNITS[unit])
    }
}

impl From<u64> for ByteCount {
    fn from(bytes: u64) -> Self {
        Self(u128::from(bytes))
    }
}

impl FromStr for ByteCount {
    type Err = CoreError;

    /// Decimal digits beyond `u128::MAX` saturate.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u128>() {
            Ok(bytes) => Ok(Self(bytes)),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(Self(u128::MAX)),
            Err(e) => Err(CoreError::InvalidByteCount(format!("{s:?}: {e}"))),
        }
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ByteCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ByteCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ByteCountVisitor)
    }
}

struct ByteCountVisitor;

impl<'de> Visitor<'de> for ByteCountVisitor {
    type Value = ByteCount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or decimal string of bytes")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteCount, E> {
        Ok(ByteCount::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<ByteCount, E> {
        Ok(ByteCount(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteCount, E> {
        u128::try_from(v)
            .map(ByteCount)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ByteCount, E> {
        // Integral floats are accepted only while they are still exact.
        if v.fract() == 0.0 && (0.0..=MAX_EXACT_F64).contains(&v) {
            Ok(ByteCount(v as u128))
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteCount, E> {
        v.parse().map_err(E::custom)
    }
}

// ---------------------------------------------------------------------------
// Capacity descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuCapacity {
    #[serde(default)]
    pub cores: u32,
    /// Cores not yet promised to servers. Falls back to `cores` when the
    /// executor omits it.
    #[serde(default)]
    pub available: Option<u32>,
}

impl CpuCapacity {
    pub fn available_cores(&self) -> u32 {
        self.available.unwrap_or(self.cores)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCapacity {
    #[serde(default)]
    pub total: ByteCount,
    #[serde(default)]
    pub allocated: ByteCount,
    #[serde(default)]
    pub available: ByteCount,
}

impl MemoryCapacity {
    /// Allocated share of total memory in percent, for display.
    pub fn percent_allocated(&self) -> Option<f64> {
        self.allocated
            .basis_points_of(self.total)
            .map(|bp| bp as f64 / 100.0)
    }

    /// Memory neither allocated nor reserved.
    pub fn headroom(&self) -> ByteCount {
        self.total.saturating_sub(self.allocated)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoragePool {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub free: ByteCount,
    #[serde(default)]
    pub size: ByteCount,
}

impl StoragePool {
    pub fn percent_used(&self) -> Option<f64> {
        self.size
            .saturating_sub(self.free)
            .basis_points_of(self.size)
            .map(|bp| bp as f64 / 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageCapacity {
    #[serde(default)]
    pub pools: Vec<StoragePool>,
}

impl StorageCapacity {
    /// Free space of the roomiest single pool. Volumes cannot span pools,
    /// so capacity is never summed.
    pub fn largest_free(&self) -> Option<ByteCount> {
        self.pools.iter().map(|p| p.free).max()
    }
}

/// Body of `GET /anvil/<uuid>/capacity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityDescriptor {
    #[serde(default)]
    pub anvil_uuid: String,
    #[serde(default)]
    pub anvil_name: String,
    #[serde(default)]
    pub cpu: CpuCapacity,
    #[serde(default)]
    pub memory: MemoryCapacity,
    #[serde(default)]
    pub storage: StorageCapacity,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
