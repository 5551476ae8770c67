//! Platform identifiers and injectable identity/time sources

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque 64-bit platform identifier
///
/// A zero value means the resource has not been realized yet. Rendered as a
/// fixed-width hex string in all interchange formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformId(u64);

impl PlatformId {
    pub const ZERO: PlatformId = PlatformId(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PlatformId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(PlatformId)
    }
}

impl From<u64> for PlatformId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl Serialize for PlatformId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PlatformId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Source of fresh platform identifiers
///
/// Injectable so tests can pin the generated values.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> PlatformId;
}

/// Default generator seeded from random UUIDs
#[derive(Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> PlatformId {
        // Zero is reserved for "unassigned"; a v4 UUID truncated to 64 bits
        // is never rejected more than once in practice.
        loop {
            let id = PlatformId(uuid::Uuid::new_v4().as_u128() as u64);
            if !id.is_zero() {
                return id;
            }
        }
    }
}

/// Source of the current time, injectable for deterministic tests
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source
#[derive(Debug, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
