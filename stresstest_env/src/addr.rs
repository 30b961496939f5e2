//! Deterministic addresses for generated series and their steps.

use crate::error::AddrParseError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Golden ratio prime, mixes the series seed into each step seed.
const STEP_SEED_MUL: u64 = 0x9e3779b97f4a7c15;

/// Second odd constant, spreads step indices apart.
const STEP_INDEX_MUL: u64 = 0x517cc1b727220a95;

/// Address of one generated configuration series.
///
/// The address *is* the seed: rendering it with `Display` and parsing it
/// back with `FromStr` reconstructs exactly the same generation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SeriesAddr(u64);

impl SeriesAddr {
    /// Draws a fresh series address from the given random source.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    /// Creates the address for a known seed.
    pub fn from_seed(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the underlying seed.
    pub fn seed(&self) -> u64 {
        self.0
    }

    /// Returns the address of the step at `index` within this series.
    pub fn step(&self, index: u32) -> StepAddr {
        StepAddr {
            series: *self,
            index,
        }
    }

    /// Returns the series-level random stream (used for series shape only).
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }
}

impl fmt::Display for SeriesAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:016x}", self.0)
    }
}

impl FromStr for SeriesAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('S')
            .or_else(|| s.strip_prefix('s'))
            .unwrap_or(s);

        if digits.is_empty() || digits.len() > 16 {
            return Err(AddrParseError::Series(s.to_string()));
        }

        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| AddrParseError::Series(s.to_string()))
    }
}

impl From<SeriesAddr> for String {
    fn from(addr: SeriesAddr) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for SeriesAddr {
    type Error = AddrParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Address of a single step (configuration snapshot) within a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StepAddr {
    /// Series this step belongs to
    pub series: SeriesAddr,

    /// Zero-based position within the series
    pub index: u32,
}

impl StepAddr {
    /// Returns the seed for this step's private random stream.
    ///
    /// Derived as `series * mul + (index + 1) * mul2`, so adding steps to a
    /// series never changes the streams of the steps before them.
    pub fn seed(&self) -> u64 {
        self.series
            .seed()
            .wrapping_mul(STEP_SEED_MUL)
            .wrapping_add((self.index as u64 + 1).wrapping_mul(STEP_INDEX_MUL))
    }

    /// Returns the random stream used to generate this step.
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed())
    }
}

impl fmt::Display for StepAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.series, self.index)
    }
}

impl FromStr for StepAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (series, index) = s
            .rsplit_once('-')
            .ok_or_else(|| AddrParseError::Step(s.to_string()))?;

        let series = series
            .parse::<SeriesAddr>()
            .map_err(|_| AddrParseError::Step(s.to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| AddrParseError::Step(s.to_string()))?;

        Ok(series.step(index))
    }
}

impl From<StepAddr> for String {
    fn from(addr: StepAddr) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for StepAddr {
    type Error = AddrParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
