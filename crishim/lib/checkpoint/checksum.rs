use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

const FNV_PRIME: u32 = 0x0100_0193;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A 32-bit FNV-1a checksum over the canonical JSON encoding of a value.
///
/// The encoding is canonical as long as the value holds no maps: struct fields are always
/// written in declaration order, so equal values always produce equal checksums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(u32);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Checksum {
    /// Computes the checksum of `value`.
    pub fn of<T: Serialize>(value: &T) -> ShimResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self(fnv1a_32(&bytes)))
    }

    /// Checks that this checksum matches `value`.
    pub fn verify<T: Serialize>(&self, value: &T) -> ShimResult<()> {
        let actual = Self::of(value)?;
        if actual != *self {
            return Err(ShimError::CorruptCheckpoint(format!(
                "checksum mismatch: stored {}, computed {}",
                self, actual
            )));
        }
        Ok(())
    }

    /// Returns the raw checksum.
    pub fn value(&self) -> u32 {
        self.0
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Computes the 32-bit FNV-1a hash of `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<u32> for Checksum {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
