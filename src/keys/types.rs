//! Standard key types: integers and strings.
//!
//! Both encode through bincode, so the stored bytes round-trip exactly
//! through serde without a hand-rolled wire format.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

use super::{KeyCodec, StoreKey, MAX_KEY_LEN};

/// Tag for [`IntKey`].
pub const INT_KEY_TAG: u8 = 1;

/// Tag for [`StrKey`].
pub const STR_KEY_TAG: u8 = 2;

fn encode_with_bincode<T: Serialize>(value: &T, buf: &mut Vec<u8>) -> Result<usize> {
    let bytes = bincode::serialize(value)
        .map_err(|e| GridError::Serialization(format!("key encode failed: {}", e)))?;

    if bytes.len() > MAX_KEY_LEN {
        return Err(GridError::SerializationOverflow(format!(
            "encoded key is {} bytes, limit is {}",
            bytes.len(),
            MAX_KEY_LEN
        )));
    }

    buf.extend_from_slice(&bytes);
    Ok(bytes.len())
}

// =============================================================================
// Integer Keys
// =============================================================================

/// A signed 64-bit integer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntKey(pub i64);

impl StoreKey for IntKey {
    fn type_tag(&self) -> u8 {
        INT_KEY_TAG
    }

    fn hash_code(&self) -> u32 {
        let v = self.0 as u64;
        (v ^ (v >> 32)) as u32
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize> {
        encode_with_bincode(&self.0, buf)
    }

    fn compare(&self, other: &dyn StoreKey) -> Ordering {
        match other.as_any().downcast_ref::<IntKey>() {
            Some(o) => self.0.cmp(&o.0),
            None => self.type_tag().cmp(&other.type_tag()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IntKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Codec for [`IntKey`].
pub struct IntKeyCodec;

impl KeyCodec for IntKeyCodec {
    fn type_tag(&self) -> u8 {
        INT_KEY_TAG
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn StoreKey>> {
        let v: i64 = bincode::deserialize(bytes)
            .map_err(|e| GridError::Serialization(format!("int key decode failed: {}", e)))?;
        Ok(Box::new(IntKey(v)))
    }
}

// =============================================================================
// String Keys
// =============================================================================

/// A UTF-8 string key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrKey(pub String);

impl StrKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl StoreKey for StrKey {
    fn type_tag(&self) -> u8 {
        STR_KEY_TAG
    }

    fn hash_code(&self) -> u32 {
        // Multiplicative string hash; stable across runs.
        let mut hash: u32 = 0;
        for byte in self.0.bytes() {
            hash = hash.wrapping_mul(37).wrapping_add(byte as u32);
        }
        hash
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize> {
        encode_with_bincode(&self.0, buf)
    }

    fn compare(&self, other: &dyn StoreKey) -> Ordering {
        match other.as_any().downcast_ref::<StrKey>() {
            Some(o) => self.0.cmp(&o.0),
            None => self.type_tag().cmp(&other.type_tag()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for StrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Codec for [`StrKey`].
pub struct StrKeyCodec;

impl KeyCodec for StrKeyCodec {
    fn type_tag(&self) -> u8 {
        STR_KEY_TAG
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn StoreKey>> {
        let s: String = bincode::deserialize(bytes)
            .map_err(|e| GridError::Serialization(format!("string key decode failed: {}", e)))?;
        Ok(Box::new(StrKey(s)))
    }
}
