//! Key Capability Set
//!
//! Keys are polymorphic over a small, closed capability set: hash, type
//! tag, compare, serialize, deserialize, print. The engine never
//! interprets key bytes itself — it stores whatever [`StoreKey::encode`]
//! produced and hands it back to the matching [`KeyCodec`] to decode.
//!
//! Type tag `0` is reserved: it marks an empty grid on disk and a
//! released node in the index arena.

mod types;

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

pub use types::{IntKey, IntKeyCodec, StrKey, StrKeyCodec};

/// Maximum encoded key length in bytes. Keys are stored in fixed-size
/// buffers both in index nodes and inside grid records.
pub const MAX_KEY_LEN: usize = 128;

/// Per-key operations: one implementation per supported key type.
pub trait StoreKey: fmt::Display + fmt::Debug {
    /// Type tag identifying this key's type. Must be nonzero and match
    /// the tag of the registered [`KeyCodec`] that decodes it.
    fn type_tag(&self) -> u8;

    /// Hash used for index bucket selection.
    fn hash_code(&self) -> u32;

    /// Append the serialized form to `buf`, returning the encoded
    /// length. Fails with `SerializationOverflow` if the result would
    /// exceed [`MAX_KEY_LEN`].
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize>;

    /// Total order over keys. Keys of different types order by tag.
    fn compare(&self, other: &dyn StoreKey) -> Ordering;

    /// Downcast support for [`StoreKey::compare`] implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Per-type deserializer, registered by tag in a [`KeyRegistry`].
pub trait KeyCodec: Send + Sync {
    /// The tag this codec decodes.
    fn type_tag(&self) -> u8;

    /// Decode key bytes previously produced by [`StoreKey::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn StoreKey>>;
}

/// Registry mapping type tags to codecs.
pub struct KeyRegistry {
    codecs: HashMap<u8, Box<dyn KeyCodec>>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Create a registry with the standard key types: [`IntKey`] (tag 1)
    /// and [`StrKey`] (tag 2).
    pub fn with_standard_types() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IntKeyCodec));
        registry.register(Box::new(StrKeyCodec));
        registry
    }

    /// Register a codec under its own tag, replacing any previous codec
    /// with the same tag. Tag 0 is reserved and rejected by assertion.
    pub fn register(&mut self, codec: Box<dyn KeyCodec>) {
        let tag = codec.type_tag();
        assert_ne!(tag, 0, "type tag 0 is reserved for empty records");
        self.codecs.insert(tag, codec);
    }

    /// Look up the codec for `tag`.
    pub fn get(&self, tag: u8) -> Option<&dyn KeyCodec> {
        self.codecs.get(&tag).map(|c| c.as_ref())
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::with_standard_types()
    }
}
