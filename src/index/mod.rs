//! Key Index Module
//!
//! In-memory hash table mapping logical keys to physical grid locations.
//! Rebuilt from disk by the recovery scan on every startup — it is never
//! persisted itself.
//!
//! ## Responsibilities
//! - Chained-bucket lookup keyed on `(type tag, key bytes)`
//! - Fixed-capacity node arena fed by an embedded [`SlotPool`]
//! - Update-in-place on re-set (only the location changes)
//! - Full-arena iteration for recovery and data dumps
//!
//! [`SlotPool`]: crate::pool::SlotPool

mod table;

pub use table::{KeyIndex, KeyIndexIter};

/// Physical location of a record: which size class, which file of that
/// class, and which grid slot inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Size class ordinal (file type).
    pub size_class: u16,

    /// File number within the size class.
    pub file_no: u16,

    /// Grid slot index within the file.
    pub slot: u32,
}

impl Location {
    /// Pack into the public 64-bit handle:
    /// `[63:48] size_class | [47:32] file_no | [31:0] slot`.
    ///
    /// The full declared field widths are encoded; no truncation.
    pub fn to_handle(self) -> u64 {
        ((self.size_class as u64) << 48) | ((self.file_no as u64) << 32) | self.slot as u64
    }

    /// Unpack a handle produced by [`Location::to_handle`].
    pub fn from_handle(handle: u64) -> Self {
        Self {
            size_class: (handle >> 48) as u16,
            file_no: (handle >> 32) as u16,
            slot: handle as u32,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file_type: {}, file_no: {}, grid_idx: {}",
            self.size_class, self.file_no, self.slot
        )
    }
}
