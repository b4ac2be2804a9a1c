//! DataFile
//!
//! One open grid file: header, fixed grid array, and the idle/used
//! tracker over its slots.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pool::SlotGroupTracker;

use super::layout::{FileHeader, FILE_HEADER_SIZE, GRID_HEADER_SIZE};

/// Slot groups tracked per file.
pub const GROUP_IDLE: usize = 0;
pub const GROUP_USED: usize = 1;
pub const GROUP_COUNT: usize = 2;

/// An open grid file with its slot tracker.
///
/// Files are created once, lazily, pre-truncated to full capacity, and
/// never deleted by the engine.
pub struct DataFile {
    file: File,
    path: PathBuf,
    grid_count: u32,
    grid_size: u32,
    tracker: SlotGroupTracker,
}

impl DataFile {
    /// Create a new grid file: write the header block, then truncate to
    /// `header + grid_count * grid_size` so every slot exists up front.
    /// All slots start idle.
    pub fn create(path: &Path, header: FileHeader) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        file.write_all(&header.encode())?;
        file.set_len(FILE_HEADER_SIZE as u64 + header.grid_count as u64 * header.grid_size as u64)?;

        let mut tracker = SlotGroupTracker::new(GROUP_COUNT, header.grid_count);
        tracker.init_group(GROUP_IDLE);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            grid_count: header.grid_count,
            grid_size: header.grid_size,
            tracker,
        })
    }

    /// Wrap an existing file whose header has already been read and
    /// validated by the recovery scan. All slots start idle; the scan
    /// marks occupied ones used as it replays them.
    pub fn open(path: &Path, file: File, header: FileHeader) -> Self {
        let mut tracker = SlotGroupTracker::new(GROUP_COUNT, header.grid_count);
        tracker.init_group(GROUP_IDLE);

        Self {
            file,
            path: path.to_path_buf(),
            grid_count: header.grid_count,
            grid_size: header.grid_size,
            tracker,
        }
    }

    fn slot_offset(&self, slot: u32) -> u64 {
        FILE_HEADER_SIZE as u64 + self.grid_size as u64 * slot as u64
    }

    /// Read up to one grid into `buf` (resized to the grid size),
    /// returning how many bytes were actually read. A short count means
    /// the file is truncated mid-grid.
    pub fn read_slot(&mut self, slot: u32, buf: &mut Vec<u8>) -> Result<usize> {
        debug_assert!(slot < self.grid_count);

        buf.resize(self.grid_size as usize, 0);
        self.file.seek(SeekFrom::Start(self.slot_offset(slot)))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }

        Ok(filled)
    }

    /// Write an encoded record at the start of a slot.
    pub fn write_slot(&mut self, slot: u32, record: &[u8]) -> Result<()> {
        debug_assert!(slot < self.grid_count);
        debug_assert!(record.len() <= self.grid_size as usize);

        self.file.seek(SeekFrom::Start(self.slot_offset(slot)))?;
        self.file.write_all(record)?;

        Ok(())
    }

    /// Tombstone a slot in place by zeroing the four bytes after the
    /// grid header — the record tag and key length field. The rest of
    /// the record's bytes are left untouched.
    pub fn clear_slot(&mut self, slot: u32) -> Result<()> {
        debug_assert!(slot < self.grid_count);

        self.file
            .seek(SeekFrom::Start(self.slot_offset(slot) + GRID_HEADER_SIZE as u64))?;
        self.file.write_all(&[0u8; 4])?;

        Ok(())
    }

    /// Read only a slot's write timestamp (first four grid-header bytes).
    pub fn read_write_time(&mut self, slot: u32) -> Result<u32> {
        debug_assert!(slot < self.grid_count);

        self.file.seek(SeekFrom::Start(self.slot_offset(slot)))?;
        let mut stamp = [0u8; 4];
        self.file.read_exact(&mut stamp)?;

        Ok(u32::from_le_bytes(stamp))
    }

    /// Head of the idle group — the slot the next write here would take.
    pub fn idle_head(&self) -> Option<u32> {
        self.tracker.head(GROUP_IDLE)
    }

    /// Move a slot idle → used after its record has been written.
    pub fn mark_used(&mut self, slot: u32) {
        self.tracker.move_slot(slot, GROUP_IDLE, GROUP_USED);
    }

    /// Move a slot used → idle after its record was tombstoned or
    /// migrated out.
    pub fn mark_idle(&mut self, slot: u32) {
        self.tracker.move_slot(slot, GROUP_USED, GROUP_IDLE);
    }

    /// Whether a slot is currently in the used group.
    pub fn slot_in_use(&self, slot: u32) -> bool {
        self.tracker.iter(GROUP_USED).any(|s| s == slot)
    }

    /// Number of slots currently in use.
    pub fn used_count(&self) -> u32 {
        self.tracker.iter(GROUP_USED).count() as u32
    }

    pub fn grid_count(&self) -> u32 {
        self.grid_count
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
