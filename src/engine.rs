//! Engine Module
//!
//! The grid store: slot-size-class selection, record migration, and the
//! startup recovery scan that rebuilds the key index from disk.
//!
//! ## Responsibilities
//! - Route put/get/delete through the key index to physical grid slots
//! - First-fit allocation across size classes, files, and idle slots
//! - Migrate records whose length crosses a slot-size boundary
//! - Rebuild all in-memory state from on-disk files on startup

use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{Config, RepairPolicy};
use crate::error::{GridError, Result};
use crate::index::{KeyIndex, Location};
use crate::keys::{KeyCodec, KeyRegistry, StoreKey, MAX_KEY_LEN};
use crate::storage::{
    decode_record, encode_record, encoded_len, DataFile, FileHeader, SizeClass, FILE_HEADER_SIZE,
};

/// A live record reported by [`GridStore::entries`].
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Key type tag.
    pub tag: u8,
    /// Printable form of the key.
    pub key_text: String,
    /// The stored value bytes.
    pub value: Vec<u8>,
    /// Where the record lives on disk.
    pub location: Location,
}

/// The grid storage engine.
///
/// ## Concurrency Model
///
/// The original design is single-threaded and blocking: every operation
/// performs its file I/O inline. This implementation keeps that shape
/// behind one coarse `Mutex` — the index, every file's tracker, and the
/// shared scratch buffer are mutated only under it, so the engine is
/// `Sync` without any finer-grained locking discipline.
pub struct GridStore {
    registry: KeyRegistry,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    config: Config,
    index: KeyIndex,
    classes: Vec<SizeClass>,
    /// Reusable record (de)serialization buffer, sized to the largest
    /// grid. Not reentrant; only touched under the engine lock.
    scratch: Vec<u8>,
}

impl GridStore {
    /// Open an engine over `config.working_dir`, creating the directory
    /// if missing, then rebuild the index from every grid file found
    /// there.
    pub fn open(config: Config, registry: KeyRegistry) -> Result<Self> {
        let classes = build_classes(&config)?;
        fs::create_dir_all(&config.working_dir)?;

        let largest = classes.last().map(|c| c.grid_size()).unwrap_or(0);
        let mut inner = StoreInner {
            index: KeyIndex::new(config.index_buckets, config.index_capacity),
            classes,
            scratch: Vec::with_capacity(largest as usize),
            config,
        };

        inner.recover(&registry)?;

        Ok(Self {
            registry,
            inner: Mutex::new(inner),
        })
    }

    /// Store `value` under `key`, allocating, overwriting in place, or
    /// migrating as the record length dictates. Returns the record's
    /// (possibly new) location.
    ///
    /// `now` is the write timestamp stamped into the grid header; pass 0
    /// to use the current wall clock.
    pub fn put(&self, key: &dyn StoreKey, value: &[u8], now: u32) -> Result<Location> {
        let codec = self.codec_for(key)?;
        self.inner.lock().put(key, codec, value, now)
    }

    /// Fetch the value stored under `key`, with its location. `Ok(None)`
    /// if the key is absent.
    pub fn get(&self, key: &dyn StoreKey) -> Result<Option<(Vec<u8>, Location)>> {
        let codec = self.codec_for(key)?;
        self.inner.lock().get(key, codec)
    }

    /// Tombstone `key`'s record and drop it from the index. Fails with
    /// `KeyNotFound` if absent.
    pub fn delete(&self, key: &dyn StoreKey) -> Result<()> {
        let codec = self.codec_for(key)?;
        self.inner.lock().delete(key, codec)
    }

    /// Every live record, in index-arena order. The dump analogue of the
    /// recovery iterator; unreadable records are skipped with a warning.
    pub fn entries(&self) -> Result<Vec<StoredEntry>> {
        self.inner.lock().entries(&self.registry)
    }

    /// Whether the slot at `location` is in its file's used group.
    /// `None` when no file is open at that location.
    pub fn slot_in_use(&self, location: Location) -> Option<bool> {
        let inner = self.inner.lock();
        let class = inner.classes.get(location.size_class as usize)?;
        let file = class.file(location.file_no)?;
        Some(file.slot_in_use(location.slot))
    }

    /// Number of live keys in the index.
    pub fn index_len(&self) -> u32 {
        self.inner.lock().index.len()
    }

    /// The configuration this engine was opened with.
    pub fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }

    fn codec_for(&self, key: &dyn StoreKey) -> Result<&dyn KeyCodec> {
        self.registry
            .get(key.type_tag())
            .ok_or(GridError::UnknownKeyType(key.type_tag()))
    }
}

/// Derive each size class's geometry from the configured base size and
/// growth factor, validating the configuration up front.
fn build_classes(config: &Config) -> Result<Vec<SizeClass>> {
    if config.max_size_classes == 0 {
        return Err(GridError::Config("max_size_classes must be nonzero".into()));
    }
    if config.growth_factor < 2 {
        return Err(GridError::Config(
            "growth_factor must be at least 2 so grid sizes strictly increase".into(),
        ));
    }
    if (config.base_grid_size as usize) < encoded_len(1, 1) {
        return Err(GridError::Config(format!(
            "base_grid_size {} cannot hold even a minimal record ({} bytes)",
            config.base_grid_size,
            encoded_len(1, 1)
        )));
    }
    if config.file_size < config.base_grid_size as u64 {
        return Err(GridError::Config(
            "file_size is smaller than one grid of class 0".into(),
        ));
    }
    if config.index_buckets == 0 || config.index_capacity == 0 {
        return Err(GridError::Config(
            "index_buckets and index_capacity must be nonzero".into(),
        ));
    }

    let mut classes = Vec::with_capacity(config.max_size_classes as usize);
    let mut grid_size = config.base_grid_size;

    for ordinal in 0..config.max_size_classes {
        let grid_count = (config.file_size / grid_size as u64) as u32;
        classes.push(SizeClass::new(
            ordinal,
            grid_size,
            grid_count,
            config.max_files_per_class,
        ));

        if ordinal + 1 < config.max_size_classes {
            grid_size = grid_size.checked_mul(config.growth_factor as u32).ok_or_else(|| {
                GridError::Config(format!(
                    "grid size overflows u32 at size class {}",
                    ordinal + 1
                ))
            })?;
        }
    }

    Ok(classes)
}

fn wall_clock_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl StoreInner {
    // =========================================================================
    // Write Path
    // =========================================================================

    fn put(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
        value: &[u8],
        now: u32,
    ) -> Result<Location> {
        let mut key_buf = Vec::with_capacity(MAX_KEY_LEN);
        let key_len = key.encode(&mut key_buf)?;
        if key_len > MAX_KEY_LEN {
            return Err(GridError::SerializationOverflow(format!(
                "encoded key is {} bytes, limit is {}",
                key_len, MAX_KEY_LEN
            )));
        }
        if value.is_empty() || value.len() > u16::MAX as usize {
            return Err(GridError::SerializationOverflow(format!(
                "value length {} does not fit the record format (1..={})",
                value.len(),
                u16::MAX
            )));
        }

        let real_len = encoded_len(key_len, value.len());
        let write_time = if now != 0 { now } else { wall_clock_secs() };

        match self.index.get(key, codec) {
            None => self.put_new(key, codec, &key_buf, value, write_time, real_len),
            Some(old) => self.put_existing(key, codec, &key_buf, value, write_time, real_len, old),
        }
    }

    /// First put of a key: first-fit scan over every size class.
    fn put_new(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
        key_buf: &[u8],
        value: &[u8],
        write_time: u32,
        real_len: usize,
    ) -> Result<Location> {
        // Refuse before touching disk so a full index leaves no orphaned
        // used slot behind.
        if self.index.available() == 0 {
            return Err(GridError::IndexFull {
                capacity: self.index.len(),
            });
        }

        let end = self.classes.len() as u16 - 1;
        let loc = self.find_slot(0, end, real_len)?;

        self.write_record(loc, write_time, key.type_tag(), key_buf, value)?;
        self.file_mut(loc)?.mark_used(loc.slot);
        self.index.set(key, codec, loc)?;

        Ok(loc)
    }

    /// Overwrite of an existing key: in place when the record still
    /// fits, otherwise migrate across size classes.
    #[allow(clippy::too_many_arguments)]
    fn put_existing(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
        key_buf: &[u8],
        value: &[u8],
        write_time: u32,
        real_len: usize,
        old: Location,
    ) -> Result<Location> {
        if self.config.verify_key_on_set {
            self.verify_stored_key(key, codec, old)?;
        }

        let old_size = self
            .classes
            .get(old.size_class as usize)
            .map(|c| c.grid_size() as usize)
            .ok_or_else(|| GridError::Storage(format!("index points at unknown {}", old)))?;

        let (begin, end) = if real_len > old_size {
            // Outgrew the slot: only a strictly larger class can hold it.
            if old.size_class + 1 >= self.classes.len() as u16 {
                error!(key = %key, real_len, old_size, "record outgrew the largest size class");
                return Err(GridError::CapacityExhausted { needed: real_len });
            }
            (old.size_class + 1, self.classes.len() as u16 - 1)
        } else if self.config.shrink_when_possible && real_len < old_size {
            (0, old.size_class)
        } else {
            // Still fits and no shrink wanted: overwrite in place.
            self.write_record(old, write_time, key.type_tag(), key_buf, value)?;
            return Ok(old);
        };

        let new = self.find_slot(begin, end, real_len)?;

        // The scan may legitimately land back on the old file when the
        // class ranges overlap; reuse the old slot instead of moving.
        if new.size_class == old.size_class && new.file_no == old.file_no {
            self.write_record(old, write_time, key.type_tag(), key_buf, value)?;
            return Ok(old);
        }

        // Write the new copy before tombstoning the old one. A crash in
        // between leaves both on disk under the same key; the recovery
        // scan resolves that via the repair policy.
        self.write_record(new, write_time, key.type_tag(), key_buf, value)?;
        {
            let old_file = self.file_mut(old)?;
            old_file.clear_slot(old.slot)?;
            old_file.mark_idle(old.slot);
        }
        self.file_mut(new)?.mark_used(new.slot);
        self.index.set(key, codec, new)?;

        debug!(key = %key, from = %old, to = %new, "migrated record");

        Ok(new)
    }

    /// First-fit scan: smallest fitting class in `[begin, end]`, file
    /// numbers in order, lazily creating files, taking the idle head of
    /// the first file with headroom.
    fn find_slot(&mut self, begin: u16, end: u16, needed: usize) -> Result<Location> {
        for class_idx in begin..=end {
            let class = &self.classes[class_idx as usize];
            if (class.grid_size() as usize) < needed || class.grid_count() == 0 {
                continue;
            }

            for file_no in 0..self.config.max_files_per_class {
                if self.classes[class_idx as usize].file(file_no).is_none() {
                    let class = &mut self.classes[class_idx as usize];
                    class.create_file(
                        &self.config.working_dir,
                        &self.config.file_name_template,
                        file_no,
                    )?;
                    info!(
                        path = %class.file_path(&self.config.working_dir, &self.config.file_name_template, file_no).display(),
                        "created grid file"
                    );
                }

                let file = self.classes[class_idx as usize]
                    .file(file_no)
                    .ok_or_else(|| GridError::Storage("freshly created file missing".into()))?;

                if let Some(slot) = file.idle_head() {
                    return Ok(Location {
                        size_class: class_idx,
                        file_no,
                        slot,
                    });
                }
            }
        }

        error!(needed, begin, end, "no size class/file/slot fits the record");
        Err(GridError::CapacityExhausted { needed })
    }

    /// Encode into the scratch buffer and write at `loc`.
    fn write_record(
        &mut self,
        loc: Location,
        write_time: u32,
        tag: u8,
        key_buf: &[u8],
        value: &[u8],
    ) -> Result<()> {
        encode_record(&mut self.scratch, write_time, tag, key_buf, value);

        let class = self
            .classes
            .get_mut(loc.size_class as usize)
            .ok_or_else(|| GridError::Storage(format!("write to unknown {}", loc)))?;
        let file = class
            .file_mut(loc.file_no)
            .ok_or_else(|| GridError::Storage(format!("write to unopened {}", loc)))?;
        file.write_slot(loc.slot, &self.scratch)
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    fn get(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
    ) -> Result<Option<(Vec<u8>, Location)>> {
        let loc = match self.index.get(key, codec) {
            Some(loc) => loc,
            None => return Ok(None),
        };

        let bytes_read = {
            let class = self
                .classes
                .get_mut(loc.size_class as usize)
                .ok_or_else(|| GridError::Storage(format!("index points at unknown {}", loc)))?;
            let file = class
                .file_mut(loc.file_no)
                .ok_or_else(|| GridError::Storage(format!("index points at unopened {}", loc)))?;
            file.read_slot(loc.slot, &mut self.scratch)?
        };

        let record = decode_record(&self.scratch[..bytes_read]).ok_or_else(|| {
            GridError::CorruptRecord(format!("live index entry but empty grid at {}", loc))
        })?;

        if self.config.verify_key_on_get {
            let stored = codec.decode(record.key)?;
            if !stored.compare(key).is_eq() {
                error!(key = %key, stored = %stored, at = %loc, "stored key does not match request");
                return Err(GridError::CorruptRecord(format!(
                    "key mismatch at {}: stored {}, requested {}",
                    loc, stored, key
                )));
            }
        }

        Ok(Some((record.value.to_vec(), loc)))
    }

    /// Re-read `loc` and check the record there actually belongs to
    /// `key` before overwriting it.
    fn verify_stored_key(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
        loc: Location,
    ) -> Result<()> {
        let bytes_read = {
            let class = self
                .classes
                .get_mut(loc.size_class as usize)
                .ok_or_else(|| GridError::Storage(format!("index points at unknown {}", loc)))?;
            let file = class
                .file_mut(loc.file_no)
                .ok_or_else(|| GridError::Storage(format!("index points at unopened {}", loc)))?;
            file.read_slot(loc.slot, &mut self.scratch)?
        };

        let record = decode_record(&self.scratch[..bytes_read]).ok_or_else(|| {
            GridError::CorruptRecord(format!("live index entry but empty grid at {}", loc))
        })?;

        let stored = codec.decode(record.key)?;
        if !stored.compare(key).is_eq() {
            error!(key = %key, stored = %stored, at = %loc, "stored key does not match request");
            return Err(GridError::CorruptRecord(format!(
                "key mismatch at {}: stored {}, requested {}",
                loc, stored, key
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Delete Path
    // =========================================================================

    fn delete(&mut self, key: &dyn StoreKey, codec: &dyn KeyCodec) -> Result<()> {
        let loc = self.index.get(key, codec).ok_or(GridError::KeyNotFound)?;

        {
            let file = self.file_mut(loc)?;
            file.clear_slot(loc.slot)?;
            file.mark_idle(loc.slot);
        }

        self.index.remove(key, codec)
    }

    // =========================================================================
    // Recovery Scan
    // =========================================================================

    /// Enumerate the working directory and replay every loadable grid
    /// file into the index. Per-file failures are logged and skipped;
    /// they never abort the scan of the rest.
    fn recover(&mut self, registry: &KeyRegistry) -> Result<()> {
        for entry in fs::read_dir(&self.config.working_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match self.load_file(registry, &path) {
                Ok(loaded) => {
                    info!(path = %path.display(), records = loaded, "loaded grid file");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unloadable file");
                }
            }
        }

        info!(keys = self.index.len(), "recovery scan complete");

        Ok(())
    }

    /// Parse, validate, and replay a single file. Returns the number of
    /// live records indexed from it.
    fn load_file(&mut self, registry: &KeyRegistry, path: &Path) -> Result<u32> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut block = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut block)?;
        let header = FileHeader::decode(&block)?;

        if header.file_type >= self.config.max_size_classes
            || header.file_no >= self.config.max_files_per_class
        {
            return Err(GridError::CorruptRecord(format!(
                "header (file_type {}, file_no {}) outside configured bounds",
                header.file_type, header.file_no
            )));
        }

        let class = &self.classes[header.file_type as usize];
        if header.grid_count != class.grid_count() || header.grid_size != class.grid_size() {
            return Err(GridError::CorruptRecord(format!(
                "header geometry {}x{} does not match class {} ({}x{})",
                header.grid_count,
                header.grid_size,
                header.file_type,
                class.grid_count(),
                class.grid_size()
            )));
        }

        if class.file(header.file_no).is_some() {
            return Err(GridError::Storage(format!(
                "another file already claims (file_type {}, file_no {})",
                header.file_type, header.file_no
            )));
        }

        let data_file = DataFile::open(path, file, header);
        self.classes[header.file_type as usize].files[header.file_no as usize] = Some(data_file);

        let mut loaded = 0;
        for slot in 0..header.grid_count {
            let candidate = Location {
                size_class: header.file_type,
                file_no: header.file_no,
                slot,
            };

            let bytes_read = {
                let class = &mut self.classes[header.file_type as usize];
                let file = class
                    .file_mut(header.file_no)
                    .ok_or_else(|| GridError::Storage("file vanished during load".into()))?;
                file.read_slot(slot, &mut self.scratch)?
            };

            // A short read is a file truncated mid-grid: stop this
            // file's scan, keep what was already replayed.
            if bytes_read < header.grid_size as usize {
                warn!(path = %path.display(), slot, "partial final grid, stopping file scan");
                break;
            }

            let record = match decode_record(&self.scratch[..bytes_read]) {
                Some(r) => r,
                None => continue, // empty or tombstoned grid
            };

            let codec = match registry.get(record.tag) {
                Some(c) => c,
                None => {
                    debug!(tag = record.tag, at = %candidate, "unrecognized record type, skipping");
                    continue;
                }
            };

            let key = match codec.decode(record.key) {
                Ok(k) => k,
                Err(e) => {
                    warn!(at = %candidate, error = %e, "undecodable key, skipping grid");
                    continue;
                }
            };
            let write_time = record.write_time;

            match self.index.get(&*key, codec) {
                Some(existing) => {
                    self.resolve_duplicate(&*key, codec, existing, candidate, write_time)?;
                }
                None => {
                    if let Err(e) = self.index.set(&*key, codec, candidate) {
                        error!(key = %key, error = %e, "cannot index recovered record");
                        continue;
                    }
                    self.file_mut(candidate)?.mark_used(candidate.slot);
                    loaded += 1;
                }
            }
        }

        Ok(loaded)
    }

    /// The same logical key is alive in two grids — the crash window
    /// between writing a migrated copy and tombstoning its original.
    /// Resolve deterministically per the configured repair policy: the
    /// winner owns the index entry and a used slot, the loser's slot
    /// stays idle, and Delete* policies also zero the loser's grid.
    fn resolve_duplicate(
        &mut self,
        key: &dyn StoreKey,
        codec: &dyn KeyCodec,
        existing: Location,
        candidate: Location,
        candidate_time: u32,
    ) -> Result<()> {
        let existing_time = self.file_mut(existing)?.read_write_time(existing.slot)?;

        // The write timestamp is the only ordering signal that survives
        // a restart. Ties go to the candidate.
        let candidate_is_new = candidate_time >= existing_time;

        let policy = self.config.repair_policy;
        let (keep_new, delete_loser) = match policy {
            RepairPolicy::DeleteOld => (true, true),
            RepairPolicy::IgnoreOld => (true, false),
            RepairPolicy::DeleteNew => (false, true),
            RepairPolicy::IgnoreNew => (false, false),
        };

        let candidate_wins = keep_new == candidate_is_new;
        let winner = if candidate_wins { candidate } else { existing };

        warn!(
            key = %key,
            existing = %existing,
            candidate = %candidate,
            ?policy,
            winner = %winner,
            "duplicate key found during recovery"
        );

        if candidate_wins {
            self.index.set(key, codec, candidate)?;

            {
                let existing_file = self.file_mut(existing)?;
                if delete_loser {
                    existing_file.clear_slot(existing.slot)?;
                }
                existing_file.mark_idle(existing.slot);
            }
            self.file_mut(candidate)?.mark_used(candidate.slot);
        } else if delete_loser {
            self.file_mut(candidate)?.clear_slot(candidate.slot)?;
        }

        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    fn entries(&mut self, registry: &KeyRegistry) -> Result<Vec<StoredEntry>> {
        let live: Vec<(u8, Vec<u8>)> = self
            .index
            .iter()
            .map(|(tag, bytes)| (tag, bytes.to_vec()))
            .collect();

        let mut out = Vec::with_capacity(live.len());
        for (tag, key_bytes) in live {
            let codec = match registry.get(tag) {
                Some(c) => c,
                None => continue,
            };
            let key = match codec.decode(&key_bytes) {
                Ok(k) => k,
                Err(e) => {
                    warn!(tag, error = %e, "undecodable key in index, skipping");
                    continue;
                }
            };

            match self.get(&*key, codec) {
                Ok(Some((value, location))) => out.push(StoredEntry {
                    tag,
                    key_text: key.to_string(),
                    value,
                    location,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "unreadable record, skipping");
                }
            }
        }

        Ok(out)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn file_mut(&mut self, loc: Location) -> Result<&mut DataFile> {
        self.classes
            .get_mut(loc.size_class as usize)
            .and_then(|c| c.file_mut(loc.file_no))
            .ok_or_else(|| GridError::Storage(format!("no open file at {}", loc)))
    }
}
