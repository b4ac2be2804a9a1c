//! Configuration for GridKV
//!
//! Centralized configuration with sensible defaults, passed by value at
//! engine construction and held immutably for the engine's lifetime.

use std::path::PathBuf;

/// What to do when the recovery scan finds the same logical key alive in
/// two grids (the crash window between writing a migrated copy and
/// tombstoning the original).
///
/// "Old" and "new" are decided by comparing the grids' write timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPolicy {
    /// Keep the new copy, zero the old grid on disk.
    DeleteOld,

    /// Keep the new copy, leave the old grid's bytes in place.
    IgnoreOld,

    /// Keep the old copy, zero the new grid on disk.
    DeleteNew,

    /// Keep the old copy, leave the new grid's bytes in place.
    IgnoreNew,
}

/// Main configuration for a GridKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding every grid file. Created if missing; assumed
    /// exclusively owned by one engine instance.
    pub working_dir: PathBuf,

    /// Grid file name template. `$(file_type)`, `$(file_no)`, `$(grid_num)`
    /// and `$(grid_size)` are substituted verbatim.
    pub file_name_template: String,

    /// Number of size classes (file types). Class n's grid size is
    /// `base_grid_size * growth_factor^n`.
    pub max_size_classes: u16,

    /// Maximum number of files per size class.
    pub max_files_per_class: u16,

    /// Payload capacity of a single file in bytes (excludes the header
    /// block). Grid count per class = file_size / grid_size.
    pub file_size: u64,

    /// Grid size of size class 0 in bytes.
    pub base_grid_size: u32,

    /// Grid size multiplier between consecutive size classes. Must be at
    /// least 2 so grid sizes are strictly increasing.
    pub growth_factor: u16,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Number of hash buckets in the key index.
    pub index_buckets: u32,

    /// Node arena capacity of the key index — the hard ceiling on live
    /// keys. Exceeding it fails inserts rather than growing.
    pub index_capacity: u32,

    // -------------------------------------------------------------------------
    // Behavior Flags
    // -------------------------------------------------------------------------
    /// Duplicate-key resolution applied during the recovery scan.
    pub repair_policy: RepairPolicy,

    /// On overwrite, migrate a record down to a smaller size class when
    /// the new value would fit one.
    pub shrink_when_possible: bool,

    /// On get, decode the stored key and report a mismatch against the
    /// requested key as a corrupt record.
    pub verify_key_on_get: bool,

    /// Same check before overwriting an existing record in place.
    pub verify_key_on_set: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./gridkv_data"),
            file_name_template: "grid_$(file_type)_$(file_no)_$(grid_num)_$(grid_size).dat"
                .to_string(),
            max_size_classes: 8,
            max_files_per_class: 16,
            file_size: 16 * 1024 * 1024, // 16 MB
            base_grid_size: 256,
            growth_factor: 2,
            index_buckets: 1024,
            index_capacity: 64 * 1024,
            repair_policy: RepairPolicy::DeleteOld,
            shrink_when_possible: true,
            verify_key_on_get: true,
            verify_key_on_set: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the working directory holding all grid files
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_dir = path.into();
        self
    }

    /// Set the grid file name template
    pub fn file_name_template(mut self, template: impl Into<String>) -> Self {
        self.config.file_name_template = template.into();
        self
    }

    /// Set the number of size classes
    pub fn max_size_classes(mut self, count: u16) -> Self {
        self.config.max_size_classes = count;
        self
    }

    /// Set the maximum number of files per size class
    pub fn max_files_per_class(mut self, count: u16) -> Self {
        self.config.max_files_per_class = count;
        self
    }

    /// Set the per-file payload capacity (in bytes)
    pub fn file_size(mut self, size: u64) -> Self {
        self.config.file_size = size;
        self
    }

    /// Set the grid size of size class 0 (in bytes)
    pub fn base_grid_size(mut self, size: u32) -> Self {
        self.config.base_grid_size = size;
        self
    }

    /// Set the grid size multiplier between consecutive classes
    pub fn growth_factor(mut self, factor: u16) -> Self {
        self.config.growth_factor = factor;
        self
    }

    /// Set the number of hash buckets in the key index
    pub fn index_buckets(mut self, count: u32) -> Self {
        self.config.index_buckets = count;
        self
    }

    /// Set the key index node capacity
    pub fn index_capacity(mut self, count: u32) -> Self {
        self.config.index_capacity = count;
        self
    }

    /// Set the duplicate-key repair policy used during recovery
    pub fn repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.config.repair_policy = policy;
        self
    }

    /// Enable or disable down-migration to smaller size classes
    pub fn shrink_when_possible(mut self, enabled: bool) -> Self {
        self.config.shrink_when_possible = enabled;
        self
    }

    /// Enable or disable the stored-key check on get
    pub fn verify_key_on_get(mut self, enabled: bool) -> Self {
        self.config.verify_key_on_get = enabled;
        self
    }

    /// Enable or disable the stored-key check on in-place overwrite
    pub fn verify_key_on_set(mut self, enabled: bool) -> Self {
        self.config.verify_key_on_set = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
