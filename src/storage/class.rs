//! SizeClass
//!
//! One tier of grid files sharing a single grid size, with a bounded
//! array of lazily created files.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::file::DataFile;
use super::layout::{expand_file_name, FileHeader};

/// Geometry and open files of one size class (file type).
pub struct SizeClass {
    ordinal: u16,
    grid_size: u32,
    grid_count: u32,
    pub(crate) files: Vec<Option<DataFile>>,
}

impl SizeClass {
    pub fn new(ordinal: u16, grid_size: u32, grid_count: u32, max_files: u16) -> Self {
        let mut files = Vec::with_capacity(max_files as usize);
        files.resize_with(max_files as usize, || None);

        Self {
            ordinal,
            grid_size,
            grid_count,
            files,
        }
    }

    pub fn ordinal(&self) -> u16 {
        self.ordinal
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn grid_count(&self) -> u32 {
        self.grid_count
    }

    /// The header every file of this class must carry for `file_no`.
    pub fn header_for(&self, file_no: u16) -> FileHeader {
        FileHeader {
            file_type: self.ordinal,
            file_no,
            grid_count: self.grid_count,
            grid_size: self.grid_size,
        }
    }

    /// Path of file `file_no`, from the configured name template.
    pub fn file_path(&self, working_dir: &Path, template: &str, file_no: u16) -> PathBuf {
        working_dir.join(expand_file_name(template, &self.header_for(file_no)))
    }

    /// Create file `file_no` lazily, pre-truncated to full capacity.
    pub fn create_file(&mut self, working_dir: &Path, template: &str, file_no: u16) -> Result<()> {
        let path = self.file_path(working_dir, template, file_no);
        let file = DataFile::create(&path, self.header_for(file_no))?;
        self.files[file_no as usize] = Some(file);
        Ok(())
    }

    pub fn file(&self, file_no: u16) -> Option<&DataFile> {
        self.files.get(file_no as usize)?.as_ref()
    }

    pub fn file_mut(&mut self, file_no: u16) -> Option<&mut DataFile> {
        self.files.get_mut(file_no as usize)?.as_mut()
    }
}
