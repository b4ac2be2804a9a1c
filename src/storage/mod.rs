//! Storage Module
//!
//! On-disk grid files: a fixed header block followed by a fixed number
//! of fixed-size grids, pre-allocated to full capacity at creation.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header block (1024 bytes)                                    │
//! │ ┌───────────┬─────────┬────────────┬────────────┬─────────┐  │
//! │ │FileType(2)│FileNo(2)│ GridNum(4) │GridSize(4) │ CRC (4) │  │
//! │ └───────────┴─────────┴────────────┴────────────┴─────────┘  │
//! │   ... zero padding to 1024 ...                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Grid 0 (grid_size bytes)                                     │
//! │ ┌──────────────────┬───────┬─────────┬─────┬────────┬─────┐  │
//! │ │ WriteTime(4)+pad │Tag (1)│KeyLen(2)│ Key │VLen(2) │Value│  │
//! │ └──────────────────┴───────┴─────────┴─────┴────────┴─────┘  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Grid 1 ... Grid grid_num-1                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A grid with tag 0 (or zero key/value length) is logically empty
//! regardless of what its file's tracker says.

mod layout;
mod file;
mod class;

pub use layout::{
    decode_record, encode_record, encoded_len, expand_file_name, DecodedRecord, FileHeader,
    FILE_HEADER_SIZE, GRID_HEADER_SIZE, RECORD_OVERHEAD,
};
pub use file::{DataFile, GROUP_COUNT, GROUP_IDLE, GROUP_USED};
pub use class::SizeClass;
