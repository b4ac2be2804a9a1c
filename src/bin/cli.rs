//! GridKV Demo CLI
//!
//! Drives a local GridStore directly: set/get/delete for the standard
//! integer and string key types, plus a full data dump.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use gridkv::{Config, GridStore, IntKey, KeyRegistry, StoreKey, StrKey};

/// GridKV CLI
#[derive(Parser, Debug)]
#[command(name = "gridkv-cli")]
#[command(about = "Embedded grid-slot key-value store")]
#[command(version)]
struct Args {
    /// Working directory holding the grid files
    #[arg(short, long, default_value = "./gridkv_data")]
    working_dir: String,

    /// Number of size classes
    #[arg(long, default_value = "4")]
    size_classes: u16,

    /// Maximum files per size class
    #[arg(long, default_value = "4")]
    files_per_class: u16,

    /// Per-file payload capacity in bytes
    #[arg(long, default_value = "1048576")]
    file_size: u64,

    /// Grid size of size class 0 in bytes
    #[arg(long, default_value = "256")]
    base_grid_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a value under an integer key
    SetInt { key: i64, value: String },

    /// Fetch the value stored under an integer key
    GetInt { key: i64 },

    /// Delete an integer key
    DelInt { key: i64 },

    /// Store a value under a string key
    SetStr { key: String, value: String },

    /// Fetch the value stored under a string key
    GetStr { key: String },

    /// Delete a string key
    DelStr { key: String },

    /// Print every live record with its location
    Dump,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let config = Config::builder()
        .working_dir(&args.working_dir)
        .max_size_classes(args.size_classes)
        .max_files_per_class(args.files_per_class)
        .file_size(args.file_size)
        .base_grid_size(args.base_grid_size)
        .build();

    let store = match GridStore::open(config, KeyRegistry::with_standard_types()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = match &args.command {
        Commands::SetInt { key, value } => set(&store, &IntKey(*key), value),
        Commands::GetInt { key } => get(&store, &IntKey(*key)),
        Commands::DelInt { key } => del(&store, &IntKey(*key)),
        Commands::SetStr { key, value } => set(&store, &StrKey::new(key.clone()), value),
        Commands::GetStr { key } => get(&store, &StrKey::new(key.clone())),
        Commands::DelStr { key } => del(&store, &StrKey::new(key.clone())),
        Commands::Dump => dump(&store),
    };

    if let Err(e) = outcome {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn set(store: &GridStore, key: &dyn StoreKey, value: &str) -> gridkv::Result<()> {
    let location = store.put(key, value.as_bytes(), 0)?;
    println!(
        "key {} (value: {}, vlen: {}) stored at {} (handle {:#018x})",
        key,
        value,
        value.len(),
        location,
        location.to_handle()
    );
    Ok(())
}

fn get(store: &GridStore, key: &dyn StoreKey) -> gridkv::Result<()> {
    match store.get(key)? {
        Some((value, location)) => {
            println!(
                "key {} (value: {}, vlen: {}) stored at {} (handle {:#018x})",
                key,
                String::from_utf8_lossy(&value),
                value.len(),
                location,
                location.to_handle()
            );
            Ok(())
        }
        None => {
            eprintln!("key {} not found", key);
            std::process::exit(1);
        }
    }
}

fn del(store: &GridStore, key: &dyn StoreKey) -> gridkv::Result<()> {
    store.delete(key)?;
    println!("deleted key {}", key);
    Ok(())
}

fn dump(store: &GridStore) -> gridkv::Result<()> {
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("store is empty");
        return Ok(());
    }

    for entry in entries {
        println!(
            "key {} (type: {}, value: {}, vlen: {}) stored at {}",
            entry.key_text,
            entry.tag,
            String::from_utf8_lossy(&entry.value),
            entry.value.len(),
            entry.location
        );
    }

    Ok(())
}
