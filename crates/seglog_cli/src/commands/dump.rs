//! Dump command implementation.

use super::{hex_encode, require_log_dir};
use seglog_core::{Config, Log};
use seglog_storage::Store;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Record offset, or store position in raw mode.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: usize,
    /// Payload as UTF-8 if it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Payload hex-encoded otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl RecordInfo {
    fn new(offset: u64, value: &[u8]) -> Self {
        let text = std::str::from_utf8(value).ok().map(str::to_string);
        let hex = text.is_none().then(|| hex_encode(value));
        Self {
            offset,
            size: value.len(),
            text,
            hex,
        }
    }
}

/// Runs the dump command over the log's offset range.
pub fn run(
    path: &Path,
    config: Config,
    start_offset: u64,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_log_dir(path)?;
    let records = read_records(path, config, start_offset, limit)?;
    print_records(&records, "Records", format)
}

/// Runs the dump command directly over every store file, ignoring indexes.
pub fn run_raw(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_log_dir(path)?;

    let mut stores: Vec<(u64, std::path::PathBuf)> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("store"))
        .filter_map(|p| {
            let base = p.file_stem()?.to_str()?.parse::<u64>().ok()?;
            Some((base, p))
        })
        .collect();
    stores.sort();

    for (base, store_path) in stores {
        let store = Store::open(&store_path)?;
        let records: Vec<RecordInfo> = store
            .scan()?
            .into_iter()
            .map(|(position, value)| RecordInfo::new(position, &value))
            .collect();
        store.close()?;

        print_records(&records, &format!("Store {}", base), format)?;
    }

    Ok(())
}

fn read_records(
    path: &Path,
    config: Config,
    start_offset: u64,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let log = Log::open(path, config)?;

    let start = start_offset.max(log.lowest_offset());
    let end = log.next_offset();
    let mut records = Vec::new();

    for offset in start..end {
        if limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
        let record = log.read(offset)?;
        records.push(RecordInfo::new(record.offset, &record.value));
    }

    log.close()?;
    Ok(records)
}

fn print_records(
    records: &[RecordInfo],
    title: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        _ => {
            println!("{} ({} total)", title, records.len());
            println!("================");
            for record in records {
                print!("[{:08}] {:>6} bytes", record.offset, record.size);
                if let Some(ref text) = record.text {
                    print!("  {:?}", text);
                }
                if let Some(ref hex) = record.hex {
                    print!("  0x{}", hex);
                }
                println!();
            }
        }
    }
    Ok(())
}
