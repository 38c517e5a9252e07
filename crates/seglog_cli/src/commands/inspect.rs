//! Inspect command implementation.

use super::require_log_dir;
use seglog_core::{Config, Log, SegmentInfo};
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Lowest offset still held.
    pub lowest_offset: u64,
    /// Offset of the last record, if any.
    pub highest_offset: Option<u64>,
    /// Offset the next append will receive.
    pub next_offset: u64,
    /// Total bytes across all stores.
    pub store_bytes: u64,
    /// Total bytes across all indexes.
    pub index_bytes: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentStats>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// First offset of the segment.
    pub base_offset: u64,
    /// Offset after the segment's last record.
    pub next_offset: u64,
    /// Number of records.
    pub records: u64,
    /// Store size in bytes.
    pub store_bytes: u64,
    /// Used index size in bytes.
    pub index_bytes: u64,
}

impl From<SegmentInfo> for SegmentStats {
    fn from(info: SegmentInfo) -> Self {
        Self {
            base_offset: info.base_offset,
            next_offset: info.next_offset,
            records: info.record_count(),
            store_bytes: info.store_bytes,
            index_bytes: info.index_bytes,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, config: Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_log_dir(path)?;
    let result = inspect(path, config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, config: Config) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let log = Log::open(path, config)?;

    let segments: Vec<SegmentStats> = log.segments().into_iter().map(Into::into).collect();
    let result = InspectResult {
        path: path.display().to_string(),
        lowest_offset: log.lowest_offset(),
        highest_offset: log.highest_offset(),
        next_offset: log.next_offset(),
        store_bytes: segments.iter().map(|s| s.store_bytes).sum(),
        index_bytes: segments.iter().map(|s| s.index_bytes).sum(),
        segments,
    };

    log.close()?;
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Log: {}", result.path);
    println!("================");
    println!();
    println!("Offsets:");
    println!("  Lowest:       {}", result.lowest_offset);
    match result.highest_offset {
        Some(highest) => println!("  Highest:      {}", highest),
        None => println!("  Highest:      (empty)"),
    }
    println!("  Next:         {}", result.next_offset);
    println!();
    println!("Storage:");
    println!("  Stores:       {} bytes", result.store_bytes);
    println!("  Indexes:      {} bytes", result.index_bytes);
    println!();
    println!("Segments ({}):", result.segments.len());
    for segment in &result.segments {
        println!(
            "  [{:>10}, {:>10})  {:>8} records  store={} index={}",
            segment.base_offset,
            segment.next_offset,
            segment.records,
            segment.store_bytes,
            segment.index_bytes
        );
    }
}
