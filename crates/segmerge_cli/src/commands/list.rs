//! List command implementation.

use super::load_table;
use segmerge_core::{find_adjacent, SegmentCondenser};
use segmerge_store::DirectoryStore;
use serde::Serialize;
use std::path::Path;

/// One listed segment.
#[derive(Debug, Serialize)]
pub struct ListedSegment {
    /// Load address.
    pub address: u64,
    /// Exclusive end address.
    pub end: u64,
    /// Length in bytes.
    pub length: u64,
    /// Permissions as `rwx` flags.
    pub permissions: String,
    /// Name from the segment table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Listing result.
#[derive(Debug, Serialize)]
pub struct ListResult {
    /// Dump directory path.
    pub path: String,
    /// Segments in address order.
    pub segments: Vec<ListedSegment>,
    /// Total bytes across all segments.
    pub total_bytes: u64,
    /// Whether any adjacent pair could still be merged.
    pub condensable: bool,
}

/// Runs the list command.
pub fn run(
    path: &Path,
    table: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(table)?;
    let store = DirectoryStore::open(path)?;
    let condenser = SegmentCondenser::with_defaults().with_table(table);
    let regions = condenser.scan(&store)?;

    let result = ListResult {
        path: path.display().to_string(),
        segments: regions
            .iter()
            .map(|region| ListedSegment {
                address: region.start(),
                end: region.end(),
                length: region.length(),
                permissions: region.permissions().to_string(),
                name: condenser.table().name_for(region.start()).map(str::to_owned),
            })
            .collect(),
        total_bytes: regions.iter().map(|r| r.length()).sum(),
        condensable: find_adjacent(&regions).is_some(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format: {other}").into()),
    }

    Ok(())
}

fn print_text(result: &ListResult) {
    println!("Segments at {}", result.path);
    println!();
    for segment in &result.segments {
        println!(
            "  {:#010x} - {:#010x}  {:>10} bytes  {}  {}",
            segment.address,
            segment.end,
            segment.length,
            segment.permissions,
            segment.name.as_deref().unwrap_or("")
        );
    }
    println!();
    println!("  Segments:    {}", result.segments.len());
    println!("  Total bytes: {}", result.total_bytes);
    if result.condensable {
        println!("  Adjacent segments remain - run `condense` to merge them");
    }
}
