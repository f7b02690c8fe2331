//! CLI command implementations.

pub mod assemble;
pub mod condense;
pub mod extract;
pub mod list;

use segmerge_core::SegmentTable;
use std::path::Path;

/// Loads the optional segment table given on the command line.
pub fn load_table(path: Option<&Path>) -> Result<SegmentTable, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(SegmentTable::load(path)?),
        None => Ok(SegmentTable::new()),
    }
}
