//! Condense command implementation.

use super::load_table;
use segmerge_core::{CondenseConfig, CondenseReport, DumpDirectory, SegmentCondenser};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for the condense command.
#[derive(Debug, Clone)]
pub struct CondenseOptions {
    /// Optional segment table path.
    pub table: Option<PathBuf>,
    /// Plan only, do not touch any artifact.
    pub dry_run: bool,
    /// Sync each append before deleting the absorbed artifact.
    pub sync: bool,
    /// Optional merge cap.
    pub max_merges: Option<usize>,
}

/// Runs the condense command.
pub fn run(path: &Path, options: &CondenseOptions) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(options.table.as_deref())?;

    let mut config = CondenseConfig::new().sync_writes(options.sync);
    if let Some(limit) = options.max_merges {
        config = config.max_merges(limit);
    }
    let condenser = SegmentCondenser::new(config).with_table(table);

    println!("Condensing segments at {}", path.display());
    if options.dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let dir = DumpDirectory::open(path)?;
    let mut store = dir.store()?;

    let report = if options.dry_run {
        condenser.plan(&store)?
    } else {
        info!(path = %path.display(), "condensing dump directory");
        match condenser.condense(&mut store) {
            Ok(report) => report,
            Err(err) => {
                if let Some(absorbed) = err.pending_delete() {
                    eprintln!(
                        "Segment {absorbed:#x} was merged but not removed; delete it before re-running"
                    );
                }
                return Err(err.into());
            }
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &CondenseReport) {
    for step in &report.merges {
        println!(
            "  {} {:#010x} into {:#010x} ({} bytes, now ends at {:#010x})",
            if report.dry_run { "would merge" } else { "merged" },
            step.absorbed,
            step.target,
            step.absorbed_length,
            step.end
        );
    }
    if !report.merges.is_empty() {
        println!();
    }

    println!("Condensation Summary:");
    println!("  Input segments:  {}", report.input_regions);
    println!("  Output segments: {}", report.regions.len());
    println!("  Merges:          {}", report.merges.len());
    println!("  Bytes in:        {}", report.input_bytes);
    println!("  Bytes out:       {}", report.output_bytes());

    if !report.complete {
        println!();
        println!("Merge limit reached - adjacent segments remain");
    } else if report.merges.is_empty() {
        println!();
        println!("No condensation needed - segments are already minimal");
    }
}
