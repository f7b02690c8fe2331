//! Assemble command implementation.

use super::load_table;
use segmerge_core::{assemble, DumpDirectory, FlatImage, SegmentCondenser};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Returns `<output>.json`, keeping any extension `output` already has.
pub fn default_manifest_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".json");
    PathBuf::from(name)
}

/// Runs the assemble command.
///
/// Regions are taken as they currently are on disk; run `condense` first
/// to get the fewest, largest regions.
pub fn run(
    path: &Path,
    output: &Path,
    manifest_path: &Path,
    table: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if manifest_path == output {
        return Err(format!(
            "manifest path {} would overwrite the image",
            manifest_path.display()
        )
        .into());
    }

    let table = load_table(table)?;
    let dir = DumpDirectory::open(path)?;
    let store = dir.store()?;

    let condenser = SegmentCondenser::with_defaults().with_table(table);
    let regions = condenser.scan(&store)?;

    let mut image = FlatImage::new();
    assemble(&store, &regions, condenser.table(), &mut image)?;
    let manifest = image.manifest();

    fs::write(output, image.data())?;
    fs::write(manifest_path, manifest.to_json()?)?;
    info!(
        image = %output.display(),
        manifest = %manifest_path.display(),
        "wrote image"
    );

    println!("Assembled {} segments", manifest.segments.len());
    println!("  Image:    {} ({} bytes)", output.display(), manifest.image_size);
    println!("  Manifest: {}", manifest_path.display());
    println!("  SHA-256:  {}", manifest.sha256);

    Ok(())
}
