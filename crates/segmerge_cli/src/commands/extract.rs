//! Extract command implementation.

use segmerge_core::DumpDirectory;
use segmerge_extract::{ExtractOptions, Extractor};
use std::fs;
use std::path::Path;
use tracing::info;

/// Parses a load address given in hex, with or without a `0x` prefix.
pub fn parse_address(text: &str) -> Result<u64, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|err| format!("invalid load address {text:?}: {err}"))
}

/// Runs the extract command, creating the dump directory if needed.
pub fn run(
    path: &Path,
    input: &Path,
    options: &ExtractOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    fs::create_dir_all(path)?;
    let dir = DumpDirectory::open(path)?;
    let mut store = dir.store()?;

    info!(input = %input.display(), path = %path.display(), "extracting firmware");
    let report = Extractor::new(options.clone()).extract(&mut store, &data)?;

    println!("Extracted {}", input.display());
    println!("  Input:    {} bytes", report.input_bytes);
    println!("  Payload:  {} bytes", report.payload_bytes);
    if report.records > 0 {
        println!("  Records:  {}", report.records);
    }
    println!(
        "  Segments: {} ({} bytes)",
        report.segments.len(),
        report.output_bytes()
    );
    for segment in &report.segments {
        println!("    {:#010x}  {:#x} bytes", segment.address, segment.length);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifacts(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".bin"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn address_with_or_without_prefix() {
        assert_eq!(parse_address("0x8000").unwrap(), 0x8000);
        assert_eq!(parse_address("8000").unwrap(), 0x8000);
        assert_eq!(parse_address("0XfF").unwrap(), 0xff);
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn srecord_file_becomes_artifacts() {
        let work = tempdir().unwrap();
        let input = work.path().join("update.s19");
        fs::write(
            &input,
            "S3090000100001020304DC\nS307000010040506D9\nS3060000200009D0\n",
        )
        .unwrap();
        let dumps = work.path().join("dumps");

        run(&dumps, &input, &ExtractOptions::new()).unwrap();

        assert_eq!(artifacts(&dumps), vec!["1000.bin", "2000.bin"]);
        assert_eq!(fs::read(dumps.join("1000.bin")).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn bad_checksum_creates_no_artifacts() {
        let work = tempdir().unwrap();
        let input = work.path().join("update.s19");
        fs::write(&input, "S3090000100001020304DC\nS3060000200009D1\n").unwrap();
        let dumps = work.path().join("dumps");

        let err = run(&dumps, &input, &ExtractOptions::new()).unwrap_err();

        assert!(err.to_string().contains("checksum"));
        assert!(artifacts(&dumps).is_empty());
    }

    #[test]
    fn raw_payload_at_load_address() {
        let work = tempdir().unwrap();
        let input = work.path().join("boot.img");
        fs::write(&input, b"\x7fELF").unwrap();
        let dumps = work.path().join("dumps");

        run(&dumps, &input, &ExtractOptions::new().load_address(0xbfc0_0000)).unwrap();

        assert_eq!(artifacts(&dumps), vec!["bfc00000.bin"]);
    }
}
