//! segmerge CLI
//!
//! Command-line tools for condensing firmware segment dumps.
//!
//! # Commands
//!
//! - `list` - Display the segments found in a dump directory
//! - `condense` - Merge address-adjacent segments in place
//! - `assemble` - Write a flat image and its segment manifest
//! - `extract` - Unpack a firmware update into segment dumps
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use segmerge_extract::{ExtractOptions, PageLayout};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// segmerge firmware dump tools.
#[derive(Parser)]
#[command(name = "segmerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the segment dump directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the segments found in a dump directory
    List {
        /// Segment table (JSON) supplying names and permissions
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Merge address-adjacent segments in place
    Condense {
        /// Segment table (JSON) supplying names and permissions
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Dry run - show what would be merged
        #[arg(short, long)]
        dry_run: bool,

        /// Skip fsync after each append
        #[arg(long)]
        no_sync: bool,

        /// Stop after this many merges
        #[arg(long)]
        max_merges: Option<usize>,
    },

    /// Write a flat image and its segment manifest
    Assemble {
        /// Output image file
        #[arg(short, long)]
        output: PathBuf,

        /// Output manifest file (defaults to <output>.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Segment table (JSON) supplying names and permissions
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Unpack a firmware update into segment dumps
    Extract {
        /// Firmware update file
        input: PathBuf,

        /// Input is a printer job carrying the update in raster transfers
        #[arg(long)]
        pjl: bool,

        /// Payload is LZSS-compressed
        #[arg(long)]
        lzss: bool,

        /// Store the payload raw at this hex load address instead of
        /// decoding S-records
        #[arg(short, long, value_parser = commands::extract::parse_address)]
        address: Option<u64>,

        /// Ignore records before the first binary S0 header
        #[arg(long)]
        binary_only: bool,

        /// Strip the 64-byte spare area after every 2 KiB NAND page
        #[arg(long)]
        strip_spare: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::List { table, format } => {
            let path = cli.path.ok_or("Dump directory path required for list")?;
            commands::list::run(&path, table.as_deref(), &format)?;
        }
        Commands::Condense {
            table,
            dry_run,
            no_sync,
            max_merges,
        } => {
            let path = cli.path.ok_or("Dump directory path required for condense")?;
            let options = commands::condense::CondenseOptions {
                table,
                dry_run,
                sync: !no_sync,
                max_merges,
            };
            commands::condense::run(&path, &options)?;
        }
        Commands::Assemble {
            output,
            manifest,
            table,
        } => {
            let path = cli.path.ok_or("Dump directory path required for assemble")?;
            let manifest =
                manifest.unwrap_or_else(|| commands::assemble::default_manifest_path(&output));
            commands::assemble::run(&path, &output, &manifest, table.as_deref())?;
        }
        Commands::Extract {
            input,
            pjl,
            lzss,
            address,
            binary_only,
            strip_spare,
        } => {
            let path = cli.path.ok_or("Dump directory path required for extract")?;
            let mut options = ExtractOptions::new()
                .unwrap_pjl(pjl)
                .decompress(lzss)
                .binary_only(binary_only);
            if let Some(address) = address {
                options = options.load_address(address);
            }
            if strip_spare {
                options = options.page_layout(PageLayout::NAND_2K);
            }
            commands::extract::run(&path, &input, &options)?;
        }
        Commands::Version => {
            println!("segmerge CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("segmerge core v{}", segmerge_core::VERSION);
        }
    }

    Ok(())
}
