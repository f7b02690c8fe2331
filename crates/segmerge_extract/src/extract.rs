//! Firmware container extraction into segment artifacts.
//!
//! Extraction runs up to four stages over the input:
//!
//! 1. printer job unwrapping: concatenate raster transfer payloads
//! 2. LZSS decompression
//! 3. S-record decoding, coalescing data records into contiguous runs
//! 4. spare-area stripping of each run
//!
//! Each run becomes one artifact, created at its load address. Runs that
//! meet end to start are left for the condenser to merge.

use crate::error::{ExtractError, ExtractResult};
use crate::srecord::{from_binary_header, parse_srecords, SRecord};
use crate::{lzss, pjl};
use segmerge_store::{SegmentInfo, SegmentStore, StoreError};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// NAND page geometry: every page of data is followed by a spare area of
/// out-of-band bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    data: usize,
    spare: usize,
}

impl PageLayout {
    /// 2 KiB pages with 64 spare bytes.
    pub const NAND_2K: Self = Self {
        data: 0x800,
        spare: 0x40,
    };

    /// Creates a layout. Returns `None` for an empty data area.
    #[must_use]
    pub const fn new(data: usize, spare: usize) -> Option<Self> {
        if data == 0 {
            return None;
        }
        Some(Self { data, spare })
    }

    /// Bytes of data per page.
    #[must_use]
    pub const fn data(&self) -> usize {
        self.data
    }

    /// Bytes of spare area per page.
    #[must_use]
    pub const fn spare(&self) -> usize {
        self.spare
    }

    /// Drops the spare area after every page. A trailing partial page keeps
    /// at most one page of data.
    #[must_use]
    pub fn strip(&self, raw: &[u8]) -> Vec<u8> {
        raw.chunks(self.data + self.spare)
            .flat_map(|page| &page[..page.len().min(self.data)])
            .copied()
            .collect()
    }
}

/// A contiguous block of bytes loaded at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRun {
    /// Load address of the first byte.
    pub address: u64,
    /// The bytes.
    pub data: Vec<u8>,
}

impl DataRun {
    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.address + self.data.len() as u64
    }
}

/// Coalesces data records into contiguous runs, in stream order.
///
/// A record starting exactly where the current run ends extends it; any
/// other data record starts a new run. Records without data are ignored.
#[must_use]
pub fn data_runs(records: &[SRecord]) -> Vec<DataRun> {
    let mut runs: Vec<DataRun> = Vec::new();
    for record in records {
        if !record.kind.is_data() || record.data.is_empty() {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.end() == record.address => {
                run.data.extend_from_slice(&record.data);
            }
            _ => runs.push(DataRun {
                address: record.address,
                data: record.data.clone(),
            }),
        }
    }
    runs
}

/// Extraction options.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Unwrap a printer job before anything else.
    pub unwrap_pjl: bool,
    /// LZSS-decompress the payload.
    pub decompress: bool,
    /// Store the payload as one artifact at this address instead of
    /// decoding S-records.
    pub load_address: Option<u64>,
    /// Ignore records before the first binary-encoded header.
    pub binary_only: bool,
    /// Strip spare areas from every run.
    pub page_layout: Option<PageLayout>,
}

impl ExtractOptions {
    /// Creates options with every stage disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the input is a printer job.
    #[must_use]
    pub const fn unwrap_pjl(mut self, unwrap: bool) -> Self {
        self.unwrap_pjl = unwrap;
        self
    }

    /// Sets whether the payload is LZSS-compressed.
    #[must_use]
    pub const fn decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Stores the payload at `address` without decoding S-records.
    #[must_use]
    pub const fn load_address(mut self, address: u64) -> Self {
        self.load_address = Some(address);
        self
    }

    /// Sets whether records before the first binary header are ignored.
    #[must_use]
    pub const fn binary_only(mut self, binary_only: bool) -> Self {
        self.binary_only = binary_only;
        self
    }

    /// Strips spare areas laid out as `layout`.
    #[must_use]
    pub const fn page_layout(mut self, layout: PageLayout) -> Self {
        self.page_layout = Some(layout);
        self
    }
}

/// Result of an extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    /// Bytes read from the container.
    pub input_bytes: usize,
    /// Bytes left after unwrapping and decompression.
    pub payload_bytes: usize,
    /// S-records decoded (zero when a load address was given).
    pub records: usize,
    /// Artifacts created, sorted by address.
    pub segments: Vec<SegmentInfo>,
}

impl ExtractReport {
    /// Total bytes written across all artifacts.
    #[must_use]
    pub fn output_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.length).sum()
    }
}

/// Turns firmware containers into segment artifacts.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Applies the unwrapping and decompression stages.
    ///
    /// # Errors
    ///
    /// Returns an error if the printer job or LZSS stream is malformed.
    pub fn payload(&self, input: &[u8]) -> ExtractResult<Vec<u8>> {
        let mut payload = if self.options.unwrap_pjl {
            pjl::combine_sections(&pjl::parse_pjl(input)?)
        } else {
            input.to_vec()
        };
        if self.options.decompress {
            payload = lzss::decompress(&payload)?;
        }
        Ok(payload)
    }

    /// Decodes `input` into the runs that would be written, and the number
    /// of S-records decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails to decode.
    pub fn runs(&self, input: &[u8]) -> ExtractResult<(Vec<DataRun>, usize)> {
        self.decode(self.payload(input)?)
    }

    fn decode(&self, payload: Vec<u8>) -> ExtractResult<(Vec<DataRun>, usize)> {
        let (mut runs, records) = match self.options.load_address {
            Some(address) => (vec![DataRun { address, data: payload }], 0),
            None => {
                let records = parse_srecords(&payload)?;
                let selected = if self.options.binary_only {
                    from_binary_header(&records)
                } else {
                    &records
                };
                (data_runs(selected), records.len())
            }
        };

        if let Some(layout) = self.options.page_layout {
            for run in &mut runs {
                run.data = layout.strip(&run.data);
            }
        }

        runs.retain(|run| {
            if run.data.is_empty() {
                warn!(address = format_args!("{:#x}", run.address), "dropping empty run");
            }
            !run.data.is_empty()
        });
        Ok((runs, records))
    }

    /// Extracts `input` into `store`, one artifact per run.
    ///
    /// Nothing is written unless every run decodes and no run's address is
    /// already taken, in the store or by an earlier run.
    ///
    /// # Errors
    ///
    /// Returns a decoding error, `AlreadyExists` for a colliding address,
    /// or a store error from creating an artifact.
    pub fn extract<S>(&self, store: &mut S, input: &[u8]) -> ExtractResult<ExtractReport>
    where
        S: SegmentStore + ?Sized,
    {
        let payload = self.payload(input)?;
        let payload_bytes = payload.len();
        let (runs, records) = self.decode(payload)?;

        let mut taken: BTreeSet<u64> = store
            .list_segments()?
            .into_iter()
            .map(|segment| segment.address)
            .collect();
        for run in &runs {
            if !taken.insert(run.address) {
                return Err(ExtractError::Store(StoreError::AlreadyExists {
                    address: run.address,
                }));
            }
        }

        let mut segments = Vec::with_capacity(runs.len());
        for run in &runs {
            store.create(run.address, &run.data)?;
            debug!(
                address = format_args!("{:#x}", run.address),
                bytes = run.data.len(),
                "created segment"
            );
            segments.push(SegmentInfo::new(run.address, run.data.len() as u64));
        }
        segments.sort();

        info!(
            records,
            segments = segments.len(),
            "extracted firmware segments"
        );

        Ok(ExtractReport {
            input_bytes: input.len(),
            payload_bytes,
            records,
            segments,
        })
    }
}
