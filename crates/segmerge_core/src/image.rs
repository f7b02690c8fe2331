//! Image assembly.
//!
//! After condensation the final regions are handed to an image assembler,
//! which maps each region into whatever addressable image the downstream
//! tool consumes. [`ImageSink`] is that seam. [`FlatImage`] is the built-in
//! assembler: it concatenates region bytes into one flat file and records
//! where each region landed, the way disassembler loaders expect a parent
//! view plus a segment table.

use crate::error::{CoreError, CoreResult};
use crate::region::{Permissions, Region};
use crate::table::SegmentTable;
use segmerge_store::SegmentStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Placement of one region inside an assembled image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSegment {
    /// Segment name from the segment table, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Load address of the first byte.
    pub address: u64,
    /// Number of bytes.
    pub length: u64,
    /// Offset of the first byte inside the image file.
    pub file_offset: u64,
    /// Permission bits.
    pub permissions: Permissions,
}

/// Receiver of condensed regions.
///
/// Implementors map each region into their own addressable image or
/// segment table.
pub trait ImageSink {
    /// Adds one region and its bytes to the image.
    ///
    /// Returns where the region was placed.
    ///
    /// # Errors
    ///
    /// Returns an error if the region cannot be placed.
    fn add_segment(
        &mut self,
        region: &Region,
        name: Option<&str>,
        data: &[u8],
    ) -> CoreResult<ImageSegment>;
}

/// Reads the bytes backing `region`, checking they match its length.
///
/// # Errors
///
/// Returns `NotFound` if the artifact is missing and `LengthMismatch` if
/// its size drifted from the region.
pub fn read_region<S>(store: &S, region: &Region) -> CoreResult<Vec<u8>>
where
    S: SegmentStore + ?Sized,
{
    let data = store.read(region.start())?;
    if data.len() as u64 != region.length() {
        return Err(CoreError::LengthMismatch {
            address: region.start(),
            expected: region.length(),
            actual: data.len() as u64,
        });
    }
    Ok(data)
}

/// Feeds every region, in address order, to `sink`.
///
/// Names come from `table` when it has an entry for the region's start.
///
/// # Errors
///
/// Returns an error if a region cannot be read or the sink rejects it.
pub fn assemble<S, K>(
    store: &S,
    regions: &[Region],
    table: &SegmentTable,
    sink: &mut K,
) -> CoreResult<Vec<ImageSegment>>
where
    S: SegmentStore + ?Sized,
    K: ImageSink + ?Sized,
{
    let mut ordered: Vec<&Region> = regions.iter().collect();
    ordered.sort_by_key(|region| region.start());

    let mut placed = Vec::with_capacity(ordered.len());
    for region in ordered {
        let data = read_region(store, region)?;
        let segment = sink.add_segment(region, table.name_for(region.start()), &data)?;
        debug!(
            address = format_args!("{:#x}", segment.address),
            offset = segment.file_offset,
            length = segment.length,
            "placed segment"
        );
        placed.push(segment);
    }
    Ok(placed)
}

/// Segment table and digest describing a flat image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Total size of the image file.
    pub image_size: u64,
    /// Lower-case hex SHA-256 of the image file.
    pub sha256: String,
    /// Placement of every region, in address order.
    pub segments: Vec<ImageSegment>,
}

impl ImageManifest {
    /// Encodes the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(data: &[u8]) -> CoreResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// An image that lays regions out back to back in one buffer.
#[derive(Debug, Default)]
pub struct FlatImage {
    data: Vec<u8>,
    segments: Vec<ImageSegment>,
}

impl FlatImage {
    /// Creates an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image, returning its bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the placed segments.
    #[must_use]
    pub fn segments(&self) -> &[ImageSegment] {
        &self.segments
    }

    /// Returns the SHA-256 digest of the image bytes.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.data).into()
    }

    /// Builds the manifest describing this image.
    #[must_use]
    pub fn manifest(&self) -> ImageManifest {
        let sha256 = self
            .digest()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        ImageManifest {
            image_size: self.data.len() as u64,
            sha256,
            segments: self.segments.clone(),
        }
    }

    /// Returns the byte at a load address, if any region covers it.
    #[must_use]
    pub fn byte_at(&self, address: u64) -> Option<u8> {
        let segment = self
            .segments
            .iter()
            .find(|s| s.address <= address && address - s.address < s.length)?;
        let offset = segment.file_offset + (address - segment.address);
        self.data.get(usize::try_from(offset).ok()?).copied()
    }
}

impl ImageSink for FlatImage {
    fn add_segment(
        &mut self,
        region: &Region,
        name: Option<&str>,
        data: &[u8],
    ) -> CoreResult<ImageSegment> {
        if data.len() as u64 != region.length() {
            return Err(CoreError::LengthMismatch {
                address: region.start(),
                expected: region.length(),
                actual: data.len() as u64,
            });
        }

        let segment = ImageSegment {
            name: name.map(str::to_owned),
            address: region.start(),
            length: region.length(),
            file_offset: self.data.len() as u64,
            permissions: region.permissions(),
        };
        self.data.extend_from_slice(data);
        self.segments.push(segment.clone());
        Ok(segment)
    }
}
