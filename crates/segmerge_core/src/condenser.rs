//! Segment condensation.
//!
//! Condensation merges address-adjacent regions into single larger regions
//! until no two remaining regions touch. Each merge appends the higher
//! region's bytes to the lower region's artifact and then deletes the
//! higher artifact. This module provides the [`SegmentCondenser`] that
//! drives this process.
//!
//! ## Invariants
//!
//! - Condensation **MUST NOT** create, drop or reorder bytes
//! - A region's start address never changes; merges only extend forward
//! - The absorbed artifact is deleted only after the append to the
//!   receiving artifact fully succeeded
//! - Overlapping regions are an error, never silently skipped
//! - Regions with different permissions are never merged
//!
//! ## Algorithm
//!
//! Scan the store, sort by start address, find the first pair where
//! `a.end == b.start`, merge it, then rescan from the top. A run of `n`
//! regions performs at most `n - 1` merges.

use crate::config::CondenseConfig;
use crate::error::{CoreError, CoreResult};
use crate::region::Region;
use crate::table::SegmentTable;
use segmerge_store::SegmentStore;
use tracing::{debug, info, warn};

/// One merge performed (or planned) during condensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStep {
    /// Start of the region that received the bytes.
    pub target: u64,
    /// Start of the region that was absorbed and deleted.
    pub absorbed: u64,
    /// Number of bytes moved.
    pub absorbed_length: u64,
    /// Exclusive end of the target region after the merge.
    pub end: u64,
}

/// Result of a condensation run.
#[derive(Debug, Clone)]
pub struct CondenseReport {
    /// Number of regions before condensation.
    pub input_regions: usize,
    /// Total bytes across all input regions.
    pub input_bytes: u64,
    /// Final region list, sorted by start address.
    pub regions: Vec<Region>,
    /// Merges in the order they were performed.
    pub merges: Vec<MergeStep>,
    /// False if the run stopped at the merge cap with adjacent pairs left.
    pub complete: bool,
    /// True if the run was planned without touching the store.
    pub dry_run: bool,
}

impl CondenseReport {
    /// Total bytes across all output regions.
    #[must_use]
    pub fn output_bytes(&self) -> u64 {
        total_bytes(&self.regions)
    }
}

/// Condenser for firmware segment artifacts.
///
/// ## Example
///
/// ```rust
/// use segmerge_core::{CondenseConfig, SegmentCondenser};
/// use segmerge_store::InMemoryStore;
///
/// let mut store = InMemoryStore::with_segments([
///     (0x1000, vec![1; 0x10]),
///     (0x1010, vec![2; 0x10]),
///     (0x1020, vec![3; 0x10]),
/// ]);
///
/// let condenser = SegmentCondenser::new(CondenseConfig::new().sync_writes(false));
/// let report = condenser.condense(&mut store).unwrap();
/// assert_eq!(report.merges.len(), 2);
/// assert_eq!(report.regions[0].length(), 0x30);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SegmentCondenser {
    config: CondenseConfig,
    table: SegmentTable,
}

impl SegmentCondenser {
    /// Creates a new condenser with the given configuration.
    #[must_use]
    pub fn new(config: CondenseConfig) -> Self {
        Self {
            config,
            table: SegmentTable::new(),
        }
    }

    /// Creates a condenser with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CondenseConfig::default())
    }

    /// Attaches per-segment metadata used to assign permissions.
    #[must_use]
    pub fn with_table(mut self, table: SegmentTable) -> Self {
        self.table = table;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CondenseConfig {
        &self.config
    }

    /// Returns the segment table.
    #[must_use]
    pub fn table(&self) -> &SegmentTable {
        &self.table
    }

    /// Discovers the current regions in `store`, sorted by start address.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails, an artifact is empty or
    /// overflows the address space, or two regions overlap.
    pub fn scan<S>(&self, store: &S) -> CoreResult<Vec<Region>>
    where
        S: SegmentStore + ?Sized,
    {
        let mut regions = store
            .list_segments()?
            .into_iter()
            .map(|segment| {
                let permissions = self
                    .table
                    .permissions_for(segment.address, self.config.default_permissions);
                Region::new(segment.address, segment.length, permissions)
            })
            .collect::<CoreResult<Vec<_>>>()?;

        regions.sort_by_key(Region::start);
        check_overlaps(&regions)?;

        debug!(count = regions.len(), "scanned regions");
        Ok(regions)
    }

    /// Plans condensation without touching the store.
    ///
    /// The returned report lists the merges [`Self::condense`] would
    /// perform on the store's current contents.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning fails.
    pub fn plan<S>(&self, store: &S) -> CoreResult<CondenseReport>
    where
        S: SegmentStore + ?Sized,
    {
        let regions = self.scan(store)?;
        let input_regions = regions.len();
        let input_bytes = total_bytes(&regions);

        let (regions, merges, complete) = condense_within(regions, self.merge_limit(input_regions));

        Ok(CondenseReport {
            input_regions,
            input_bytes,
            regions,
            merges,
            complete,
            dry_run: true,
        })
    }

    /// Condenses the store in place.
    ///
    /// Repeatedly merges the first adjacent pair and rescans, until no
    /// adjacent pair remains or the configured merge cap is reached.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run. Merges completed before the failure
    /// stay in place; the failing merge never loses bytes. See
    /// [`CoreError::IncompleteMerge`] for a failure after the append.
    pub fn condense<S>(&self, store: &mut S) -> CoreResult<CondenseReport>
    where
        S: SegmentStore + ?Sized,
    {
        let mut regions = self.scan(&*store)?;
        let input_regions = regions.len();
        let input_bytes = total_bytes(&regions);
        let limit = self.merge_limit(input_regions);

        let mut merges = Vec::new();
        let complete = loop {
            let Some(index) = find_adjacent(&regions) else {
                break true;
            };
            if merges.len() >= limit {
                break false;
            }

            let step = self.merge(&mut *store, &regions[index], &regions[index + 1])?;
            merges.push(step);

            regions = self.scan(&*store)?;
            verify_step(&regions, &step)?;
        };

        info!(
            input = input_regions,
            output = regions.len(),
            merges = merges.len(),
            complete,
            "condensation finished"
        );

        Ok(CondenseReport {
            input_regions,
            input_bytes,
            regions,
            merges,
            complete,
            dry_run: false,
        })
    }

    /// Moves `next`'s bytes onto the end of `target` and deletes `next`.
    fn merge<S>(&self, store: &mut S, target: &Region, next: &Region) -> CoreResult<MergeStep>
    where
        S: SegmentStore + ?Sized,
    {
        let data = store.read(next.start())?;
        if data.len() as u64 != next.length() {
            return Err(CoreError::LengthMismatch {
                address: next.start(),
                expected: next.length(),
                actual: data.len() as u64,
            });
        }

        let new_length = store.append(target.start(), &data)?;
        let expected = target.length() + next.length();
        if new_length != expected {
            return Err(CoreError::LengthMismatch {
                address: target.start(),
                expected,
                actual: new_length,
            });
        }

        let incomplete = |source| CoreError::IncompleteMerge {
            target: target.start(),
            absorbed: next.start(),
            source,
        };

        if self.config.sync_writes {
            store.sync(target.start()).map_err(incomplete)?;
        }

        if let Err(err) = store.delete(next.start()) {
            warn!(
                base = format_args!("{:#x}", target.start()),
                absorbed = format_args!("{:#x}", next.start()),
                error = %err,
                "appended bytes but could not delete absorbed segment"
            );
            return Err(incomplete(err));
        }

        info!(
            base = format_args!("{:#x}", target.start()),
            absorbed = format_args!("{:#x}", next.start()),
            bytes = next.length(),
            "merged segment"
        );

        Ok(MergeStep {
            target: target.start(),
            absorbed: next.start(),
            absorbed_length: next.length(),
            end: next.end(),
        })
    }

    /// `n` regions allow at most `n - 1` merges.
    fn merge_limit(&self, input_regions: usize) -> usize {
        let bound = input_regions.saturating_sub(1);
        self.config.max_merges.map_or(bound, |cap| cap.min(bound))
    }
}

/// Returns the index of the first region whose successor starts exactly at
/// its end and carries the same permissions.
///
/// `regions` must be sorted by start address.
#[must_use]
pub fn find_adjacent(regions: &[Region]) -> Option<usize> {
    regions.windows(2).position(|pair| {
        pair[0].touches(&pair[1]) && pair[0].permissions() == pair[1].permissions()
    })
}

/// Verifies that no two regions overlap.
///
/// `regions` must be sorted by start address.
///
/// # Errors
///
/// Returns `Overlap` for the first overlapping pair.
pub fn check_overlaps(regions: &[Region]) -> CoreResult<()> {
    for pair in regions.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if first.end() > second.start() {
            return Err(CoreError::Overlap {
                first_start: first.start(),
                first_end: first.end(),
                second_start: second.start(),
                second_end: second.end(),
            });
        }
    }
    Ok(())
}

/// Condenses a sorted, non-overlapping region list in memory.
///
/// Returns the final regions and the merges in the order performed.
#[must_use]
pub fn condense_regions(regions: Vec<Region>) -> (Vec<Region>, Vec<MergeStep>) {
    let limit = regions.len().saturating_sub(1);
    let (regions, merges, _) = condense_within(regions, limit);
    (regions, merges)
}

fn condense_within(mut regions: Vec<Region>, limit: usize) -> (Vec<Region>, Vec<MergeStep>, bool) {
    let mut merges = Vec::new();
    let complete = loop {
        let Some(index) = find_adjacent(&regions) else {
            break true;
        };
        if merges.len() >= limit {
            break false;
        }

        let next = regions.remove(index + 1);
        let target = &mut regions[index];
        target.absorb(&next);
        merges.push(MergeStep {
            target: target.start(),
            absorbed: next.start(),
            absorbed_length: next.length(),
            end: target.end(),
        });
    };
    (regions, merges, complete)
}

/// Checks that the rescanned store reflects the merge that was just made.
fn verify_step(regions: &[Region], step: &MergeStep) -> CoreResult<()> {
    let merged = regions
        .iter()
        .find(|region| region.start() == step.target)
        .ok_or(CoreError::Store(segmerge_store::StoreError::NotFound {
            address: step.target,
        }))?;

    if merged.end() != step.end {
        return Err(CoreError::LengthMismatch {
            address: step.target,
            expected: step.end - step.target,
            actual: merged.length(),
        });
    }
    Ok(())
}

fn total_bytes(regions: &[Region]) -> u64 {
    regions.iter().map(Region::length).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Permissions;
    use crate::table::SegmentEntry;
    use proptest::prelude::*;
    use proptest::sample::Index;
    use segmerge_store::{InMemoryStore, StoreError};

    fn condenser() -> SegmentCondenser {
        SegmentCondenser::new(CondenseConfig::new().sync_writes(false))
    }

    fn region(start: u64, length: u64) -> Region {
        Region::new(start, length, Permissions::ALL).unwrap()
    }

    fn filled(len: usize, fill: u8) -> Vec<u8> {
        vec![fill; len]
    }

    #[test]
    fn two_adjacent_segments_merge() {
        let mut store =
            InMemoryStore::with_segments([(0x1000, filled(0x10, 1)), (0x1010, filled(0x20, 2))]);

        let report = condenser().condense(&mut store).unwrap();

        assert_eq!(report.regions, vec![region(0x1000, 0x30)]);
        assert!(report.complete);
        assert!(store.read(0x1010).unwrap_err().is_not_found());

        let mut expected = filled(0x10, 1);
        expected.extend(filled(0x20, 2));
        assert_eq!(store.read(0x1000).unwrap(), expected);
    }

    #[test]
    fn gap_prevents_merge() {
        let mut store =
            InMemoryStore::with_segments([(0x1000, filled(0x10, 1)), (0x1020, filled(0x10, 2))]);

        let report = condenser().condense(&mut store).unwrap();

        assert!(report.merges.is_empty());
        assert_eq!(report.regions, vec![region(0x1000, 0x10), region(0x1020, 0x10)]);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn chain_of_three_condenses_to_one() {
        let mut store = InMemoryStore::with_segments([
            (0x1000, filled(0x10, 1)),
            (0x1010, filled(0x10, 2)),
            (0x1020, filled(0x10, 3)),
        ]);

        let report = condenser().condense(&mut store).unwrap();

        assert_eq!(report.regions, vec![region(0x1000, 0x30)]);
        assert_eq!(
            report.merges,
            vec![
                MergeStep {
                    target: 0x1000,
                    absorbed: 0x1010,
                    absorbed_length: 0x10,
                    end: 0x1020,
                },
                MergeStep {
                    target: 0x1000,
                    absorbed: 0x1020,
                    absorbed_length: 0x10,
                    end: 0x1030,
                },
            ]
        );
    }

    #[test]
    fn overlap_is_an_error() {
        let mut store =
            InMemoryStore::with_segments([(0x3000, filled(0x20, 1)), (0x3010, filled(0x10, 2))]);

        let err = condenser().condense(&mut store).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Overlap {
                first_start: 0x3000,
                first_end: 0x3020,
                second_start: 0x3010,
                second_end: 0x3020,
            }
        ));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn empty_segment_is_an_error() {
        let store = InMemoryStore::with_segments([(0x1000, Vec::new())]);
        let err = condenser().scan(&store).unwrap_err();
        assert!(matches!(err, CoreError::EmptyRegion { address: 0x1000 }));
    }

    #[test]
    fn empty_store_condenses_to_nothing() {
        let mut store = InMemoryStore::new();
        let report = condenser().condense(&mut store).unwrap();
        assert!(report.regions.is_empty());
        assert!(report.complete);
        assert_eq!(report.input_regions, 0);
    }

    #[test]
    fn differing_permissions_stay_separate() {
        let table = SegmentTable::from_entries(vec![
            SegmentEntry {
                name: "text".into(),
                load_addr: 0x1000,
                perms: Permissions::from_bits(5).unwrap(),
            },
            SegmentEntry {
                name: "data".into(),
                load_addr: 0x1010,
                perms: Permissions::from_bits(6).unwrap(),
            },
        ])
        .unwrap();

        let mut store =
            InMemoryStore::with_segments([(0x1000, filled(0x10, 1)), (0x1010, filled(0x10, 2))]);

        let report = condenser().with_table(table).condense(&mut store).unwrap();
        assert!(report.merges.is_empty());
        assert_eq!(report.regions.len(), 2);
        assert_eq!(report.regions[0].permissions().to_string(), "r-x");
        assert_eq!(report.regions[1].permissions().to_string(), "rw-");
    }

    #[test]
    fn table_permissions_carry_through_merge() {
        let table = SegmentTable::from_entries(vec![
            SegmentEntry {
                name: "rom".into(),
                load_addr: 0x1000,
                perms: Permissions::READ,
            },
            SegmentEntry {
                name: "rom2".into(),
                load_addr: 0x1010,
                perms: Permissions::READ,
            },
        ])
        .unwrap();

        let mut store =
            InMemoryStore::with_segments([(0x1000, filled(0x10, 1)), (0x1010, filled(0x10, 2))]);

        let report = condenser().with_table(table).condense(&mut store).unwrap();
        assert_eq!(report.regions.len(), 1);
        assert_eq!(report.regions[0].permissions(), Permissions::READ);
    }

    #[test]
    fn merge_cap_stops_early() {
        let mut store = InMemoryStore::with_segments([
            (0x1000, filled(0x10, 1)),
            (0x1010, filled(0x10, 2)),
            (0x1020, filled(0x10, 3)),
        ]);

        let condenser = SegmentCondenser::new(CondenseConfig::new().sync_writes(false).max_merges(1));
        let report = condenser.condense(&mut store).unwrap();

        assert!(!report.complete);
        assert_eq!(report.merges.len(), 1);
        assert_eq!(report.regions, vec![region(0x1000, 0x20), region(0x1020, 0x10)]);

        let rest = condenser.condense(&mut store).unwrap();
        assert!(rest.complete);
        assert_eq!(rest.regions, vec![region(0x1000, 0x30)]);
    }

    #[test]
    fn plan_matches_condense_and_leaves_store_untouched() {
        let segments = [
            (0x1000, filled(0x10, 1)),
            (0x1010, filled(0x08, 2)),
            (0x1040, filled(0x10, 3)),
            (0x1050, filled(0x10, 4)),
        ];
        let mut store = InMemoryStore::with_segments(segments.clone());
        let before = store.snapshot();

        let plan = condenser().plan(&store).unwrap();
        assert!(plan.dry_run);
        assert_eq!(store.snapshot(), before);

        let report = condenser().condense(&mut store).unwrap();
        assert_eq!(plan.regions, report.regions);
        assert_eq!(plan.merges, report.merges);
        assert_eq!(plan.output_bytes(), report.output_bytes());
    }

    #[test]
    fn condense_regions_in_memory() {
        let (regions, merges) = condense_regions(vec![
            region(0x0, 0x4),
            region(0x4, 0x4),
            region(0x10, 0x4),
        ]);
        assert_eq!(regions, vec![region(0x0, 0x8), region(0x10, 0x4)]);
        assert_eq!(merges.len(), 1);
    }

    #[test]
    fn find_adjacent_returns_first_pair() {
        let regions = [region(0x0, 0x4), region(0x8, 0x4), region(0xc, 0x4), region(0x10, 0x4)];
        assert_eq!(find_adjacent(&regions), Some(1));
        assert_eq!(find_adjacent(&regions[..2]), None);
        assert_eq!(find_adjacent(&[]), None);
    }

    #[test]
    fn condensing_twice_is_a_noop() {
        let mut store = InMemoryStore::with_segments([
            (0x1000, filled(0x10, 1)),
            (0x1010, filled(0x10, 2)),
            (0x2000, filled(0x10, 3)),
        ]);

        let first = condenser().condense(&mut store).unwrap();
        let snapshot = store.snapshot();
        let second = condenser().condense(&mut store).unwrap();

        assert!(second.merges.is_empty());
        assert_eq!(first.regions, second.regions);
        assert_eq!(store.snapshot(), snapshot);
    }

    /// Fails every delete, leaving the absorbed artifact behind.
    struct NoDelete(InMemoryStore);

    impl SegmentStore for NoDelete {
        fn list_segments(&self) -> segmerge_store::StoreResult<Vec<segmerge_store::SegmentInfo>> {
            self.0.list_segments()
        }
        fn read(&self, address: u64) -> segmerge_store::StoreResult<Vec<u8>> {
            self.0.read(address)
        }
        fn segment_len(&self, address: u64) -> segmerge_store::StoreResult<u64> {
            self.0.segment_len(address)
        }
        fn append(&mut self, address: u64, data: &[u8]) -> segmerge_store::StoreResult<u64> {
            self.0.append(address, data)
        }
        fn delete(&mut self, _address: u64) -> segmerge_store::StoreResult<()> {
            Err(StoreError::Io(std::io::Error::from(
                std::io::ErrorKind::PermissionDenied,
            )))
        }
        fn create(&mut self, address: u64, data: &[u8]) -> segmerge_store::StoreResult<()> {
            self.0.create(address, data)
        }
        fn sync(&mut self, address: u64) -> segmerge_store::StoreResult<()> {
            self.0.sync(address)
        }
    }

    #[test]
    fn failed_delete_keeps_both_artifacts() {
        let mut store = NoDelete(InMemoryStore::with_segments([
            (0x1000, filled(0x10, 1)),
            (0x1010, filled(0x10, 2)),
        ]));

        let err = condenser().condense(&mut store).unwrap_err();
        assert_eq!(err.pending_delete(), Some(0x1010));
        assert!(err.is_io());

        let snapshot = store.0.snapshot();
        assert_eq!(snapshot[&0x1000u64].len(), 0x20);
        assert_eq!(snapshot[&0x1010u64], filled(0x10, 2));

        // Finishing the merge by hand leaves a consistent store.
        store.0.delete(0x1010).unwrap();
        let report = condenser().condense(&mut store.0).unwrap();
        assert_eq!(report.regions, vec![region(0x1000, 0x20)]);
    }

    /// Sorted, disjoint regions; roughly a third start exactly at the
    /// previous end.
    fn layout() -> impl Strategy<Value = Vec<Region>> {
        prop::collection::vec(
            (0u64..3, 1u64..0x40, prop::sample::select(vec![5u8, 7])),
            0..12,
        )
        .prop_map(|parts| {
            let mut next = 0x1000u64;
            parts
                .into_iter()
                .map(|(gap, length, bits)| {
                    let start = next + gap * 0x10;
                    next = start + length;
                    let perms = Permissions::from_bits(bits).unwrap();
                    Region::new(start, length, perms).unwrap()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn condense_regions_reaches_fixed_point(input in layout()) {
            prop_assert!(check_overlaps(&input).is_ok());

            let (output, merges) = condense_regions(input.clone());

            prop_assert_eq!(find_adjacent(&output), None);
            prop_assert!(check_overlaps(&output).is_ok());
            prop_assert_eq!(merges.len(), input.len() - output.len());
            prop_assert_eq!(total_bytes(&output), total_bytes(&input));
            for region in &output {
                prop_assert!(input.iter().any(|r| r.start() == region.start()));
            }

            let (again, more) = condense_regions(output.clone());
            prop_assert!(more.is_empty());
            prop_assert_eq!(again, output);
        }

        #[test]
        fn pulled_back_region_is_reported_as_overlap(
            input in layout().prop_filter("needs a pair", |r| r.len() >= 2),
            pick in any::<Index>(),
        ) {
            let mut regions = input;
            let i = pick.index(regions.len() - 1) + 1;
            let prev = regions[i - 1];
            regions[i] = Region::new(prev.end() - 1, regions[i].length(), Permissions::ALL).unwrap();

            let err = check_overlaps(&regions).unwrap_err();
            let is_expected_overlap = matches!(
                err,
                CoreError::Overlap { first_start, second_start, .. }
                    if first_start == prev.start() && second_start == prev.end() - 1
            );
            prop_assert!(is_expected_overlap);
        }
    }
}
