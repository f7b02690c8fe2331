//! Property-based test generators using proptest.
//!
//! Provides strategies for generating segment layouts that satisfy the
//! store invariants: unique start addresses, non-empty artifacts and no
//! overlapping ranges. Adjacent and separated neighbours are both common.

use proptest::prelude::*;
use segmerge_core::{Permissions, SegmentEntry, SegmentTable};

/// A generated layout: `(load address, bytes)` in ascending address order.
pub type Layout = Vec<(u64, Vec<u8>)>;

/// Fills a segment with bytes derived from its index, so merged data can
/// be traced back to its source segment.
pub fn pattern(index: usize, len: usize) -> Vec<u8> {
    (0..len)
        .map(|offset| (index as u8).wrapping_mul(37).wrapping_add(offset as u8))
        .collect()
}

/// Strategy for the gap before a segment: mostly zero (adjacent).
pub fn gap_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        3 => Just(0u64),
        1 => 1u64..0x40,
    ]
}

/// Strategy for a non-overlapping segment layout of 1 to 12 segments.
pub fn layout_strategy() -> impl Strategy<Value = Layout> {
    (
        0u64..0x1_0000_0000,
        prop::collection::vec((gap_strategy(), 1usize..0x40), 1..12),
    )
        .prop_map(|(base, parts)| {
            let mut address = base;
            let mut layout = Vec::with_capacity(parts.len());
            for (index, (gap, len)) in parts.into_iter().enumerate() {
                address += gap;
                layout.push((address, pattern(index, len)));
                address += len as u64;
            }
            layout
        })
}

/// Strategy for a layout in shuffled discovery order.
pub fn shuffled_layout_strategy() -> impl Strategy<Value = (Layout, Layout)> {
    layout_strategy().prop_flat_map(|layout| {
        let sorted = layout.clone();
        Just(layout)
            .prop_shuffle()
            .prop_map(move |shuffled| (sorted.clone(), shuffled))
    })
}

/// Strategy for permissions drawn from two common values, so that some
/// adjacent neighbours differ.
pub fn permissions_strategy() -> impl Strategy<Value = Permissions> {
    prop_oneof![
        3 => Just(Permissions::ALL),
        1 => Just(Permissions::READ.union(Permissions::EXECUTE)),
    ]
}

/// Strategy for a layout plus a segment table covering every segment.
pub fn tabled_layout_strategy() -> impl Strategy<Value = (Layout, SegmentTable)> {
    layout_strategy().prop_flat_map(|layout| {
        let count = layout.len();
        (
            Just(layout),
            prop::collection::vec(permissions_strategy(), count),
        )
            .prop_map(|(layout, perms)| {
                let entries = layout
                    .iter()
                    .zip(perms)
                    .enumerate()
                    .map(|(index, ((address, _), perms))| SegmentEntry {
                        name: format!("seg{index}"),
                        load_addr: *address,
                        perms,
                    })
                    .collect();
                let table =
                    SegmentTable::from_entries(entries).expect("Generated addresses are unique");
                (layout, table)
            })
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases.
    pub cases: u32,
}

impl PropTestConfig {
    /// Quick config for fast tests.
    #[must_use]
    pub fn quick() -> Self {
        Self { cases: 32 }
    }

    /// Config for tests that touch the filesystem.
    #[must_use]
    pub fn on_disk() -> Self {
        Self { cases: 16 }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            ..ProptestConfig::default()
        }
    }
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self { cases: 256 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn layout_is_sorted_and_disjoint(layout in layout_strategy()) {
            for pair in layout.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(a.0 + a.1.len() as u64 <= b.0);
            }
            prop_assert!(layout.iter().all(|(_, data)| !data.is_empty()));
        }

        #[test]
        fn shuffle_keeps_segments((sorted, shuffled) in shuffled_layout_strategy()) {
            let mut resorted = shuffled;
            resorted.sort_by_key(|(address, _)| *address);
            prop_assert_eq!(resorted, sorted);
        }

        #[test]
        fn table_covers_layout((layout, table) in tabled_layout_strategy()) {
            prop_assert_eq!(table.len(), layout.len());
            for (address, _) in &layout {
                prop_assert!(table.get(*address).is_some());
            }
        }
    }
}
