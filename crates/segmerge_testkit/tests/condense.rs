//! End-to-end condensation tests over on-disk and in-memory stores.

use proptest::prelude::*;
use segmerge_core::{
    assemble, CondenseConfig, CoreError, DumpDirectory, FlatImage, Permissions, Region,
    SegmentCondenser, SegmentTable,
};
use segmerge_store::{InMemoryStore, SegmentStore, StoreError};
use segmerge_testkit::prelude::*;

fn condenser() -> SegmentCondenser {
    SegmentCondenser::new(CondenseConfig::new().sync_writes(false))
}

fn region(start: u64, length: u64) -> Region {
    Region::new(start, length, Permissions::ALL).unwrap()
}

#[test]
fn adjacent_pair_merges_on_disk() {
    let fixture = DumpFixture::with_segments(&[
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x20)),
    ]);
    let before = store_bytes(&fixture.store());

    let mut store = fixture.store();
    let report = SegmentCondenser::with_defaults().condense(&mut store).unwrap();

    assert_eq!(report.regions, vec![region(0x1000, 0x30)]);
    assert_eq!(fixture.file_names(), vec!["1000.bin"]);
    assert_eq!(store.segment_len(0x1000).unwrap(), 0x30);
    assert_eq!(store_bytes(&store), before);
}

#[test]
fn gap_leaves_both_segments() {
    let fixture = DumpFixture::with_segments(&[
        (0x1000, pattern(0, 0x10)),
        (0x1020, pattern(1, 0x10)),
    ]);

    let mut store = fixture.store();
    let report = condenser().condense(&mut store).unwrap();

    assert!(report.merges.is_empty());
    assert_eq!(report.regions, vec![region(0x1000, 0x10), region(0x1020, 0x10)]);
    assert_eq!(fixture.file_names(), vec!["1000.bin", "1020.bin"]);
}

#[test]
fn chain_of_three_needs_a_rescan() {
    let fixture = DumpFixture::with_segments(&[
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x10)),
        (0x1020, pattern(2, 0x10)),
    ]);

    let mut store = fixture.store();
    let report = condenser().condense(&mut store).unwrap();

    assert_eq!(report.merges.len(), 2);
    assert_eq!(report.merges[0].end, 0x1020);
    assert_eq!(report.merges[1].end, 0x1030);
    assert_eq!(report.regions, vec![region(0x1000, 0x30)]);

    let mut expected = pattern(0, 0x10);
    expected.extend(pattern(1, 0x10));
    expected.extend(pattern(2, 0x10));
    assert_eq!(store.read(0x1000).unwrap(), expected);
}

#[test]
fn duplicate_address_fails_discovery() {
    let fixture = DumpFixture::new();
    fixture.write("2000.bin", &[0; 4]);
    fixture.write("0x2000.dump", &[0; 4]);

    let dir = DumpDirectory::open(fixture.path()).unwrap();
    let err = dir.store().unwrap_err();
    assert!(err.is_discovery());
    assert!(matches!(
        err,
        CoreError::Store(StoreError::DuplicateAddress { address: 0x2000, .. })
    ));
    assert_eq!(fixture.file_names().len(), 3);
}

#[test]
fn overlap_fails_loudly() {
    let fixture = DumpFixture::with_segments(&[
        (0x3000, pattern(0, 0x20)),
        (0x3010, pattern(1, 0x10)),
    ]);

    let mut store = fixture.store();
    let err = condenser().condense(&mut store).unwrap_err();
    assert!(err.is_overlap());
    assert_eq!(fixture.file_names(), vec!["3000.bin", "3010.bin"]);
}

#[test]
fn unparseable_name_fails_discovery() {
    let fixture = DumpFixture::with_segments(&[(0x1000, pattern(0, 4))]);
    fixture.write("README", b"not a segment");

    let result = segmerge_store::DirectoryStore::open(fixture.path());
    assert!(result.unwrap_err().is_discovery());
}

#[test]
fn failed_append_loses_nothing() {
    let layout = vec![
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x10)),
        (0x1020, pattern(2, 0x10)),
    ];
    let mut store = FaultyStore::new(InMemoryStore::with_segments(layout.clone()));
    store.fail_appends_after(1);

    let err = condenser().condense(&mut store).unwrap_err();
    assert!(err.is_io());
    assert_eq!(err.pending_delete(), None);

    // First merge went through; the second left both artifacts untouched.
    let snapshot = store.inner().snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[&0x1000u64].len(), 0x20);
    assert_eq!(snapshot[&0x1020u64], pattern(2, 0x10));
    assert_eq!(
        store_bytes(store.inner()),
        address_bytes(layout.iter().map(|(a, d)| (*a, d.as_slice())))
    );

    store.reset();
    let report = condenser().condense(&mut store).unwrap();
    assert_eq!(report.regions, vec![region(0x1000, 0x30)]);
}

#[test]
fn failed_delete_is_recoverable() {
    let layout = vec![(0x1000, pattern(0, 0x10)), (0x1010, pattern(1, 0x10))];
    let mut store = FaultyStore::new(InMemoryStore::with_segments(layout.clone()));
    store.set_fail_on_delete(true);

    let err = condenser().condense(&mut store).unwrap_err();
    let pending = err.pending_delete().expect("delete should be pending");
    assert_eq!(pending, 0x1010);

    // Both artifacts exist and the target holds a superset of the bytes.
    assert_eq!(store.inner().segment_len(0x1000).unwrap(), 0x20);
    assert_eq!(store.inner().read(0x1010).unwrap(), pattern(1, 0x10));

    // Re-running without finishing the delete trips the overlap check.
    store.reset();
    assert!(condenser().condense(&mut store).unwrap_err().is_overlap());

    store.inner_mut().delete(pending).unwrap();
    let report = condenser().condense(&mut store).unwrap();
    assert_eq!(report.regions, vec![region(0x1000, 0x20)]);
    assert_eq!(
        store_bytes(store.inner()),
        address_bytes(layout.iter().map(|(a, d)| (*a, d.as_slice())))
    );
}

#[test]
fn failed_sync_keeps_absorbed_artifact() {
    let mut store = FaultyStore::new(InMemoryStore::with_segments([
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x10)),
    ]));
    store.set_fail_on_sync(true);

    let err = SegmentCondenser::with_defaults()
        .condense(&mut store)
        .unwrap_err();
    assert!(matches!(err, CoreError::IncompleteMerge { absorbed: 0x1010, .. }));
    assert!(store.inner().read(0x1010).is_ok());
}

#[test]
fn misreported_append_length_stops_before_delete() {
    let mut store = FaultyStore::new(InMemoryStore::with_segments([
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x10)),
    ]));
    store.set_misreport_length(true);

    let err = condenser().condense(&mut store).unwrap_err();
    assert!(matches!(
        err,
        CoreError::LengthMismatch {
            address: 0x1000,
            expected: 0x20,
            actual: 0x21,
        }
    ));
    assert_eq!(err.pending_delete(), None);

    // The absorbed artifact is never deleted once lengths disagree.
    assert_eq!(store.inner().read(0x1010).unwrap(), pattern(1, 0x10));
    assert_eq!(store.inner().segment_len(0x1000).unwrap(), 0x20);
}

#[test]
fn locked_directory_rejects_second_condenser() {
    let fixture = DumpFixture::with_segments(&[(0x1000, pattern(0, 4))]);
    let _held = DumpDirectory::open(fixture.path()).unwrap();

    let err = DumpDirectory::open(fixture.path()).unwrap_err();
    assert!(matches!(err, CoreError::DirectoryLocked { .. }));
}

#[test]
fn table_drives_permissions_and_names_end_to_end() {
    let fixture = DumpFixture::with_segments(&[
        (0x1000, pattern(0, 0x10)),
        (0x1010, pattern(1, 0x10)),
        (0x1020, pattern(2, 0x10)),
    ]);
    let json = serde_json::json!([
        { "name": "text", "load_addr": 0x1000, "perms": 5 },
        { "name": "text2", "load_addr": 0x1010, "perms": 5 },
        { "name": "data", "load_addr": 0x1020, "perms": 6 },
    ]);
    let table = SegmentTable::from_json(json.to_string().as_bytes()).unwrap();

    let dir = DumpDirectory::open(fixture.path()).unwrap();
    let mut store = dir.store().unwrap();
    let condenser = condenser().with_table(table);
    let report = condenser.condense(&mut store).unwrap();
    assert_eq!(report.regions.len(), 2);

    let mut image = FlatImage::new();
    let placed = assemble(&store, &report.regions, condenser.table(), &mut image).unwrap();
    assert_eq!(placed[0].name.as_deref(), Some("text"));
    assert_eq!(placed[0].length, 0x20);
    assert_eq!(placed[0].permissions.to_string(), "r-x");
    assert_eq!(placed[1].name.as_deref(), Some("data"));
    assert_eq!(placed[1].file_offset, 0x20);
    assert_eq!(image.byte_at(0x1020), Some(pattern(2, 1)[0]));
}

fn assert_terminal(regions: &[Region]) {
    for pair in regions.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.end() <= b.start());
        assert!(
            a.end() != b.start() || a.permissions() != b.permissions(),
            "adjacent regions left unmerged: {a} / {b}"
        );
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn condensation_properties((layout, table) in tabled_layout_strategy()) {
        let mut store = InMemoryStore::with_segments(layout.clone());
        let input_bytes = address_bytes(layout.iter().map(|(a, d)| (*a, d.as_slice())));
        let condenser = condenser().with_table(table);

        let report = condenser.condense(&mut store).unwrap();

        // Byte conservation, address by address.
        prop_assert_eq!(store_bytes(&store), input_bytes);
        prop_assert_eq!(report.output_bytes(), report.input_bytes);

        // Every final start was an input start.
        for region in &report.regions {
            prop_assert!(layout.iter().any(|(address, _)| *address == region.start()));
        }

        // No mergeable pair remains, and the merge count is bounded.
        assert_terminal(&report.regions);
        prop_assert!(report.complete);
        prop_assert_eq!(report.merges.len(), layout.len() - report.regions.len());

        // Idempotence.
        let again = condenser.condense(&mut store).unwrap();
        prop_assert!(again.merges.is_empty());
        prop_assert_eq!(again.regions, report.regions);
    }

    #[test]
    fn plan_predicts_condense(layout in layout_strategy()) {
        let mut store = InMemoryStore::with_segments(layout);
        let plan = condenser().plan(&store).unwrap();
        let report = condenser().condense(&mut store).unwrap();

        prop_assert_eq!(plan.merges, report.merges);
        prop_assert_eq!(plan.regions, report.regions);
    }
}

proptest! {
    #![proptest_config(PropTestConfig::on_disk().to_proptest_config())]

    #[test]
    fn discovery_order_does_not_matter((sorted, shuffled) in shuffled_layout_strategy()) {
        let in_order = DumpFixture::with_segments(&sorted);
        let out_of_order = DumpFixture::with_segments(&shuffled);

        let first = condenser().condense(&mut in_order.store()).unwrap();
        let second = condenser().condense(&mut out_of_order.store()).unwrap();
        prop_assert_eq!(&first.regions, &second.regions);
        prop_assert_eq!(in_order.file_names(), out_of_order.file_names());
        prop_assert_eq!(store_bytes(&in_order.store()), store_bytes(&out_of_order.store()));

        let mut memory = InMemoryStore::with_segments(shuffled);
        let third = condenser().condense(&mut memory).unwrap();
        prop_assert_eq!(&first.regions, &third.regions);
    }
}
