use super::*;
use crate::{
    test_support::{MemoryStore, RamFlash},
    types::{ActionId, Binding},
};

const NS: &str = "rsr";

fn sensor(index: u8) -> SensorIndex {
    SensorIndex::new(index).unwrap()
}

fn layer(index: u8) -> LayerIndex {
    LayerIndex::new(index).unwrap()
}

fn cell(action: u16) -> LayerBindings {
    LayerBindings {
        cw: Binding {
            action: ActionId(action),
            param1: 0x000C_00E9,
            param2: 0,
            tap_ms: 5,
        },
        ccw: Binding::UNSET,
    }
}

fn encoded(bindings: LayerBindings) -> [u8; LAYER_BINDINGS_RECORD_LEN] {
    let mut record = [0u8; LAYER_BINDINGS_RECORD_LEN];
    bindings.encode(&mut record);
    record
}

fn apply(
    adapter: &mut PersistenceAdapter<MemoryStore>,
    table: &mut BindingTable,
    s: u8,
    l: u8,
    bindings: LayerBindings,
    policy: CommitPolicy,
) -> Result<(), PersistError> {
    table.set(sensor(s), layer(l), bindings);
    adapter.record_change(table, sensor(s), layer(l), policy)
}

#[test]
fn immediate_per_cell_change_writes_one_key() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();

    apply(&mut adapter, &mut table, 1, 2, cell(3), CommitPolicy::Immediate).unwrap();

    assert_eq!(adapter.store().saves, 1);
    assert_eq!(adapter.store().get("rsr/s1/l2"), Some(&encoded(cell(3))[..]));
    assert!(!adapter.has_pending());
}

#[test]
fn deferred_changes_make_no_store_calls_until_flush() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();

    apply(&mut adapter, &mut table, 0, 0, cell(1), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 0, 1, cell(2), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 1, 7, cell(3), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 0, 1, cell(4), CommitPolicy::Deferred).unwrap();

    assert_eq!(adapter.store().saves, 0);
    assert!(adapter.has_pending());
    assert!(adapter.is_dirty(sensor(1), layer(7)));

    assert_eq!(adapter.flush(&table), Ok(3));
    assert_eq!(adapter.store().saves, 3);
    assert!(!adapter.has_pending());
    assert_eq!(adapter.store().get("rsr/s0/l1"), Some(&encoded(cell(4))[..]));
}

#[test]
fn whole_table_flush_is_a_single_write() {
    let mut adapter =
        PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::WholeTable, NS);
    let mut table = BindingTable::new();

    apply(&mut adapter, &mut table, 0, 0, cell(1), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 1, 3, cell(2), CommitPolicy::Deferred).unwrap();
    assert_eq!(adapter.store().saves, 0);

    assert_eq!(adapter.flush(&table), Ok(1));
    assert_eq!(adapter.store().saves, 1);
    let blob = adapter.store().get("rsr/bindings").unwrap();
    assert_eq!(blob.len(), TABLE_RECORD_LEN);
    assert_eq!(&blob[..], &encode_table(&table)[..]);
    assert!(!adapter.has_pending());
}

#[test]
fn flush_with_nothing_pending_is_a_no_op() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    let table = BindingTable::new();

    assert_eq!(adapter.flush(&table), Ok(0));
    assert_eq!(adapter.store().saves, 0);
}

#[test]
fn failed_flush_keeps_pending_flag() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();
    apply(&mut adapter, &mut table, 0, 4, cell(9), CommitPolicy::Deferred).unwrap();

    adapter.store_mut().fail_saves = true;
    assert_eq!(adapter.flush(&table), Err(PersistError::Store));
    assert!(adapter.has_pending());

    adapter.store_mut().fail_saves = false;
    assert_eq!(adapter.flush(&table), Ok(1));
    assert!(!adapter.has_pending());
}

#[test]
fn per_cell_flush_stops_at_the_first_failed_save() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();
    apply(&mut adapter, &mut table, 0, 1, cell(1), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 0, 4, cell(2), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 1, 2, cell(3), CommitPolicy::Deferred).unwrap();
    adapter.store_mut().fail_after = Some(1);

    assert_eq!(adapter.flush(&table), Err(PersistError::Store));

    assert_eq!(adapter.store().saves, 2);
    assert!(!adapter.is_dirty(sensor(0), layer(1)));
    assert!(adapter.is_dirty(sensor(0), layer(4)));
    assert!(adapter.is_dirty(sensor(1), layer(2)));
    assert!(adapter.has_pending());
    assert_eq!(adapter.store().get("rsr/s0/l1"), Some(&encoded(cell(1))[..]));
    assert_eq!(adapter.store().get("rsr/s0/l4"), None);

    adapter.store_mut().fail_after = None;
    assert_eq!(adapter.flush(&table), Ok(2));
    assert!(!adapter.has_pending());
}

#[test]
fn failed_whole_table_flush_keeps_pending_flag() {
    let mut adapter =
        PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::WholeTable, NS);
    let mut table = BindingTable::new();
    apply(&mut adapter, &mut table, 0, 0, cell(1), CommitPolicy::Deferred).unwrap();
    apply(&mut adapter, &mut table, 1, 6, cell(2), CommitPolicy::Deferred).unwrap();
    adapter.store_mut().fail_saves = true;

    assert_eq!(adapter.flush(&table), Err(PersistError::Store));

    assert!(adapter.has_pending());
    assert!(adapter.is_dirty(sensor(0), layer(0)));
    assert!(adapter.is_dirty(sensor(1), layer(6)));
    assert_eq!(adapter.store().get("rsr/bindings"), None);
    assert_eq!(table.get(sensor(1), layer(6)), cell(2));
}

#[test]
fn overlong_namespace_fails_the_save_instead_of_truncating_the_key() {
    let namespace = "abcdefghijklmnopqrst";
    let mut adapter =
        PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, namespace);
    let mut table = BindingTable::new();

    let first = apply(&mut adapter, &mut table, 0, 1, cell(1), CommitPolicy::Immediate);
    let second = apply(&mut adapter, &mut table, 0, 2, cell(2), CommitPolicy::Immediate);

    assert_eq!(first, Err(PersistError::KeyTooLong));
    assert_eq!(second, Err(PersistError::KeyTooLong));
    assert_eq!(adapter.store().saves, 0);
    assert!(adapter.store().entries.is_empty());
    assert!(adapter.is_dirty(sensor(0), layer(1)));
    assert!(adapter.is_dirty(sensor(0), layer(2)));

    let mut whole =
        PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::WholeTable, namespace);
    assert_eq!(
        whole.record_change(&table, sensor(0), layer(1), CommitPolicy::Immediate),
        Err(PersistError::KeyTooLong)
    );
    assert!(whole.has_pending());
    assert_eq!(cell_key(namespace, sensor(0), layer(1)), Err(PersistError::KeyTooLong));
}

#[test]
fn failed_immediate_save_leaves_memory_mutated_and_pending() {
    let mut adapter = PersistenceAdapter::new(MemoryStore::new(), PersistGranularity::PerCell, NS);
    adapter.store_mut().fail_saves = true;
    let mut table = BindingTable::new();

    let result = apply(&mut adapter, &mut table, 1, 1, cell(5), CommitPolicy::Immediate);

    assert_eq!(result, Err(PersistError::Store));
    assert_eq!(table.get(sensor(1), layer(1)), cell(5));
    assert!(adapter.is_dirty(sensor(1), layer(1)));
}

#[test]
fn restore_isolates_a_size_mismatch_to_its_key() {
    let store = MemoryStore::new()
        .with_entry("rsr/s0/l0", &encoded(cell(1)))
        .with_entry("rsr/s0/l1", &[1, 2, 3])
        .with_entry("rsr/s1/l5", &encoded(cell(7)));
    let mut adapter = PersistenceAdapter::new(store, PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();

    let report = adapter.restore(&mut table).unwrap();

    assert_eq!(
        report,
        LoadReport {
            loaded: 2,
            rejected: 1,
            ignored: 0
        }
    );
    assert_eq!(table.get(sensor(0), layer(0)), cell(1));
    assert_eq!(table.get(sensor(0), layer(1)), LayerBindings::UNSET);
    assert_eq!(table.get(sensor(1), layer(5)), cell(7));
    assert!(!adapter.has_pending());
}

#[test]
fn restore_skips_foreign_namespaces_and_counts_other_granularity() {
    let store = MemoryStore::new()
        .with_entry("other/s0/l0", &encoded(cell(1)))
        .with_entry("rsr/bindings", &[0u8; TABLE_RECORD_LEN])
        .with_entry("rsr/s9/l0", &encoded(cell(2)))
        .with_entry("rsr/s0/l3", &encoded(cell(3)));
    let mut adapter = PersistenceAdapter::new(store, PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();

    let report = adapter.restore(&mut table).unwrap();

    assert_eq!(
        report,
        LoadReport {
            loaded: 1,
            rejected: 1,
            ignored: 1
        }
    );
    assert_eq!(table.get(sensor(0), layer(0)), LayerBindings::UNSET);
    assert_eq!(table.get(sensor(0), layer(3)), cell(3));
}

#[test]
fn whole_table_record_restores_every_cell() {
    let mut source = BindingTable::new();
    source.set(sensor(0), layer(2), cell(11));
    source.set(sensor(1), layer(7), cell(12));
    let store = MemoryStore::new().with_entry("rsr/bindings", &encode_table(&source));
    let mut adapter = PersistenceAdapter::new(store, PersistGranularity::WholeTable, NS);
    let mut table = BindingTable::new();

    let report = adapter.restore(&mut table).unwrap();

    assert_eq!(report.loaded, 1);
    assert_eq!(table.get(sensor(0), layer(2)), cell(11));
    assert_eq!(table.get(sensor(1), layer(7)), cell(12));
}

#[test]
fn truncated_table_record_is_rejected_whole() {
    let store = MemoryStore::new().with_entry("rsr/bindings", &[0u8; TABLE_RECORD_LEN - 1]);
    let mut adapter = PersistenceAdapter::new(store, PersistGranularity::WholeTable, NS);
    let mut table = BindingTable::new();
    table.set(sensor(0), layer(0), cell(1));

    let report = adapter.restore(&mut table).unwrap();

    assert_eq!(report.rejected, 1);
    assert_eq!(table.get(sensor(0), layer(0)), cell(1));
}

#[test]
fn keys_format_and_parse() {
    assert_eq!(cell_key(NS, sensor(1), layer(7)).unwrap().as_str(), "rsr/s1/l7");
    assert_eq!(table_key(NS).unwrap().as_str(), "rsr/bindings");

    assert_eq!(
        parse_key(NS, "rsr/s1/l7"),
        Some(Ok(KeyTarget::Cell(sensor(1), layer(7))))
    );
    assert_eq!(parse_key(NS, "rsr/bindings"), Some(Ok(KeyTarget::Table)));
    assert_eq!(parse_key(NS, "wifi/ssid"), None);
    assert_eq!(parse_key(NS, "rsrx/s0/l0"), None);
    assert_eq!(parse_key(NS, "rsr/s0"), Some(Err(PersistError::UnknownKey)));
    assert_eq!(parse_key(NS, "rsr/s0/l99"), Some(Err(PersistError::UnknownKey)));
    assert_eq!(parse_key(NS, "rsr/s+1/l0"), Some(Err(PersistError::UnknownKey)));
}

fn flash_store(slots: usize) -> FlashKvStore<RamFlash> {
    FlashKvStore::at_end(RamFlash::new(FLASH_SLOT_LEN * (slots + 2)), slots)
}

fn collect(store: &mut impl KvStore) -> std::vec::Vec<(std::string::String, std::vec::Vec<u8>)> {
    use std::string::ToString;

    let mut entries = std::vec::Vec::new();
    store
        .load_all(&mut |key, blob| entries.push((key.to_string(), blob.to_vec())))
        .unwrap();
    entries
}

#[test]
fn flash_store_round_trips_and_overwrites_in_place() {
    let mut store = flash_store(4);

    store.save("rsr/s0/l0", &[1, 2, 3]).unwrap();
    store.save("rsr/s1/l1", &[4]).unwrap();
    store.save("rsr/s0/l0", &[9, 9]).unwrap();

    let entries = collect(&mut store);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "rsr/s0/l0");
    assert_eq!(entries[0].1, [9, 9]);
    assert_eq!(entries[1].0, "rsr/s1/l1");
}

#[test]
fn flash_store_skips_corrupted_slots() {
    let mut store = flash_store(2);
    store.save("rsr/s0/l0", &[1, 2, 3]).unwrap();
    store.save("rsr/s0/l1", &[4, 5, 6]).unwrap();

    let mut flash = store.into_inner();
    let second_slot = flash.bytes.len() - FLASH_SLOT_LEN;
    flash.bytes[second_slot + 40] ^= 0x10;
    let mut store = FlashKvStore::at_end(flash, 2);

    let entries = collect(&mut store);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "rsr/s0/l0");

    // The corrupted slot is reusable.
    store.save("rsr/s1/l0", &[7]).unwrap();
    assert_eq!(collect(&mut store).len(), 2);
}

#[test]
fn flash_store_reports_exhaustion() {
    let mut store = flash_store(1);
    store.save("rsr/s0/l0", &[1]).unwrap();

    assert_eq!(store.save("rsr/s0/l1", &[2]), Err(PersistError::Store));
    assert_eq!(store.save("rsr/s0/l0", &[3]), Ok(()));
}

#[test]
fn flash_store_backs_the_adapter() {
    let mut adapter = PersistenceAdapter::new(flash_store(4), PersistGranularity::PerCell, NS);
    let mut table = BindingTable::new();
    table.set(sensor(1), layer(4), cell(6));
    adapter
        .record_change(&table, sensor(1), layer(4), CommitPolicy::Immediate)
        .unwrap();

    let mut restored = BindingTable::new();
    let report = adapter.restore(&mut restored).unwrap();

    assert_eq!(report.loaded, 1);
    assert_eq!(restored.get(sensor(1), layer(4)), cell(6));
}
