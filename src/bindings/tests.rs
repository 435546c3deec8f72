use super::*;
use crate::types::ActionId;

fn sensor(index: u8) -> SensorIndex {
    SensorIndex::new(index).unwrap()
}

fn layer(index: u8) -> LayerIndex {
    LayerIndex::new(index).unwrap()
}

fn binding(action: u16, param1: u32) -> Binding {
    Binding {
        action: ActionId(action),
        param1,
        param2: 0,
        tap_ms: 5,
    }
}

fn cw_default_on_layer_two(_: SensorIndex, layer: LayerIndex, direction: Direction) -> Option<Binding> {
    (layer.get() == 2 && direction == Direction::Cw).then(|| binding(42, 1))
}

#[test]
fn new_table_is_unconfigured() {
    let table = BindingTable::new();
    assert!(table.iter().all(|(_, _, cell)| *cell == LayerBindings::UNSET));
    assert_eq!(table.iter().count(), MAX_SENSORS * MAX_LAYERS);
}

#[test]
fn set_then_get_round_trips() {
    let mut table = BindingTable::new();
    let cell = LayerBindings {
        cw: binding(3, 0xE9),
        ccw: binding(3, 0xEA),
    };

    table.set(sensor(1), layer(3), cell);

    assert_eq!(table.get(sensor(1), layer(3)), cell);
    assert_eq!(table.get(sensor(0), layer(3)), LayerBindings::UNSET);
}

#[test]
fn resolution_fills_only_unconfigured_directions() {
    let mut table = BindingTable::new();

    let resolved = table.get_resolved(sensor(0), layer(2), &cw_default_on_layer_two);
    assert_eq!(resolved.cw, binding(42, 1));
    assert_eq!(resolved.ccw, Binding::UNSET);
    assert_eq!(table.get(sensor(0), layer(2)), LayerBindings::UNSET);

    table.set(
        sensor(0),
        layer(2),
        LayerBindings {
            cw: binding(7, 9),
            ccw: Binding::UNSET,
        },
    );
    let resolved = table.get_resolved(sensor(0), layer(2), &cw_default_on_layer_two);
    assert_eq!(resolved.cw, binding(7, 9));
}

#[test]
fn no_defaults_leaves_cells_untouched() {
    let table = BindingTable::new();
    assert_eq!(
        table.get_resolved(sensor(0), layer(0), &NoDefaults),
        LayerBindings::UNSET
    );
}

#[test]
fn compiled_defaults_match_generated_table() {
    for entry in DEFAULT_BINDINGS {
        let s = sensor(entry.sensor);
        let l = layer(entry.layer);
        assert_eq!(
            CompiledDefaults.default_binding(s, l, Direction::Cw),
            entry.cw
        );
        assert_eq!(
            CompiledDefaults.default_binding(s, l, Direction::Ccw),
            entry.ccw
        );
    }
    let last_layer = layer(MAX_LAYERS as u8 - 1);
    if !DEFAULT_BINDINGS
        .iter()
        .any(|entry| entry.sensor == 0 && entry.layer == last_layer.get())
    {
        assert!(CompiledDefaults
            .default_binding(sensor(0), last_layer, Direction::Cw)
            .is_none());
    }
}

#[test]
fn store_get_all_resolves_each_layer_up_to_the_limit() {
    use crate::{
        storage::{CommitPolicy, PersistGranularity},
        test_support::MemoryStore,
    };

    let mut store = BindingStore::new(MemoryStore::new(), PersistGranularity::PerCell, "rsr");
    store
        .set(
            sensor(1),
            layer(0),
            LayerBindings {
                cw: Binding::UNSET,
                ccw: binding(8, 2),
            },
            CommitPolicy::Deferred,
        )
        .unwrap();

    let layers = store.get_all(sensor(1), 3, &cw_default_on_layer_two);

    assert_eq!(layers.len(), 3);
    assert_eq!(layers[0].ccw, binding(8, 2));
    assert_eq!(layers[2].cw, binding(42, 1));
    assert!(store.has_pending_changes());
    assert_eq!(store.persistence().store().saves, 0);
    assert_eq!(store.get_all(sensor(1), usize::MAX, &NoDefaults).len(), MAX_LAYERS);
}
