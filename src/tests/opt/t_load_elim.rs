use super::state::MAX_TRACKED_FIELDS;
use super::*;
use crate::graph::Graph;
use crate::graph::builder::GraphBuilder;
use crate::graph::format::format_graph;
use crate::op::Properties;
use crate::op::access::{BaseTaggedness, ElementAccess, FieldAccess, MachineType};
use crate::reduce::reduce_graph;

fn run_pass(graph: &mut Graph) {
    let mut pass = LoadElimination::new();
    reduce_graph(graph, &mut pass);
}

fn slot(offset: u32) -> FieldAccess {
    FieldAccess::tagged(offset)
}

#[test]
fn test_load_replaced_by_dominating_store() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let store = b.store_field(object, value, slot(8), start, start);
    let load = b.load_field(object, slot(8), store, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert!(!graph.is_dead(store));
    assert_eq!(graph.value_input(ret, 0), value);
    assert_eq!(graph.effect_input(ret, 0), store);
}

#[test]
fn test_load_replaced_by_earlier_load() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let load1 = b.load_field(object, slot(8), start, start);
    let load2 = b.load_field(object, slot(8), load1, start);
    let ret = b.return_(load2, load2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load1));
    assert!(graph.is_dead(load2));
    assert_eq!(graph.value_input(ret, 0), load1);
    assert_eq!(graph.effect_input(ret, 0), load1);
}

#[test]
fn test_redundant_store_elided() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let store1 = b.store_field(object, value, slot(8), start, start);
    let store2 = b.store_field(object, value, slot(8), store1, start);
    let ret = b.return_(value, store2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(store1));
    assert!(graph.is_dead(store2));
    assert_eq!(graph.effect_input(ret, 0), store1);
}

#[test]
fn test_store_of_just_loaded_value_elided() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let load = b.load_field(object, slot(8), start, start);
    let store = b.store_field(object, load, slot(8), load, start);
    let ret = b.return_(load, store, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(store));
    assert_eq!(graph.effect_input(ret, 0), load);
}

#[test]
fn test_aliasing_store_kills_whole_slot() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let a = b.parameter(0);
    let c = b.parameter(1);
    let v1 = b.parameter(2);
    let v2 = b.parameter(3);
    let store_a = b.store_field(a, v1, slot(8), start, start);
    // `c` may alias `a`, so the later load cannot be forwarded.
    let store_c = b.store_field(c, v2, slot(8), store_a, start);
    let load = b.load_field(a, slot(8), store_c, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(store_a));
    assert!(!graph.is_dead(store_c));
    assert!(!graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), load);
}

#[test]
fn test_stores_to_different_slots_do_not_interfere() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v1 = b.parameter(1);
    let v2 = b.parameter(2);
    let store1 = b.store_field(object, v1, slot(8), start, start);
    let store2 = b.store_field(object, v2, slot(16), store1, start);
    let load = b.load_field(object, slot(8), store2, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), v1);
}

#[test]
fn test_element_load_replaced_by_store() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let array = b.parameter(0);
    let value = b.parameter(1);
    let index = b.constant(0);
    let access = ElementAccess::tagged(16);
    let store = b.store_element(array, index, value, access, start, start);
    let load = b.load_element(array, index, access, store, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert!(!graph.is_dead(store));
    assert_eq!(graph.value_input(ret, 0), value);
    assert_eq!(graph.effect_input(ret, 0), store);
}

#[test]
fn test_element_load_with_different_index_survives() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let array = b.parameter(0);
    let value = b.parameter(1);
    let i = b.parameter(2);
    let j = b.parameter(3);
    let access = ElementAccess::tagged(16);
    let store = b.store_element(array, i, value, access, start, start);
    let load = b.load_element(array, j, access, store, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), load);
}

#[test]
fn test_element_store_at_unknown_index_kills_tracked_entry() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let array = b.parameter(0);
    let v1 = b.parameter(1);
    let v2 = b.parameter(2);
    let unknown = b.parameter(3);
    let index = b.constant(0);
    let access = ElementAccess::tagged(16);
    let store1 = b.store_element(array, index, v1, access, start, start);
    let store2 = b.store_element(array, unknown, v2, access, store1, start);
    let load = b.load_element(array, index, access, store2, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), load);
}

#[test]
fn test_element_store_at_distinct_constant_index_is_disjoint() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let array = b.parameter(0);
    let v1 = b.parameter(1);
    let v2 = b.parameter(2);
    let index0 = b.constant(0);
    let index1 = b.constant(1);
    let access = ElementAccess::tagged(16);
    let store1 = b.store_element(array, index0, v1, access, start, start);
    let store2 = b.store_element(array, index1, v2, access, store1, start);
    let load = b.load_element(array, index0, access, store2, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), v1);
}

#[test]
fn test_redundant_element_store_elided() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let array = b.parameter(0);
    let value = b.parameter(1);
    let index = b.constant(3);
    let access = ElementAccess::tagged(16);
    let store1 = b.store_element(array, index, value, access, start, start);
    let store2 = b.store_element(array, index, value, access, store1, start);
    let ret = b.return_(value, store2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(store2));
    assert_eq!(graph.effect_input(ret, 0), store1);
}

#[test]
fn test_merge_with_disagreeing_stores_blocks_forwarding() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v = b.parameter(1);
    let w = b.parameter(2);
    let cond = b.parameter(3);
    let branch = b.branch(cond, start);
    let if_true = b.if_true(branch);
    let if_false = b.if_false(branch);
    let store_t = b.store_field(object, v, slot(8), start, if_true);
    let store_f = b.store_field(object, w, slot(8), start, if_false);
    let merge = b.merge(&[if_true, if_false]);
    let phi = b.phi(&[v, w], merge);
    let ephi = b.effect_phi(&[store_t, store_f], merge);
    let load = b.load_field(object, slot(8), ephi, merge);
    let ret = b.return_(phi, load, merge);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
    assert!(!graph.is_dead(store_t));
    assert!(!graph.is_dead(store_f));
}

#[test]
fn test_merge_with_agreeing_stores_allows_forwarding() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v = b.parameter(1);
    let cond = b.parameter(2);
    let branch = b.branch(cond, start);
    let if_true = b.if_true(branch);
    let if_false = b.if_false(branch);
    let store_t = b.store_field(object, v, slot(8), start, if_true);
    let store_f = b.store_field(object, v, slot(8), start, if_false);
    let merge = b.merge(&[if_true, if_false]);
    let ephi = b.effect_phi(&[store_t, store_f], merge);
    let load = b.load_field(object, slot(8), ephi, merge);
    let ret = b.return_(load, load, merge);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), v);
    assert_eq!(graph.effect_input(ret, 0), ephi);
}

#[test]
fn test_repeated_check_maps_elided() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let map = b.heap_constant(1);
    let check1 = b.check_maps(object, &[map], start, start);
    let check2 = b.check_maps(object, &[map], check1, start);
    let ret = b.return_(object, check2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(check1));
    assert!(graph.is_dead(check2));
    assert_eq!(graph.effect_input(ret, 0), check1);
}

#[test]
fn test_check_maps_feeds_map_field_load() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let map = b.heap_constant(1);
    let check = b.check_maps(object, &[map], start, start);
    let load = b.load_field(object, FieldAccess::for_map(), check, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), map);
}

#[test]
fn test_polymorphic_check_maps_records_nothing() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let map1 = b.heap_constant(1);
    let map2 = b.heap_constant(2);
    let check1 = b.check_maps(object, &[map1, map2], start, start);
    let check2 = b.check_maps(object, &[map1, map2], check1, start);
    let ret = b.return_(object, check2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    // Without a single recorded map the second check cannot be proven.
    assert!(!graph.is_dead(check2));
    assert_eq!(graph.effect_input(ret, 0), check2);
}

#[test]
fn test_monomorphic_check_satisfies_polymorphic_check() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let map1 = b.heap_constant(1);
    let map2 = b.heap_constant(2);
    let check1 = b.check_maps(object, &[map1], start, start);
    let check2 = b.check_maps(object, &[map1, map2], check1, start);
    let ret = b.return_(object, check2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(check2));
    assert_eq!(graph.effect_input(ret, 0), check1);
}

#[test]
fn test_transition_to_known_target_map_elided() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let source = b.heap_constant(1);
    let target = b.heap_constant(2);
    let check = b.check_maps(object, &[target], start, start);
    let transition = b.transition_elements_kind(object, source, target, check, start);
    let ret = b.return_(object, transition, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(transition));
    assert_eq!(graph.effect_input(ret, 0), check);
}

#[test]
fn test_transition_from_known_source_records_target_map() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let source = b.heap_constant(1);
    let target = b.heap_constant(2);
    let check = b.check_maps(object, &[source], start, start);
    let transition = b.transition_elements_kind(object, source, target, check, start);
    let load = b.load_field(object, FieldAccess::for_map(), transition, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), target);
}

#[test]
fn test_transition_kills_map_knowledge_and_elements() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let known = b.heap_constant(1);
    let source = b.heap_constant(2);
    let target = b.heap_constant(3);
    let index = b.constant(0);
    let access = ElementAccess::tagged(16);
    let check1 = b.check_maps(object, &[known], start, start);
    let store = b.store_element(object, index, value, access, check1, start);
    let transition = b.transition_elements_kind(object, source, target, store, start);
    let check2 = b.check_maps(object, &[known], transition, start);
    let load = b.load_element(object, index, access, check2, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    // The transition wiped both the recorded map and the element ring.
    assert!(!graph.is_dead(check2));
    assert!(!graph.is_dead(load));
}

#[test]
fn test_loop_store_blocks_forwarding_across_header() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v_init = b.parameter(1);
    let v_iter = b.parameter(2);
    let cond = b.parameter(3);
    let store_init = b.store_field(object, v_init, slot(8), start, start);
    let loop_ = b.loop_(start);
    let ephi = b.effect_phi(&[store_init, store_init], loop_);
    let store_iter = b.store_field(object, v_iter, slot(8), ephi, loop_);
    let branch = b.branch(cond, loop_);
    let if_true = b.if_true(branch);
    let if_false = b.if_false(branch);
    b.graph_mut().replace_effect_input(ephi, 1, store_iter);
    b.graph_mut().add_control_input(loop_, if_true);
    let load = b.load_field(object, slot(8), ephi, if_false);
    let ret = b.return_(load, load, if_false);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
    assert!(!graph.is_dead(store_init));
    assert_eq!(graph.value_input(ret, 0), load);
}

#[test]
fn test_loop_preserves_untouched_slots() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v_init = b.parameter(1);
    let v_iter = b.parameter(2);
    let cond = b.parameter(3);
    let store_init = b.store_field(object, v_init, slot(8), start, start);
    let loop_ = b.loop_(start);
    let ephi = b.effect_phi(&[store_init, store_init], loop_);
    // The body writes a different slot, so slot 8 stays known.
    let store_iter = b.store_field(object, v_iter, slot(16), ephi, loop_);
    let branch = b.branch(cond, loop_);
    let if_true = b.if_true(branch);
    let if_false = b.if_false(branch);
    b.graph_mut().replace_effect_input(ephi, 1, store_iter);
    b.graph_mut().add_control_input(loop_, if_true);
    let load = b.load_field(object, slot(8), ephi, if_false);
    let ret = b.return_(load, load, if_false);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), v_init);
}

#[test]
fn test_loop_with_call_drops_everything() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let v_init = b.parameter(1);
    let cond = b.parameter(2);
    let store_init = b.store_field(object, v_init, slot(8), start, start);
    let loop_ = b.loop_(start);
    let ephi = b.effect_phi(&[store_init, store_init], loop_);
    let call = b.call(&[], Properties::NONE, ephi, loop_);
    let branch = b.branch(cond, loop_);
    let if_true = b.if_true(branch);
    let if_false = b.if_false(branch);
    b.graph_mut().replace_effect_input(ephi, 1, call);
    b.graph_mut().add_control_input(loop_, if_true);
    let load = b.load_field(object, slot(8), ephi, if_false);
    let ret = b.return_(load, load, if_false);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
}

#[test]
fn test_writing_call_kills_tracked_fields() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let store = b.store_field(object, value, slot(8), start, start);
    let call = b.call(&[], Properties::NONE, store, start);
    let load = b.load_field(object, slot(8), call, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), load);
}

#[test]
fn test_non_writing_call_preserves_tracked_fields() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let store = b.store_field(object, value, slot(8), start, start);
    let call = b.call(
        &[],
        Properties::NO_WRITE | Properties::NO_THROW,
        store,
        start,
    );
    let load = b.load_field(object, slot(8), call, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(graph.is_dead(load));
    assert_eq!(graph.value_input(ret, 0), value);
}

#[test]
fn test_untracked_offset_is_not_forwarded() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let far = slot(MAX_TRACKED_FIELDS as u32 * 8);
    let load1 = b.load_field(object, far, start, start);
    let load2 = b.load_field(object, far, load1, start);
    let ret = b.return_(load2, load2, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load1));
    assert!(!graph.is_dead(load2));
}

#[test]
fn test_untracked_store_drops_all_knowledge() {
    let mut b = GraphBuilder::new();
    let start = b.start();
    let object = b.parameter(0);
    let value = b.parameter(1);
    let store1 = b.store_field(object, value, slot(8), start, start);
    // A misaligned store may overlap any tracked slot.
    let store2 = b.store_field(object, value, slot(12), store1, start);
    let load = b.load_field(object, slot(8), store2, start);
    let ret = b.return_(load, load, start);
    b.end(&[ret]);
    let mut graph = b.finish();

    run_pass(&mut graph);

    assert!(!graph.is_dead(load));
}

#[test]
fn test_fixed_point_is_idempotent() {
    let build = || {
        let mut b = GraphBuilder::new();
        let start = b.start();
        let object = b.parameter(0);
        let value = b.parameter(1);
        let store = b.store_field(object, value, slot(8), start, start);
        let load1 = b.load_field(object, slot(8), store, start);
        let load2 = b.load_field(object, slot(16), load1, start);
        let store2 = b.store_field(object, load2, slot(16), load2, start);
        let ret = b.return_(load2, store2, start);
        b.end(&[ret]);
        b.finish()
    };

    let mut once = build();
    run_pass(&mut once);
    let first = format_graph(&once);

    run_pass(&mut once);
    let second = format_graph(&once);
    assert_eq!(first, second);
}

#[test]
fn test_field_index_of_tracks_pointer_slots_only() {
    assert_eq!(field_index_of(&slot(0)), Some(0));
    assert_eq!(field_index_of(&slot(8)), Some(1));
    assert_eq!(field_index_of(&slot(248)), Some(31));

    // Beyond the tracked range.
    assert_eq!(field_index_of(&slot(256)), None);
    // Misaligned.
    assert_eq!(field_index_of(&slot(12)), None);

    let mut narrow = slot(8);
    narrow.machine_type = MachineType::Int32;
    assert_eq!(field_index_of(&narrow), None);

    let mut unboxed = slot(8);
    unboxed.machine_type = MachineType::Float64;
    assert_eq!(field_index_of(&unboxed), None);

    let mut untagged = slot(8);
    untagged.base_is_tagged = BaseTaggedness::Untagged;
    assert_eq!(field_index_of(&untagged), None);

    let mut word = slot(8);
    word.machine_type = MachineType::Uint64;
    assert_eq!(field_index_of(&word), Some(1));
}
