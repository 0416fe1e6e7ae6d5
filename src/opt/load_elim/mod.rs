//! Load elimination along the effect chain.
//!
//! Tracks an abstract memory state per effect node and uses it to replace
//! loads whose value is already known, drop stores that write back the value
//! a slot is known to hold, and elide repeated map checks. The analysis is
//! intra-procedural and purely identity-based: two nodes are the same value
//! only if they are the same node.

pub mod state;

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::rc::Rc;

use crate::graph::{Graph, NodeId};
use crate::op::access::{
    BaseTaggedness, ELEMENTS_OFFSET, FieldAccess, MAP_OFFSET, MachineType, POINTER_SIZE,
};
use crate::op::{Operator, Properties};
use crate::reduce::{Reducer, Reduction};
use state::{AbstractState, MAX_TRACKED_FIELDS, NodeStates};

/// Field slot of an object's map pointer.
const MAP_FIELD_INDEX: usize = (MAP_OFFSET / POINTER_SIZE) as usize;

/// Field slot of an object's elements backing-store pointer.
const ELEMENTS_FIELD_INDEX: usize = (ELEMENTS_OFFSET / POINTER_SIZE) as usize;

pub struct LoadElimination {
    node_states: NodeStates,
    empty_state: Rc<AbstractState>,
}

impl LoadElimination {
    pub fn new() -> Self {
        Self {
            node_states: NodeStates::new(),
            empty_state: Rc::new(AbstractState::empty()),
        }
    }

    /// Renders the per-node abstract states for `--dump states`.
    pub fn format_states(&self, graph: &Graph) -> String {
        let mut out = String::new();
        for id in graph.live_node_ids() {
            if let Some(state) = self.node_states.get(id) {
                let _ = writeln!(out, "{id}: {state}");
            }
        }
        out
    }
}

impl Reducer for LoadElimination {
    fn name(&self) -> &'static str {
        "load-elim"
    }

    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        match *graph.op(node) {
            Operator::Start => self.reduce_start(node),
            Operator::LoadField { access } => self.reduce_load_field(graph, node, &access),
            Operator::StoreField { access } => self.reduce_store_field(graph, node, &access),
            Operator::LoadElement { .. } => self.reduce_load_element(graph, node),
            Operator::StoreElement { .. } => self.reduce_store_element(graph, node),
            Operator::CheckMaps => self.reduce_check_maps(graph, node),
            Operator::TransitionElementsKind => self.reduce_transition_elements_kind(graph, node),
            Operator::EffectPhi => self.reduce_effect_phi(graph, node),
            _ => self.reduce_other_node(graph, node),
        }
    }
}

impl LoadElimination {
    fn reduce_start(&mut self, node: NodeId) -> Reduction {
        let state = Rc::clone(&self.empty_state);
        self.update_state(node, state)
    }

    fn reduce_load_field(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        access: &FieldAccess,
    ) -> Reduction {
        let object = graph.value_input(node, 0);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        if let Some(index) = field_index_of(access) {
            if let Some(replacement) = state.lookup_field(object, index) {
                graph.replace_with_value(node, replacement, effect);
                return Reduction::Replace(replacement);
            }
            // The load itself becomes the representative value for the slot.
            let state = Rc::new(state.add_field(object, index, node));
            return self.update_state(node, state);
        }
        self.update_state(node, state)
    }

    fn reduce_store_field(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        access: &FieldAccess,
    ) -> Reduction {
        let object = graph.value_input(node, 0);
        let new_value = graph.value_input(node, 1);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        let state = if let Some(index) = field_index_of(access) {
            if state.lookup_field(object, index) == Some(new_value) {
                // The slot is already known to hold this exact value.
                return Reduction::Replace(effect);
            }
            // Another object may alias, so the whole slot is reset to the
            // single new fact.
            Rc::new(state.kill_field_slot(index).add_field(object, index, new_value))
        } else {
            // A store through an untracked access may clobber anything.
            Rc::clone(&self.empty_state)
        };
        self.update_state(node, state)
    }

    fn reduce_load_element(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let object = graph.value_input(node, 0);
        let index = graph.value_input(node, 1);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        if let Some(replacement) = state.lookup_element(object, index) {
            graph.replace_with_value(node, replacement, effect);
            return Reduction::Replace(replacement);
        }
        let state = Rc::new(state.add_element(object, index, node));
        self.update_state(node, state)
    }

    fn reduce_store_element(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let object = graph.value_input(node, 0);
        let index = graph.value_input(node, 1);
        let new_value = graph.value_input(node, 2);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        if state.lookup_element(object, index) == Some(new_value) {
            return Reduction::Replace(effect);
        }
        let state = Rc::new(
            state
                .kill_element(object, index, graph)
                .add_element(object, index, new_value),
        );
        self.update_state(node, state)
    }

    fn reduce_check_maps(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let object = graph.value_input(node, 0);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        let map_count = graph.node(node).value_inputs.len() - 1;
        if let Some(object_map) = state.lookup_field(object, MAP_FIELD_INDEX) {
            for i in 0..map_count {
                if graph.value_input(node, 1 + i) == object_map {
                    // The object's map is already known to pass the check.
                    return Reduction::Replace(effect);
                }
            }
        }
        if map_count == 1 {
            let map = graph.value_input(node, 1);
            let state = Rc::new(state.add_field(object, MAP_FIELD_INDEX, map));
            return self.update_state(node, state);
        }
        self.update_state(node, state)
    }

    fn reduce_transition_elements_kind(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let object = graph.value_input(node, 0);
        let source_map = graph.value_input(node, 1);
        let target_map = graph.value_input(node, 2);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        let object_map = state.lookup_field(object, MAP_FIELD_INDEX);
        if object_map == Some(target_map) {
            // Already in the target kind; the transition cannot change
            // anything.
            return Reduction::Replace(effect);
        }
        // Any aliasing object may observe the transition: drop the map and
        // elements-pointer slots and the whole element ring.
        let mut new_state = state
            .kill_field_slot(MAP_FIELD_INDEX)
            .kill_field_slot(ELEMENTS_FIELD_INDEX)
            .kill_all_elements();
        if object_map == Some(source_map) {
            // The transition is known to fire, so the map is the target now.
            new_state = new_state.add_field(object, MAP_FIELD_INDEX, target_map);
        }
        self.update_state(node, Rc::new(new_state))
    }

    fn reduce_effect_phi(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let effect0 = graph.effect_input(node, 0);
        let control = graph.control_input(node, 0);
        let Some(state0) = self.node_states.get(effect0).cloned() else {
            return Reduction::NoChange;
        };
        if matches!(graph.op(control), Operator::Loop) {
            // The entry edge dominates the header, so the loop state is the
            // entry state minus everything the body may write.
            let state = self.compute_loop_state(graph, node, state0);
            return self.update_state(node, state);
        }

        let input_count = graph.node(node).effect_inputs.len();
        let mut input_states = Vec::with_capacity(input_count.saturating_sub(1));
        for i in 1..input_count {
            match self.node_states.get(graph.effect_input(node, i)) {
                Some(state) => input_states.push(Rc::clone(state)),
                // Not all predecessors analyzed yet; revisited later.
                None => return Reduction::NoChange,
            }
        }
        let mut state = (*state0).clone();
        for input_state in &input_states {
            state = state.merge(input_state);
        }
        self.update_state(node, Rc::new(state))
    }

    fn reduce_other_node(&mut self, graph: &mut Graph, node: NodeId) -> Reduction {
        let node_ref = graph.node(node);
        if node_ref.effect_inputs.len() != 1 || !node_ref.op.produces_effect() {
            // Off the effect chain, or an effect sink; nothing to track.
            return Reduction::NoChange;
        }
        let no_write = node_ref.op.properties().contains(Properties::NO_WRITE);
        let effect = node_ref.effect_inputs[0];
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };
        let state = if no_write {
            state
        } else {
            // The node may write anywhere; every tracked fact dies.
            Rc::clone(&self.empty_state)
        };
        self.update_state(node, state)
    }

    /// One-shot walk over the loop body: clears every field slot and element
    /// class a body node may write, without iterating the dataflow.
    fn compute_loop_state(
        &self,
        graph: &Graph,
        node: NodeId,
        state: Rc<AbstractState>,
    ) -> Rc<AbstractState> {
        let mut state = state;
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        visited.insert(node);
        for i in 1..graph.node(node).effect_inputs.len() {
            queue.push_back(graph.effect_input(node, i));
        }
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if !graph.op(current).properties().contains(Properties::NO_WRITE) {
                match graph.op(current) {
                    Operator::StoreField { access } => match field_index_of(access) {
                        Some(index) => state = Rc::new(state.kill_field_slot(index)),
                        None => return Rc::clone(&self.empty_state),
                    },
                    Operator::StoreElement { .. } => {
                        let object = graph.value_input(current, 0);
                        let index = graph.value_input(current, 1);
                        state = Rc::new(state.kill_element(object, index, graph));
                    }
                    Operator::TransitionElementsKind => {
                        state = Rc::new(
                            state
                                .kill_field_slot(MAP_FIELD_INDEX)
                                .kill_field_slot(ELEMENTS_FIELD_INDEX)
                                .kill_all_elements(),
                        );
                    }
                    _ => return Rc::clone(&self.empty_state),
                }
            }
            for i in 0..graph.node(current).effect_inputs.len() {
                queue.push_back(graph.effect_input(current, i));
            }
        }
        state
    }

    fn update_state(&mut self, node: NodeId, state: Rc<AbstractState>) -> Reduction {
        if let Some(original) = self.node_states.get(node)
            && (Rc::ptr_eq(original, &state) || **original == *state)
        {
            return Reduction::NoChange;
        }
        self.node_states.set(node, state);
        Reduction::Changed(node)
    }
}

/// Maps a field access to its dense slot, or `None` when untracked.
pub(crate) fn field_index_of(access: &FieldAccess) -> Option<usize> {
    match access.machine_type {
        // Only pointer-size fields are tracked.
        MachineType::Int8
        | MachineType::Uint8
        | MachineType::Int16
        | MachineType::Uint16
        | MachineType::Int32
        | MachineType::Uint32
        | MachineType::Float32
        | MachineType::Float64 => return None,
        MachineType::Int64
        | MachineType::Uint64
        | MachineType::AnyTagged
        | MachineType::TaggedSigned
        | MachineType::TaggedPointer => {}
    }
    if access.base_is_tagged != BaseTaggedness::Tagged {
        return None;
    }
    if access.offset % POINTER_SIZE != 0 {
        return None;
    }
    let index = (access.offset / POINTER_SIZE) as usize;
    (index < MAX_TRACKED_FIELDS).then_some(index)
}

#[cfg(test)]
#[path = "../../tests/opt/t_load_elim.rs"]
mod tests;
