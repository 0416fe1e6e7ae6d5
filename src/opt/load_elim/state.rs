//! Abstract memory state for the load-elimination reducer.
//!
//! A state over-approximates memory contents at one effect-chain position:
//! per field slot, the last known value for each object; plus a small ring
//! of recent element stores. Values compare by node identity only. Every
//! mutator returns a new state; states are shared through `Rc`.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::graph::{Graph, NodeId};
use crate::op::Operator;

pub const MAX_TRACKED_FIELDS: usize = 32;
pub const MAX_TRACKED_ELEMENTS: usize = 8;

/// Last known values of one field slot, keyed by object identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbstractField {
    info_for_node: HashMap<NodeId, NodeId>,
}

impl AbstractField {
    pub fn new(object: NodeId, value: NodeId) -> Self {
        let mut info_for_node = HashMap::new();
        info_for_node.insert(object, value);
        Self { info_for_node }
    }

    pub fn extend(&self, object: NodeId, value: NodeId) -> Self {
        let mut that = self.clone();
        that.info_for_node.insert(object, value);
        that
    }

    pub fn lookup(&self, object: NodeId) -> Option<NodeId> {
        self.info_for_node.get(&object).copied()
    }

    /// Removes the binding for `object`; `None` when nothing remains.
    pub fn kill(&self, object: NodeId) -> Option<Self> {
        if !self.info_for_node.contains_key(&object) {
            return Some(self.clone());
        }
        let mut info_for_node = self.info_for_node.clone();
        info_for_node.remove(&object);
        if info_for_node.is_empty() {
            None
        } else {
            Some(Self { info_for_node })
        }
    }

    /// Intersection: a binding survives only if both sides agree on the
    /// identical value node.
    pub fn merge(&self, that: &Self) -> Self {
        if self == that {
            return self.clone();
        }
        let mut info_for_node = HashMap::new();
        for (object, value) in &self.info_for_node {
            if that.info_for_node.get(object) == Some(value) {
                info_for_node.insert(*object, *value);
            }
        }
        Self { info_for_node }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Element {
    object: NodeId,
    index: NodeId,
    value: NodeId,
}

/// Recency window of element stores: a fixed ring of (object, index, value)
/// triples. On overflow the oldest entry is silently overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractElements {
    elements: [Option<Element>; MAX_TRACKED_ELEMENTS],
    next_index: usize,
}

impl AbstractElements {
    pub fn new(object: NodeId, index: NodeId, value: NodeId) -> Self {
        let mut elements = [None; MAX_TRACKED_ELEMENTS];
        elements[0] = Some(Element {
            object,
            index,
            value,
        });
        Self {
            elements,
            next_index: 1,
        }
    }

    pub fn extend(&self, object: NodeId, index: NodeId, value: NodeId) -> Self {
        let mut that = self.clone();
        that.elements[that.next_index] = Some(Element {
            object,
            index,
            value,
        });
        that.next_index = (that.next_index + 1) % MAX_TRACKED_ELEMENTS;
        that
    }

    /// Identity must-alias on both object and index; anything weaker misses.
    pub fn lookup(&self, object: NodeId, index: NodeId) -> Option<NodeId> {
        for element in self.elements.iter().flatten() {
            if element.object == object && element.index == index {
                return Some(element.value);
            }
        }
        None
    }

    /// Clears every entry a store to `(object, index)` might overlap.
    /// Distinct objects can always alias, so only the index can prove a
    /// store disjoint.
    pub fn kill(&self, _object: NodeId, index: NodeId, graph: &Graph) -> Self {
        let mut that = self.clone();
        for slot in &mut that.elements {
            if let Some(element) = slot
                && may_alias_index(index, element.index, graph)
            {
                *slot = None;
            }
        }
        that
    }

    /// Positional intersection of two rings.
    pub fn merge(&self, that: &Self) -> Self {
        if self == that {
            return self.clone();
        }
        let mut elements = [None; MAX_TRACKED_ELEMENTS];
        for (i, slot) in elements.iter_mut().enumerate() {
            if self.elements[i] == that.elements[i] {
                *slot = self.elements[i];
            }
        }
        Self {
            elements,
            next_index: self.next_index,
        }
    }
}

/// Two element indices may address the same slot unless both are distinct
/// integer constants.
fn may_alias_index(a: NodeId, b: NodeId, graph: &Graph) -> bool {
    if a == b {
        return true;
    }
    match (graph.op(a), graph.op(b)) {
        (Operator::Constant { value: va }, Operator::Constant { value: vb }) => va == vb,
        _ => true,
    }
}

/// Abstract memory contents at one effect-chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractState {
    elements: Option<Rc<AbstractElements>>,
    fields: [Option<Rc<AbstractField>>; MAX_TRACKED_FIELDS],
}

impl AbstractState {
    pub fn empty() -> Self {
        Self {
            elements: None,
            fields: std::array::from_fn(|_| None),
        }
    }

    pub fn lookup_field(&self, object: NodeId, index: usize) -> Option<NodeId> {
        self.fields[index].as_ref()?.lookup(object)
    }

    pub fn add_field(&self, object: NodeId, index: usize, value: NodeId) -> Self {
        let mut that = self.clone();
        that.fields[index] = Some(Rc::new(match &self.fields[index] {
            Some(field) => field.extend(object, value),
            None => AbstractField::new(object, value),
        }));
        that
    }

    /// Removes the binding for one object in one slot.
    pub fn kill_field(&self, object: NodeId, index: usize) -> Self {
        match &self.fields[index] {
            Some(field) => {
                let mut that = self.clone();
                that.fields[index] = field.kill(object).map(Rc::new);
                that
            }
            None => self.clone(),
        }
    }

    /// Conservative aliasing kill: drops every binding in the slot.
    pub fn kill_field_slot(&self, index: usize) -> Self {
        if self.fields[index].is_none() {
            return self.clone();
        }
        let mut that = self.clone();
        that.fields[index] = None;
        that
    }

    pub fn lookup_element(&self, object: NodeId, index: NodeId) -> Option<NodeId> {
        self.elements.as_ref()?.lookup(object, index)
    }

    pub fn add_element(&self, object: NodeId, index: NodeId, value: NodeId) -> Self {
        let mut that = self.clone();
        that.elements = Some(Rc::new(match &self.elements {
            Some(elements) => elements.extend(object, index, value),
            None => AbstractElements::new(object, index, value),
        }));
        that
    }

    pub fn kill_element(&self, object: NodeId, index: NodeId, graph: &Graph) -> Self {
        match &self.elements {
            Some(elements) => {
                let mut that = self.clone();
                that.elements = Some(Rc::new(elements.kill(object, index, graph)));
                that
            }
            None => self.clone(),
        }
    }

    pub fn kill_all_elements(&self) -> Self {
        if self.elements.is_none() {
            return self.clone();
        }
        let mut that = self.clone();
        that.elements = None;
        that
    }

    /// Slot-wise intersection; information survives only where both sides
    /// agree.
    pub fn merge(&self, that: &Self) -> Self {
        if self == that {
            return self.clone();
        }
        let mut merged = Self::empty();
        merged.elements = match (&self.elements, &that.elements) {
            (Some(a), Some(b)) if Rc::ptr_eq(a, b) => Some(Rc::clone(a)),
            (Some(a), Some(b)) => Some(Rc::new(a.merge(b))),
            _ => None,
        };
        for i in 0..MAX_TRACKED_FIELDS {
            merged.fields[i] = match (&self.fields[i], &that.fields[i]) {
                (Some(a), Some(b)) if Rc::ptr_eq(a, b) => Some(Rc::clone(a)),
                (Some(a), Some(b)) => Some(Rc::new(a.merge(b))),
                _ => None,
            };
        }
        merged
    }
}

impl fmt::Display for AbstractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (i, field) in self.fields.iter().enumerate() {
            let Some(field) = field else { continue };
            let mut bindings: Vec<(NodeId, NodeId)> = field
                .info_for_node
                .iter()
                .map(|(o, v)| (*o, *v))
                .collect();
            bindings.sort_unstable();
            for (object, value) in bindings {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "f{i}[{object}]={value}")?;
            }
        }
        if let Some(elements) = &self.elements {
            for element in elements.elements.iter().flatten() {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write!(f, "{}[{}]={}", element.object, element.index, element.value)?;
            }
        }
        write!(f, "}}")
    }
}

/// Per-effect-node abstract states, keyed by node id.
#[derive(Debug, Default)]
pub struct NodeStates {
    info_for_node: Vec<Option<Rc<AbstractState>>>,
}

impl NodeStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&Rc<AbstractState>> {
        self.info_for_node.get(node.index())?.as_ref()
    }

    pub fn set(&mut self, node: NodeId, state: Rc<AbstractState>) {
        if self.info_for_node.len() <= node.index() {
            self.info_for_node.resize(node.index() + 1, None);
        }
        self.info_for_node[node.index()] = Some(state);
    }
}

#[cfg(test)]
#[path = "../../tests/opt/t_state.rs"]
mod tests;
