//! Sea-of-nodes graph: nodes threaded by value, effect and control edges.

pub mod builder;
pub mod format;
pub mod verify;

use std::fmt;

use crate::op::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub op: Operator,
    pub value_inputs: Vec<NodeId>,
    pub effect_inputs: Vec<NodeId>,
    pub control_inputs: Vec<NodeId>,
    pub dead: bool,
}

/// Node table plus use lists. Use lists carry one entry per edge, so a node
/// that feeds another through two edges appears twice.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    uses: Vec<Vec<NodeId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Inputs may reference ids that do not exist yet; the
    /// parser relies on this for forward references.
    pub fn add_node(
        &mut self,
        op: Operator,
        value_inputs: Vec<NodeId>,
        effect_inputs: Vec<NodeId>,
        control_inputs: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for input in value_inputs
            .iter()
            .chain(&effect_inputs)
            .chain(&control_inputs)
            .copied()
            .collect::<Vec<_>>()
        {
            self.record_use(input, id);
        }
        self.nodes.push(Node {
            id,
            op,
            value_inputs,
            effect_inputs,
            control_inputs,
            dead: false,
        });
        if self.uses.len() < self.nodes.len() {
            self.uses.resize(self.nodes.len(), Vec::new());
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn op(&self, id: NodeId) -> &Operator {
        &self.nodes[id.index()].op
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn live_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| !n.dead).map(|n| n.id)
    }

    pub fn is_dead(&self, id: NodeId) -> bool {
        self.nodes[id.index()].dead
    }

    pub fn value_input(&self, id: NodeId, i: usize) -> NodeId {
        self.nodes[id.index()].value_inputs[i]
    }

    pub fn effect_input(&self, id: NodeId, i: usize) -> NodeId {
        self.nodes[id.index()].effect_inputs[i]
    }

    pub fn control_input(&self, id: NodeId, i: usize) -> NodeId {
        self.nodes[id.index()].control_inputs[i]
    }

    pub fn uses(&self, id: NodeId) -> &[NodeId] {
        &self.uses[id.index()]
    }

    /// Rewires every edge into `from` so it points at `to`.
    pub fn replace_all_uses(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let users = std::mem::take(&mut self.uses[from.index()]);
        for user in &users {
            let node = &mut self.nodes[user.index()];
            for input in node
                .value_inputs
                .iter_mut()
                .chain(node.effect_inputs.iter_mut())
                .chain(node.control_inputs.iter_mut())
            {
                if *input == from {
                    *input = to;
                }
            }
        }
        self.uses[to.index()].extend(users);
    }

    /// Rewires value edges of `node` to `value` and effect edges to
    /// `effect`. Control edges are untouched; loads never act as control.
    pub fn replace_with_value(&mut self, node: NodeId, value: NodeId, effect: NodeId) {
        let mut users = std::mem::take(&mut self.uses[node.index()]);
        users.sort_unstable();
        users.dedup();
        let mut remaining = Vec::new();
        for user in users {
            let mut to_value = 0;
            let mut to_effect = 0;
            let mut kept = 0;
            {
                let n = &mut self.nodes[user.index()];
                for input in &mut n.value_inputs {
                    if *input == node {
                        *input = value;
                        to_value += 1;
                    }
                }
                for input in &mut n.effect_inputs {
                    if *input == node {
                        *input = effect;
                        to_effect += 1;
                    }
                }
                for input in &n.control_inputs {
                    if *input == node {
                        kept += 1;
                    }
                }
            }
            for _ in 0..to_value {
                self.record_use(value, user);
            }
            for _ in 0..to_effect {
                self.record_use(effect, user);
            }
            for _ in 0..kept {
                remaining.push(user);
            }
        }
        self.uses[node.index()] = remaining;
    }

    /// Replaces the `index`-th effect input of `node` (loop backedge patching).
    pub fn replace_effect_input(&mut self, node: NodeId, index: usize, effect: NodeId) {
        let old = self.nodes[node.index()].effect_inputs[index];
        if old == effect {
            return;
        }
        self.nodes[node.index()].effect_inputs[index] = effect;
        self.forget_use(old, node);
        self.record_use(effect, node);
    }

    /// Appends a control input to `node` (loop backedges).
    pub fn add_control_input(&mut self, node: NodeId, control: NodeId) {
        self.nodes[node.index()].control_inputs.push(control);
        self.record_use(control, node);
    }

    /// Marks `node` dead and detaches it from its inputs.
    pub fn kill(&mut self, node: NodeId) {
        let inputs: Vec<NodeId> = {
            let n = &self.nodes[node.index()];
            n.value_inputs
                .iter()
                .chain(&n.effect_inputs)
                .chain(&n.control_inputs)
                .copied()
                .collect()
        };
        for input in inputs {
            self.forget_use(input, node);
        }
        let n = &mut self.nodes[node.index()];
        n.value_inputs.clear();
        n.effect_inputs.clear();
        n.control_inputs.clear();
        n.dead = true;
    }

    fn record_use(&mut self, input: NodeId, user: NodeId) {
        if self.uses.len() <= input.index() {
            self.uses.resize(input.index() + 1, Vec::new());
        }
        self.uses[input.index()].push(user);
    }

    fn forget_use(&mut self, input: NodeId, user: NodeId) {
        if let Some(list) = self.uses.get_mut(input.index())
            && let Some(pos) = list.iter().position(|u| *u == user)
        {
            list.swap_remove(pos);
        }
    }
}

#[cfg(test)]
#[path = "../tests/graph/t_graph.rs"]
mod tests;
