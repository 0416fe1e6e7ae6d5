//! Worklist driver that applies reducers to a graph until fixed point.

use std::collections::VecDeque;

use crate::graph::{Graph, NodeId};

/// Verdict returned by a reducer for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Nothing to do (yet); the node is revisited if an input changes.
    NoChange,
    /// The node's recorded information changed; its uses are requeued.
    Changed(NodeId),
    /// The node is replaced by another node and killed.
    Replace(NodeId),
}

pub trait Reducer {
    fn name(&self) -> &'static str;

    /// Reduces one node.
    ///
    /// A reducer that replaces an effectful node with a plain *value* must
    /// rewire effect users itself (`Graph::replace_with_value`) before
    /// returning `Replace`; the driver's blanket rewire is only correct when
    /// the replacement can stand in for every edge kind.
    fn reduce(&mut self, graph: &mut Graph, node: NodeId) -> Reduction;
}

pub struct GraphReducer {
    queue: VecDeque<NodeId>,
    on_queue: Vec<bool>,
}

impl GraphReducer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            on_queue: Vec::new(),
        }
    }

    pub fn reduce_graph(&mut self, graph: &mut Graph, reducer: &mut dyn Reducer) {
        // Seed in creation order, which tends to visit effect predecessors
        // before their users; revisiting covers the rest.
        for id in graph.node_ids() {
            if !graph.is_dead(id) {
                self.push(id);
            }
        }
        while let Some(node) = self.pop() {
            if graph.is_dead(node) {
                continue;
            }
            match reducer.reduce(graph, node) {
                Reduction::NoChange => {}
                Reduction::Changed(changed) => self.push_uses(graph, changed),
                Reduction::Replace(replacement) => {
                    if replacement != node {
                        graph.replace_all_uses(node, replacement);
                        graph.kill(node);
                        self.push_uses(graph, replacement);
                    }
                }
            }
        }
    }

    fn push(&mut self, node: NodeId) {
        if self.on_queue.len() <= node.index() {
            self.on_queue.resize(node.index() + 1, false);
        }
        if !self.on_queue[node.index()] {
            self.on_queue[node.index()] = true;
            self.queue.push_back(node);
        }
    }

    fn push_uses(&mut self, graph: &Graph, node: NodeId) {
        for user in graph.uses(node).to_vec() {
            self.push(user);
        }
    }

    fn pop(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.on_queue[node.index()] = false;
        Some(node)
    }
}

/// Runs a single reducer over the graph to fixed point.
pub fn reduce_graph(graph: &mut Graph, reducer: &mut dyn Reducer) {
    GraphReducer::new().reduce_graph(graph, reducer);
}

#[cfg(test)]
#[path = "tests/reduce/t_reducer.rs"]
mod tests;
