//! Convenience constructor for graphs.

use crate::graph::{Graph, NodeId};
use crate::op::access::{ElementAccess, FieldAccess};
use crate::op::{Operator, Properties};

/// Builds a graph one node at a time, starting from an implicit start node.
pub struct GraphBuilder {
    graph: Graph,
    start: NodeId,
}

impl GraphBuilder {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let start = graph.add_node(Operator::Start, vec![], vec![], vec![]);
        Self { graph, start }
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn finish(self) -> Graph {
        self.graph
    }

    pub fn parameter(&mut self, index: u32) -> NodeId {
        self.graph
            .add_node(Operator::Parameter { index }, vec![], vec![], vec![self.start])
    }

    pub fn constant(&mut self, value: i64) -> NodeId {
        self.graph
            .add_node(Operator::Constant { value }, vec![], vec![], vec![])
    }

    pub fn heap_constant(&mut self, id: u32) -> NodeId {
        self.graph
            .add_node(Operator::HeapConstant { id }, vec![], vec![], vec![])
    }

    pub fn branch(&mut self, cond: NodeId, control: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Branch, vec![cond], vec![], vec![control])
    }

    pub fn if_true(&mut self, branch: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::IfTrue, vec![], vec![], vec![branch])
    }

    pub fn if_false(&mut self, branch: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::IfFalse, vec![], vec![], vec![branch])
    }

    pub fn merge(&mut self, controls: &[NodeId]) -> NodeId {
        self.graph
            .add_node(Operator::Merge, vec![], vec![], controls.to_vec())
    }

    /// A loop header with only its entry edge; patch the backedge in with
    /// `Graph::add_control_input` once the body exists.
    pub fn loop_(&mut self, entry: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Loop, vec![], vec![], vec![entry])
    }

    pub fn phi(&mut self, values: &[NodeId], control: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Phi, values.to_vec(), vec![], vec![control])
    }

    pub fn effect_phi(&mut self, effects: &[NodeId], control: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::EffectPhi, vec![], effects.to_vec(), vec![control])
    }

    pub fn load_field(
        &mut self,
        object: NodeId,
        access: FieldAccess,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::LoadField { access },
            vec![object],
            vec![effect],
            vec![control],
        )
    }

    pub fn store_field(
        &mut self,
        object: NodeId,
        value: NodeId,
        access: FieldAccess,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::StoreField { access },
            vec![object, value],
            vec![effect],
            vec![control],
        )
    }

    pub fn load_element(
        &mut self,
        object: NodeId,
        index: NodeId,
        access: ElementAccess,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::LoadElement { access },
            vec![object, index],
            vec![effect],
            vec![control],
        )
    }

    pub fn store_element(
        &mut self,
        object: NodeId,
        index: NodeId,
        value: NodeId,
        access: ElementAccess,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::StoreElement { access },
            vec![object, index, value],
            vec![effect],
            vec![control],
        )
    }

    pub fn check_maps(
        &mut self,
        object: NodeId,
        maps: &[NodeId],
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        let mut value_inputs = Vec::with_capacity(1 + maps.len());
        value_inputs.push(object);
        value_inputs.extend_from_slice(maps);
        self.graph.add_node(
            Operator::CheckMaps,
            value_inputs,
            vec![effect],
            vec![control],
        )
    }

    pub fn transition_elements_kind(
        &mut self,
        object: NodeId,
        source_map: NodeId,
        target_map: NodeId,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::TransitionElementsKind,
            vec![object, source_map, target_map],
            vec![effect],
            vec![control],
        )
    }

    pub fn call(
        &mut self,
        args: &[NodeId],
        properties: Properties,
        effect: NodeId,
        control: NodeId,
    ) -> NodeId {
        self.graph.add_node(
            Operator::Call {
                arity: args.len() as u32,
                properties,
            },
            args.to_vec(),
            vec![effect],
            vec![control],
        )
    }

    pub fn return_(&mut self, value: NodeId, effect: NodeId, control: NodeId) -> NodeId {
        self.graph
            .add_node(Operator::Return, vec![value], vec![effect], vec![control])
    }

    pub fn end(&mut self, controls: &[NodeId]) -> NodeId {
        self.graph
            .add_node(Operator::End, vec![], vec![], controls.to_vec())
    }
}
