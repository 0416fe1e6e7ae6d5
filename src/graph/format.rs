//! Text formatter for graphs.
//!
//! One node per line, in id order, skipping dead nodes. The output parses
//! back into an equivalent graph.

use std::fmt::Write as _;

use crate::graph::{Graph, NodeId};
use crate::op::access::{BaseTaggedness, ElementAccess, FieldAccess, MachineType};
use crate::op::Operator;

pub fn format_graph(graph: &Graph) -> String {
    let mut out = String::new();
    for id in graph.live_node_ids() {
        write_node(&mut out, graph, id);
    }
    out
}

fn write_node(out: &mut String, graph: &Graph, id: NodeId) {
    let node = graph.node(id);
    let _ = write!(out, "{} = {}", id, node.op.mnemonic());
    for input in &node.value_inputs {
        let _ = write!(out, " {input}");
    }
    match &node.op {
        Operator::Parameter { index } => {
            let _ = write!(out, " index={index}");
        }
        Operator::Constant { value } => {
            let _ = write!(out, " value={value}");
        }
        Operator::HeapConstant { id } => {
            let _ = write!(out, " id={id}");
        }
        Operator::LoadField { access } | Operator::StoreField { access } => {
            write_field_access(out, access);
        }
        Operator::LoadElement { access } | Operator::StoreElement { access } => {
            write_element_access(out, access);
        }
        Operator::Call { properties, .. } => {
            if properties.contains(crate::op::Properties::NO_WRITE) {
                let _ = write!(out, " writes=false");
            }
        }
        _ => {}
    }
    write_input_list(out, "eff", &node.effect_inputs);
    write_input_list(out, "ctl", &node.control_inputs);
    out.push('\n');
}

fn write_field_access(out: &mut String, access: &FieldAccess) {
    let _ = write!(out, " offset={}", access.offset);
    if access.machine_type != MachineType::AnyTagged {
        let _ = write!(out, " machine={}", access.machine_type.token());
    }
    if access.base_is_tagged == BaseTaggedness::Untagged {
        let _ = write!(out, " base=untagged");
    }
}

fn write_element_access(out: &mut String, access: &ElementAccess) {
    let _ = write!(out, " header={}", access.header_size);
    if access.machine_type != MachineType::AnyTagged {
        let _ = write!(out, " machine={}", access.machine_type.token());
    }
    if access.base_is_tagged == BaseTaggedness::Untagged {
        let _ = write!(out, " base=untagged");
    }
}

fn write_input_list(out: &mut String, key: &str, inputs: &[NodeId]) {
    if inputs.is_empty() {
        return;
    }
    let _ = write!(out, " {key}=");
    for (i, input) in inputs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{input}");
    }
}
