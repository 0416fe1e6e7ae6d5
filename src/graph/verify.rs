//! Structural validity checks for graphs.

use thiserror::Error;

use crate::graph::{Graph, NodeId};
use crate::op::Operator;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct VerifyError {
    message: String,
}

fn err(node: NodeId, message: impl Into<String>) -> VerifyError {
    VerifyError {
        message: format!("{node}: {}", message.into()),
    }
}

pub fn verify_graph(graph: &Graph) -> Result<(), VerifyError> {
    let mut start_count = 0;
    for id in graph.live_node_ids() {
        if matches!(graph.op(id), Operator::Start) {
            start_count += 1;
        }
    }
    if start_count != 1 {
        return Err(VerifyError {
            message: format!("expected exactly one start node, found {start_count}"),
        });
    }

    for id in graph.live_node_ids() {
        verify_node(graph, id)?;
    }
    Ok(())
}

fn verify_node(graph: &Graph, id: NodeId) -> Result<(), VerifyError> {
    let node = graph.node(id);

    for input in node
        .value_inputs
        .iter()
        .chain(&node.effect_inputs)
        .chain(&node.control_inputs)
    {
        if input.index() >= graph.node_count() {
            return Err(err(id, format!("input {input} does not exist")));
        }
        if graph.is_dead(*input) {
            return Err(err(id, format!("input {input} is dead")));
        }
    }

    // (value, effect, control) arity; `None` means variadic.
    let expected: (Option<usize>, Option<usize>, Option<usize>) = match &node.op {
        Operator::Start => (Some(0), Some(0), Some(0)),
        Operator::End => (Some(0), Some(0), None),
        Operator::Parameter { .. } => (Some(0), Some(0), Some(1)),
        Operator::Constant { .. } | Operator::HeapConstant { .. } => (Some(0), Some(0), Some(0)),
        Operator::Branch => (Some(1), Some(0), Some(1)),
        Operator::IfTrue | Operator::IfFalse => (Some(0), Some(0), Some(1)),
        Operator::Merge | Operator::Loop => (Some(0), Some(0), None),
        Operator::Return => (Some(1), Some(1), Some(1)),
        Operator::Phi => (None, Some(0), Some(1)),
        Operator::EffectPhi => (Some(0), None, Some(1)),
        Operator::LoadField { .. } => (Some(1), Some(1), Some(1)),
        Operator::StoreField { .. } => (Some(2), Some(1), Some(1)),
        Operator::LoadElement { .. } => (Some(2), Some(1), Some(1)),
        Operator::StoreElement { .. } => (Some(3), Some(1), Some(1)),
        Operator::CheckMaps => (None, Some(1), Some(1)),
        Operator::TransitionElementsKind => (Some(3), Some(1), Some(1)),
        Operator::Call { arity, .. } => (Some(*arity as usize), Some(1), Some(1)),
    };

    check_arity(id, "value", node.value_inputs.len(), expected.0)?;
    check_arity(id, "effect", node.effect_inputs.len(), expected.1)?;
    check_arity(id, "control", node.control_inputs.len(), expected.2)?;

    match &node.op {
        Operator::End | Operator::Merge | Operator::Loop => {
            if node.control_inputs.is_empty() {
                return Err(err(id, "requires at least one control input"));
            }
        }
        Operator::CheckMaps => {
            if node.value_inputs.len() < 2 {
                return Err(err(id, "requires an object and at least one map"));
            }
        }
        Operator::Phi => {
            let control = node.control_inputs[0];
            if !matches!(graph.op(control), Operator::Merge | Operator::Loop) {
                return Err(err(id, "phi control must be a merge or loop"));
            }
            let preds = graph.node(control).control_inputs.len();
            if node.value_inputs.len() != preds {
                return Err(err(
                    id,
                    format!(
                        "phi has {} value inputs for a {}-predecessor control",
                        node.value_inputs.len(),
                        preds
                    ),
                ));
            }
        }
        Operator::EffectPhi => {
            let control = node.control_inputs[0];
            if !matches!(graph.op(control), Operator::Merge | Operator::Loop) {
                return Err(err(id, "effect_phi control must be a merge or loop"));
            }
            let preds = graph.node(control).control_inputs.len();
            if node.effect_inputs.len() != preds {
                return Err(err(
                    id,
                    format!(
                        "effect_phi has {} effect inputs for a {}-predecessor control",
                        node.effect_inputs.len(),
                        preds
                    ),
                ));
            }
        }
        _ => {}
    }

    Ok(())
}

fn check_arity(
    id: NodeId,
    kind: &str,
    actual: usize,
    expected: Option<usize>,
) -> Result<(), VerifyError> {
    match expected {
        Some(expected) if actual != expected => Err(err(
            id,
            format!("expected {expected} {kind} inputs, found {actual}"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "../tests/graph/t_verify.rs"]
mod tests;
