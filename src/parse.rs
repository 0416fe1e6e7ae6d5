//! Parser for the textual graph format.
//!
//! One node per line: `%name = opcode %operand... key=value...`. Effect and
//! control inputs are given as `eff=%a,%b` and `ctl=%a,%b` attribute lists.
//! Names may be referenced before their definition (loop backedges).

use indexmap::IndexMap;
use thiserror::Error;

use crate::graph::{Graph, NodeId};
use crate::op::access::{BaseTaggedness, ElementAccess, FieldAccess, MachineType};
use crate::op::{Operator, Properties};

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("line {line}: unknown opcode `{mnemonic}`")]
    UnknownOpcode { line: usize, mnemonic: String },

    #[error("line {line}: unknown node `%{name}`")]
    UnknownNode { line: usize, name: String },

    #[error("line {line}: duplicate node `%{name}`")]
    DuplicateNode { line: usize, name: String },
}

fn malformed(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        line,
        message: message.into(),
    }
}

#[derive(Debug, Default)]
struct Attrs {
    offset: Option<u32>,
    header: Option<u32>,
    machine: Option<MachineType>,
    base: Option<BaseTaggedness>,
    index: Option<u32>,
    value: Option<i64>,
    id: Option<u32>,
    writes: Option<bool>,
}

pub fn parse_graph(source: &str) -> Result<Graph, ParseError> {
    // First pass: assign an id per definition so later lines can be
    // referenced before they are seen.
    let mut names: IndexMap<String, NodeId> = IndexMap::new();
    let mut defs: Vec<(usize, String)> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let Some((lhs, rhs)) = text.split_once('=') else {
            return Err(malformed(line, "expected `%name = opcode ...`"));
        };
        let Some(name) = lhs.trim().strip_prefix('%') else {
            return Err(malformed(line, "node name must start with `%`"));
        };
        if name.is_empty() {
            return Err(malformed(line, "empty node name"));
        }
        let id = NodeId(names.len() as u32);
        if names.insert(name.to_string(), id).is_some() {
            return Err(ParseError::DuplicateNode {
                line,
                name: name.to_string(),
            });
        }
        defs.push((line, rhs.trim().to_string()));
    }

    // Second pass: build nodes in definition order so ids line up.
    let mut graph = Graph::new();
    for (line, rhs) in &defs {
        parse_node(&mut graph, &names, *line, rhs)?;
    }
    Ok(graph)
}

fn parse_node(
    graph: &mut Graph,
    names: &IndexMap<String, NodeId>,
    line: usize,
    rhs: &str,
) -> Result<(), ParseError> {
    let mut tokens = rhs.split_whitespace();
    let Some(mnemonic) = tokens.next() else {
        return Err(malformed(line, "missing opcode"));
    };

    let mut value_inputs = Vec::new();
    let mut effect_inputs = Vec::new();
    let mut control_inputs = Vec::new();
    let mut attrs = Attrs::default();

    for token in tokens {
        if let Some(name) = token.strip_prefix('%') {
            value_inputs.push(resolve(names, line, name)?);
        } else if let Some((key, value)) = token.split_once('=') {
            match key {
                "eff" => parse_input_list(names, line, value, &mut effect_inputs)?,
                "ctl" => parse_input_list(names, line, value, &mut control_inputs)?,
                "offset" => attrs.offset = Some(parse_num(line, key, value)?),
                "header" => attrs.header = Some(parse_num(line, key, value)?),
                "index" => attrs.index = Some(parse_num(line, key, value)?),
                "id" => attrs.id = Some(parse_num(line, key, value)?),
                "value" => attrs.value = Some(parse_num(line, key, value)?),
                "machine" => {
                    attrs.machine = Some(MachineType::from_token(value).ok_or_else(|| {
                        malformed(line, format!("unknown machine type `{value}`"))
                    })?);
                }
                "base" => {
                    attrs.base = Some(match value {
                        "tagged" => BaseTaggedness::Tagged,
                        "untagged" => BaseTaggedness::Untagged,
                        _ => return Err(malformed(line, format!("unknown base `{value}`"))),
                    });
                }
                "writes" => {
                    attrs.writes = Some(match value {
                        "true" => true,
                        "false" => false,
                        _ => return Err(malformed(line, format!("bad writes flag `{value}`"))),
                    });
                }
                _ => return Err(malformed(line, format!("unknown attribute `{key}`"))),
            }
        } else {
            return Err(malformed(line, format!("unexpected token `{token}`")));
        }
    }

    let op = operator_from(mnemonic, &attrs, value_inputs.len(), line)?;
    graph.add_node(op, value_inputs, effect_inputs, control_inputs);
    Ok(())
}

fn operator_from(
    mnemonic: &str,
    attrs: &Attrs,
    value_count: usize,
    line: usize,
) -> Result<Operator, ParseError> {
    let op = match mnemonic {
        "start" => Operator::Start,
        "end" => Operator::End,
        "parameter" => Operator::Parameter {
            index: attrs
                .index
                .ok_or_else(|| malformed(line, "parameter requires index="))?,
        },
        "constant" => Operator::Constant {
            value: attrs
                .value
                .ok_or_else(|| malformed(line, "constant requires value="))?,
        },
        "heap_constant" => Operator::HeapConstant {
            id: attrs
                .id
                .ok_or_else(|| malformed(line, "heap_constant requires id="))?,
        },
        "branch" => Operator::Branch,
        "if_true" => Operator::IfTrue,
        "if_false" => Operator::IfFalse,
        "merge" => Operator::Merge,
        "loop" => Operator::Loop,
        "return" => Operator::Return,
        "phi" => Operator::Phi,
        "effect_phi" => Operator::EffectPhi,
        "load_field" => Operator::LoadField {
            access: field_access(attrs, line)?,
        },
        "store_field" => Operator::StoreField {
            access: field_access(attrs, line)?,
        },
        "load_element" => Operator::LoadElement {
            access: element_access(attrs, line)?,
        },
        "store_element" => Operator::StoreElement {
            access: element_access(attrs, line)?,
        },
        "check_maps" => Operator::CheckMaps,
        "transition_elements_kind" => Operator::TransitionElementsKind,
        "call" => Operator::Call {
            arity: value_count as u32,
            properties: if attrs.writes == Some(false) {
                Properties::NO_WRITE | Properties::NO_THROW
            } else {
                Properties::NONE
            },
        },
        _ => {
            return Err(ParseError::UnknownOpcode {
                line,
                mnemonic: mnemonic.to_string(),
            });
        }
    };
    Ok(op)
}

fn field_access(attrs: &Attrs, line: usize) -> Result<FieldAccess, ParseError> {
    let offset = attrs
        .offset
        .ok_or_else(|| malformed(line, "field access requires offset="))?;
    let mut access = FieldAccess::tagged(offset);
    if let Some(machine) = attrs.machine {
        access.machine_type = machine;
    }
    if let Some(base) = attrs.base {
        access.base_is_tagged = base;
    }
    Ok(access)
}

fn element_access(attrs: &Attrs, line: usize) -> Result<ElementAccess, ParseError> {
    let header = attrs
        .header
        .ok_or_else(|| malformed(line, "element access requires header="))?;
    let mut access = ElementAccess::tagged(header);
    if let Some(machine) = attrs.machine {
        access.machine_type = machine;
    }
    if let Some(base) = attrs.base {
        access.base_is_tagged = base;
    }
    Ok(access)
}

fn parse_input_list(
    names: &IndexMap<String, NodeId>,
    line: usize,
    list: &str,
    into: &mut Vec<NodeId>,
) -> Result<(), ParseError> {
    for part in list.split(',') {
        let Some(name) = part.strip_prefix('%') else {
            return Err(malformed(line, format!("bad node reference `{part}`")));
        };
        into.push(resolve(names, line, name)?);
    }
    Ok(())
}

fn parse_num<T: std::str::FromStr>(line: usize, key: &str, value: &str) -> Result<T, ParseError> {
    value
        .parse()
        .map_err(|_| malformed(line, format!("bad {key} value `{value}`")))
}

fn resolve(
    names: &IndexMap<String, NodeId>,
    line: usize,
    name: &str,
) -> Result<NodeId, ParseError> {
    names.get(name).copied().ok_or_else(|| ParseError::UnknownNode {
        line,
        name: name.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/parse/t_parse.rs"]
mod tests;
