//! Pipeline entry point for textual graphs: parse, verify, reduce, format.

use crate::diag::SwellError;
use crate::graph::format::format_graph;
use crate::graph::verify::verify_graph;
use crate::opt::load_elim::LoadElimination;
use crate::parse::parse_graph;
use crate::reduce::{self, Reducer};

#[derive(Debug, Default)]
pub struct RunOptions {
    pub dump: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DumpFlags {
    before: bool,
    states: bool,
}

impl DumpFlags {
    fn from_spec(spec: Option<&str>) -> Self {
        let mut flags = Self::default();
        if let Some(spec) = spec {
            for item in spec.split(',').map(|s| s.trim().to_lowercase()) {
                match item.as_str() {
                    "before" => flags.before = true,
                    "states" => flags.states = true,
                    "" => {}
                    _ => eprintln!("[WARN] unknown dump flag: {item}"),
                }
            }
        }
        flags
    }
}

/// Parses a textual graph, reduces it to fixed point, and returns the
/// formatted result.
pub fn run(source: &str, opts: &RunOptions) -> Result<String, SwellError> {
    let dump = DumpFlags::from_spec(opts.dump.as_deref());

    let mut graph = parse_graph(source)?;
    verify_graph(&graph)?;

    if dump.before {
        print!("{}", format_graph(&graph));
        println!("---");
    }

    let mut pass = LoadElimination::new();
    reduce::reduce_graph(&mut graph, &mut pass);

    if dump.states {
        println!("# {} states", pass.name());
        print!("{}", pass.format_states(&graph));
        println!("---");
    }

    verify_graph(&graph)?;
    Ok(format_graph(&graph))
}
