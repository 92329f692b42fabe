use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;

use color_eyre::eyre::Result;
use log::info;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::prelude::StableGraph;

use crate::fa::{StateSet, FA};

/// A state as drawn: its name plus the markers the renderer cares about.
#[derive(Debug, Clone)]
struct StateNode {
    name: String,
    initial: bool,
    accepting: bool,
    active: bool,
}

impl fmt::Display for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.initial {
            write!(f, "Start\n{}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl StateNode {
    fn attributes(&self) -> String {
        let mut attributes = vec![format!("label = \"{}\"", self.to_string().escape_debug())];
        if self.accepting {
            attributes.push("shape = doublecircle".to_string());
        } else {
            attributes.push("shape = circle".to_string());
        }
        if self.active {
            attributes.push("style = filled".to_string());
            attributes.push("fillcolor = \"#1482a5\"".to_string());
        }
        attributes.join(", ")
    }
}

fn generate_stable_graph<T: FA + ?Sized>(fa: &T, active: &StateSet) -> StableGraph<StateNode, String> {
    let mut stable_graph = StableGraph::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();

    for state in fa.get_states() {
        let node = stable_graph.add_node(StateNode {
            name: state.clone(),
            initial: state == fa.get_initial_state(),
            accepting: fa.is_accepting_state(state),
            active: active.contains(state),
        });
        node_map.insert(state.as_str(), node);
    }

    // Parallel edges are merged into one edge with a comma separated label
    let mut edge_map: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();

    for (from, symbol, to) in fa.get_transition_list() {
        let (Some(&source), Some(&target)) = (node_map.get(from), node_map.get(to)) else {
            continue;
        };
        let label = symbol.to_string();
        match edge_map.get(&(source, target)) {
            Some(&edge_idx) => {
                let old_label = &stable_graph[edge_idx];
                stable_graph[edge_idx] = format!("{}, {}", old_label, label);
            }
            None => {
                let edge_idx = stable_graph.add_edge(source, target, label);
                edge_map.insert((source, target), edge_idx);
            }
        }
    }

    stable_graph
}

/// Render an automaton as Graphviz DOT, filling the states in `active`.
pub fn to_dot<T: FA + ?Sized>(fa: &T, active: &StateSet) -> String {
    let stable_graph = generate_stable_graph(fa, active);
    let dot = Dot::with_attr_getters(
        &stable_graph,
        &[Config::NodeNoLabel],
        &|_, _| String::new(),
        &|_, (_, node)| node.attributes(),
    );
    format!("{}", dot)
}

/// Write the DOT rendering of an automaton to `{filename}.dot`.
pub fn save_dot<T: FA + ?Sized>(fa: &T, active: &StateSet, filename: &str) -> Result<()> {
    let dot_filename = format!("{}.dot", filename);
    let mut dot_file = File::create(&dot_filename)?;
    dot_file.write_all(to_dot(fa, active).as_bytes())?;
    info!("automaton saved as {}", dot_filename);
    Ok(())
}
