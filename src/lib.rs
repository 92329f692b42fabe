//! # fasim
//!
//! A playground for finite automata and context-free grammars.
//!
//! This library provides functionality to:
//! - Build DFAs and NFAs (with optional epsilon moves) as immutable values
//! - Compute epsilon closures and single-symbol moves
//! - Play an automaton back over an input, step by step, with pause, resume and step back
//! - Validate grammars, convert them towards Chomsky Normal Form and compute FIRST sets
//! - Draw random derivation trees from a grammar
//! - Test membership of a string with the CYK algorithm
//! - Export automata as Graphviz DOT

// Re-export the modules
pub mod cyk;
pub mod dfa;
pub mod fa;
pub mod grammar;
pub mod nfa;
pub mod simulation;
pub mod visualizer;

// Re-export commonly used items for convenience
pub use cyk::{parse_cyk, parse_cyk_strict, CykResult};
pub use dfa::DFA;
pub use fa::{load_automaton, save_automaton, Automaton, AutomatonError, StateSet, Symbol, FA};
pub use grammar::{
    compute_first_sets, convert_to_cnf, is_chomsky_normal_form, load_grammar, random_derivation,
    validate_grammar, DerivationNode, Grammar, Production,
};
pub use nfa::NFA;
pub use simulation::{Outcome, Phase, Simulate, Simulation, SimulationConfig, TestResult};
pub use visualizer::{save_dot, to_dot};
