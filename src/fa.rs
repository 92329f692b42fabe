use color_eyre::eyre::Result;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::dfa::DFA;
use crate::nfa::NFA;

/// The character reserved for the empty-string move. It can never be part of an alphabet.
pub const EPSILON: char = 'ε';

/// A set of state names. Ordered so that every derived listing is stable.
pub type StateSet = BTreeSet<String>;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Symbol {
    Epsilon,
    Char(char),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Epsilon => write!(f, "{}", EPSILON),
            Symbol::Char(ch) => write!(f, "{}", ch),
        }
    }
}

// Symbols are written as one-character strings so they can key JSON objects.
impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct SymbolVisitor;

impl<'de> Visitor<'de> for SymbolVisitor {
    type Value = Symbol;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a single character or \"{}\"", EPSILON)
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Symbol, E>
    where
        E: de::Error,
    {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(EPSILON), None) => Ok(Symbol::Epsilon),
            (Some(ch), None) => Ok(Symbol::Char(ch)),
            _ => Err(E::custom(format!(
                "symbol {:?} must be exactly one character",
                value
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Symbol, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(SymbolVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomatonError {
    #[error("Error: Character '{0}' is not in the alphabet.")]
    InvalidSymbol(char),
    #[error("Error: State {0} does not exist!")]
    UnknownState(String),
    #[error("Error: State {0} already exists!")]
    DuplicateState(String),
    #[error("Error: Symbol '{0}' is already part of the alphabet!")]
    DuplicateSymbol(char),
    #[error("Error: '{}' is reserved for epsilon transitions and cannot be an alphabet symbol!", EPSILON)]
    ReservedSymbol,
    #[error("Error: Epsilon transitions are disabled for this automaton!")]
    EpsilonDisabled,
    #[error("Error: Malformed automaton: {0}")]
    Malformed(String),
}

/// Read access shared by every finite automaton.
pub trait FA {
    fn get_states(&self) -> &[String];
    fn get_alphabet(&self) -> &[char];
    fn get_initial_state(&self) -> &str;
    fn get_accepting_states(&self) -> &StateSet;
    /// Every `(from, symbol, to)` edge, in state declaration order.
    fn get_transition_list(&self) -> Vec<(&str, Symbol, &str)>;

    fn has_state(&self, state: &str) -> bool {
        self.get_states().iter().any(|s| s == state)
    }

    fn has_symbol(&self, symbol: char) -> bool {
        self.get_alphabet().contains(&symbol)
    }

    fn is_accepting_state(&self, state: &str) -> bool {
        self.get_accepting_states().contains(state)
    }

    fn are_accepting_states(&self, states: &StateSet) -> bool {
        states.iter().any(|state| self.is_accepting_state(state))
    }
}

/// Structural checks shared by the DFA and NFA constructors.
pub(crate) fn check_structure(
    states: &[String],
    alphabet: &[char],
    initial_state: &str,
    accepting_states: &StateSet,
) -> Result<(), AutomatonError> {
    if states.is_empty() {
        return Err(AutomatonError::Malformed(
            "an automaton needs at least one state".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for state in states {
        if state.is_empty() {
            return Err(AutomatonError::Malformed(
                "state names cannot be empty".to_string(),
            ));
        }
        if !seen.insert(state.as_str()) {
            return Err(AutomatonError::DuplicateState(state.clone()));
        }
    }

    let mut seen_symbols = BTreeSet::new();
    for symbol in alphabet {
        if *symbol == EPSILON {
            return Err(AutomatonError::ReservedSymbol);
        }
        if !seen_symbols.insert(*symbol) {
            return Err(AutomatonError::DuplicateSymbol(*symbol));
        }
    }

    if !seen.contains(initial_state) {
        return Err(AutomatonError::UnknownState(initial_state.to_string()));
    }

    if let Some(stray) = accepting_states.iter().find(|s| !seen.contains(s.as_str())) {
        return Err(AutomatonError::UnknownState(stray.clone()));
    }

    Ok(())
}

pub(crate) fn check_new_state(states: &[String], state: &str) -> Result<(), AutomatonError> {
    if state.is_empty() {
        return Err(AutomatonError::Malformed(
            "state names cannot be empty".to_string(),
        ));
    }
    if states.iter().any(|s| s == state) {
        return Err(AutomatonError::DuplicateState(state.to_string()));
    }
    Ok(())
}

pub(crate) fn check_new_symbol(alphabet: &[char], symbol: char) -> Result<(), AutomatonError> {
    if symbol == EPSILON {
        return Err(AutomatonError::ReservedSymbol);
    }
    if alphabet.contains(&symbol) {
        return Err(AutomatonError::DuplicateSymbol(symbol));
    }
    Ok(())
}

/// Either kind of automaton, tagged by `type` in its JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Automaton {
    #[serde(rename = "dfa")]
    Dfa(DFA),
    #[serde(rename = "nfa")]
    Nfa(NFA),
}

impl Automaton {
    pub fn as_fa(&self) -> &dyn FA {
        match self {
            Automaton::Dfa(dfa) => dfa,
            Automaton::Nfa(nfa) => nfa,
        }
    }
}

/// Load an automaton from a JSON file. Every structural invariant is re-checked while loading.
pub fn load_automaton<P: AsRef<Path>>(file_name: P) -> Result<Automaton> {
    let file = File::open(file_name)?;
    let buf_reader = BufReader::new(file);
    let automaton: Automaton = serde_json::from_reader(buf_reader)?;
    Ok(automaton)
}

pub fn save_automaton<P: AsRef<Path>>(automaton: &Automaton, file_name: P) -> Result<()> {
    let json_string = serde_json::to_string_pretty(automaton)?;
    let mut file = File::create(file_name)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}
