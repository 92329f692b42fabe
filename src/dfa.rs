/* Deterministic finite automaton. The transition table is total: every state maps every
 * alphabet symbol to exactly one state, and unset entries fall back to the first declared
 * state. Every edit returns a fresh automaton. */

use crate::fa::{check_new_state, check_new_symbol, check_structure, AutomatonError, StateSet, Symbol, FA};
use crate::simulation::{evaluate, Advance, FiredTransition, Outcome, Simulate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type TransitionTable = BTreeMap<String, BTreeMap<char, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDFA")]
pub struct DFA {
    states: Vec<String>,
    alphabet: Vec<char>,
    transitions: TransitionTable,
    initial_state: String,
    accepting_states: StateSet,
}

/// The JSON shape accepted on load, before the invariants have been checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDFA {
    states: Vec<String>,
    alphabet: Vec<char>,
    #[serde(default)]
    transitions: TransitionTable,
    #[serde(default)]
    initial_state: Option<String>,
    #[serde(default)]
    accepting_states: Vec<String>,
}

impl TryFrom<RawDFA> for DFA {
    type Error = AutomatonError;

    fn try_from(raw: RawDFA) -> Result<Self, Self::Error> {
        let initial_state = match raw.initial_state {
            Some(state) if !state.is_empty() => state,
            _ => raw.states.first().cloned().unwrap_or_default(),
        };
        let dfa = DFA::new(
            raw.states,
            raw.alphabet,
            &initial_state,
            raw.accepting_states,
        )?;

        let mut transitions = dfa.transitions.clone();
        for (from, row) in raw.transitions {
            if !dfa.has_state(&from) {
                return Err(AutomatonError::UnknownState(from));
            }
            for (symbol, to) in row {
                if !dfa.has_symbol(symbol) {
                    return Err(AutomatonError::InvalidSymbol(symbol));
                }
                if !dfa.has_state(&to) {
                    return Err(AutomatonError::UnknownState(to));
                }
                transitions.entry(from.clone()).or_default().insert(symbol, to);
            }
        }

        Ok(DFA { transitions, ..dfa })
    }
}

impl FA for DFA {
    fn get_states(&self) -> &[String] {
        &self.states
    }

    fn get_alphabet(&self) -> &[char] {
        &self.alphabet
    }

    fn get_initial_state(&self) -> &str {
        &self.initial_state
    }

    fn get_accepting_states(&self) -> &StateSet {
        &self.accepting_states
    }

    fn get_transition_list(&self) -> Vec<(&str, Symbol, &str)> {
        let mut transition_list = Vec::new();
        for state in &self.states {
            for symbol in &self.alphabet {
                if let Some(target) = self.transitions.get(state).and_then(|row| row.get(symbol)) {
                    transition_list.push((state.as_str(), Symbol::Char(*symbol), target.as_str()));
                }
            }
        }
        transition_list
    }
}

impl DFA {
    /// Build a DFA whose transitions all point at the first declared state.
    pub fn new<I>(
        states: Vec<String>,
        alphabet: Vec<char>,
        initial_state: &str,
        accepting_states: I,
    ) -> Result<Self, AutomatonError>
    where
        I: IntoIterator<Item = String>,
    {
        let accepting_states: StateSet = accepting_states.into_iter().collect();
        check_structure(&states, &alphabet, initial_state, &accepting_states)?;

        let mut dfa = DFA {
            states,
            alphabet,
            transitions: TransitionTable::new(),
            initial_state: initial_state.to_string(),
            accepting_states,
        };
        dfa.fill_missing_transitions();
        Ok(dfa)
    }

    fn default_target(&self) -> &str {
        // Non-empty by construction
        &self.states[0]
    }

    fn fill_missing_transitions(&mut self) {
        let default_target = self.default_target().to_string();
        for state in &self.states {
            let row = self.transitions.entry(state.clone()).or_default();
            for symbol in &self.alphabet {
                row.entry(*symbol).or_insert_with(|| default_target.clone());
            }
        }
    }

    /// Look up the single successor of `state` on `symbol`.
    pub fn compute_next_state(&self, state: &str, symbol: char) -> Result<&str, AutomatonError> {
        if !self.has_symbol(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }
        self.transitions
            .get(state)
            .and_then(|row| row.get(&symbol))
            .map(String::as_str)
            .ok_or_else(|| AutomatonError::UnknownState(state.to_string()))
    }

    /// Run the whole input at once.
    pub fn process_input(&self, input: &str) -> Outcome {
        evaluate(self, input)
    }

    pub fn add_state(&self, state: &str) -> Result<Self, AutomatonError> {
        check_new_state(&self.states, state)?;
        let mut dfa = self.clone();
        dfa.states.push(state.to_string());
        dfa.fill_missing_transitions();
        Ok(dfa)
    }

    /// Remove a state, redirecting every transition that pointed at it to the (new) first state.
    pub fn remove_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        if self.states.len() == 1 {
            return Err(AutomatonError::Malformed(
                "cannot remove the only state of an automaton".to_string(),
            ));
        }

        let mut dfa = self.clone();
        dfa.states.retain(|s| s != state);
        dfa.transitions.remove(state);
        dfa.accepting_states.remove(state);

        let default_target = dfa.default_target().to_string();
        for row in dfa.transitions.values_mut() {
            for target in row.values_mut() {
                if target == state {
                    *target = default_target.clone();
                }
            }
        }

        if dfa.initial_state == state {
            dfa.initial_state = default_target;
        }
        Ok(dfa)
    }

    pub fn add_symbol(&self, symbol: char) -> Result<Self, AutomatonError> {
        check_new_symbol(&self.alphabet, symbol)?;
        let mut dfa = self.clone();
        dfa.alphabet.push(symbol);
        dfa.fill_missing_transitions();
        Ok(dfa)
    }

    pub fn remove_symbol(&self, symbol: char) -> Result<Self, AutomatonError> {
        if !self.has_symbol(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }
        let mut dfa = self.clone();
        dfa.alphabet.retain(|s| *s != symbol);
        for row in dfa.transitions.values_mut() {
            row.remove(&symbol);
        }
        Ok(dfa)
    }

    pub fn set_initial_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        Ok(DFA {
            initial_state: state.to_string(),
            ..self.clone()
        })
    }

    pub fn toggle_accepting_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        let mut dfa = self.clone();
        if !dfa.accepting_states.remove(state) {
            dfa.accepting_states.insert(state.to_string());
        }
        Ok(dfa)
    }

    pub fn set_transition(&self, from: &str, symbol: char, to: &str) -> Result<Self, AutomatonError> {
        if !self.has_symbol(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }
        for state in [from, to] {
            if !self.has_state(state) {
                return Err(AutomatonError::UnknownState(state.to_string()));
            }
        }
        let mut dfa = self.clone();
        dfa.transitions
            .entry(from.to_string())
            .or_default()
            .insert(symbol, to.to_string());
        Ok(dfa)
    }
}

impl Simulate for DFA {
    type Configuration = String;

    fn initial_configuration(&self) -> String {
        self.initial_state.clone()
    }

    fn advance(&self, from: &String, symbol: char) -> Result<Advance<String>, Outcome> {
        match self.compute_next_state(from, symbol) {
            Ok(next_state) => Ok(Advance {
                configuration: next_state.to_string(),
                transitions: vec![FiredTransition {
                    from: from.clone(),
                    symbol,
                    to: next_state.to_string(),
                }],
                epsilon_reached: StateSet::new(),
            }),
            Err(AutomatonError::InvalidSymbol(symbol)) => Err(Outcome::InvalidSymbol { symbol }),
            Err(_) => Err(Outcome::NoValidTransition {
                from: StateSet::from([from.clone()]),
                symbol,
            }),
        }
    }

    fn verdict(&self, configuration: &String) -> Outcome {
        if self.is_accepting_state(configuration) {
            Outcome::Accepted
        } else {
            Outcome::EndedInRejectingState {
                state: configuration.clone(),
            }
        }
    }
}
