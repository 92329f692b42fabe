use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fa::{
    check_new_state, check_new_symbol, check_structure, AutomatonError, StateSet, Symbol, EPSILON,
    FA,
};
use crate::simulation::{evaluate, Advance, FiredTransition, Outcome, Simulate};

type TransitionRelation = BTreeMap<String, BTreeMap<Symbol, StateSet>>;

/// A non-deterministic finite automaton with optional epsilon moves.
///
/// A missing or empty entry in the relation is a legal dead end. While
/// `use_epsilon_transitions` is off, the epsilon entries are kept but ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawNFA")]
pub struct NFA {
    states: Vec<String>,
    alphabet: Vec<char>,
    transitions: TransitionRelation,
    initial_state: String,
    accepting_states: StateSet,
    epsilon_symbol: char,
    use_epsilon_transitions: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNFA {
    states: Vec<String>,
    alphabet: Vec<char>,
    #[serde(default)]
    transitions: BTreeMap<String, BTreeMap<Symbol, Vec<String>>>,
    #[serde(default)]
    initial_state: Option<String>,
    #[serde(default)]
    accepting_states: Vec<String>,
    #[serde(default)]
    epsilon_symbol: Option<char>,
    #[serde(default = "default_use_epsilon")]
    use_epsilon_transitions: bool,
}

fn default_use_epsilon() -> bool {
    true
}

impl TryFrom<RawNFA> for NFA {
    type Error = AutomatonError;

    fn try_from(raw: RawNFA) -> Result<Self, Self::Error> {
        if let Some(symbol) = raw.epsilon_symbol.filter(|symbol| *symbol != EPSILON) {
            return Err(AutomatonError::Malformed(format!(
                "epsilon symbol must be '{}', found '{}'",
                EPSILON, symbol
            )));
        }
        let initial_state = match raw.initial_state {
            Some(state) if !state.is_empty() => state,
            _ => raw.states.first().cloned().unwrap_or_default(),
        };
        let mut nfa = NFA::new(
            raw.states,
            raw.alphabet,
            &initial_state,
            raw.accepting_states,
        )?;

        // Epsilon entries are loaded even when the toggle is off
        for (from, row) in raw.transitions {
            for (symbol, targets) in row {
                for to in targets {
                    nfa = nfa.add_transition(&from, symbol, &to)?;
                }
            }
        }
        Ok(nfa.set_use_epsilon_transitions(raw.use_epsilon_transitions))
    }
}

/// Result of moving a set of states over one input symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextStates {
    pub next_states: StateSet,
    pub transitions: Vec<FiredTransition>,
    /// States in `next_states` reached only through the epsilon closure.
    pub epsilon_reached: StateSet,
}

impl FA for NFA {
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
            let Some(row) = self.transitions.get(state) else {
                continue;
            };
            for (symbol, targets) in row {
                if *symbol == Symbol::Epsilon && !self.use_epsilon_transitions {
                    continue;
                }
                for target in targets {
                    transition_list.push((state.as_str(), *symbol, target.as_str()));
                }
            }
        }
        transition_list
    }
}

impl NFA {
    /// Build an NFA without transitions. Epsilon moves start enabled.
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

        Ok(NFA {
            states,
            alphabet,
            transitions: TransitionRelation::new(),
            initial_state: initial_state.to_string(),
            accepting_states,
            epsilon_symbol: EPSILON,
            use_epsilon_transitions: true,
        })
    }

    pub fn uses_epsilon_transitions(&self) -> bool {
        self.use_epsilon_transitions
    }

    /// Targets of `state` on `symbol`. Empty when there is no such move.
    pub fn get_targets(&self, state: &str, symbol: Symbol) -> StateSet {
        if symbol == Symbol::Epsilon && !self.use_epsilon_transitions {
            return StateSet::new();
        }
        self.transitions
            .get(state)
            .and_then(|row| row.get(&symbol))
            .cloned()
            .unwrap_or_default()
    }

    /// Every state reachable from `states` using epsilon moves only, `states` included.
    pub fn compute_epsilon_closure(&self, states: &StateSet) -> StateSet {
        if !self.use_epsilon_transitions {
            return states.clone();
        }

        let mut closure = states.clone();
        let mut stack: Vec<&str> = states.iter().map(String::as_str).collect();

        while let Some(state) = stack.pop() {
            let Some(targets) = self
                .transitions
                .get(state)
                .and_then(|row| row.get(&Symbol::Epsilon))
            else {
                continue;
            };
            for target in targets {
                if closure.insert(target.clone()) {
                    stack.push(target);
                }
            }
        }

        closure
    }

    /// Move every state in `states` over `symbol`, then close over epsilon moves.
    ///
    /// An empty `next_states` is a legal dead configuration, not an error.
    pub fn compute_next_states(
        &self,
        states: &StateSet,
        symbol: char,
    ) -> Result<NextStates, AutomatonError> {
        if !self.has_symbol(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }

        let mut reached = StateSet::new();
        let mut transitions = Vec::new();
        for state in states {
            let Some(targets) = self
                .transitions
                .get(state)
                .and_then(|row| row.get(&Symbol::Char(symbol)))
            else {
                continue;
            };
            for target in targets {
                reached.insert(target.clone());
                transitions.push(FiredTransition {
                    from: state.clone(),
                    symbol,
                    to: target.clone(),
                });
            }
        }

        let next_states = self.compute_epsilon_closure(&reached);
        let epsilon_reached = next_states.difference(&reached).cloned().collect();

        Ok(NextStates {
            next_states,
            transitions,
            epsilon_reached,
        })
    }

    pub fn process_input(&self, input: &str) -> Outcome {
        evaluate(self, input)
    }

    pub fn add_state(&self, state: &str) -> Result<Self, AutomatonError> {
        check_new_state(&self.states, state)?;
        let mut nfa = self.clone();
        nfa.states.push(state.to_string());
        Ok(nfa)
    }

    pub fn remove_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        if self.states.len() == 1 {
            return Err(AutomatonError::Malformed(
                "cannot remove the only state of an automaton".to_string(),
            ));
        }

        let mut nfa = self.clone();
        nfa.states.retain(|s| s != state);
        nfa.transitions.remove(state);
        nfa.accepting_states.remove(state);
        for row in nfa.transitions.values_mut() {
            for targets in row.values_mut() {
                targets.remove(state);
            }
        }
        if nfa.initial_state == state {
            nfa.initial_state = nfa.states[0].clone();
        }
        Ok(nfa)
    }

    pub fn add_symbol(&self, symbol: char) -> Result<Self, AutomatonError> {
        check_new_symbol(&self.alphabet, symbol)?;
        let mut nfa = self.clone();
        nfa.alphabet.push(symbol);
        Ok(nfa)
    }

    pub fn remove_symbol(&self, symbol: char) -> Result<Self, AutomatonError> {
        if !self.has_symbol(symbol) {
            return Err(AutomatonError::InvalidSymbol(symbol));
        }
        let mut nfa = self.clone();
        nfa.alphabet.retain(|s| *s != symbol);
        for row in nfa.transitions.values_mut() {
            row.remove(&Symbol::Char(symbol));
        }
        Ok(nfa)
    }

    pub fn set_initial_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        Ok(NFA {
            initial_state: state.to_string(),
            ..self.clone()
        })
    }

    pub fn toggle_accepting_state(&self, state: &str) -> Result<Self, AutomatonError> {
        if !self.has_state(state) {
            return Err(AutomatonError::UnknownState(state.to_string()));
        }
        let mut nfa = self.clone();
        if !nfa.accepting_states.remove(state) {
            nfa.accepting_states.insert(state.to_string());
        }
        Ok(nfa)
    }

    fn check_edge(&self, from: &str, symbol: Symbol, to: &str) -> Result<(), AutomatonError> {
        match symbol {
            Symbol::Epsilon if !self.use_epsilon_transitions => {
                return Err(AutomatonError::EpsilonDisabled)
            }
            Symbol::Char(ch) if !self.has_symbol(ch) => {
                return Err(AutomatonError::InvalidSymbol(ch))
            }
            _ => {}
        }
        for state in [from, to] {
            if !self.has_state(state) {
                return Err(AutomatonError::UnknownState(state.to_string()));
            }
        }
        Ok(())
    }

    pub fn add_transition(&self, from: &str, symbol: Symbol, to: &str) -> Result<Self, AutomatonError> {
        self.check_edge(from, symbol, to)?;
        let mut nfa = self.clone();
        nfa.transitions
            .entry(from.to_string())
            .or_default()
            .entry(symbol)
            .or_default()
            .insert(to.to_string());
        Ok(nfa)
    }

    pub fn remove_transition(&self, from: &str, symbol: Symbol, to: &str) -> Result<Self, AutomatonError> {
        self.check_edge(from, symbol, to)?;
        let mut nfa = self.clone();
        if let Some(targets) = nfa
            .transitions
            .get_mut(from)
            .and_then(|row| row.get_mut(&symbol))
        {
            targets.remove(to);
            if targets.is_empty() {
                if let Some(row) = nfa.transitions.get_mut(from) {
                    row.remove(&symbol);
                }
            }
        }
        Ok(nfa)
    }

    pub fn set_use_epsilon_transitions(&self, value: bool) -> Self {
        NFA {
            use_epsilon_transitions: value,
            ..self.clone()
        }
    }
}

impl Simulate for NFA {
    type Configuration = StateSet;

    fn initial_configuration(&self) -> StateSet {
        self.compute_epsilon_closure(&StateSet::from([self.initial_state.clone()]))
    }

    fn initial_epsilon_reached(&self) -> StateSet {
        let mut reached = self.initial_configuration();
        reached.remove(&self.initial_state);
        reached
    }

    fn advance(&self, from: &StateSet, symbol: char) -> Result<Advance<StateSet>, Outcome> {
        let next = match self.compute_next_states(from, symbol) {
            Ok(next) => next,
            Err(_) => return Err(Outcome::InvalidSymbol { symbol }),
        };
        if next.next_states.is_empty() {
            return Err(Outcome::NoValidTransition {
                from: from.clone(),
                symbol,
            });
        }
        Ok(Advance {
            configuration: next.next_states,
            transitions: next.transitions,
            epsilon_reached: next.epsilon_reached,
        })
    }

    fn verdict(&self, configuration: &StateSet) -> Outcome {
        if self.are_accepting_states(configuration) {
            Outcome::Accepted
        } else {
            Outcome::EndedInRejectingStates {
                states: configuration.clone(),
            }
        }
    }
}

#[cfg(test)]
mod nfa_tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn set(list: &[&str]) -> StateSet {
        list.iter().map(|s| s.to_string()).collect()
    }

    // q0 -ε-> q1 -ε-> q2, q2 -ε-> q0, q3 -ε-> q4, q0 -a-> q3
    fn epsilon_chain() -> NFA {
        NFA::new(
            names(&["q0", "q1", "q2", "q3", "q4"]),
            vec!['a', 'b'],
            "q0",
            names(&["q4"]),
        )
        .unwrap()
        .add_transition("q0", Symbol::Epsilon, "q1")
        .unwrap()
        .add_transition("q1", Symbol::Epsilon, "q2")
        .unwrap()
        .add_transition("q2", Symbol::Epsilon, "q0")
        .unwrap()
        .add_transition("q3", Symbol::Epsilon, "q4")
        .unwrap()
        .add_transition("q0", Symbol::Char('a'), "q3")
        .unwrap()
    }

    #[test]
    fn test_epsilon_closure() {
        let nfa = epsilon_chain();
        assert_eq!(nfa.compute_epsilon_closure(&set(&["q0"])), set(&["q0", "q1", "q2"]));
        assert_eq!(nfa.compute_epsilon_closure(&set(&["q3"])), set(&["q3", "q4"]));
        assert_eq!(nfa.compute_epsilon_closure(&set(&["q4"])), set(&["q4"]));
        assert_eq!(nfa.compute_epsilon_closure(&StateSet::new()), StateSet::new());
    }

    #[test]
    fn test_epsilon_closure_idempotent_and_order_independent() {
        let nfa = epsilon_chain();
        let inputs = [set(&["q2", "q3"]), set(&["q1"]), set(&["q4", "q0"])];
        for input in inputs {
            let closure = nfa.compute_epsilon_closure(&input);
            assert_eq!(nfa.compute_epsilon_closure(&closure), closure);
            assert!(input.is_subset(&closure));
        }

        // Same set built in different insertion orders
        let forward: StateSet = ["q3", "q1"].iter().map(|s| s.to_string()).collect();
        let backward: StateSet = ["q1", "q3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            nfa.compute_epsilon_closure(&forward),
            nfa.compute_epsilon_closure(&backward)
        );
    }

    #[test]
    fn test_epsilon_free_closure_is_identity() {
        let nfa = NFA::new(names(&["p", "q"]), vec!['a'], "p", Vec::new())
            .unwrap()
            .add_transition("p", Symbol::Char('a'), "q")
            .unwrap();
        for input in [set(&["p"]), set(&["q"]), set(&["p", "q"]), StateSet::new()] {
            assert_eq!(nfa.compute_epsilon_closure(&input), input);
        }

        let disabled = epsilon_chain().set_use_epsilon_transitions(false);
        assert_eq!(disabled.compute_epsilon_closure(&set(&["q0"])), set(&["q0"]));
        assert!(disabled.get_targets("q0", Symbol::Epsilon).is_empty());
    }

    #[test]
    fn test_compute_next_states() {
        let nfa = epsilon_chain();
        let next = nfa.compute_next_states(&set(&["q0", "q1", "q2"]), 'a').unwrap();
        assert_eq!(next.next_states, set(&["q3", "q4"]));
        assert_eq!(next.epsilon_reached, set(&["q4"]));
        assert_eq!(
            next.transitions,
            vec![FiredTransition {
                from: "q0".to_string(),
                symbol: 'a',
                to: "q3".to_string()
            }]
        );

        // Stuck is an empty set, not an error
        let stuck = nfa.compute_next_states(&set(&["q0"]), 'b').unwrap();
        assert!(stuck.next_states.is_empty());
        assert!(stuck.transitions.is_empty());

        assert_eq!(
            nfa.compute_next_states(&set(&["q0"]), 'z'),
            Err(AutomatonError::InvalidSymbol('z'))
        );
    }

    #[test]
    fn test_next_states_deduplicate() {
        let nfa = NFA::new(names(&["a", "b", "c"]), vec!['x'], "a", Vec::new())
            .unwrap()
            .add_transition("a", Symbol::Char('x'), "c")
            .unwrap()
            .add_transition("b", Symbol::Char('x'), "c")
            .unwrap();
        let next = nfa.compute_next_states(&set(&["a", "b"]), 'x').unwrap();
        assert_eq!(next.next_states, set(&["c"]));
        assert_eq!(next.transitions.len(), 2);
    }

    #[test]
    fn test_remove_state_purges_targets() {
        let nfa = epsilon_chain().remove_state("q0").unwrap();
        assert_eq!(nfa.get_initial_state(), "q1");
        assert!(nfa.get_targets("q2", Symbol::Epsilon).is_empty());
        assert!(nfa
            .get_transition_list()
            .iter()
            .all(|(from, _, to)| *from != "q0" && *to != "q0"));

        let nfa = nfa.remove_state("q4").unwrap();
        assert!(nfa.get_accepting_states().is_empty());
    }

    #[test]
    fn test_remove_symbol_drops_column() {
        let nfa = epsilon_chain().remove_symbol('a').unwrap();
        assert!(nfa.get_targets("q0", Symbol::Char('a')).is_empty());
        assert_eq!(nfa.get_targets("q0", Symbol::Epsilon), set(&["q1"]));
    }

    #[test]
    fn test_transition_edits() {
        let nfa = epsilon_chain();
        assert_eq!(
            nfa.add_transition("q0", Symbol::Char('z'), "q1"),
            Err(AutomatonError::InvalidSymbol('z'))
        );
        assert_eq!(
            nfa.set_use_epsilon_transitions(false)
                .add_transition("q0", Symbol::Epsilon, "q4"),
            Err(AutomatonError::EpsilonDisabled)
        );

        let removed = nfa.remove_transition("q0", Symbol::Char('a'), "q3").unwrap();
        assert!(removed.get_targets("q0", Symbol::Char('a')).is_empty());
    }

    #[test]
    fn test_process_input() {
        let nfa = epsilon_chain();
        assert_eq!(nfa.process_input("a"), Outcome::Accepted);
        assert_eq!(
            nfa.process_input(""),
            Outcome::EndedInRejectingStates {
                states: set(&["q0", "q1", "q2"])
            }
        );
        assert_eq!(
            nfa.process_input("aa"),
            Outcome::NoValidTransition {
                from: set(&["q3", "q4"]),
                symbol: 'a'
            }
        );
        assert_eq!(nfa.process_input("c"), Outcome::InvalidSymbol { symbol: 'c' });
    }

    #[test]
    fn test_json_round_trip_keeps_epsilon_moves() {
        let nfa = epsilon_chain();
        let json = serde_json::to_string(&nfa).unwrap();
        assert!(json.contains("\"ε\""));
        assert!(json.contains("\"useEpsilonTransitions\":true"));
        let loaded: NFA = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, nfa);
    }

    #[test]
    fn test_json_epsilon_symbol_is_checked() {
        let nfa = epsilon_chain();
        let json = serde_json::to_string(&nfa).unwrap();
        assert!(json.contains("\"epsilonSymbol\":\"ε\""));

        let other = json.replace("\"epsilonSymbol\":\"ε\"", "\"epsilonSymbol\":\"e\"");
        let err = serde_json::from_str::<NFA>(&other).unwrap_err();
        assert!(err.to_string().contains("epsilon symbol must be 'ε', found 'e'"));

        let without = r#"{"states":["p"],"alphabet":["a"],"transitions":{"p":{"ε":["p"]}}}"#;
        let loaded: NFA = serde_json::from_str(without).unwrap();
        assert_eq!(loaded.get_targets("p", Symbol::Epsilon), StateSet::from(["p".to_string()]));
    }
}
