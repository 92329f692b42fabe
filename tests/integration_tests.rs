mod integration_tests_helper {

    use fasim::{load_automaton, load_grammar, validate_grammar, Automaton, Grammar, DFA, NFA};

    pub fn get_dfa(path: &str) -> DFA {
        let automaton = load_automaton(path);

        // assert that reading the file was successful
        assert!(automaton.is_ok());

        match automaton.unwrap() {
            Automaton::Dfa(dfa) => dfa,
            Automaton::Nfa(_) => panic!("{} does not hold a DFA", path),
        }
    }

    pub fn get_nfa(path: &str) -> NFA {
        let automaton = load_automaton(path);

        assert!(automaton.is_ok());

        match automaton.unwrap() {
            Automaton::Nfa(nfa) => nfa,
            Automaton::Dfa(_) => panic!("{} does not hold an NFA", path),
        }
    }

    pub fn get_grammar(path: &str) -> Grammar {
        let grammar = load_grammar(path);

        assert!(grammar.is_ok());

        let grammar = grammar.unwrap();

        // assert that the grammar only uses declared symbols
        assert!(validate_grammar(&grammar).is_ok());

        grammar
    }
}

mod integration_tests {
    use crate::integration_tests_helper::{get_dfa, get_grammar, get_nfa};

    use fasim::grammar::GrammarError;
    use fasim::simulation::SimulationStep;
    use fasim::{
        convert_to_cnf, is_chomsky_normal_form, load_automaton, load_grammar, parse_cyk,
        parse_cyk_strict, save_automaton, to_dot, validate_grammar, Automaton, Outcome, Phase,
        Simulate, Simulation, SimulationConfig, StateSet,
    };
    use std::time::Duration;

    fn set(list: &[&str]) -> StateSet {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_to_end<A: Simulate>(simulation: &mut Simulation<A>) -> Vec<Duration> {
        let mut waits = Vec::new();
        simulation.drive(|delay| waits.push(delay), |_| {});
        waits
    }

    #[test]
    fn test_dfa_file_simulation() {
        let dfa = get_dfa("test_data/even_ones.json");
        let mut simulation = Simulation::new(dfa, SimulationConfig::default());

        assert!(simulation.submit_input("1010"));
        let waits = run_to_end(&mut simulation);

        // one tick per symbol, the first after the prepare delay, then the verdict tick
        assert_eq!(waits.len(), 5);
        assert_eq!(waits[0], Duration::from_millis(500));
        assert!(waits[1..].iter().all(|wait| *wait == Duration::from_millis(500)));

        let state = simulation.state();
        assert!(state.is_complete);
        assert_eq!(simulation.phase(), Phase::Complete);
        assert_eq!(state.current_step, 4);
        assert_eq!(state.processed_input, "1010");
        assert_eq!(state.remaining_input, "");

        let configurations: Vec<&str> = state
            .path
            .iter()
            .map(|step| step.configuration.as_str())
            .collect();
        assert_eq!(configurations, vec!["q0", "q1", "q1", "q0", "q0"]);

        let result = simulation.test_result();
        assert!(result.visible);
        assert!(result.accepted);
        assert_eq!(result.message, "Success! Input \"1010\" is accepted.");
    }

    #[test]
    fn test_dfa_file_rejection_and_invalid_symbol() {
        let dfa = get_dfa("test_data/even_ones.json");

        assert_eq!(
            dfa.process_input("100").message("100"),
            "Rejected! Input \"100\" ends in state q1, which is not an accepting state."
        );
        assert_eq!(
            dfa.process_input("12"),
            Outcome::InvalidSymbol { symbol: '2' }
        );

        let mut simulation = Simulation::new(dfa, SimulationConfig::default());
        simulation.submit_input("12");
        run_to_end(&mut simulation);
        assert!(simulation.state().is_complete);
        assert_eq!(simulation.state().processed_input, "1");
        assert_eq!(
            simulation.test_result().message,
            "Error: Character '2' is not in the alphabet."
        );
    }

    #[test]
    fn test_nfa_file_simulation() {
        let nfa = get_nfa("test_data/ends_in_ab.json");
        let mut simulation = Simulation::new(nfa, SimulationConfig::default());

        simulation.submit_input("aab");
        run_to_end(&mut simulation);

        let path: &Vec<SimulationStep<StateSet>> = &simulation.state().path;
        assert_eq!(path[0].configuration, set(&["p", "s"]));
        assert_eq!(path[0].epsilon_reached, set(&["p"]));
        assert_eq!(path[1].configuration, set(&["p", "q"]));
        assert_eq!(path[3].configuration, set(&["f", "p"]));
        assert!(simulation.test_result().accepted);

        let nfa = simulation.automaton();
        assert!(!nfa.process_input("aba").is_accepted());
        assert!(nfa.process_input("bab").is_accepted());
    }

    #[test]
    fn test_pause_and_step_through_file_automaton() {
        let dfa = get_dfa("test_data/even_ones.json");
        let mut simulation = Simulation::new(dfa, SimulationConfig::default());
        simulation.submit_input("11");

        let tick = simulation.pending_tick().unwrap();
        assert!(simulation.fire(tick));
        simulation.pause();
        assert_eq!(simulation.phase(), Phase::Paused);
        assert!(simulation.pending_tick().is_none());

        // the tick cancelled by pause must not move anything
        assert!(!simulation.fire(tick));

        simulation.step_forward();
        simulation.step_forward();
        assert_eq!(simulation.state().configuration, "q0");
        simulation.step_backward();
        assert_eq!(simulation.state().configuration, "q1");
        assert_eq!(simulation.state().processed_input, "1");

        simulation.resume();
        run_to_end(&mut simulation);
        assert!(simulation.test_result().accepted);
    }

    #[test]
    fn test_automaton_file_round_trip() {
        let automaton = load_automaton("test_data/ends_in_ab.json").unwrap();
        let path = std::env::temp_dir().join("fasim_round_trip.json");

        assert!(save_automaton(&automaton, &path).is_ok());
        let reloaded = load_automaton(&path).unwrap();
        assert_eq!(automaton, reloaded);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_automaton("test_data/does_not_exist.json").is_err());
        assert!(load_grammar("test_data/does_not_exist.json").is_err());
    }

    #[test]
    fn test_dot_export_from_file() {
        let automaton = load_automaton("test_data/ends_in_ab.json").unwrap();
        let dot = to_dot(automaton.as_fa(), &set(&["p"]));
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("ε"));
        assert_eq!(dot.matches("shape = doublecircle").count(), 1);

        match automaton {
            Automaton::Nfa(nfa) => assert!(nfa.uses_epsilon_transitions()),
            Automaton::Dfa(_) => panic!("expected an NFA"),
        }
    }

    #[test]
    fn test_cyk_from_file() {
        let grammar = get_grammar("test_data/ab.grammar.json");
        assert!(is_chomsky_normal_form(&grammar));

        let result = parse_cyk(&grammar, "ab");
        assert!(result.accepted);
        assert_eq!(result.table[0][1], vec!["S".to_string()]);

        assert!(!parse_cyk(&grammar, "abb").accepted);
        assert!(!parse_cyk(&grammar, "").accepted);
    }

    #[test]
    fn test_cyk_after_conversion() {
        let grammar = get_grammar("test_data/balanced.grammar.json");
        assert!(!is_chomsky_normal_form(&grammar));
        assert!(parse_cyk_strict(&grammar, "aabb").is_err());

        let converted = convert_to_cnf(&grammar);
        assert!(is_chomsky_normal_form(&converted));
        assert!(validate_grammar(&converted).is_ok());

        for accepted in ["ab", "aabb", "aaabbb"] {
            assert!(parse_cyk_strict(&converted, accepted).unwrap().accepted, "{}", accepted);
        }
        for rejected in ["a", "ba", "aab", "abab"] {
            assert!(!parse_cyk(&converted, rejected).accepted, "{}", rejected);
        }
    }

    #[test]
    fn test_invalid_grammar_file() {
        let grammar = load_grammar("test_data/broken.grammar.json").unwrap();
        assert_eq!(
            validate_grammar(&grammar),
            Err(GrammarError::UnknownSymbol("X".to_string()))
        );
    }
}
