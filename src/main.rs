use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result};
use fasim::{
    compute_first_sets, convert_to_cnf, is_chomsky_normal_form, load_automaton, load_grammar,
    parse_cyk, parse_cyk_strict, random_derivation, save_dot, to_dot, validate_grammar, Automaton,
    Simulate, Simulation, SimulationConfig, StateSet,
};
use fasim::grammar::DEFAULT_DERIVATION_DEPTH;
use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play <AUTOMATON> back over <INPUT> one step at a time
    #[command(arg_required_else_help = true)]
    Simulate {
        /// JSON file describing a DFA or an NFA
        automaton: PathBuf,
        /// String to test
        input: String,
        /// JSON file with the simulation timing settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Milliseconds between two steps (100 to 1000)
        #[arg(short, long)]
        speed: Option<u64>,
        /// Milliseconds before the first step
        #[arg(short, long)]
        prepare_delay: Option<u64>,
        /// Print every step as a JSON simulation state
        #[arg(long)]
        json: bool,
    },
    /// Decide at once whether <AUTOMATON> accepts <INPUT>
    #[command(arg_required_else_help = true)]
    Run {
        automaton: PathBuf,
        input: String,
    },
    /// Test membership of <INPUT> in <GRAMMAR> with the CYK algorithm
    #[command(arg_required_else_help = true)]
    Cyk {
        /// JSON file describing the grammar
        grammar: PathBuf,
        input: String,
        /// Refuse grammars that are not in Chomsky Normal Form
        #[arg(long)]
        strict: bool,
        /// Convert the grammar towards Chomsky Normal Form first
        #[arg(long)]
        convert: bool,
    },
    /// Validate <GRAMMAR> and print its FIRST sets
    #[command(arg_required_else_help = true)]
    CheckGrammar { grammar: PathBuf },
    /// Print a random derivation tree of <GRAMMAR>
    #[command(arg_required_else_help = true)]
    Derive {
        grammar: PathBuf,
        /// Symbol to expand, the start symbol when absent
        #[arg(long)]
        symbol: Option<String>,
        /// Maximum depth of the tree
        #[arg(short, long, default_value_t = DEFAULT_DERIVATION_DEPTH)]
        depth: usize,
        /// Seed for a reproducible tree
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write <AUTOMATON> as a Graphviz DOT file
    #[command(arg_required_else_help = true)]
    Dot {
        automaton: PathBuf,
        /// Output file name, without the .dot extension. Prints to stdout when absent
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Debug, Parser)]
#[command(name = "fasim")]
#[command(about = "Simulate finite automata and parse context-free grammars with CYK")]
#[command(author, version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn read_config(path: Option<PathBuf>, speed: Option<u64>, prepare_delay: Option<u64>) -> Result<SimulationConfig> {
    let mut config = match path {
        Some(path) => {
            let buf_reader = BufReader::new(File::open(path)?);
            serde_json::from_reader(buf_reader)?
        }
        None => SimulationConfig::default(),
    };
    if let Some(speed) = speed {
        config.speed = Duration::from_millis(speed);
    }
    if let Some(prepare_delay) = prepare_delay {
        config.prepare_delay = Duration::from_millis(prepare_delay);
    }
    Ok(config)
}

fn simulate<A: Simulate>(automaton: A, input: &str, config: SimulationConfig, json: bool) -> Result<()> {
    let mut simulation = Simulation::new(automaton, config);
    if !simulation.submit_input(input) {
        bail!("{}", simulation.test_result().message);
    }

    let mut failure = None;
    simulation.drive(thread::sleep, |sim| {
        let state = sim.state();
        if json {
            match serde_json::to_string(state) {
                Ok(line) => println!("{}", line),
                Err(err) => failure = Some(err),
            }
            return;
        }
        if let Some(step) = state.path.last().filter(|_| !state.is_complete) {
            let configuration = serde_json::to_string(&step.configuration).unwrap_or_default();
            println!(
                "step {}: read '{}' -> {} | processed \"{}\" remaining \"{}\"",
                state.current_step,
                step.symbol.unwrap_or(' '),
                configuration,
                state.processed_input,
                state.remaining_input
            );
        }
    });
    if let Some(err) = failure {
        return Err(err.into());
    }

    println!("{}", simulation.test_result().message);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = Cli::parse();

    match args.command {
        Commands::Simulate {
            automaton,
            input,
            config,
            speed,
            prepare_delay,
            json,
        } => {
            let config = read_config(config, speed, prepare_delay)?;
            info!("simulating {:?} with {:?}", automaton, config);
            match load_automaton(automaton)? {
                Automaton::Dfa(dfa) => simulate(dfa, &input, config, json)?,
                Automaton::Nfa(nfa) => simulate(nfa, &input, config, json)?,
            }
        }
        Commands::Run { automaton, input } => {
            let outcome = match load_automaton(automaton)? {
                Automaton::Dfa(dfa) => dfa.process_input(&input),
                Automaton::Nfa(nfa) => nfa.process_input(&input),
            };
            println!("{}", outcome.message(&input));
        }
        Commands::Cyk {
            grammar,
            input,
            strict,
            convert,
        } => {
            let mut grammar = load_grammar(grammar)?;
            validate_grammar(&grammar)?;
            if convert {
                grammar = convert_to_cnf(&grammar);
            }
            let result = if strict {
                parse_cyk_strict(&grammar, &input)?
            } else {
                parse_cyk(&grammar, &input)
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.accepted {
                println!("\"{}\" is derivable from {}", input, grammar.start_symbol);
            } else {
                println!("\"{}\" is not derivable from {}", input, grammar.start_symbol);
            }
        }
        Commands::CheckGrammar { grammar } => {
            let grammar = load_grammar(grammar)?;
            validate_grammar(&grammar)?;
            println!("Grammar is valid");
            println!("Chomsky Normal Form: {}", is_chomsky_normal_form(&grammar));
            for (non_terminal, first) in compute_first_sets(&grammar) {
                let first: Vec<String> = first.into_iter().collect();
                println!("FIRST({}) = {{{}}}", non_terminal, first.join(", "));
            }
        }
        Commands::Derive {
            grammar,
            symbol,
            depth,
            seed,
        } => {
            let grammar = load_grammar(grammar)?;
            validate_grammar(&grammar)?;
            let symbol = symbol.unwrap_or_else(|| grammar.start_symbol.clone());
            let mut rng: Box<dyn RngCore> = match seed {
                Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
                None => Box::new(rand::rng()),
            };
            let tree = random_derivation(&grammar, &symbol, depth, &mut rng);
            print!("{}", tree);
            println!("yield: \"{}\"", tree.frontier());
        }
        Commands::Dot { automaton, output } => {
            let automaton = load_automaton(automaton)?;
            let fa = automaton.as_fa();
            match output {
                Some(filename) => save_dot(fa, &StateSet::new(), &filename)?,
                None => print!("{}", to_dot(fa, &StateSet::new())),
            }
        }
    }

    Ok(())
}
