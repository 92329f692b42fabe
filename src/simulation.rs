/* Step-by-step playback of an automaton over a test string.
 *
 * The engine never sleeps or spawns anything itself. It owns at most one pending `Tick`, and an
 * external driver waits `tick.delay()` and hands the tick back through `fire`. Every schedule or
 * cancel bumps a generation counter, so a tick that was cancelled in the meantime is ignored. */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::fa::{StateSet, FA};

pub const MIN_SPEED: Duration = Duration::from_millis(100);
pub const MAX_SPEED: Duration = Duration::from_millis(1000);

/// Timing knobs for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Interval between two automatic steps
    #[serde(with = "millis")]
    pub speed: Duration,
    /// Delay between `start` and the first step, while the host shows its loading frame
    #[serde(with = "millis")]
    pub prepare_delay: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            speed: Duration::from_millis(500),
            prepare_delay: Duration::from_millis(500),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

pub fn clamp_speed(speed: Duration) -> Duration {
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredTransition {
    pub from: String,
    pub symbol: char,
    pub to: String,
}

/// One successful move of an automaton over a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance<C> {
    pub configuration: C,
    pub transitions: Vec<FiredTransition>,
    pub epsilon_reached: StateSet,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    EndedInRejectingState { state: String },
    EndedInRejectingStates { states: StateSet },
    InvalidSymbol { symbol: char },
    NoValidTransition { from: StateSet, symbol: char },
}

fn join_states(states: &StateSet) -> String {
    states.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    /// The user-facing explanation for a run over `input`.
    pub fn message(&self, input: &str) -> String {
        match self {
            Outcome::Accepted => format!("Success! Input \"{}\" is accepted.", input),
            Outcome::EndedInRejectingState { state } => format!(
                "Rejected! Input \"{}\" ends in state {}, which is not an accepting state.",
                input, state
            ),
            Outcome::EndedInRejectingStates { states } => format!(
                "Rejected! Input \"{}\" ends in states [{}], none of which are accepting states.",
                input,
                join_states(states)
            ),
            Outcome::InvalidSymbol { symbol } => {
                format!("Error: Character '{}' is not in the alphabet.", symbol)
            }
            Outcome::NoValidTransition { from, symbol } => format!(
                "Rejected! No valid transitions from states [{}] on input '{}'.",
                join_states(from),
                symbol
            ),
        }
    }
}

/// The verdict panel shown next to a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TestResult {
    pub visible: bool,
    pub accepted: bool,
    pub message: String,
    pub outcome: Option<Outcome>,
}

impl TestResult {
    fn hidden() -> Self {
        TestResult::default()
    }

    fn shown(outcome: Outcome, input: &str) -> Self {
        TestResult {
            visible: true,
            accepted: outcome.is_accepted(),
            message: outcome.message(input),
            outcome: Some(outcome),
        }
    }

    fn notice(message: &str) -> Self {
        TestResult {
            visible: true,
            accepted: false,
            message: message.to_string(),
            outcome: None,
        }
    }
}

/// What an automaton must provide to be played back.
pub trait Simulate: FA {
    /// A single state for a DFA, a set of states for an NFA.
    type Configuration: Clone + PartialEq + Debug + Serialize;

    fn initial_configuration(&self) -> Self::Configuration;

    /// The part of the initial configuration reached through epsilon moves.
    fn initial_epsilon_reached(&self) -> StateSet {
        StateSet::new()
    }

    /// Consume one symbol. Terminal conditions come back as the `Outcome` that ends the run.
    fn advance(
        &self,
        from: &Self::Configuration,
        symbol: char,
    ) -> Result<Advance<Self::Configuration>, Outcome>;

    /// Accept or reject a configuration once the input is exhausted.
    fn verdict(&self, configuration: &Self::Configuration) -> Outcome;
}

/// Run an automaton over the whole input without recording a path.
pub fn evaluate<A: Simulate + ?Sized>(automaton: &A, input: &str) -> Outcome {
    let mut configuration = automaton.initial_configuration();
    for symbol in input.chars() {
        match automaton.advance(&configuration, symbol) {
            Ok(advance) => configuration = advance.configuration,
            Err(outcome) => return outcome,
        }
    }
    automaton.verdict(&configuration)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStep<C> {
    pub configuration: C,
    /// `None` for the initial record
    pub symbol: Option<char>,
    pub from: Option<C>,
    pub processed_input: String,
    pub remaining_input: String,
    pub transitions: Vec<FiredTransition>,
    pub epsilon_reached: StateSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationState<C> {
    pub is_running: bool,
    pub is_paused: bool,
    pub is_complete: bool,
    pub current_step: usize,
    pub configuration: C,
    pub processed_input: String,
    pub remaining_input: String,
    #[serde(with = "millis")]
    pub speed: Duration,
    pub path: Vec<SimulationStep<C>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Complete,
}

/// A scheduled step. Only the most recently issued tick can still fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
    delay: Duration,
}

impl Tick {
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

pub struct Simulation<A: Simulate> {
    automaton: A,
    test_input: String,
    // The input the current run was started with
    run_input: String,
    config: SimulationConfig,
    state: SimulationState<A::Configuration>,
    test_result: TestResult,
    is_loading: bool,
    pending: Option<Tick>,
    generation: u64,
}

impl<A: Simulate> Simulation<A> {
    pub fn new(automaton: A, config: SimulationConfig) -> Self {
        let config = SimulationConfig {
            speed: clamp_speed(config.speed),
            ..config
        };
        let state = Self::idle_state(&automaton, "", config.speed);
        Simulation {
            automaton,
            test_input: String::new(),
            run_input: String::new(),
            config,
            state,
            test_result: TestResult::hidden(),
            is_loading: false,
            pending: None,
            generation: 0,
        }
    }

    fn idle_state(automaton: &A, input: &str, speed: Duration) -> SimulationState<A::Configuration> {
        SimulationState {
            is_running: false,
            is_paused: false,
            is_complete: false,
            current_step: 0,
            configuration: automaton.initial_configuration(),
            processed_input: String::new(),
            remaining_input: input.to_string(),
            speed,
            path: Vec::new(),
        }
    }

    pub fn automaton(&self) -> &A {
        &self.automaton
    }

    pub fn state(&self) -> &SimulationState<A::Configuration> {
        &self.state
    }

    pub fn test_result(&self) -> &TestResult {
        &self.test_result
    }

    pub fn test_input(&self) -> &str {
        &self.test_input
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn pending_tick(&self) -> Option<Tick> {
        self.pending
    }

    pub fn phase(&self) -> Phase {
        let state = &self.state;
        if !state.is_running {
            Phase::Idle
        } else if state.is_complete {
            Phase::Complete
        } else if state.is_paused {
            Phase::Paused
        } else {
            Phase::Running
        }
    }

    fn schedule(&mut self, delay: Duration) {
        self.generation += 1;
        self.pending = Some(Tick {
            generation: self.generation,
            delay,
        });
        debug!("scheduled tick {} in {:?}", self.generation, delay);
    }

    fn cancel(&mut self) {
        if let Some(tick) = self.pending.take() {
            debug!("cancelled tick {}", tick.generation);
        }
        self.generation += 1;
    }

    /// Swap in an edited automaton. Any run in progress is stopped.
    pub fn set_automaton(&mut self, automaton: A) {
        self.automaton = automaton;
        self.stop();
    }

    pub fn set_test_input(&mut self, input: &str) {
        self.test_input = input.to_string();
        if !self.state.is_running {
            self.state.remaining_input = self.test_input.clone();
        }
    }

    /// Start a run over `input`, refusing an empty string.
    pub fn submit_input(&mut self, input: &str) -> bool {
        self.set_test_input(input);
        if input.is_empty() {
            self.test_result = TestResult::notice("Please enter an input string to test.");
            return false;
        }
        self.start();
        true
    }

    /// Seed the path with the initial configuration and schedule the first step.
    pub fn start(&mut self) {
        self.cancel();
        self.is_loading = true;
        self.run_input = self.test_input.clone();

        let configuration = self.automaton.initial_configuration();
        let initial_step = SimulationStep {
            configuration: configuration.clone(),
            symbol: None,
            from: None,
            processed_input: String::new(),
            remaining_input: self.run_input.clone(),
            transitions: Vec::new(),
            epsilon_reached: self.automaton.initial_epsilon_reached(),
        };

        self.state = SimulationState {
            is_running: true,
            path: vec![initial_step],
            configuration,
            ..Self::idle_state(&self.automaton, &self.run_input, self.state.speed)
        };
        self.test_result = TestResult::hidden();

        info!("starting simulation on {:?}", self.run_input);
        self.schedule(self.config.prepare_delay);
    }

    /// Apply a tick handed back by the driver. Returns `false` for stale ticks.
    pub fn fire(&mut self, tick: Tick) -> bool {
        match self.pending {
            Some(pending) if pending == tick => {}
            _ => {
                warn!("ignoring stale tick {}", tick.generation);
                return false;
            }
        }
        self.pending = None;
        self.is_loading = false;
        self.step();
        true
    }

    /// One automatic tick: advance, then keep the tick chain going while still running.
    fn step(&mut self) {
        self.advance_one();
        let state = &self.state;
        if state.is_running && !state.is_paused && !state.is_complete {
            self.schedule(self.state.speed);
        }
    }

    /// Consume one symbol, or settle the verdict when the input is exhausted.
    fn advance_one(&mut self) {
        if self.state.is_complete || !self.state.is_running {
            return;
        }

        let Some(symbol) = self.state.remaining_input.chars().next() else {
            let outcome = self.automaton.verdict(&self.state.configuration);
            self.complete(outcome);
            return;
        };

        let advance = match self.automaton.advance(&self.state.configuration, symbol) {
            Ok(advance) => advance,
            Err(outcome) => {
                self.complete(outcome);
                return;
            }
        };

        let processed_input = format!("{}{}", self.state.processed_input, symbol);
        let remaining_input = self.state.remaining_input[symbol.len_utf8()..].to_string();
        let from = std::mem::replace(&mut self.state.configuration, advance.configuration.clone());

        self.state.path.push(SimulationStep {
            configuration: advance.configuration,
            symbol: Some(symbol),
            from: Some(from),
            processed_input: processed_input.clone(),
            remaining_input: remaining_input.clone(),
            transitions: advance.transitions,
            epsilon_reached: advance.epsilon_reached,
        });
        self.state.current_step += 1;
        self.state.processed_input = processed_input;
        self.state.remaining_input = remaining_input;

        debug!(
            "step {} on '{}' -> {:?}",
            self.state.current_step, symbol, self.state.configuration
        );
    }

    fn complete(&mut self, outcome: Outcome) {
        self.cancel();
        info!("simulation complete: {:?}", outcome);
        self.test_result = TestResult::shown(outcome, &self.run_input);
        self.state.is_complete = true;
    }

    pub fn pause(&mut self) {
        if !self.state.is_running {
            return;
        }
        self.cancel();
        self.state.is_paused = true;
    }

    pub fn resume(&mut self) {
        if !self.state.is_running {
            return;
        }
        self.cancel();
        self.state.is_paused = false;
        self.is_loading = false;
        self.step();
    }

    /// Start when idle, or advance exactly one symbol when paused.
    pub fn step_forward(&mut self) {
        match self.phase() {
            Phase::Idle => self.start(),
            Phase::Paused => {
                // Manual steps never schedule a follow-up tick
                self.cancel();
                self.is_loading = false;
                self.advance_one();
            }
            Phase::Running | Phase::Complete => {}
        }
    }

    /// Undo the last consumed symbol using the path alone.
    pub fn step_backward(&mut self) {
        if self.state.current_step == 0 || !self.state.is_running {
            return;
        }

        self.state.path.pop();
        let Some(previous) = self.state.path.last() else {
            return;
        };

        self.state.configuration = previous.configuration.clone();
        self.state.processed_input = previous.processed_input.clone();
        self.state.remaining_input = previous.remaining_input.clone();
        self.state.current_step -= 1;

        if self.state.is_complete {
            // Leave the run paused so it can be continued step by step
            self.state.is_complete = false;
            self.state.is_paused = true;
        }
        self.test_result = TestResult::hidden();
        debug!("stepped back to step {}", self.state.current_step);
    }

    pub fn stop(&mut self) {
        self.cancel();
        self.is_loading = false;
        self.state = Self::idle_state(&self.automaton, &self.test_input, self.state.speed);
        self.test_result = TestResult::hidden();
    }

    /// Takes effect from the next scheduled tick on.
    pub fn set_speed(&mut self, speed: Duration) {
        self.state.speed = clamp_speed(speed);
    }

    /// Reference driver: wait for each pending tick and fire it until none is left.
    pub fn drive<W, O>(&mut self, mut wait: W, mut observe: O)
    where
        W: FnMut(Duration),
        O: FnMut(&Self),
    {
        while let Some(tick) = self.pending_tick() {
            wait(tick.delay());
            if self.fire(tick) {
                observe(self);
            }
        }
    }
}
