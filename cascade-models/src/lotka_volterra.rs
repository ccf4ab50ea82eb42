//! A discrete Lotka-Volterra predator-prey model.
//!
//! Two blocks per timestep: the first lets prey reproduce and be hunted,
//! the second lets predators reproduce and die off. Each block's policies
//! contribute additive population changes that its update function folds
//! into the state.

use std::convert::Infallible;

use cascade_core::{
    Block, ImmutableState, Job, MetaParameters, Model, MutableState, Signal, SignalKey,
};

/// Interaction coefficients of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Prey birth rate.
    pub alpha: f64,
    /// Predation rate.
    pub beta: f64,
    /// Predator reproduction rate per prey consumed.
    pub delta: f64,
    /// Predator death rate.
    pub gamma: f64,
}

/// The evolving populations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Population {
    pub prey: f64,
    pub predator: f64,
}

/// Signal keys: additive contributions to each population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Contribution {
    AddPrey,
    AddPredator,
}

impl SignalKey for Contribution {
    const ALL: &'static [Self] = &[Self::AddPrey, Self::AddPredator];
}

/// The Lotka-Volterra model definition.
#[derive(Debug, Clone, Copy)]
pub struct LotkaVolterra;

impl Model for LotkaVolterra {
    type Params = Params;
    type State = Population;
    type Key = Contribution;
    type Error = Infallible;
}

type P = ImmutableState<Params>;
type S = MutableState<Population>;

pub fn prey_births(params: &P, state: &S) -> Result<Signal<Contribution>, Infallible> {
    let value = state.user.prey * params.model.alpha;
    Ok(Signal::of(Contribution::AddPrey, value))
}

pub fn prey_deaths(params: &P, state: &S) -> Result<Signal<Contribution>, Infallible> {
    let value = -1.0 * state.user.prey * state.user.predator * params.model.beta;
    Ok(Signal::of(Contribution::AddPrey, value))
}

pub fn predator_births(params: &P, state: &S) -> Result<Signal<Contribution>, Infallible> {
    let value = state.user.prey * state.user.predator * params.model.delta;
    Ok(Signal::of(Contribution::AddPredator, value))
}

pub fn predator_deaths(params: &P, state: &S) -> Result<Signal<Contribution>, Infallible> {
    let value = -1.0 * state.user.predator * params.model.gamma;
    Ok(Signal::of(Contribution::AddPredator, value))
}

pub fn update_prey(
    _params: &P,
    state: &S,
    signal: &Signal<Contribution>,
    next: &mut Population,
) -> Result<(), Infallible> {
    next.prey = state.user.prey + signal.get(Contribution::AddPrey);
    Ok(())
}

pub fn update_predator(
    _params: &P,
    state: &S,
    signal: &Signal<Contribution>,
    next: &mut Population,
) -> Result<(), Infallible> {
    next.predator = state.user.predator + signal.get(Contribution::AddPredator);
    Ok(())
}

/// The prey block: birth and predation signals folded into `prey`.
pub fn prey_block() -> Block<LotkaVolterra> {
    Block::new()
        .labeled("prey")
        .policy(prey_births)
        .policy(prey_deaths)
        .update(update_prey)
}

/// The predator block: reproduction and death signals folded into
/// `predator`.
pub fn predator_block() -> Block<LotkaVolterra> {
    Block::new()
        .labeled("predator")
        .policy(predator_births)
        .policy(predator_deaths)
        .update(update_predator)
}

/// Builds a ready-to-run job for the model.
pub fn job(params: Params, initial: Population, timesteps: u64) -> Job<LotkaVolterra> {
    let params = ImmutableState::new(params, MetaParameters { timesteps, runs: 1 });
    Job::new(params, MutableState::initial(initial))
        .block(prey_block())
        .block(predator_block())
}
