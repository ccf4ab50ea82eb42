use crate::{
    signal::{Signal, SignalKey},
    state::{ImmutableState, MutableState},
};

/// Types that define a simulation model.
///
/// A model fixes the shape of a simulation: the immutable parameter
/// record, the user-domain state record, the closed enumeration of signal
/// keys, and the error type its policies and update functions may return.
pub trait Model: Sized {
    /// Named coefficients, fixed for the lifetime of a run.
    type Params;

    /// The domain variables the simulation evolves.
    type State: Clone;

    /// The recognized signal keys.
    type Key: SignalKey;

    /// The error type returned by this model's policies, update
    /// functions, and exit conditions.
    type Error: std::error::Error + Send + Sync + 'static;
}

/// A pure function proposing a change from the current parameters and state.
///
/// Policies must be deterministic and must not mutate external state;
/// within one block every policy reads the same `(params, state)` pair
/// and their signals interact only through aggregation. The engine does
/// not detect violations of this contract, but they break the guarantee
/// that policy order never affects a block's outcome.
///
/// Implemented for any plain function or closure of the matching shape,
/// so model authors register bare `fn` items directly.
pub trait Policy<M: Model> {
    /// Computes this policy's signal contribution.
    ///
    /// # Errors
    ///
    /// Returns a model-defined error; the enclosing block fails
    /// atomically when any policy fails.
    fn evaluate(
        &self,
        params: &ImmutableState<M::Params>,
        state: &MutableState<M::State>,
    ) -> Result<Signal<M::Key>, M::Error>;
}

impl<M, F> Policy<M> for F
where
    M: Model,
    F: Fn(&ImmutableState<M::Params>, &MutableState<M::State>) -> Result<Signal<M::Key>, M::Error>,
{
    fn evaluate(
        &self,
        params: &ImmutableState<M::Params>,
        state: &MutableState<M::State>,
    ) -> Result<Signal<M::Key>, M::Error> {
        self(params, state)
    }
}

/// A pure function computing new values for the state variables it owns.
///
/// `next` starts each block application as a copy of the previous user
/// state; an update overlays only the fields it is responsible for, so
/// fields no update touches carry forward unchanged. Updates within a
/// block must write disjoint fields and read only `params`, the previous
/// `state`, and the aggregated `signal`.
pub trait Update<M: Model> {
    /// Writes this update's output fields into `next`.
    ///
    /// # Errors
    ///
    /// Returns a model-defined error; the enclosing block fails
    /// atomically when any update fails.
    fn apply(
        &self,
        params: &ImmutableState<M::Params>,
        state: &MutableState<M::State>,
        signal: &Signal<M::Key>,
        next: &mut M::State,
    ) -> Result<(), M::Error>;
}

impl<M, F> Update<M> for F
where
    M: Model,
    F: Fn(
        &ImmutableState<M::Params>,
        &MutableState<M::State>,
        &Signal<M::Key>,
        &mut M::State,
    ) -> Result<(), M::Error>,
{
    fn apply(
        &self,
        params: &ImmutableState<M::Params>,
        state: &MutableState<M::State>,
        signal: &Signal<M::Key>,
        next: &mut M::State,
    ) -> Result<(), M::Error> {
        self(params, state, signal, next)
    }
}

/// A predicate over state that terminates a trajectory early.
///
/// Evaluated on every snapshot the trajectory yields, including the
/// initial one. When it returns `true` the triggering snapshot is still
/// yielded and no further states are produced.
pub trait ExitCondition<M: Model> {
    /// Decides whether the trajectory should stop at `state`.
    ///
    /// # Errors
    ///
    /// Returns a model-defined error; the trajectory terminates without
    /// yielding further states.
    fn is_met(&self, state: &MutableState<M::State>) -> Result<bool, M::Error>;
}

impl<M, F> ExitCondition<M> for F
where
    M: Model,
    F: Fn(&MutableState<M::State>) -> Result<bool, M::Error>,
{
    fn is_met(&self, state: &MutableState<M::State>) -> Result<bool, M::Error> {
        self(state)
    }
}
