use std::fmt;

/// Position of a state snapshot in a simulation's execution order.
///
/// A timestep consists of an ordered sequence of substeps, one per block
/// application. Pairs are ordered lexicographically: all snapshots of
/// timestep `t` precede every snapshot of timestep `t + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaState {
    pub timestep: u64,
    pub substep: u64,
}

impl MetaState {
    /// Creates a meta state at the given coordinates.
    pub fn new(timestep: u64, substep: u64) -> Self {
        Self { timestep, substep }
    }

    /// The meta state at the start of a timestep, before any block has run.
    pub fn start_of(timestep: u64) -> Self {
        Self {
            timestep,
            substep: 0,
        }
    }

    /// The meta state after one more block application in the same timestep.
    #[must_use]
    pub fn advanced(self) -> Self {
        Self {
            timestep: self.timestep,
            substep: self.substep + 1,
        }
    }
}

impl fmt::Display for MetaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(timestep {}, substep {})", self.timestep, self.substep)
    }
}

/// Run-level configuration.
///
/// `runs` is carried for orchestration layers that fan a model out across
/// repeated runs; a single trajectory only consumes `timesteps`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct MetaParameters {
    pub timesteps: u64,
    pub runs: u64,
}

/// The immutable half of a simulation: model coefficients plus run-level
/// configuration. Constructed once per [`Job`](crate::Job) and shared by
/// reference across every step of its trajectory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct ImmutableState<P> {
    pub model: P,
    pub meta: MetaParameters,
}

impl<P> ImmutableState<P> {
    pub fn new(model: P, meta: MetaParameters) -> Self {
        Self { model, meta }
    }
}

/// One snapshot of the evolving state: the model's domain variables plus
/// the execution coordinates at which they were produced.
///
/// Despite the name, a `MutableState` value is never mutated in place by
/// the engine. Each block application produces a fresh value and the
/// previous one remains a valid, complete snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct MutableState<U> {
    pub user: U,
    pub meta: MetaState,
}

impl<U> MutableState<U> {
    pub fn new(user: U, meta: MetaState) -> Self {
        Self { user, meta }
    }

    /// A seed snapshot at coordinates `(0, 0)`.
    pub fn initial(user: U) -> Self {
        Self {
            user,
            meta: MetaState::default(),
        }
    }
}
