//! Core engine for Cascade, a state-update simulation framework.
//!
//! A simulation evolves a mutable state record through an ordered pipeline
//! of *partial state-update blocks*. Each block evaluates a set of pure
//! [`Policy`] functions, aggregates their [`Signal`] contributions, and
//! applies pure [`Update`] functions to produce the next state. A [`Job`]
//! bundles the immutable parameters, the initial state, the pipeline, and
//! an optional exit condition, and yields a lazy trajectory of state
//! snapshots, one per substep plus the initial state.

mod block;
mod model;
mod signal;
mod state;
mod trajectory;

pub use block::{Block, BlockError};
pub use model::{ExitCondition, Model, Policy, Update};
pub use signal::{Signal, SignalKey};
pub use state::{ImmutableState, MetaParameters, MetaState, MutableState};
pub use trajectory::{Job, Trajectory, TrajectoryError};
