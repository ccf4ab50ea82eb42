use std::iter::FusedIterator;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    block::{Block, BlockError},
    model::{ExitCondition, Model},
    state::{ImmutableState, MetaState, MutableState},
};

/// One trajectory-execution request: immutable parameters, a seed state,
/// an ordered pipeline of blocks, and an optional exit condition.
///
/// A job owns everything a single trajectory needs. Jobs are independent
/// of one another, so an orchestration layer may run many of them across
/// worker threads without coordination.
pub struct Job<M: Model> {
    params: ImmutableState<M::Params>,
    initial: MutableState<M::State>,
    pipeline: Vec<Block<M>>,
    exit: Option<Box<dyn ExitCondition<M> + Send + Sync>>,
}

impl<M: Model> Job<M> {
    /// Creates a job with an empty pipeline and no exit condition.
    pub fn new(params: ImmutableState<M::Params>, initial: MutableState<M::State>) -> Self {
        Self {
            params,
            initial,
            pipeline: Vec::new(),
            exit: None,
        }
    }

    /// Appends a block to the pipeline. Blocks execute in registration
    /// order within every timestep.
    #[must_use]
    pub fn block(mut self, block: Block<M>) -> Self {
        self.pipeline.push(block);
        self
    }

    /// Installs an exit condition, replacing any previous one.
    #[must_use]
    pub fn exit_when(mut self, exit: impl ExitCondition<M> + Send + Sync + 'static) -> Self {
        self.exit = Some(Box::new(exit));
        self
    }

    /// The job's immutable parameters.
    pub fn params(&self) -> &ImmutableState<M::Params> {
        &self.params
    }

    /// The seed snapshot the trajectory starts from.
    pub fn initial(&self) -> &MutableState<M::State> {
        &self.initial
    }

    /// Returns a fresh lazy trajectory over this job.
    ///
    /// The iterator yields the initial snapshot first, then one snapshot
    /// per block application across all timesteps: `1 + timesteps * blocks`
    /// items in total, fewer if the exit condition triggers or a block
    /// fails. Each call starts over from the initial state; no iteration
    /// position is shared between calls.
    pub fn trajectory(&self) -> Trajectory<'_, M> {
        Trajectory {
            job: self,
            cursor: Cursor::Start,
        }
    }

    /// Runs the trajectory to completion and collects every snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first [`TrajectoryError`] encountered; snapshots
    /// produced before the failure are discarded.
    pub fn run(&self) -> Result<Vec<MutableState<M::State>>, TrajectoryError<M::Error>> {
        self.trajectory().collect()
    }

    fn exit_met(&self, state: &MutableState<M::State>) -> Result<bool, M::Error> {
        match &self.exit {
            Some(exit) => exit.is_met(state),
            None => Ok(false),
        }
    }
}

/// Error type for a failed trajectory.
///
/// Carries the meta-state coordinates that pinpoint where the failure
/// occurred: for a block failure, the last successfully produced
/// snapshot the block consumed; for an exit-condition failure, the
/// snapshot under evaluation.
#[derive(Debug, Error)]
pub enum TrajectoryError<E: std::error::Error + 'static> {
    #[error("block {block} failed after {at}: {source}")]
    Block {
        block: usize,
        at: MetaState,
        source: BlockError<E>,
    },

    #[error("exit condition failed at {at}: {source}")]
    ExitCondition { at: MetaState, source: E },
}

/// A lazy, pull-driven sequence of state snapshots.
///
/// Created by [`Job::trajectory`]. Nothing is computed until the
/// consumer pulls; dropping the iterator mid-trajectory leaves the last
/// yielded snapshot as a valid, complete state. After yielding an error
/// or the final snapshot the iterator is fused.
pub struct Trajectory<'a, M: Model> {
    job: &'a Job<M>,
    cursor: Cursor<M::State>,
}

/// Internal position of the [`Trajectory`] iterator.
enum Cursor<U> {
    /// The initial snapshot has not been yielded yet.
    Start,
    /// `state` was the last yielded snapshot; `timestep` and `block`
    /// locate the next block application.
    Running {
        state: MutableState<U>,
        timestep: u64,
        block: usize,
    },
    /// The trajectory has ended.
    Done,
}

impl<M: Model> Trajectory<'_, M> {
    /// Yields `state`, first checking the exit condition and arming the
    /// cursor for the next block application when the run continues.
    fn emit(
        &mut self,
        state: MutableState<M::State>,
        next_timestep: u64,
        next_block: usize,
    ) -> Option<Result<MutableState<M::State>, TrajectoryError<M::Error>>> {
        match self.job.exit_met(&state) {
            Err(source) => {
                debug!(at = %state.meta, "exit condition failed");
                Some(Err(TrajectoryError::ExitCondition {
                    at: state.meta,
                    source,
                }))
            }
            Ok(true) => {
                debug!(at = %state.meta, "exit condition met, ending trajectory");
                Some(Ok(state))
            }
            Ok(false) => {
                let timesteps = self.job.params.meta.timesteps;
                if next_timestep < timesteps && !self.job.pipeline.is_empty() {
                    self.cursor = Cursor::Running {
                        state: state.clone(),
                        timestep: next_timestep,
                        block: next_block,
                    };
                }
                Some(Ok(state))
            }
        }
    }
}

impl<M: Model> Iterator for Trajectory<'_, M> {
    type Item = Result<MutableState<M::State>, TrajectoryError<M::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        // The cursor is parked at `Done` while this step runs, so any
        // early return below fuses the iterator.
        match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => None,

            Cursor::Start => {
                debug!(
                    timesteps = self.job.params.meta.timesteps,
                    blocks = self.job.pipeline.len(),
                    "starting trajectory"
                );
                self.emit(self.job.initial.clone(), 0, 0)
            }

            Cursor::Running {
                state,
                timestep,
                block,
            } => {
                let mut current = state.clone();
                if block == 0 {
                    current.meta = MetaState::start_of(timestep);
                }

                match self.job.pipeline[block].apply(&self.job.params, &current) {
                    Err(source) => {
                        debug!(block, at = %state.meta, "block failed, aborting trajectory");
                        Some(Err(TrajectoryError::Block {
                            block,
                            at: state.meta,
                            source,
                        }))
                    }
                    Ok(mut next_state) => {
                        next_state.meta = current.meta.advanced();
                        trace!(
                            block,
                            label = self.job.pipeline[block].label().unwrap_or(""),
                            at = %next_state.meta,
                            "applied block"
                        );

                        let (next_timestep, next_block) = if block + 1 == self.job.pipeline.len() {
                            (timestep + 1, 0)
                        } else {
                            (timestep, block + 1)
                        };
                        self.emit(next_state, next_timestep, next_block)
                    }
                }
            }
        }
    }
}

/// Iteration always ends permanently after the first `None`.
impl<M: Model> FusedIterator for Trajectory<'_, M> {}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use thiserror::Error;

    use crate::{MetaParameters, Signal, SignalKey};

    /// A one-variable accumulator model used to exercise the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        Delta,
    }

    impl SignalKey for Key {
        const ALL: &'static [Self] = &[Self::Delta];
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Count {
        value: f64,
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("{0}")]
    struct CountError(&'static str);

    struct Counter;

    impl Model for Counter {
        type Params = f64;
        type State = Count;
        type Key = Key;
        type Error = CountError;
    }

    fn step_by_increment(
        params: &ImmutableState<f64>,
        _state: &MutableState<Count>,
    ) -> Result<Signal<Key>, CountError> {
        Ok(Signal::of(Key::Delta, params.model))
    }

    fn apply_delta(
        _params: &ImmutableState<f64>,
        state: &MutableState<Count>,
        signal: &Signal<Key>,
        next: &mut Count,
    ) -> Result<(), CountError> {
        next.value = state.user.value + signal.get(Key::Delta);
        Ok(())
    }

    fn increment_block() -> Block<Counter> {
        Block::new().policy(step_by_increment).update(apply_delta)
    }

    fn job(timesteps: u64, blocks: usize) -> Job<Counter> {
        let params = ImmutableState::new(
            1.0,
            MetaParameters {
                timesteps,
                runs: 1,
            },
        );
        let mut job = Job::new(params, MutableState::initial(Count { value: 0.0 }));
        for _ in 0..blocks {
            job = job.block(increment_block());
        }
        job
    }

    fn snapshots(job: &Job<Counter>) -> Vec<MutableState<Count>> {
        job.run().unwrap()
    }

    #[test]
    fn trajectory_length_is_one_plus_timesteps_times_blocks() {
        for timesteps in 0..4 {
            for blocks in 0..4 {
                let job = job(timesteps, blocks);
                let count = snapshots(&job).len() as u64;
                assert_eq!(count, 1 + timesteps * blocks as u64);
            }
        }
    }

    #[test]
    fn meta_states_progress_lexicographically() {
        let job = job(3, 2);
        let states = snapshots(&job);

        let coordinates: Vec<_> = states.iter().map(|s| s.meta).collect();
        assert_eq!(coordinates[0], MetaState::new(0, 0));
        assert!(coordinates.windows(2).all(|pair| pair[0] < pair[1]));

        // Substeps restart from 1 whenever the timestep increments.
        for pair in coordinates.windows(2) {
            if pair[1].timestep > pair[0].timestep {
                assert_eq!(pair[1].substep, 1);
            }
        }
    }

    #[test]
    fn each_block_sees_its_predecessor_output() {
        let job = job(2, 3);
        let states = snapshots(&job);

        let values: Vec<_> = states.iter().map(|s| s.user.value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn trajectories_are_deterministic_and_restartable() {
        let job = job(4, 2);
        let first = snapshots(&job);
        let second = snapshots(&job);
        assert_eq!(first, second);
    }

    #[test]
    fn consumption_is_lazy() {
        let job = job(1_000_000, 2);
        let third = job
            .trajectory()
            .nth(2)
            .expect("trajectory has a third item")
            .expect("third item is a success");
        assert_abs_diff_eq!(third.user.value, 2.0);
    }

    #[test]
    fn exit_condition_stops_after_the_triggering_state() {
        fn at_least_three(state: &MutableState<Count>) -> Result<bool, CountError> {
            Ok(state.user.value >= 3.0)
        }

        let job = job(10, 1).exit_when(at_least_three);

        let states = job.run().unwrap();
        let last = states.last().unwrap();

        assert_eq!(states.len(), 4);
        assert_abs_diff_eq!(last.user.value, 3.0);
    }

    #[test]
    fn exit_condition_may_trigger_on_the_initial_state() {
        fn always(_state: &MutableState<Count>) -> Result<bool, CountError> {
            Ok(true)
        }

        let job = job(10, 1).exit_when(always);

        let states = job.run().unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].meta, MetaState::new(0, 0));
    }

    #[test]
    fn exit_condition_error_terminates_the_trajectory() {
        fn fails_at_substep_one(state: &MutableState<Count>) -> Result<bool, CountError> {
            if state.meta.substep == 1 {
                Err(CountError("bad predicate"))
            } else {
                Ok(false)
            }
        }

        let job = job(10, 1).exit_when(fails_at_substep_one);

        let mut trajectory = job.trajectory();

        trajectory
            .next()
            .expect("initial snapshot is yielded")
            .expect("initial snapshot is a success");

        let error = trajectory
            .next()
            .expect("second item is yielded")
            .expect_err("second item is the predicate failure");
        match error {
            TrajectoryError::ExitCondition { at, source } => {
                assert_eq!(at, MetaState::new(0, 1));
                assert_eq!(source, CountError("bad predicate"));
            }
            TrajectoryError::Block { .. } => panic!("expected an exit condition failure"),
        }

        assert!(trajectory.next().is_none());
    }

    #[test]
    fn block_failure_reports_last_good_coordinates() {
        fn broken(
            _params: &ImmutableState<f64>,
            state: &MutableState<Count>,
        ) -> Result<Signal<Key>, CountError> {
            if state.meta.timestep == 1 {
                Err(CountError("diverged"))
            } else {
                Ok(Signal::empty())
            }
        }

        let params = ImmutableState::new(
            1.0,
            MetaParameters {
                timesteps: 3,
                runs: 1,
            },
        );
        let job = Job::new(params, MutableState::initial(Count { value: 0.0 }))
            .block(increment_block())
            .block(Block::new().policy(broken).update(apply_delta));

        let mut trajectory = job.trajectory();

        // Initial plus both substeps of timestep 0 succeed, then the
        // first substep of timestep 1 and the failure in the second.
        let mut yielded = Vec::new();
        for _ in 0..4 {
            yielded.push(trajectory.next().unwrap().unwrap());
        }
        assert_eq!(yielded.last().unwrap().meta, MetaState::new(1, 1));

        let error = trajectory
            .next()
            .expect("failure is yielded")
            .expect_err("failure is an error");
        match error {
            TrajectoryError::Block { block, at, source } => {
                assert_eq!(block, 1);
                assert_eq!(at, MetaState::new(1, 1));
                assert!(matches!(source, BlockError::Policy { policy: 0, .. }));
            }
            TrajectoryError::ExitCondition { .. } => panic!("expected a block failure"),
        }

        // The iterator is fused after the error.
        assert!(trajectory.next().is_none());
    }

    #[test]
    fn initial_meta_state_is_emitted_as_given() {
        let params = ImmutableState::new(
            1.0,
            MetaParameters {
                timesteps: 1,
                runs: 1,
            },
        );
        let seed = MutableState::new(Count { value: 0.0 }, MetaState::new(7, 3));
        let job = Job::new(params, seed.clone()).block(increment_block());

        let states = job.run().unwrap();

        // The seed is forwarded untouched; the first timestep then
        // restarts the coordinates.
        assert_eq!(states[0].meta, MetaState::new(7, 3));
        assert_eq!(states[1].meta, MetaState::new(0, 1));
    }
}
