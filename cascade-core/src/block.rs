use thiserror::Error;

use crate::{
    model::{Model, Policy, Update},
    signal::Signal,
    state::{ImmutableState, MutableState},
};

/// One partial state-update block: an ordered set of policies and the
/// update functions that consume their aggregated signal.
///
/// A block is one atomic unit of computation within a timestep. Applying
/// it evaluates every policy, sums their signals, and runs every update
/// against a working copy of the previous user state.
pub struct Block<M: Model> {
    label: Option<&'static str>,
    policies: Vec<Box<dyn Policy<M> + Send + Sync>>,
    updates: Vec<Box<dyn Update<M> + Send + Sync>>,
}

/// Error type for a failure inside a single block application.
///
/// Identifies the offending policy or update function by its position in
/// the block's registration order.
#[derive(Debug, Error)]
pub enum BlockError<E: std::error::Error + 'static> {
    #[error("policy {policy} failed: {source}")]
    Policy { policy: usize, source: E },

    #[error("update {update} failed: {source}")]
    Update { update: usize, source: E },
}

impl<M: Model> Block<M> {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self {
            label: None,
            policies: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Attaches a diagnostic label, used in trace output.
    #[must_use]
    pub fn labeled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Registers a policy. Policies run in registration order, though the
    /// summed aggregate is order-independent.
    #[must_use]
    pub fn policy(mut self, policy: impl Policy<M> + Send + Sync + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    /// Registers an update function. Updates within a block must write
    /// disjoint fields of the user state.
    #[must_use]
    pub fn update(mut self, update: impl Update<M> + Send + Sync + 'static) -> Self {
        self.updates.push(Box::new(update));
        self
    }

    /// The block's diagnostic label, if any.
    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    /// Applies the block to a state, producing the next state.
    ///
    /// Runs every policy with `(params, state)`, aggregates the collected
    /// signals by summation, and runs every update function against a copy
    /// of the previous user state. Fields no update writes carry forward
    /// unchanged. The returned snapshot keeps the input's meta state; the
    /// caller is responsible for advancing the substep.
    ///
    /// # Errors
    ///
    /// Returns a [`BlockError`] identifying the failing policy or update.
    /// On error no partial update is visible: `state` is untouched and
    /// remains the state of record.
    pub fn apply(
        &self,
        params: &ImmutableState<M::Params>,
        state: &MutableState<M::State>,
    ) -> Result<MutableState<M::State>, BlockError<M::Error>> {
        let mut signals = Vec::with_capacity(self.policies.len());
        for (index, policy) in self.policies.iter().enumerate() {
            let signal = policy
                .evaluate(params, state)
                .map_err(|source| BlockError::Policy {
                    policy: index,
                    source,
                })?;
            signals.push(signal);
        }

        let signal = Signal::aggregate(signals);

        let mut next = state.user.clone();
        for (index, update) in self.updates.iter().enumerate() {
            update
                .apply(params, state, &signal, &mut next)
                .map_err(|source| BlockError::Update {
                    update: index,
                    source,
                })?;
        }

        Ok(MutableState::new(next, state.meta))
    }
}

impl<M: Model> Default for Block<M> {
    fn default() -> Self {
        Self::new()
    }
}
