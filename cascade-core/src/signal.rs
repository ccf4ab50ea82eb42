use std::collections::BTreeMap;
use std::fmt::Debug;

/// The closed enumeration of signal keys a model recognizes.
///
/// Implemented by a model's signal enum. Because keys are a static enum,
/// a policy cannot produce an unrecognized key and an update function
/// cannot reference a key outside the enumeration; both failure modes of
/// an open string-keyed design are discharged at compile time.
pub trait SignalKey: Copy + Ord + Debug + 'static {
    /// Every recognized key, in declaration order.
    const ALL: &'static [Self];
}

/// A transient mapping from signal keys to numeric contributions.
///
/// Policies produce sparse signals holding only the keys they contribute
/// to; [`Signal::aggregate`] combines them into a dense signal with every
/// recognized key present. Signals are created and consumed within a
/// single block application and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal<K: SignalKey>(BTreeMap<K, f64>);

impl<K: SignalKey> Signal<K> {
    /// A signal with no contributions.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// A dense signal with every recognized key at `0.0`, the additive
    /// identity of aggregation.
    pub fn zero() -> Self {
        Self(K::ALL.iter().map(|&key| (key, 0.0)).collect())
    }

    /// A signal contributing a single value under one key.
    pub fn of(key: K, value: f64) -> Self {
        Self(BTreeMap::from([(key, value)]))
    }

    /// Folds another contribution into the signal, summing with any value
    /// already stored under `key`, and returns the extended signal.
    #[must_use]
    pub fn with(mut self, key: K, value: f64) -> Self {
        *self.0.entry(key).or_insert(0.0) += value;
        self
    }

    /// The value stored under `key`, or `0.0` when absent.
    pub fn get(&self, key: K) -> f64 {
        self.0.get(&key).copied().unwrap_or(0.0)
    }

    /// Combines per-policy signals into one dense signal by summing each
    /// key's contributions.
    ///
    /// Starts from [`Signal::zero`], so the result always contains every
    /// recognized key and aggregating an empty sequence yields the zero
    /// signal. Summation is commutative and associative, so policy order
    /// never affects the aggregate.
    pub fn aggregate<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::aggregate_with(signals, |total, value| total + value)
    }

    /// Combines signals with a caller-supplied rule.
    ///
    /// The rule folds each incoming contribution into the running total
    /// for its key, starting from `0.0`. It must be commutative and
    /// associative with `0.0` as its identity for the aggregate to be
    /// independent of policy order.
    pub fn aggregate_with<I, F>(signals: I, rule: F) -> Self
    where
        I: IntoIterator<Item = Self>,
        F: Fn(f64, f64) -> f64,
    {
        let mut aggregate = Self::zero();
        for signal in signals {
            for (key, value) in signal.0 {
                let total = aggregate.0.entry(key).or_insert(0.0);
                *total = rule(*total, value);
            }
        }
        aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key {
        Growth,
        Decay,
    }

    impl SignalKey for Key {
        const ALL: &'static [Self] = &[Self::Growth, Self::Decay];
    }

    #[test]
    fn aggregating_nothing_yields_the_zero_signal() {
        let aggregate = Signal::<Key>::aggregate([]);
        assert_eq!(aggregate, Signal::zero());
        assert_eq!(aggregate.get(Key::Growth), 0.0);
        assert_eq!(aggregate.get(Key::Decay), 0.0);
    }

    #[test]
    fn aggregation_sums_per_key() {
        let aggregate = Signal::aggregate([
            Signal::of(Key::Growth, 1.5),
            Signal::of(Key::Growth, 0.5).with(Key::Decay, -0.25),
        ]);

        assert_abs_diff_eq!(aggregate.get(Key::Growth), 2.0);
        assert_abs_diff_eq!(aggregate.get(Key::Decay), -0.25);
    }

    #[test]
    fn aggregation_is_invariant_to_signal_order() {
        let signals = [
            Signal::of(Key::Growth, 1.0),
            Signal::of(Key::Decay, 2.0),
            Signal::of(Key::Growth, -0.5),
        ];

        let forward = Signal::aggregate(signals.clone());
        let reversed = Signal::aggregate(signals.into_iter().rev());

        assert_eq!(forward, reversed);
    }

    #[test]
    fn with_sums_repeated_contributions_to_one_key() {
        let signal = Signal::of(Key::Growth, 1.0).with(Key::Growth, 2.5);
        assert_abs_diff_eq!(signal.get(Key::Growth), 3.5);
    }

    #[test]
    fn absent_keys_read_as_zero() {
        let signal = Signal::of(Key::Growth, 3.0);
        assert_eq!(signal.get(Key::Decay), 0.0);
    }

    #[test]
    fn custom_rule_replaces_summation() {
        let aggregate = Signal::aggregate_with(
            [Signal::of(Key::Growth, 2.0), Signal::of(Key::Growth, 5.0)],
            f64::max,
        );
        assert_abs_diff_eq!(aggregate.get(Key::Growth), 5.0);
    }
}
