//! The frontier and reached sets of the reachability algorithm.
//!
//! Both sets are partitioned: every state has a `PartitionKey`, and
//! `partition_of` only ever returns states with the same key as the state
//! asked about. Merge and stop compare states within one partition only.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::fmt;

use crate::analysis::AbstractState;

/// States with different keys are never compared.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PartitionKey(Vec<usize>);

impl PartitionKey {
    pub fn new(key: Vec<usize>) -> PartitionKey {
        PartitionKey(key)
    }

    pub fn values(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let values: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", values.join(", "))
    }
}

pub type PartitionFunction<'a, S> = Box<dyn Fn(&S) -> PartitionKey + 'a>;

pub trait StateSet<S: AbstractState> {
    /// Add a state, returning false if it was already present.
    fn add(&mut self, state: S) -> bool;

    fn add_all<I: IntoIterator<Item = S>>(&mut self, states: I) {
        for state in states {
            self.add(state);
        }
    }

    /// Remove a state, returning false if it was not present.
    fn remove(&mut self, state: &S) -> bool;

    fn remove_all<'s, I: IntoIterator<Item = &'s S>>(&mut self, states: I)
    where
        S: 's,
    {
        for state in states {
            self.remove(state);
        }
    }

    fn contains(&self, state: &S) -> bool;

    /// All states sharing the partition of `state`.
    fn partition_of(&self, state: &S) -> Vec<&S>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every state admitted so far, grouped by partition.
pub struct ReachedSet<'a, S> {
    partition: PartitionFunction<'a, S>,
    partitions: FxHashMap<PartitionKey, Vec<S>>,
    len: usize,
}

impl<'a, S: AbstractState> ReachedSet<'a, S> {
    pub fn new<F: Fn(&S) -> PartitionKey + 'a>(partition: F) -> ReachedSet<'a, S> {
        ReachedSet {
            partition: Box::new(partition),
            partitions: FxHashMap::default(),
            len: 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.partitions.values().flat_map(|states| states.iter())
    }

    pub fn partition_keys(&self) -> impl Iterator<Item = &PartitionKey> {
        self.partitions.keys()
    }
}

impl<'a, S: AbstractState> StateSet<S> for ReachedSet<'a, S> {
    fn add(&mut self, state: S) -> bool {
        let key = (self.partition)(&state);
        let states = self.partitions.entry(key).or_default();
        if states.contains(&state) {
            return false;
        }
        states.push(state);
        self.len += 1;
        true
    }

    fn remove(&mut self, state: &S) -> bool {
        let key = (self.partition)(state);
        let states = match self.partitions.get_mut(&key) {
            Some(states) => states,
            None => return false,
        };
        let position = match states.iter().position(|s| s == state) {
            Some(position) => position,
            None => return false,
        };
        states.remove(position);
        if states.is_empty() {
            self.partitions.remove(&key);
        }
        self.len -= 1;
        true
    }

    fn contains(&self, state: &S) -> bool {
        self.partitions
            .get(&(self.partition)(state))
            .map(|states| states.contains(state))
            .unwrap_or(false)
    }

    fn partition_of(&self, state: &S) -> Vec<&S> {
        self.partitions
            .get(&(self.partition)(state))
            .map(|states| states.iter().collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// The states waiting to be expanded, in first-in first-out order. The
/// states are also indexed by partition.
pub struct FrontierSet<'a, S> {
    partition: PartitionFunction<'a, S>,
    states: VecDeque<S>,
    partitions: FxHashMap<PartitionKey, Vec<S>>,
}

impl<'a, S: AbstractState> FrontierSet<'a, S> {
    pub fn new<F: Fn(&S) -> PartitionKey + 'a>(partition: F) -> FrontierSet<'a, S> {
        FrontierSet {
            partition: Box::new(partition),
            states: VecDeque::new(),
            partitions: FxHashMap::default(),
        }
    }

    fn unindex(&mut self, state: &S) -> bool {
        let key = (self.partition)(state);
        let states = match self.partitions.get_mut(&key) {
            Some(states) => states,
            None => return false,
        };
        let position = match states.iter().position(|s| s == state) {
            Some(position) => position,
            None => return false,
        };
        states.swap_remove(position);
        if states.is_empty() {
            self.partitions.remove(&key);
        }
        true
    }

    pub fn pop(&mut self) -> Option<S> {
        let state = self.states.pop_front()?;
        self.unindex(&state);
        Some(state)
    }

    /// Replace `old` by `new` in place, returning false if `old` was not
    /// waiting. If `new` is already waiting, `old` is only removed.
    pub fn replace(&mut self, old: &S, new: S) -> bool {
        if !self.contains(old) {
            return false;
        }
        if self.contains(&new) {
            return self.remove(old);
        }
        match self.states.iter().position(|s| s == old) {
            Some(position) => {
                self.unindex(old);
                self.partitions
                    .entry((self.partition)(&new))
                    .or_default()
                    .push(new.clone());
                self.states[position] = new;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.partitions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.states.iter()
    }
}

impl<'a, S: AbstractState> StateSet<S> for FrontierSet<'a, S> {
    fn add(&mut self, state: S) -> bool {
        let states = self.partitions.entry((self.partition)(&state)).or_default();
        if states.contains(&state) {
            return false;
        }
        states.push(state.clone());
        self.states.push_back(state);
        true
    }

    fn remove(&mut self, state: &S) -> bool {
        if !self.unindex(state) {
            return false;
        }
        self.states.retain(|s| s != state);
        true
    }

    fn contains(&self, state: &S) -> bool {
        self.partitions
            .get(&(self.partition)(state))
            .map(|states| states.contains(state))
            .unwrap_or(false)
    }

    fn partition_of(&self, state: &S) -> Vec<&S> {
        self.partitions
            .get(&(self.partition)(state))
            .map(|states| states.iter().collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}
