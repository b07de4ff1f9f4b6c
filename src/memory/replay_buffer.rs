//! Replay Buffer
//!
//! Fixed-capacity experience store for off-policy learning. Transitions are
//! evicted oldest-first and sampled uniformly without replacement.

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::Action;

/// A single transition in the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// State features before action
    pub state: Vec<f32>,
    /// Action taken
    pub action: Action,
    /// Reward received
    pub reward: f32,
    /// Next state features
    pub next_state: Vec<f32>,
    /// Whether episode terminated
    pub done: bool,
}

impl Transition {
    /// Create a new transition
    pub fn new(state: Vec<f32>, action: Action, reward: f32, next_state: Vec<f32>, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// A sampled batch as five aligned parallel arrays
///
/// Index i of every field refers to the same drawn transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionBatch {
    pub states: Vec<Vec<f32>>,
    pub actions: Vec<Action>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<Vec<f32>>,
    pub dones: Vec<bool>,
}

impl TransitionBatch {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Replay buffer for experience storage
#[derive(Debug)]
pub struct ReplayBuffer {
    /// Storage for transitions
    buffer: VecDeque<Transition>,
    /// Maximum capacity
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a transition to the buffer, evicting the oldest at capacity
    pub fn add(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample a uniform random batch without replacement
    ///
    /// If fewer than `batch_size` transitions are stored the batch shrinks to
    /// the available size rather than erroring.
    pub fn sample(&self, batch_size: usize) -> TransitionBatch {
        let mut rng = thread_rng();
        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        indices.shuffle(&mut rng);

        let take = batch_size.min(self.buffer.len());
        let mut batch = TransitionBatch {
            states: Vec::with_capacity(take),
            actions: Vec::with_capacity(take),
            rewards: Vec::with_capacity(take),
            next_states: Vec::with_capacity(take),
            dones: Vec::with_capacity(take),
        };

        for i in indices.into_iter().take(take) {
            let t = &self.buffer[i];
            batch.states.push(t.state.clone());
            batch.actions.push(t.action);
            batch.rewards.push(t.reward);
            batch.next_states.push(t.next_state.clone());
            batch.dones.push(t.done);
        }

        batch
    }

    /// Clear all transitions
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get current number of transitions
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer has enough samples for training
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.buffer.len() >= min_samples
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.buffer.len() as f32 / self.capacity as f32
    }

    /// Iterate stored transitions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_transition(reward: f32, done: bool) -> Transition {
        Transition::new(vec![reward; 4], Action::Hold, reward, vec![reward; 4], done)
    }

    #[test]
    fn test_capacity_invariant() {
        let mut buffer = ReplayBuffer::new(10);

        for i in 0..25 {
            buffer.add(make_transition(i as f32, false));
        }

        assert_eq!(buffer.len(), 10);

        // Exactly the most recent 10 insertions survive, in order.
        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
        let expected: Vec<f32> = (15..25).map(|i| i as f32).collect();
        assert_eq!(rewards, expected);
    }

    #[test]
    fn test_sample_size() {
        let mut buffer = ReplayBuffer::new(100);

        for i in 0..50 {
            buffer.add(make_transition(i as f32, false));
        }

        let batch = buffer.sample(10);
        assert_eq!(batch.len(), 10);
        assert_eq!(batch.actions.len(), 10);
        assert_eq!(batch.rewards.len(), 10);
        assert_eq!(batch.next_states.len(), 10);
        assert_eq!(batch.dones.len(), 10);
    }

    #[test]
    fn test_sample_degrades_when_undersized() {
        let mut buffer = ReplayBuffer::new(100);

        for i in 0..5 {
            buffer.add(make_transition(i as f32, false));
        }

        let batch = buffer.sample(32);
        assert_eq!(batch.len(), 5);
    }

    #[test]
    fn test_sample_without_replacement() {
        let mut buffer = ReplayBuffer::new(100);

        for i in 0..20 {
            buffer.add(make_transition(i as f32, false));
        }

        let batch = buffer.sample(20);
        let mut rewards: Vec<i64> = batch.rewards.iter().map(|r| *r as i64).collect();
        rewards.sort_unstable();
        rewards.dedup();
        assert_eq!(rewards.len(), 20);
    }

    #[test]
    fn test_sample_arrays_stay_aligned() {
        let mut buffer = ReplayBuffer::new(100);

        // Encode the reward into the state so alignment is checkable.
        for i in 0..30 {
            buffer.add(make_transition(i as f32, i % 7 == 0));
        }

        let batch = buffer.sample(16);
        for i in 0..batch.len() {
            assert_eq!(batch.states[i][0], batch.rewards[i]);
            assert_eq!(batch.next_states[i][0], batch.rewards[i]);
            assert_eq!(batch.dones[i], (batch.rewards[i] as usize) % 7 == 0);
        }
    }

    #[test]
    fn test_clear() {
        let mut buffer = ReplayBuffer::new(10);
        buffer.add(make_transition(1.0, false));
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_fill_ratio() {
        let mut buffer = ReplayBuffer::new(10);
        for i in 0..5 {
            buffer.add(make_transition(i as f32, false));
        }
        assert!((buffer.fill_ratio() - 0.5).abs() < 1e-6);
        assert!(buffer.has_enough_samples(5));
        assert!(!buffer.has_enough_samples(6));
    }
}
