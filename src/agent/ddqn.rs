//! Double DQN Agent
//!
//! Epsilon-greedy action selection, experience storage, and the Double-DQN
//! target computation: the online network selects the bootstrap action on
//! next states while the frozen target network evaluates it, which is what
//! keeps value estimates from the overestimation bias of vanilla DQN.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use super::approximator::QFunction;
use crate::config::AgentConfig;
use crate::core::{Action, NUM_ACTIONS};
use crate::error::Result;
use crate::memory::{ReplayBuffer, Transition, TransitionBatch};

/// Resumable agent state, persisted alongside the approximator's weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub epsilon: f32,
    pub step_count: u64,
    pub episode_count: u64,
}

/// Double DQN agent
pub struct DdqnAgent {
    config: AgentConfig,
    model: Box<dyn QFunction>,
    memory: ReplayBuffer,
    epsilon: f32,
    step_count: u64,
    episode_count: u64,
}

impl DdqnAgent {
    /// Create an agent. Fails fast on invalid hyperparameters.
    pub fn new(config: AgentConfig, model: Box<dyn QFunction>) -> Result<Self> {
        config.validate()?;
        let epsilon = config.epsilon;
        let memory = ReplayBuffer::new(config.memory_size);

        Ok(Self {
            config,
            model,
            memory,
            epsilon,
            step_count: 0,
            episode_count: 0,
        })
    }

    /// Choose an action with epsilon-greedy exploration
    pub fn act(&mut self, state: &[f32]) -> Action {
        let u: f32 = rand::random();
        if u <= self.epsilon {
            let index = rand::thread_rng().gen_range(0..NUM_ACTIONS);
            return Action::from_index(index).unwrap_or_default();
        }
        self.greedy_action(state)
    }

    /// Greedy action from the online network; argmax ties resolve to the
    /// lowest action index for determinism.
    pub fn greedy_action(&self, state: &[f32]) -> Action {
        let states = [state.to_vec()];
        let q = self.model.predict(&states);
        Action::from_index(argmax(&q[0])).unwrap_or_default()
    }

    /// Store a transition in replay memory
    pub fn remember(&mut self, transition: Transition) {
        self.memory.add(transition);
    }

    /// Compute Double-DQN training targets for a batch.
    ///
    /// Untouched action slots keep the online predictions, so only the taken
    /// action contributes training error.
    pub fn ddqn_targets(&self, batch: &TransitionBatch) -> Vec<Vec<f32>> {
        let mut targets = self.model.predict(&batch.states);
        let q_online_next = self.model.predict(&batch.next_states);
        let q_target_next = self.model.predict_target(&batch.next_states);

        for i in 0..batch.len() {
            let action = batch.actions[i].to_index();
            if batch.dones[i] {
                targets[i][action] = batch.rewards[i];
            } else {
                // Online network selects, target network evaluates.
                let best = argmax(&q_online_next[i]);
                targets[i][action] =
                    batch.rewards[i] + self.config.gamma * q_target_next[i][best];
            }
        }

        targets
    }

    /// Train on one sampled batch and return the loss.
    ///
    /// With fewer stored transitions than the batch size this is a
    /// legitimate early-training no-op returning 0.0; epsilon does not
    /// decay on a skipped update.
    pub fn replay(&mut self) -> f32 {
        if !self.memory.has_enough_samples(self.config.batch_size) {
            return 0.0;
        }

        let batch = self.memory.sample(self.config.batch_size);
        let targets = self.ddqn_targets(&batch);
        let loss = self.model.train(&batch.states, &targets);

        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);

        loss
    }

    /// Advance the environment-step counter, syncing the target network at
    /// the configured cadence.
    pub fn on_step(&mut self) {
        self.step_count += 1;
        if self.step_count % self.config.target_update_freq as u64 == 0 {
            self.model.sync_target();
            debug!(step = self.step_count, "target network synced");
        }
    }

    /// Record an episode boundary
    pub fn on_episode_end(&mut self) {
        self.episode_count += 1;
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Force a specific exploration rate (greedy evaluation uses 0.0)
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Current resumable state
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            epsilon: self.epsilon,
            step_count: self.step_count,
            episode_count: self.episode_count,
        }
    }

    /// Restore resumable state from a snapshot
    pub fn restore(&mut self, snapshot: AgentSnapshot) {
        self.epsilon = snapshot.epsilon.clamp(0.0, 1.0);
        self.step_count = snapshot.step_count;
        self.episode_count = snapshot.episode_count;
    }

    /// Persist the snapshot as JSON
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Restore the snapshot from JSON
    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path)?;
        let snapshot: AgentSnapshot = serde_json::from_str(&json)?;
        self.restore(snapshot);
        Ok(())
    }

    /// Persist approximator parameters
    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.model.save(path)
    }

    /// Restore approximator parameters
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        self.model.load(path)
    }
}

/// Index of the maximum value; ties resolve to the first (lowest) index
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
