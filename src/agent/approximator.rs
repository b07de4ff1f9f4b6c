//! Function Approximator Boundary
//!
//! The learning loop talks to the Q-value model only through [`QFunction`];
//! any trainable scorer exposing predict/train/sync/save/load substitutes.
//! [`LinearQNet`] is a pure-Rust baseline so training runs without an ML
//! framework.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{BotError, Result};

/// Capability interface for the Q-value approximator
///
/// `predict` reads the online parameters, `predict_target` the frozen target
/// copy, and `sync_target` copies online into target. The agent never
/// inspects parameters directly.
pub trait QFunction {
    /// Q-values from the online network, `[batch][action]`
    fn predict(&self, states: &[Vec<f32>]) -> Vec<Vec<f32>>;

    /// Q-values from the frozen target network, `[batch][action]`
    fn predict_target(&self, states: &[Vec<f32>]) -> Vec<Vec<f32>>;

    /// One gradient step toward `targets`; returns the scalar loss
    fn train(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> f32;

    /// Copy online parameters into the target copy
    fn sync_target(&mut self);

    /// Persist parameters
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore parameters
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Minimal linear Q-network with online and target parameter sets
///
/// Q(s)[a] = w_a . s + b_a, trained by SGD on the mean squared error of the
/// provided target matrix. Since untouched action slots carry the online
/// predictions as targets, their error is zero and only the taken action
/// back-propagates signal.
pub struct LinearQNet {
    state_dim: usize,
    action_dim: usize,
    learning_rate: f32,
    /// Online weights, `[action][state_dim + 1]` with trailing bias
    online: Vec<Vec<f32>>,
    /// Frozen target weights, same shape
    target: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct LinearQNetRecord {
    state_dim: usize,
    action_dim: usize,
    learning_rate: f32,
    online: Vec<Vec<f32>>,
    target: Vec<Vec<f32>>,
}

impl LinearQNet {
    /// Create a new network with small random online weights; the target
    /// starts as an exact copy.
    pub fn new(state_dim: usize, action_dim: usize, learning_rate: f32) -> Self {
        let mut rng = rand::thread_rng();
        let online: Vec<Vec<f32>> = (0..action_dim)
            .map(|_| {
                (0..=state_dim)
                    .map(|_| rng.gen_range(-0.05..0.05))
                    .collect()
            })
            .collect();
        let target = online.clone();

        Self {
            state_dim,
            action_dim,
            learning_rate,
            online,
            target,
        }
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn forward(weights: &[Vec<f32>], state: &[f32]) -> Vec<f32> {
        weights
            .iter()
            .map(|w| {
                let bias = w[w.len() - 1];
                w[..w.len() - 1]
                    .iter()
                    .zip(state.iter())
                    .map(|(wi, si)| wi * si)
                    .sum::<f32>()
                    + bias
            })
            .collect()
    }
}

impl QFunction for LinearQNet {
    fn predict(&self, states: &[Vec<f32>]) -> Vec<Vec<f32>> {
        states
            .iter()
            .map(|s| Self::forward(&self.online, s))
            .collect()
    }

    fn predict_target(&self, states: &[Vec<f32>]) -> Vec<Vec<f32>> {
        states
            .iter()
            .map(|s| Self::forward(&self.target, s))
            .collect()
    }

    fn train(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> f32 {
        if states.is_empty() {
            return 0.0;
        }

        let mut total_sq_err = 0.0f32;
        let n = states.len() as f32;

        for (state, target_row) in states.iter().zip(targets.iter()) {
            let predicted = Self::forward(&self.online, state);
            for action in 0..self.action_dim {
                let err = target_row[action] - predicted[action];
                total_sq_err += err * err;

                let scale = self.learning_rate * err / n;
                let w = &mut self.online[action];
                let bias_idx = w.len() - 1;
                for (wi, si) in w[..bias_idx].iter_mut().zip(state.iter()) {
                    *wi += scale * si;
                }
                w[bias_idx] += scale;
            }
        }

        total_sq_err / (n * self.action_dim as f32)
    }

    fn sync_target(&mut self) {
        self.target = self.online.clone();
    }

    fn save(&self, path: &Path) -> Result<()> {
        let record = LinearQNetRecord {
            state_dim: self.state_dim,
            action_dim: self.action_dim,
            learning_rate: self.learning_rate,
            online: self.online.clone(),
            target: self.target.clone(),
        };
        let json = serde_json::to_string(&record)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path)?;
        let record: LinearQNetRecord = serde_json::from_str(&json)?;

        if record.state_dim != self.state_dim || record.action_dim != self.action_dim {
            return Err(BotError::Checkpoint(format!(
                "weight shape mismatch: checkpoint is {}x{}, model is {}x{}",
                record.state_dim, record.action_dim, self.state_dim, self.action_dim
            )));
        }

        // Weights are the persistent state; the learning rate stays as
        // configured so a resumed run can deliberately change it.
        if (record.learning_rate - self.learning_rate).abs() > f32::EPSILON {
            debug!(
                "checkpoint learning_rate {} differs from configured {}, keeping configured",
                record.learning_rate, self.learning_rate
            );
        }
        self.online = record.online;
        self.target = record.target;
        Ok(())
    }
}
