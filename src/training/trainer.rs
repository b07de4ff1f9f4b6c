//! Training Loop
//!
//! Drives episodes through the environment and agent: act, step, store, one
//! replay update, counter advance, until done. Emits episode records through
//! the status sink and checkpoints at a configured cadence. The loop is
//! single-threaded and simulation-paced; a cooperative stop flag checked
//! between steps is the only cancellation mechanism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::checkpointing::{episode_name, Checkpointer};
use super::status::{EpisodeResult, StatusSink};
use crate::agent::DdqnAgent;
use crate::env::TradingEnv;
use crate::memory::Transition;

/// Training driver
pub struct Trainer {
    stop: Arc<AtomicBool>,
    sink: Option<Box<dyn StatusSink>>,
    checkpointer: Option<Checkpointer>,
    checkpoint_frequency: u64,
    checkpoint_prefix: String,
}

impl Trainer {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            sink: None,
            checkpointer: None,
            checkpoint_frequency: 25,
            checkpoint_prefix: "ddqn".to_string(),
        }
    }

    /// Attach a status sink receiving one record per episode
    pub fn with_sink(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach periodic checkpointing
    pub fn with_checkpointer(mut self, checkpointer: Checkpointer, frequency: u64) -> Self {
        self.checkpointer = Some(checkpointer);
        self.checkpoint_frequency = frequency.max(1);
        self
    }

    /// Handle for requesting a cooperative stop from another thread
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Train for up to `episodes` episodes
    pub fn run(
        &mut self,
        env: &mut TradingEnv,
        agent: &mut DdqnAgent,
        episodes: usize,
    ) -> Vec<EpisodeResult> {
        let mut results = Vec::with_capacity(episodes);

        for _ in 0..episodes {
            if self.stop.load(Ordering::Relaxed) {
                warn!("stop requested, ending training");
                break;
            }

            let Some(result) = self.run_episode(env, agent) else {
                warn!("stop requested mid-episode, discarding partial episode");
                break;
            };

            info!(
                "Episode {}: reward={:.4}, pnl={:.4}, trades={}, epsilon={:.4}",
                result.episode,
                result.total_reward,
                result.realized_pnl,
                result.trade_count,
                result.epsilon
            );

            if let Some(sink) = self.sink.as_mut() {
                sink.emit(&result);
            }

            if let Some(checkpointer) = self.checkpointer.as_ref() {
                if result.episode % self.checkpoint_frequency == 0 {
                    let name = episode_name(&self.checkpoint_prefix, result.episode);
                    if let Err(e) = checkpointer.save(agent, &name) {
                        // Persistence failure never corrupts the live policy.
                        warn!("checkpoint save failed: {}", e);
                    }
                }
            }

            results.push(result);
        }

        results
    }

    /// Run one episode to completion, or `None` if the stop flag tripped
    /// mid-episode. A truncated episode is discarded rather than recorded:
    /// it is neither counted, emitted, nor checkpointed. Transitions already
    /// stored in replay memory are kept.
    fn run_episode(&self, env: &mut TradingEnv, agent: &mut DdqnAgent) -> Option<EpisodeResult> {
        let mut state = env.reset();
        let mut total_reward = 0.0f32;
        let mut loss_sum = 0.0f32;
        let mut loss_count = 0usize;
        let mut steps = 0usize;

        loop {
            if self.stop.load(Ordering::Relaxed) {
                return None;
            }

            let action = agent.act(&state);
            let result = env.step(action);

            agent.remember(Transition::new(
                state,
                action,
                result.reward,
                result.observation.clone(),
                result.done,
            ));

            let trained = agent.memory_len() >= agent.batch_size();
            let loss = agent.replay();
            if trained {
                loss_sum += loss;
                loss_count += 1;
            }

            agent.on_step();

            state = result.observation;
            total_reward += result.reward;
            steps += 1;

            if result.done {
                break;
            }
        }

        agent.on_episode_end();

        Some(EpisodeResult {
            episode: agent.episode_count(),
            total_reward,
            ending_capital: env.capital(),
            portfolio_value: env.portfolio_value(),
            realized_pnl: env.realized_pnl(),
            trade_count: env.trades().len(),
            epsilon: agent.epsilon(),
            avg_loss: if loss_count > 0 {
                loss_sum / loss_count as f32
            } else {
                0.0
            },
            steps,
        })
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Run greedy evaluation episodes: exploration off, no learning.
pub fn evaluate(env: &mut TradingEnv, agent: &mut DdqnAgent, episodes: usize) -> Vec<EpisodeResult> {
    let saved_epsilon = agent.epsilon();
    agent.set_epsilon(0.0);

    let mut results = Vec::with_capacity(episodes);
    for episode in 1..=episodes as u64 {
        let mut state = env.reset();
        let mut total_reward = 0.0f32;
        let mut steps = 0usize;

        loop {
            let action = agent.greedy_action(&state);
            let result = env.step(action);
            state = result.observation;
            total_reward += result.reward;
            steps += 1;
            if result.done {
                break;
            }
        }

        results.push(EpisodeResult {
            episode,
            total_reward,
            ending_capital: env.capital(),
            portfolio_value: env.portfolio_value(),
            realized_pnl: env.realized_pnl(),
            trade_count: env.trades().len(),
            epsilon: 0.0,
            avg_loss: 0.0,
            steps,
        });
    }

    agent.set_epsilon(saved_epsilon);
    results
}

/// Training summary statistics
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    /// Number of episodes
    pub num_episodes: usize,
    /// Average reward per episode
    pub avg_reward: f32,
    /// Average realized P&L per episode
    pub avg_pnl: f64,
    /// Average episode length
    pub avg_episode_length: f32,
    /// Average trades per episode
    pub avg_trades: f32,
    /// Profit factor (sum of winning episodes / sum of losing episodes)
    pub profit_factor: f64,
    /// Fraction of episodes closing with positive realized P&L
    pub episode_win_rate: f64,
}

/// Calculate training summary statistics
pub fn summarize_results(results: &[EpisodeResult]) -> TrainingSummary {
    if results.is_empty() {
        return TrainingSummary::default();
    }

    let n = results.len() as f64;

    let avg_reward = results.iter().map(|r| r.total_reward as f64).sum::<f64>() / n;
    let avg_pnl = results.iter().map(|r| r.realized_pnl).sum::<f64>() / n;
    let avg_length = results.iter().map(|r| r.steps as f64).sum::<f64>() / n;
    let avg_trades = results.iter().map(|r| r.trade_count as f64).sum::<f64>() / n;

    let total_wins: f64 = results
        .iter()
        .filter(|r| r.realized_pnl > 0.0)
        .map(|r| r.realized_pnl)
        .sum();
    let total_losses: f64 = results
        .iter()
        .filter(|r| r.realized_pnl < 0.0)
        .map(|r| -r.realized_pnl)
        .sum();
    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else {
        f64::INFINITY
    };

    let winning_episodes = results.iter().filter(|r| r.realized_pnl > 0.0).count();

    TrainingSummary {
        num_episodes: results.len(),
        avg_reward: avg_reward as f32,
        avg_pnl,
        avg_episode_length: avg_length as f32,
        avg_trades: avg_trades as f32,
        profit_factor,
        episode_win_rate: winning_episodes as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LinearQNet;
    use crate::config::{AgentConfig, TradingConfig};
    use crate::env::{generate_series, SeriesConfig, TradingEnv};

    fn small_env() -> TradingEnv {
        let data = generate_series(&SeriesConfig::default(), 120).unwrap();
        let config = TradingConfig {
            initial_capital: 10_000.0,
            position_size: 0.2,
            max_position: 50,
            stop_loss: 0.05,
            take_profit: 0.08,
        };
        TradingEnv::new(data, config, 10).unwrap()
    }

    fn small_agent(env: &TradingEnv) -> DdqnAgent {
        let config = AgentConfig {
            batch_size: 8,
            memory_size: 500,
            target_update_freq: 20,
            ..Default::default()
        };
        let net = LinearQNet::new(env.observation_dim(), 3, 0.001);
        DdqnAgent::new(config, Box::new(net)).unwrap()
    }

    #[test]
    fn test_run_produces_results_and_decays_epsilon() {
        let mut env = small_env();
        let mut agent = small_agent(&env);
        let mut trainer = Trainer::new();

        let results = trainer.run(&mut env, &mut agent, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].episode, 1);
        assert_eq!(results[2].episode, 3);
        for r in &results {
            assert!(r.steps > 0);
            assert!(r.ending_capital > 0.0);
        }
        // Replay ran, so exploration decayed from its initial 1.0.
        assert!(agent.epsilon() < 1.0);
        assert!(agent.memory_len() > 0);
    }

    #[test]
    fn test_stop_flag_halts_training() {
        let mut env = small_env();
        let mut agent = small_agent(&env);
        let mut trainer = Trainer::new();

        trainer.stop_handle().store(true, Ordering::Relaxed);
        let results = trainer.run(&mut env, &mut agent, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn test_interrupted_episode_is_discarded() {
        let mut env = small_env();
        let mut agent = small_agent(&env);
        let trainer = Trainer::new();

        trainer.stop_handle().store(true, Ordering::Relaxed);
        let result = trainer.run_episode(&mut env, &mut agent);

        // A truncated episode never becomes a record or advances the
        // episode counter.
        assert!(result.is_none());
        assert_eq!(agent.episode_count(), 0);
    }

    #[test]
    fn test_evaluate_leaves_agent_untouched() {
        let mut env = small_env();
        let mut agent = small_agent(&env);
        agent.set_epsilon(0.5);

        let results = evaluate(&mut env, &mut agent, 2);

        assert_eq!(results.len(), 2);
        assert!((agent.epsilon() - 0.5).abs() < 1e-6);
        assert_eq!(agent.step_count(), 0);
        assert_eq!(agent.memory_len(), 0);
    }

    #[test]
    fn test_summarize_results() {
        let make = |pnl: f64, reward: f32| EpisodeResult {
            episode: 1,
            total_reward: reward,
            ending_capital: 10_000.0 + pnl,
            portfolio_value: 10_000.0 + pnl,
            realized_pnl: pnl,
            trade_count: 2,
            epsilon: 0.5,
            avg_loss: 0.0,
            steps: 100,
        };
        let results = vec![make(100.0, 1.0), make(-50.0, -0.5), make(30.0, 0.3)];

        let summary = summarize_results(&results);
        assert_eq!(summary.num_episodes, 3);
        assert!((summary.avg_pnl - 80.0 / 3.0).abs() < 1e-9);
        assert!((summary.profit_factor - 130.0 / 50.0).abs() < 1e-9);
        assert!((summary.episode_win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.avg_trades - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize_results(&[]);
        assert_eq!(summary.num_episodes, 0);
    }
}
