//! Double DQN trading bot.
//!
//! A reinforcement-learning loop over a simulated single-instrument market:
//! an epsilon-greedy agent interacts with a deterministic price-series
//! environment, stores transitions in a uniform replay buffer, and trains a
//! pluggable Q-value approximator with Double-DQN bootstrapped targets.

pub mod agent;
pub mod config;
pub mod core;
pub mod env;
pub mod error;
pub mod memory;
pub mod training;

pub use agent::{AgentSnapshot, DdqnAgent, LinearQNet, QFunction};
pub use config::{AgentConfig, AppConfig, DataConfig, RunConfig, TradingConfig};
pub use core::{Action, NUM_ACTIONS};
pub use env::{generate_series, MarketData, SeriesConfig, StepResult, TradingEnv};
pub use error::{BotError, Result};
pub use memory::{ReplayBuffer, Transition, TransitionBatch};
pub use training::{
    evaluate, summarize_results, Checkpointer, EpisodeResult, JsonStatusSink, LogStatusSink,
    StatusSink, Trainer, TrainingSummary,
};
