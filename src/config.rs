use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BotError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            agent: AgentConfig::default(),
            data: DataConfig::default(),
            run: RunConfig::default(),
        }
    }
}

/// Trading simulation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Starting cash for each episode
    pub initial_capital: f64,
    /// Fraction of available capital committed per buy (e.g. 0.1 = 10%)
    pub position_size: f64,
    /// Holdings cap in shares; buys are rejected once holdings reach this
    pub max_position: u64,
    /// Forced-exit loss threshold as a positive fraction (e.g. 0.03 = -3%)
    pub stop_loss: f64,
    /// Forced-exit profit threshold as a positive fraction (e.g. 0.05 = +5%)
    pub take_profit: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            position_size: 0.1,
            max_position: 100,
            stop_loss: 0.03,
            take_profit: 0.05,
        }
    }
}

impl TradingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= 0.0 {
            return Err(BotError::Config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.position_size <= 0.0 || self.position_size > 1.0 {
            return Err(BotError::Config(format!(
                "position_size must be in (0, 1], got {}",
                self.position_size
            )));
        }
        if self.max_position == 0 {
            return Err(BotError::Config("max_position must be at least 1".into()));
        }
        if self.stop_loss <= 0.0 {
            return Err(BotError::Config(format!(
                "stop_loss must be positive, got {}",
                self.stop_loss
            )));
        }
        if self.take_profit <= 0.0 {
            return Err(BotError::Config(format!(
                "take_profit must be positive, got {}",
                self.take_profit
            )));
        }
        Ok(())
    }
}

/// DDQN agent hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Approximator learning rate
    pub learning_rate: f32,
    /// Discount factor
    pub gamma: f32,
    /// Initial exploration rate
    pub epsilon: f32,
    /// Exploration floor
    pub epsilon_min: f32,
    /// Multiplicative exploration decay applied after each training step
    pub epsilon_decay: f32,
    /// Mini-batch size for replay training
    pub batch_size: usize,
    /// Replay buffer capacity
    pub memory_size: usize,
    /// Environment steps between target network syncs
    pub target_update_freq: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            gamma: 0.99,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            batch_size: 32,
            memory_size: 10_000,
            target_update_freq: 100,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(BotError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(BotError::Config(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(BotError::Config(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        if self.epsilon_min < 0.0 || self.epsilon_min > self.epsilon {
            return Err(BotError::Config(format!(
                "epsilon_min must be in [0, epsilon], got {}",
                self.epsilon_min
            )));
        }
        if self.epsilon_decay <= 0.0 || self.epsilon_decay > 1.0 {
            return Err(BotError::Config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if self.batch_size == 0 {
            return Err(BotError::Config("batch_size must be at least 1".into()));
        }
        if self.memory_size < self.batch_size {
            return Err(BotError::Config(format!(
                "memory_size ({}) must be >= batch_size ({})",
                self.memory_size, self.batch_size
            )));
        }
        if self.target_update_freq == 0 {
            return Err(BotError::Config(
                "target_update_freq must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Observation and synthetic data parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Trailing window length for observations
    pub lookback: usize,
    /// Number of steps to generate for synthetic series
    pub series_len: usize,
    /// Initial price for synthetic series
    pub initial_price: f64,
    /// Per-step return volatility for synthetic series
    pub volatility: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            series_len: 1_000,
            initial_price: 100.0,
            volatility: 0.01,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(BotError::Config("lookback must be at least 1".into()));
        }
        if self.series_len <= self.lookback + 1 {
            return Err(BotError::Config(format!(
                "series_len ({}) must exceed lookback + 1 ({})",
                self.series_len,
                self.lookback + 1
            )));
        }
        if self.initial_price <= 0.0 {
            return Err(BotError::Config(format!(
                "initial_price must be positive, got {}",
                self.initial_price
            )));
        }
        if self.volatility < 0.0 {
            return Err(BotError::Config(format!(
                "volatility must be non-negative, got {}",
                self.volatility
            )));
        }
        Ok(())
    }
}

/// Training-run level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory for checkpoints
    pub checkpoint_dir: String,
    /// Checkpoint save frequency (episodes)
    pub checkpoint_frequency: usize,
    /// Maximum checkpoints to keep
    pub max_checkpoints: usize,
    /// Status file path for the metrics sink (none disables it)
    pub status_file: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "./checkpoints".to_string(),
            checkpoint_frequency: 25,
            max_checkpoints: 5,
            status_file: Some("bot_status.json".to_string()),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_frequency == 0 {
            return Err(BotError::Config(
                "checkpoint_frequency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration, layering an optional TOML file and `DQT_`
    /// environment variables over the defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg: AppConfig = builder
            .add_source(
                Environment::with_prefix("DQT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate all sections, failing fast on the first bad value
    pub fn validate(&self) -> Result<()> {
        self.trading.validate()?;
        self.agent.validate()?;
        self.data.validate()?;
        self.run.validate()?;
        Ok(())
    }
}
