//! Trading Environment
//!
//! Deterministic gym-like state machine stepping through a price series.
//! Owns all account state (capital, holdings, cost basis, trade log) and is
//! the only place that mutates it, via `reset` and `step`.

use tracing::debug;

use super::data::MarketData;
use crate::config::TradingConfig;
use crate::core::Action;
use crate::error::{BotError, Result};

/// Position-context features appended to every observation
pub const CONTEXT_FEATURES: usize = 4;

/// One executed liquidation
#[derive(Debug, Clone)]
pub struct TradeRecord {
    /// Step cursor at execution
    pub step: usize,
    /// Execution price
    pub price: f64,
    /// Shares liquidated
    pub shares: u64,
    /// Realized profit/loss against cost basis
    pub pnl: f64,
    /// True when triggered by stop-loss/take-profit or episode end
    pub forced: bool,
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after the action
    pub observation: Vec<f32>,
    /// Realized P&L attributable to this step
    pub reward: f32,
    /// Whether the episode is done
    pub done: bool,
    /// Additional info
    pub info: StepInfo,
}

/// Additional step information
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// Current cash capital
    pub capital: f64,
    /// Shares currently held
    pub shares_held: u64,
    /// Cash plus mark-to-market position value
    pub portfolio_value: f64,
    /// Cumulative realized P&L this episode
    pub realized_pnl: f64,
    /// Trades executed this episode
    pub trade_count: usize,
}

/// Trading environment over a preloaded market data series
pub struct TradingEnv {
    config: TradingConfig,
    data: MarketData,
    lookback: usize,
    cursor: usize,
    capital: f64,
    shares_held: u64,
    cost_basis: f64,
    realized_pnl: f64,
    trades: Vec<TradeRecord>,
    done: bool,
}

impl TradingEnv {
    /// Create a new environment. Fails fast when the configuration is
    /// invalid or the series is too short for the lookback window.
    pub fn new(data: MarketData, config: TradingConfig, lookback: usize) -> Result<Self> {
        config.validate()?;
        if lookback == 0 {
            return Err(BotError::Config("lookback must be at least 1".into()));
        }
        if data.len() <= lookback + 1 {
            return Err(BotError::InvalidData(format!(
                "series length {} too short for lookback {}",
                data.len(),
                lookback
            )));
        }

        let capital = config.initial_capital;
        Ok(Self {
            config,
            data,
            lookback,
            cursor: lookback,
            capital,
            shares_held: 0,
            cost_basis: 0.0,
            realized_pnl: 0.0,
            trades: Vec::new(),
            done: false,
        })
    }

    /// Reset the environment for a new episode and return the initial
    /// observation. Calling it repeatedly from any state is idempotent.
    pub fn reset(&mut self) -> Vec<f32> {
        self.cursor = self.lookback;
        self.capital = self.config.initial_capital;
        self.shares_held = 0;
        self.cost_basis = 0.0;
        self.realized_pnl = 0.0;
        self.trades.clear();
        self.done = false;

        self.observation()
    }

    /// Execute one step.
    ///
    /// Reward is the realized P&L of any liquidation executed during this
    /// step (explicit sell, stop-loss/take-profit exit, or terminal
    /// liquidation); buy and hold steps reward 0. Calling after the episode
    /// is done returns a neutral no-op result instead of panicking, so
    /// drivers may safely over-iterate by a step.
    pub fn step(&mut self, action: Action) -> StepResult {
        if self.done {
            return StepResult {
                observation: self.observation(),
                reward: 0.0,
                done: true,
                info: self.info(),
            };
        }

        let price = self.data.close(self.cursor);
        let mut reward = 0.0f64;

        match action {
            Action::Hold => {}
            Action::Buy => self.try_buy(price),
            Action::Sell => {
                if self.shares_held > 0 {
                    reward += self.liquidate(price, false);
                }
            }
        }

        // Automatic risk exit, independent of the chosen action.
        if self.shares_held > 0 && self.cost_basis > 0.0 {
            let change = (price - self.cost_basis) / self.cost_basis;
            if change <= -self.config.stop_loss || change >= self.config.take_profit {
                reward += self.liquidate(price, true);
            }
        }

        self.cursor += 1;
        if self.cursor >= self.data.len() - 1 {
            self.done = true;
            // Fold any open position into the terminal reward.
            if self.shares_held > 0 {
                let final_price = self.data.close(self.cursor.min(self.data.len() - 1));
                reward += self.liquidate(final_price, true);
            }
        }

        StepResult {
            observation: self.observation(),
            reward: reward as f32,
            done: self.done,
            info: self.info(),
        }
    }

    fn try_buy(&mut self, price: f64) {
        if self.shares_held >= self.config.max_position {
            return;
        }

        let shares = (self.capital * self.config.position_size / price).floor() as u64;
        if shares == 0 {
            return;
        }

        let cost = shares as f64 * price;
        if cost > self.capital {
            return;
        }

        self.capital -= cost;
        self.shares_held += shares;
        self.cost_basis = price;
        debug!(shares, price, capital = self.capital, "buy executed");
    }

    fn liquidate(&mut self, price: f64, forced: bool) -> f64 {
        let proceeds = self.shares_held as f64 * price;
        let pnl = proceeds - self.shares_held as f64 * self.cost_basis;

        self.capital += proceeds;
        self.realized_pnl += pnl;
        self.trades.push(TradeRecord {
            step: self.cursor,
            price,
            shares: self.shares_held,
            pnl,
            forced,
        });
        debug!(
            shares = self.shares_held,
            price, pnl, forced, "position liquidated"
        );

        self.shares_held = 0;
        self.cost_basis = 0.0;
        pnl
    }

    /// Observation: trailing window of feature rows plus normalized position
    /// context (capital, holdings, portfolio value, unrealized return).
    fn observation(&self) -> Vec<f32> {
        let at = self.cursor.min(self.data.len() - 1);
        let mut obs = Vec::with_capacity(self.observation_dim());

        for step in at - self.lookback..at {
            obs.extend_from_slice(self.data.features(step));
        }

        let price = self.data.close(at);
        let portfolio = self.capital + self.shares_held as f64 * price;
        let unrealized = if self.cost_basis > 0.0 {
            (price - self.cost_basis) / self.cost_basis
        } else {
            0.0
        };

        obs.push((self.capital / self.config.initial_capital) as f32);
        obs.push(self.shares_held as f32 / self.config.max_position as f32);
        obs.push((portfolio / self.config.initial_capital) as f32);
        obs.push(unrealized as f32);

        obs
    }

    fn info(&self) -> StepInfo {
        StepInfo {
            capital: self.capital,
            shares_held: self.shares_held,
            portfolio_value: self.portfolio_value(),
            realized_pnl: self.realized_pnl,
            trade_count: self.trades.len(),
        }
    }

    /// Observation dimensionality
    pub fn observation_dim(&self) -> usize {
        self.lookback * self.data.feature_width() + CONTEXT_FEATURES
    }

    /// Cash plus mark-to-market value of any held position
    pub fn portfolio_value(&self) -> f64 {
        let at = self.cursor.min(self.data.len() - 1);
        self.capital + self.shares_held as f64 * self.data.close(at)
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn shares_held(&self) -> u64 {
        self.shares_held
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn step_cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_series(price: f64, len: usize) -> MarketData {
        MarketData::from_closes(vec![price; len]).unwrap()
    }

    fn ramp_series(start: f64, step: f64, len: usize) -> MarketData {
        MarketData::from_closes((0..len).map(|i| start + step * i as f64).collect()).unwrap()
    }

    fn test_config() -> TradingConfig {
        TradingConfig {
            initial_capital: 1000.0,
            position_size: 0.1,
            max_position: 100,
            stop_loss: 0.03,
            take_profit: 0.05,
        }
    }

    fn make_env(data: MarketData, config: TradingConfig) -> TradingEnv {
        let mut env = TradingEnv::new(data, config, 5).unwrap();
        env.reset();
        env
    }

    #[test]
    fn test_buy_sizing_boundary() {
        let mut env = make_env(flat_series(50.0, 30), test_config());

        let result = env.step(Action::Buy);
        // floor(1000 * 0.1 / 50) = 2 shares, cost 100
        assert_eq!(env.shares_held(), 2);
        assert!((env.capital() - 900.0).abs() < 1e-9);
        assert_eq!(result.reward, 0.0);
    }

    #[test]
    fn test_buy_rejected_when_fraction_buys_nothing() {
        let config = TradingConfig {
            position_size: 0.01, // 10 of capital, price 50 -> 0 shares
            ..test_config()
        };
        let mut env = make_env(flat_series(50.0, 30), config);

        env.step(Action::Buy);
        assert_eq!(env.shares_held(), 0);
        assert!((env.capital() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_buy_rejected_at_position_cap() {
        let config = TradingConfig {
            max_position: 2,
            ..test_config()
        };
        let mut env = make_env(flat_series(50.0, 30), config);

        env.step(Action::Buy);
        assert_eq!(env.shares_held(), 2);

        env.step(Action::Buy);
        // Cap reached, second buy is a silent no-op.
        assert_eq!(env.shares_held(), 2);
        assert!((env.capital() - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_realizes_pnl() {
        // Slow ramp so the +5% take profit does not fire before we sell.
        let config = TradingConfig {
            take_profit: 10.0,
            stop_loss: 10.0,
            ..test_config()
        };
        let mut env = make_env(ramp_series(50.0, 0.5, 40), config);

        env.step(Action::Buy); // 1 share at the cursor price
        let entry = env.trades().len();
        assert_eq!(entry, 0);
        assert_eq!(env.shares_held(), 1);

        env.step(Action::Hold);
        let result = env.step(Action::Sell);

        assert_eq!(env.shares_held(), 0);
        assert_eq!(env.trades().len(), 1);
        assert!(!env.trades()[0].forced);
        // Price rose 0.5 per step over 2 steps.
        assert!((result.reward - 1.0).abs() < 1e-4);
        assert!((env.realized_pnl() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_without_position_is_noop() {
        let mut env = make_env(flat_series(50.0, 30), test_config());

        let result = env.step(Action::Sell);
        assert_eq!(result.reward, 0.0);
        assert_eq!(env.trades().len(), 0);
    }

    #[test]
    fn test_stop_loss_forces_exit() {
        // 1% drop per step; -3% stop loss trips on the third step holding.
        let mut env = make_env(ramp_series(100.0, -1.0, 40), test_config());

        env.step(Action::Buy);
        assert!(env.trades().is_empty());

        let mut forced = false;
        for _ in 0..10 {
            let result = env.step(Action::Hold);
            if !env.trades().is_empty() {
                assert!(env.trades()[0].forced);
                assert!(env.trades()[0].pnl < 0.0);
                assert!(result.reward < 0.0);
                forced = true;
                break;
            }
        }
        assert!(forced);
        assert_eq!(env.shares_held(), 0);
    }

    #[test]
    fn test_take_profit_forces_exit() {
        let mut env = make_env(ramp_series(50.0, 2.0, 40), test_config());

        env.step(Action::Buy);
        let mut forced = false;
        for _ in 0..10 {
            let result = env.step(Action::Hold);
            if !env.trades().is_empty() {
                assert!(env.trades()[0].forced);
                assert!(env.trades()[0].pnl > 0.0);
                assert!(result.reward > 0.0);
                forced = true;
                break;
            }
        }
        assert!(forced);
    }

    #[test]
    fn test_terminal_force_liquidation() {
        let config = TradingConfig {
            take_profit: 10.0,
            stop_loss: 10.0,
            ..test_config()
        };
        let mut env = make_env(flat_series(50.0, 12), config);

        env.step(Action::Buy);
        assert!(env.shares_held() > 0);

        let mut last = None;
        while !env.is_done() {
            last = Some(env.step(Action::Hold));
        }

        let result = last.unwrap();
        assert!(result.done);
        // Position was closed into the terminal step; portfolio is cash-only.
        assert_eq!(env.shares_held(), 0);
        assert!((env.portfolio_value() - env.capital()).abs() < 1e-9);
        assert!(!env.trades().is_empty());
        assert!(env.trades().last().unwrap().forced);
    }

    #[test]
    fn test_post_terminal_step_is_noop() {
        let mut env = make_env(flat_series(50.0, 12), test_config());

        while !env.is_done() {
            env.step(Action::Hold);
        }
        let capital_before = env.capital();

        let result = env.step(Action::Buy);
        assert!(result.done);
        assert_eq!(result.reward, 0.0);
        assert_eq!(env.capital(), capital_before);
        assert_eq!(env.shares_held(), 0);
    }

    #[test]
    fn test_idempotent_reset() {
        let mut env = make_env(ramp_series(100.0, 0.5, 40), test_config());

        env.step(Action::Buy);
        env.step(Action::Hold);

        let obs_a = env.reset();
        let cap_a = env.capital();
        let obs_b = env.reset();
        let cap_b = env.capital();

        assert_eq!(obs_a, obs_b);
        assert_eq!(cap_a, cap_b);
        assert_eq!(env.shares_held(), 0);
        assert!(!env.is_done());
    }

    #[test]
    fn test_observation_dim() {
        use crate::env::data::DERIVED_FEATURE_WIDTH;

        let mut env = make_env(flat_series(50.0, 30), test_config());
        let obs = env.reset();
        assert_eq!(obs.len(), 5 * DERIVED_FEATURE_WIDTH + CONTEXT_FEATURES);
        assert_eq!(env.observation_dim(), obs.len());
    }

    #[test]
    fn test_rejects_short_series() {
        let data = flat_series(50.0, 6);
        assert!(TradingEnv::new(data, test_config(), 5).is_err());
    }
}
