//! Status Sink
//!
//! Episode-level metrics are pushed through an injected [`StatusSink`]
//! collaborator; the training loop never writes status files itself. Sink
//! failures are reported and swallowed so persistence problems cannot stall
//! training.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Per-episode metrics record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeResult {
    /// Episode index (1-based)
    pub episode: u64,
    /// Sum of rewards over the episode
    pub total_reward: f32,
    /// Cash capital at episode end
    pub ending_capital: f64,
    /// Cash plus position value at episode end
    pub portfolio_value: f64,
    /// Realized P&L over the episode
    pub realized_pnl: f64,
    /// Trades executed
    pub trade_count: usize,
    /// Exploration rate after the episode
    pub epsilon: f32,
    /// Mean training loss over performed updates (0 when none ran)
    pub avg_loss: f32,
    /// Environment steps taken
    pub steps: usize,
}

/// Receives one record per completed episode
pub trait StatusSink {
    fn emit(&mut self, record: &EpisodeResult);
}

/// Writes the latest episode record to a JSON status file
pub struct JsonStatusSink {
    path: PathBuf,
}

impl JsonStatusSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl StatusSink for JsonStatusSink {
    fn emit(&mut self, record: &EpisodeResult) {
        let json = match serde_json::to_string_pretty(record) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize status record: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json) {
            warn!("failed to write status file {:?}: {}", self.path, e);
        }
    }
}

/// Logs each record through tracing
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn emit(&mut self, record: &EpisodeResult) {
        info!(
            episode = record.episode,
            total_reward = record.total_reward,
            capital = record.ending_capital,
            trades = record.trade_count,
            epsilon = record.epsilon,
            "episode status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> EpisodeResult {
        EpisodeResult {
            episode: 3,
            total_reward: 12.5,
            ending_capital: 10_050.0,
            portfolio_value: 10_050.0,
            realized_pnl: 50.0,
            trade_count: 4,
            epsilon: 0.7,
            avg_loss: 0.01,
            steps: 200,
        }
    }

    #[test]
    fn test_json_sink_writes_latest_record() {
        let path = std::env::temp_dir().join("dqtrader_status_test.json");
        let mut sink = JsonStatusSink::new(&path);

        sink.emit(&sample_record());

        let json = std::fs::read_to_string(&path).unwrap();
        let restored: EpisodeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.episode, 3);
        assert_eq!(restored.trade_count, 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_json_sink_survives_bad_path() {
        let mut sink = JsonStatusSink::new("/nonexistent-dir/status.json");
        // Must not panic; failures are logged and swallowed.
        sink.emit(&sample_record());
    }
}
