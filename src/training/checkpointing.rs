//! Checkpointing
//!
//! Saves and restores the agent's resumable state (epsilon, step and episode
//! counters) together with the approximator's own weight artifact, so a
//! paused run resumes with the same exploration rate and sync cadence phase.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::agent::{AgentSnapshot, DdqnAgent};
use crate::error::{BotError, Result};

const SNAPSHOT_SUFFIX: &str = ".agent.json";
const WEIGHTS_SUFFIX: &str = ".weights.json";

/// Checkpointer for saving and loading training state
#[derive(Clone)]
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum checkpoints to keep
    max_checkpoints: usize,
}

impl Checkpointer {
    /// Create a new checkpointer
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }

        Self {
            checkpoint_dir,
            max_checkpoints,
        }
    }

    /// Path of the agent snapshot artifact for a given name
    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{}{}", name, SNAPSHOT_SUFFIX))
    }

    /// Path of the approximator weight artifact for a given name
    pub fn weights_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{}{}", name, WEIGHTS_SUFFIX))
    }

    /// Save agent snapshot and approximator weights under a name
    pub fn save(&self, agent: &DdqnAgent, name: &str) -> Result<PathBuf> {
        let snapshot_path = self.snapshot_path(name);
        agent.save_snapshot(&snapshot_path)?;
        agent.save_model(&self.weights_path(name))?;

        info!("Saved checkpoint '{}' to {:?}", name, self.checkpoint_dir);
        self.cleanup_old_checkpoints();
        Ok(snapshot_path)
    }

    /// Restore agent snapshot and approximator weights from a name
    ///
    /// The agent is mutated only once both artifacts are readable; a missing
    /// or corrupt weights file leaves the live state exactly as it was.
    pub fn load(&self, agent: &mut DdqnAgent, name: &str) -> Result<()> {
        let snapshot_path = self.snapshot_path(name);
        if !snapshot_path.exists() {
            return Err(BotError::Checkpoint(format!(
                "checkpoint not found: {:?}",
                snapshot_path
            )));
        }

        let json = fs::read_to_string(&snapshot_path)?;
        let snapshot: AgentSnapshot = serde_json::from_str(&json)?;

        agent.load_model(&self.weights_path(name))?;
        agent.restore(snapshot);
        info!("Loaded checkpoint '{}'", name);
        Ok(())
    }

    /// List available checkpoint names, sorted
    pub fn list_checkpoints(&self) -> Vec<String> {
        let mut checkpoints = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(SNAPSHOT_SUFFIX) {
                        checkpoints.push(stem.to_string());
                    }
                }
            }
        }

        checkpoints.sort();
        checkpoints
    }

    /// Get latest checkpoint name
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints().into_iter().last()
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.snapshot_path(name).exists()
    }

    /// Remove oldest checkpoints beyond max_checkpoints
    fn cleanup_old_checkpoints(&self) {
        let checkpoints = self.list_checkpoints();

        if checkpoints.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = checkpoints.len() - self.max_checkpoints;
        for name in checkpoints.into_iter().take(to_remove) {
            for path in [self.snapshot_path(&name), self.weights_path(&name)] {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove old checkpoint {:?}: {}", path, e);
                }
            }
            info!("Removed old checkpoint: {}", name);
        }
    }
}

/// Generate a checkpoint name with timestamp
pub fn timestamped_name(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Generate a checkpoint name with episode number
pub fn episode_name(prefix: &str, episode: u64) -> String {
    format!("{}_ep{:06}", prefix, episode)
}
