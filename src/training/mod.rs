//! Training driver, checkpointing, and status reporting.

pub mod checkpointing;
pub mod status;
pub mod trainer;

pub use checkpointing::{episode_name, timestamped_name, Checkpointer};
pub use status::{EpisodeResult, JsonStatusSink, LogStatusSink, StatusSink};
pub use trainer::{evaluate, summarize_results, Trainer, TrainingSummary};
