//! Experience replay memory.

pub mod replay_buffer;

pub use replay_buffer::{ReplayBuffer, Transition, TransitionBatch};
