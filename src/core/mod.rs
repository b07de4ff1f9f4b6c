//! Core types shared across the environment, memory, and agent.

pub mod action;

pub use action::{Action, NUM_ACTIONS};
