//! DDQN agent and the function-approximator boundary.

pub mod approximator;
pub mod ddqn;

pub use approximator::{LinearQNet, QFunction};
pub use ddqn::{AgentSnapshot, DdqnAgent};
