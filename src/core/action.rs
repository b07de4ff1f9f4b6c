//! Action Space
//!
//! The discrete action space for the DDQN trading agent.

use serde::{Deserialize, Serialize};

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 3;

/// Discrete action space
///
/// Simple, interpretable actions that map directly to trading decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    /// Do nothing, maintain current state
    Hold = 0,
    /// Open or extend a long position
    Buy = 1,
    /// Liquidate the current position
    Sell = 2,
}

impl Action {
    /// Convert from action index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Hold),
            1 => Some(Self::Buy),
            2 => Some(Self::Sell),
            _ => None,
        }
    }

    /// Convert to action index
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Get all possible actions
    pub fn all() -> &'static [Action] {
        &[Self::Hold, Self::Buy, Self::Sell]
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Hold => "Hold current position",
            Self::Buy => "Buy shares",
            Self::Sell => "Sell/exit position",
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip() {
        for action in Action::all() {
            let index = action.to_index();
            let recovered = Action::from_index(index).unwrap();
            assert_eq!(*action, recovered);
        }
    }

    #[test]
    fn test_out_of_range_index() {
        assert!(Action::from_index(NUM_ACTIONS).is_none());
    }
}
