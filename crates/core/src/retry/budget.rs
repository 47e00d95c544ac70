//! Bounded attempt counter.

use serde::{Deserialize, Serialize};

/// Attempts used against a fixed maximum.
///
/// Only the retry policy consumes attempts; a new budget is created for every
/// round that owns one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    attempts_used: u32,
    max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_used: 0,
            max_attempts,
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts - self.attempts_used
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }

    /// Records one failed attempt. Saturates at the maximum.
    pub(super) fn consume(&mut self) {
        if self.attempts_used < self.max_attempts {
            self.attempts_used += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_saturates() {
        let mut budget = RetryBudget::new(2);
        assert_eq!(budget.remaining(), 2);
        assert!(!budget.is_exhausted());

        budget.consume();
        assert_eq!(budget.attempts_used(), 1);
        budget.consume();
        assert!(budget.is_exhausted());
        budget.consume();
        assert_eq!(budget.attempts_used(), 2);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        assert!(RetryBudget::new(0).is_exhausted());
    }
}
