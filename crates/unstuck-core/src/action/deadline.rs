//! Overall command deadline.

use std::time::{Duration, Instant};

/// Point in time after which no new cluster work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Option<Instant>,
    budget: Option<Duration>,
}

impl Default for Deadline {
    fn default() -> Self {
        Deadline::none()
    }
}

impl Deadline {
    /// Never expires.
    pub fn none() -> Self {
        Deadline {
            expires_at: None,
            budget: None,
        }
    }

    pub fn after(budget: Duration) -> Self {
        Deadline {
            expires_at: Some(Instant::now() + budget),
            budget: Some(budget),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Deadline::after(Duration::from_secs(secs))
    }

    /// Time left, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Clamp `timeout` to the time left.
    pub fn bound(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => timeout.min(left),
            None => timeout,
        }
    }

    /// Whole budget in seconds, 0 when unbounded.
    pub fn budget_secs(&self) -> u64 {
        self.budget.map(|b| b.as_secs()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_expires() {
        let d = Deadline::none();
        assert!(!d.is_expired());
        assert_eq!(d.remaining(), None);
        assert_eq!(d.bound(Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn zero_budget_is_expired() {
        let d = Deadline::after(Duration::ZERO);
        assert!(d.is_expired());
        assert_eq!(d.bound(Duration::from_secs(30)), Duration::ZERO);
    }

    #[test]
    fn bound_clamps_to_remaining() {
        let d = Deadline::from_secs(5);
        assert!(!d.is_expired());
        assert!(d.bound(Duration::from_secs(30)) <= Duration::from_secs(5));
        assert_eq!(d.bound(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(d.budget_secs(), 5);
    }
}
