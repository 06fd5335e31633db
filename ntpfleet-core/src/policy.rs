//! Result-handling policies for creation and teardown
//!
//! Creation is fail-fast: the first failing step aborts the rest via plain
//! `?` propagation and nothing is unwound. Teardown is the opposite: every
//! sub-step swallows its own failure so a single missing resource never
//! blocks reclamation of the rest. [`BestEffort`] makes the second policy
//! explicit instead of scattering `let _ =` over the teardown paths.

use crate::Result;

/// Collect-and-continue error policy for teardown sequences
///
/// Each failed step is logged and counted; the sequence always runs to the
/// end. Callers inspect [`BestEffort::failures`] afterwards if they care.
#[derive(Debug, Default)]
pub struct BestEffort {
    failures: usize,
}

impl BestEffort {
    /// Create a fresh policy with no recorded failures
    #[must_use]
    pub const fn new() -> Self {
        Self { failures: 0 }
    }

    /// Record the outcome of one teardown step
    ///
    /// Returns `Some(value)` on success, logs and returns `None` on failure.
    pub fn run<T>(&mut self, step: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(step, error = %e, "Teardown step failed, continuing");
                self.failures += 1;
                None
            }
        }
    }

    /// Number of steps that failed so far
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failures
    }

    /// Whether every step so far succeeded
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_best_effort_clean() {
        let mut policy = BestEffort::new();

        assert_eq!(policy.run("step-a", Ok(1)), Some(1));
        assert_eq!(policy.run("step-b", Ok("two")), Some("two"));
        assert!(policy.is_clean());
        assert_eq!(policy.failures(), 0);
    }

    #[test]
    fn test_best_effort_continues_past_failures() {
        let mut policy = BestEffort::new();

        let first: Option<()> = policy.run(
            "step-a",
            Err(Error::Network {
                message: "link vanished".to_string(),
            }),
        );
        assert!(first.is_none());

        // Later steps still execute and succeed
        assert_eq!(policy.run("step-b", Ok(2)), Some(2));
        let third: Option<()> = policy.run(
            "step-c",
            Err(Error::Network {
                message: "namespace gone".to_string(),
            }),
        );
        assert!(third.is_none());

        assert!(!policy.is_clean());
        assert_eq!(policy.failures(), 2);
    }
}
