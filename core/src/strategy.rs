//! Outcome of a single fallback strategy attempt.
//!
//! Shared by the backend resolver, the generation dispatcher and the audio
//! decoder chain. `NotApplicable` means the capability a strategy needs is
//! absent; `Failed` means the capability was there but using it raised.

use crate::CompatError;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum StrategyResult<T> {
    Success(T),
    NotApplicable,
    Failed(CompatError),
}

impl<T> StrategyResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, StrategyResult::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StrategyResult<U> {
        match self {
            StrategyResult::Success(v) => StrategyResult::Success(f(v)),
            StrategyResult::NotApplicable => StrategyResult::NotApplicable,
            StrategyResult::Failed(e) => StrategyResult::Failed(e),
        }
    }
}

impl<T> From<crate::Result<T>> for StrategyResult<T> {
    fn from(res: crate::Result<T>) -> Self {
        match res {
            Ok(v) => StrategyResult::Success(v),
            Err(e) => StrategyResult::Failed(e),
        }
    }
}

/// Log a strategy outcome with the level its variant deserves.
pub fn log_outcome<T>(chain: &str, strategy: &str, outcome: &StrategyResult<T>) {
    match outcome {
        StrategyResult::Success(_) => {
            info!(target: "strategy", chain, strategy, "Strategy succeeded")
        }
        StrategyResult::NotApplicable => {
            debug!(target: "strategy", chain, strategy, "Strategy not applicable, trying next")
        }
        StrategyResult::Failed(e) => {
            warn!(target: "strategy", chain, strategy, cause = %e, "Strategy failed, trying next")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_conversion_keeps_cause() {
        let res: crate::Result<u8> = Err(CompatError::Runtime("boom".into()));
        match StrategyResult::from(res) {
            StrategyResult::Failed(e) => assert!(e.to_string().contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(StrategyResult::from(Ok::<u8, CompatError>(3)).is_success());
    }
}
