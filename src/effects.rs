// Post-commit side effects
//
// A primary write commits first; the effects queued here run afterwards,
// independently of each other. A failing effect is logged and reported but
// never turns the primary operation into a failure.

use futures::future::{join_all, BoxFuture, FutureExt};
use std::future::Future;

use crate::error::DomainResult;

/// Named side effects queued behind a committed operation
pub struct PostCommit<'a> {
    operation: &'static str,
    effects: Vec<(&'static str, BoxFuture<'a, DomainResult<()>>)>,
}

/// Outcome of running a `PostCommit` batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EffectsReport {
    pub attempted: usize,
    pub failed: Vec<&'static str>,
}

impl EffectsReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<'a> PostCommit<'a> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            effects: Vec::new(),
        }
    }

    /// Queue an effect under a name used in logs and in the report
    pub fn then<F>(mut self, name: &'static str, effect: F) -> Self
    where
        F: Future<Output = DomainResult<()>> + Send + 'a,
    {
        self.effects.push((name, effect.boxed()));
        self
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Run every queued effect concurrently and collect the failures
    pub async fn run(self) -> EffectsReport {
        let operation = self.operation;
        let (names, futures): (Vec<_>, Vec<_>) = self.effects.into_iter().unzip();
        let results = join_all(futures).await;

        let mut report = EffectsReport {
            attempted: names.len(),
            failed: Vec::new(),
        };
        for (name, result) in names.into_iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(operation, effect = name, error = %e, "post-commit effect failed");
                report.failed.push(name);
            }
        }
        report
    }
}
