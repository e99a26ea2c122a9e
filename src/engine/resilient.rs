/// Guarded calls to optional collaborators
///
/// The vector index, embedding provider, and text generator are all allowed
/// to fail or stall without failing a request. Every call to one of them goes
/// through `guard`, which applies a time budget and substitutes a fallback
/// value on timeout or error, logging a warning either way. Only the catalog
/// store bypasses this layer; its failures surface to the caller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Outcome of a guarded call: the primary result, or the fallback after a
/// failure or timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Primary(T),
    Degraded(T),
}

impl<T> Attempt<T> {
    pub fn into_inner(self) -> T {
        match self {
            Attempt::Primary(v) | Attempt::Degraded(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Attempt::Degraded(_))
    }
}

/// Run `op` under a time budget; on error or timeout return `fallback`.
pub async fn guard<T, E, F>(budget: Duration, label: &str, op: F, fallback: T) -> Attempt<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(budget, op).await {
        Ok(Ok(value)) => Attempt::Primary(value),
        Ok(Err(e)) => {
            warn!(operation = label, error = %e, "collaborator call failed, degrading");
            Attempt::Degraded(fallback)
        }
        Err(_) => {
            warn!(
                operation = label,
                budget_ms = budget.as_millis() as u64,
                "collaborator call timed out, degrading"
            );
            Attempt::Degraded(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<i32, String> {
        Ok(7)
    }

    async fn fails() -> Result<i32, String> {
        Err("boom".to_string())
    }

    async fn stalls() -> Result<i32, String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(7)
    }

    #[tokio::test]
    async fn test_guard_passes_through_success() {
        let result = guard(Duration::from_secs(1), "test", ok(), 0).await;
        assert_eq!(result, Attempt::Primary(7));
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_guard_degrades_on_error() {
        let result = guard(Duration::from_secs(1), "test", fails(), 0).await;
        assert_eq!(result, Attempt::Degraded(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_degrades_on_timeout() {
        let result = guard(Duration::from_millis(50), "test", stalls(), 0).await;
        assert_eq!(result, Attempt::Degraded(0));
    }
}
