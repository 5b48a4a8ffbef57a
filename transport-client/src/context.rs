//! Cooperative cancellation for in-flight dials and transfers.
//!
//! A [`DialContext`] carries an optional deadline and an optional
//! [`CancellationToken`]. Either can end a call early: `race` polls the
//! supplied future against both and turns a loss into the appropriate
//! [`TransportError`] variant.

use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carries the deadline and cancellation signal for a single dial or I/O
/// operation. Clone is cheap: the token is reference-counted and the
/// deadline is `Copy`.
#[derive(Clone, Debug, Default)]
pub struct DialContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl DialContext {
    /// A context with no deadline and no cancellation signal.
    pub fn none() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancel: None }
    }

    /// A context bound to an externally-held cancellation token, so a
    /// caller elsewhere can abort this operation.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { deadline: None, cancel: Some(cancel) }
    }

    /// Derives a child context sharing this context's cancellation token
    /// (if any) plus the given timeout, whichever deadline is sooner wins.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => Some(existing),
            _ => Some(candidate),
        };
        Self { deadline, cancel: self.cancel.clone() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Races `fut` against this context's deadline and cancellation signal.
    /// Returns `Ok(output)` if `fut` wins, otherwise a [`TransportError`]
    /// identifying which limit was hit first.
    pub async fn race<F, T>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = T>,
    {
        tokio::pin!(fut);

        match (&self.deadline, &self.cancel) {
            (None, None) => Ok(fut.await),
            (Some(deadline), None) => {
                tokio::select! {
                    out = &mut fut => Ok(out),
                    _ = tokio::time::sleep_until(*deadline) => Err(TransportError::TimedOut),
                }
            }
            (None, Some(cancel)) => {
                tokio::select! {
                    out = &mut fut => Ok(out),
                    _ = cancel.cancelled() => Err(TransportError::Cancelled),
                }
            }
            (Some(deadline), Some(cancel)) => {
                tokio::select! {
                    out = &mut fut => Ok(out),
                    _ = tokio::time::sleep_until(*deadline) => Err(TransportError::TimedOut),
                    _ = cancel.cancelled() => Err(TransportError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbounded_context_just_awaits() {
        let ctx = DialContext::none();
        let out = ctx.race(async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_context_expires() {
        let ctx = DialContext::with_timeout(Duration::from_millis(10));
        let err = ctx.race(std::future::pending::<()>()).await.unwrap_err();
        assert!(matches!(err, TransportError::TimedOut));
    }

    #[tokio::test]
    async fn cancellation_token_short_circuits() {
        let token = CancellationToken::new();
        let ctx = DialContext::with_cancellation(token.clone());
        token.cancel();
        let err = ctx.race(std::future::pending::<()>()).await.unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[test]
    fn child_with_timeout_keeps_sooner_deadline() {
        let ctx = DialContext::with_timeout(Duration::from_secs(1));
        let child = ctx.child_with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline, child.deadline);
    }
}
