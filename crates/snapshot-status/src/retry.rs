// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times an operation is attempted, and how long to wait between attempts.
///
/// The attempt count includes the first try, and is never lower than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry straight away.
    Immediate(u32),
    /// Wait the same delay after every failed attempt.
    Fixed(u32, Duration),
    /// Wait `delay * attempt` after each failed attempt.
    LinearBackoff(u32, Duration),
}

impl RetryStrategy {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        let attempts = match self {
            RetryStrategy::Immediate(n)
            | RetryStrategy::Fixed(n, _)
            | RetryStrategy::LinearBackoff(n, _) => *n,
        };
        attempts.max(1)
    }

    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::Fixed(_, delay) => *delay,
            RetryStrategy::LinearBackoff(_, delay) => delay.saturating_mul(attempt),
        }
    }
}

/// Result of a successful [`retry`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Every attempt failed. Holds the error from the last one.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempts")]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last
    }
}

/// Runs `op` until it succeeds or the strategy's attempts run out.
///
/// `op` receives the 1-based attempt number. Sleeps go through `tokio::time`, so tests can
/// drive them with a paused clock.
pub async fn retry<T, E, F, Fut>(
    strategy: &RetryStrategy,
    mut op: F,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = strategy.max_attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(last) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last,
                })
            }
            Err(_) => {}
        }
        let delay = strategy.delay_after(attempt);
        debug!("Attempt {attempt}/{max_attempts} failed, retrying in {delay:?}");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}
