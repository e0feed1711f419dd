//! Retry with exponential backoff, shared by every upstream call

use crate::config::RetryConfig;
use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::warn;

/// Errors that know whether another attempt may succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

/// Why a retried operation gave up
#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The last attempt failed with a permanent error or no attempts were left
    #[error("failed after {attempts} attempt(s): {source}")]
    Failed { attempts: u32, source: E },

    /// The total deadline passed before an attempt succeeded
    #[error("gave up after {attempts} attempt(s), deadline of {deadline:?} exceeded")]
    DeadlineExceeded { attempts: u32, deadline: Duration },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// Error of the last attempt, if it finished
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Failed { source, .. } => Some(source),
            RetryError::DeadlineExceeded { .. } => None,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts or exceeds the total deadline.
///
/// The operation receives the 1-based attempt number.
pub async fn run_with_retry<F, Fut, T, E>(
    retry_config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::error::Error + 'static,
{
    let total = retry_config.total_deadline();
    let deadline = Instant::now() + total;
    let max_attempts = retry_config.max_attempts.max(1);
    let mut delay = retry_config.initial_delay();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match timeout_at(deadline, operation(attempt)).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(error)) => error,
            Err(_) => return Err(RetryError::DeadlineExceeded { attempts: attempt, deadline: total }),
        };

        if !error.is_transient() || attempt >= max_attempts {
            return Err(RetryError::Failed { attempts: attempt, source: error });
        }

        if Instant::now() + delay >= deadline {
            warn!("Attempt {} failed: {}, no time left for another attempt", attempt, error);
            return Err(RetryError::DeadlineExceeded { attempts: attempt, deadline: total });
        }

        warn!("Attempt {} failed: {}, retrying in {:?}", attempt, error, delay);
        sleep(delay).await;

        delay = retry_config.next_delay(delay);
    }
}
