use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy. Every variant
/// carries the number of attempts made.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal { error: E, attempts: usize },
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded { error: E, attempts: usize },
    /// The next backoff would run past the deadline.
    OutOfTime { error: E, attempts: usize },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> usize {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::AttemptsExceeded { attempts, .. }
            | RetryError::OutOfTime { attempts, .. } => *attempts,
        }
    }

    pub fn error(&self) -> &E {
        match self {
            RetryError::Fatal { error, .. }
            | RetryError::AttemptsExceeded { error, .. }
            | RetryError::OutOfTime { error, .. } => error,
        }
    }

    pub fn into_error(self) -> E {
        match self {
            RetryError::Fatal { error, .. }
            | RetryError::AttemptsExceeded { error, .. }
            | RetryError::OutOfTime { error, .. } => error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Preset for best-effort webhook delivery: 3 attempts doubling from 200 ms.
    pub fn for_notifications() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(800),
        }
    }

    /// Executes the operation with the configured retry policy.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        self.run_until(None, op, classify).await
    }

    /// Like [`run`](Self::run) but never sleeps past `deadline`.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run_until<F, Fut, T, E, Classifier>(
        &self,
        deadline: Option<Instant>,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op(attempt + 1).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let attempts = attempt + 1;
                    match classify(&error) {
                        RetryDisposition::Stop => {
                            return Err(RetryError::Fatal { error, attempts });
                        }
                        RetryDisposition::Retry => {
                            if attempts >= self.max_attempts {
                                return Err(RetryError::AttemptsExceeded { error, attempts });
                            }

                            let delay = self.backoff_delay(attempt);
                            if let Some(deadline) = deadline
                                && Instant::now() + delay > deadline
                            {
                                return Err(RetryError::OutOfTime { error, attempts });
                            }

                            sleep(delay).await;
                            attempt += 1;
                        }
                    }
                }
            }
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn backoff_is_capped_exponential() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn max_attempts_counts_the_first_try() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(4, Duration::ZERO, Duration::ZERO);

        let result: Result<(), _> = policy
            .run(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("transient")
                    }
                },
                |_| RetryDisposition::Retry,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            result,
            Err(RetryError::AttemptsExceeded { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn stop_disposition_returns_after_one_attempt() {
        let policy = RetryPolicy::default();
        let result: Result<(), _> = policy
            .run(|_| async { Err::<(), _>("bad file") }, |_| RetryDisposition::Stop)
            .await;
        assert!(matches!(result, Err(RetryError::Fatal { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn deadline_stops_before_sleeping() {
        let policy = RetryPolicy::new(5, Duration::from_secs(30), Duration::from_secs(30));
        let deadline = Instant::now() + Duration::from_secs(1);
        let result: Result<(), _> = policy
            .run_until(
                Some(deadline),
                |_| async { Err::<(), _>("slow") },
                |_| RetryDisposition::Retry,
            )
            .await;
        assert!(matches!(result, Err(RetryError::OutOfTime { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
        let value = policy
            .run(
                |attempt| async move {
                    if attempt < 3 { Err("flaky") } else { Ok(attempt) }
                },
                |_| RetryDisposition::Retry,
            )
            .await
            .unwrap();
        assert_eq!(value, 3);
    }
}
