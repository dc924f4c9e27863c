use std::{future::Future, pin::Pin, time::Duration};

use tokio::time::sleep;

pub type RetryFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Runs `operation` until it succeeds or `max_retries` retries have failed,
/// doubling the delay after every failure.
pub async fn retry_with_backoff<F, T, E>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> RetryFuture<T, E>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!("Attempt {attempt} failed: {e}. Retrying in {delay:?}...");
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<usize, String> = retry_with_backoff(
            move || -> RetryFuture<usize, String> {
                let counter = counter.clone();
                Box::pin(async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("busy {n}"))
                    } else {
                        Ok(n)
                    }
                })
            },
            5,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = retry_with_backoff(
            move || -> RetryFuture<(), String> {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err("locked".to_string()) })
            },
            2,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result, Err("locked".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
