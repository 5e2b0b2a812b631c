//! Timeout enforcement.
//!
//! Every attempt runs under its own deadline; the whole request, body
//! included, has to finish before it or the attempt counts as timed out.

use std::future::Future;
use std::time::Duration;

use crate::resilience::retries::FetchError;

/// Run `fut` under `deadline`, turning expiry into [`FetchError::Timeout`].
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline() {
        let result: Result<(), FetchError> = with_timeout(Duration::from_secs(8), async {
            tokio::time::sleep(Duration::from_secs(9)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(FetchError::Timeout(8_000)));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, FetchError>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<(), _> =
            with_timeout(Duration::from_secs(1), async { Err(FetchError::Server(502)) }).await;
        assert_eq!(err, Err(FetchError::Server(502)));
    }
}
