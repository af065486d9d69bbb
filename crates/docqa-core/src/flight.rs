//! In-flight request scoping.
//!
//! Each workflow owns a scope token derived from the session's root token. Requests run
//! under a child of that scope; once the scope is cancelled their results are dropped
//! instead of being applied to state nobody is looking at anymore.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Run `request` unless `scope` is cancelled first.
pub(crate) async fn guarded<T, F>(scope: &CancellationToken, request: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    let token = scope.child_token();
    tokio::select! {
        biased;

        _ = token.cancelled() => {
            debug!("Discarding result of abandoned request");
            Err(ClientError::Cancelled)
        }

        result = request => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_completes_when_not_cancelled() {
        let scope = CancellationToken::new();
        let result = guarded(&scope, async { Ok::<_, ClientError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_already_cancelled_scope() {
        let scope = CancellationToken::new();
        scope.cancel();
        let result = guarded(&scope, async { Ok::<_, ClientError>(5) }).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn test_late_result_is_discarded() {
        let scope = CancellationToken::new();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ClientError>(1)
        };
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            scope.cancel();
        };
        let (result, _) = tokio::join!(guarded(&scope, slow), cancel);
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }
}
