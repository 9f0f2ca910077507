use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::{AttemptBudget, BatchRequest, BatchResponse, BoxFuture, RpcHandle, SendError};

/// Terminal result of one attempt.
pub type Outcome = std::result::Result<BatchResponse, SendError>;

/// Performs exactly one remote call against one replica.
///
/// The dispatcher spawns the returned future and reports whatever it resolves
/// to, so an implementation cannot report twice. Swapping the strategy is how
/// tests simulate replica behavior.
pub trait SendOne: Send + Sync {
    fn send_one(
        &self,
        handle: Arc<dyn RpcHandle>,
        request: BatchRequest,
        budget: AttemptBudget,
    ) -> BoxFuture<'static, Outcome>;
}

async fn expire(limit: Option<Duration>) {
    match limit {
        Some(limit) => sleep(limit).await,
        None => pending::<()>().await,
    }
}

/// Default strategy: wait for the handle to become ready, then call it.
///
/// Waiting longer than [`AttemptBudget::ready`] yields a `NotReady` failure.
/// A call still running when [`AttemptBudget::total`] runs out yields a
/// `Transport` failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct RpcSendOne;

impl SendOne for RpcSendOne {
    fn send_one(
        &self,
        handle: Arc<dyn RpcHandle>,
        request: BatchRequest,
        budget: AttemptBudget,
    ) -> BoxFuture<'static, Outcome> {
        Box::pin(async move {
            let address = handle.address().to_owned();
            let total = expire(budget.total);
            tokio::pin!(total);
            let ready = expire(budget.ready);
            tokio::pin!(ready);

            tokio::select! {
                biased;
                _ = handle.closed() => return Err(SendError::connection_closed(&address)),
                _ = handle.ready() => {}
                _ = &mut ready => return Err(SendError::not_ready(&address)),
                _ = &mut total => return Err(SendError::not_ready(&address)),
            }

            tokio::select! {
                biased;
                _ = handle.closed() => Err(SendError::connection_closed(&address)),
                result = handle.execute_batch(request) => {
                    result.map_err(|err| SendError::from_call(&address, err))
                }
                _ = &mut total => Err(SendError::transport(&address, "call timed out")),
            }
        })
    }
}

/// [`SendOne`] strategy backed by a closure; see [`send_one_fn`].
pub struct SendOneFn<F>(F);

/// Adapts a closure into a [`SendOne`] strategy.
pub fn send_one_fn<F, Fut>(f: F) -> SendOneFn<F>
where
    F: Fn(Arc<dyn RpcHandle>, BatchRequest, AttemptBudget) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    SendOneFn(f)
}

impl<F, Fut> SendOne for SendOneFn<F>
where
    F: Fn(Arc<dyn RpcHandle>, BatchRequest, AttemptBudget) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn send_one(
        &self,
        handle: Arc<dyn RpcHandle>,
        request: BatchRequest,
        budget: AttemptBudget,
    ) -> BoxFuture<'static, Outcome> {
        Box::pin((self.0)(handle, request, budget))
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::watch;

    use super::{RpcSendOne, SendOne};
    use crate::{
        AttemptBudget, BatchRequest, BatchResponse, BoxFuture, CallError, Retryable, RpcHandle,
        SendErrorKind,
    };

    fn budget(ready_ms: Option<u64>, total_ms: Option<u64>) -> AttemptBudget {
        AttemptBudget {
            ready: ready_ms.map(Duration::from_millis),
            total: total_ms.map(Duration::from_millis),
        }
    }

    struct FakeHandle {
        ready: bool,
        reply: Option<std::result::Result<BatchResponse, CallError>>,
        closed: watch::Sender<bool>,
    }

    impl FakeHandle {
        fn new(ready: bool, reply: Option<std::result::Result<BatchResponse, CallError>>) -> Self {
            Self {
                ready,
                reply,
                closed: watch::channel(false).0,
            }
        }
    }

    impl RpcHandle for FakeHandle {
        fn address(&self) -> &str {
            "fake:1"
        }

        fn ready(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                if !self.ready {
                    pending::<()>().await;
                }
            })
        }

        fn closed(&self) -> BoxFuture<'_, ()> {
            let mut rx = self.closed.subscribe();
            Box::pin(async move {
                let _ = rx.wait_for(|closed| *closed).await;
            })
        }

        fn execute_batch(
            &self,
            _request: BatchRequest,
        ) -> BoxFuture<'_, std::result::Result<BatchResponse, CallError>> {
            let reply = self.reply.clone();
            Box::pin(async move {
                match reply {
                    Some(reply) => reply,
                    None => pending().await,
                }
            })
        }
    }

    #[tokio::test]
    async fn returns_reply_from_ready_handle() {
        let handle = Arc::new(FakeHandle::new(
            true,
            Some(Ok(BatchResponse(json!({"ok": 1})))),
        ));
        let outcome = RpcSendOne
            .send_one(handle, BatchRequest::default(), budget(Some(1000), Some(1000)))
            .await;
        assert_eq!(outcome, Ok(BatchResponse(json!({"ok": 1}))));
    }

    #[tokio::test]
    async fn handle_that_never_becomes_ready_is_retryable() {
        let handle = Arc::new(FakeHandle::new(false, None));
        let err = RpcSendOne
            .send_one(handle, BatchRequest::default(), budget(Some(10), None))
            .await
            .expect_err("must not become ready");
        assert_eq!(err.kind(), SendErrorKind::NotReady);
        assert!(err.can_retry());
    }

    #[tokio::test]
    async fn application_error_defaults_to_non_retryable() {
        let handle = Arc::new(FakeHandle::new(
            true,
            Some(Err(CallError::Application {
                message: "boom".to_owned(),
                retryable: None,
            })),
        ));
        let err = RpcSendOne
            .send_one(handle, BatchRequest::default(), AttemptBudget::default())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind(), SendErrorKind::Application);
        assert!(!err.can_retry());
    }

    #[tokio::test]
    async fn closing_pending_call_yields_connection_closed() {
        let handle = Arc::new(FakeHandle::new(true, None));
        let task = tokio::spawn(RpcSendOne.send_one(
            handle.clone(),
            BatchRequest::default(),
            AttemptBudget::default(),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.closed.send_replace(true);

        let err = task
            .await
            .expect("attempt task must not panic")
            .expect_err("closed call must fail");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn readiness_limit_fires_before_total_budget() {
        let handle = Arc::new(FakeHandle::new(false, None));
        let started = tokio::time::Instant::now();
        let err = RpcSendOne
            .send_one(handle, BatchRequest::default(), budget(Some(10), Some(5_000)))
            .await
            .expect_err("must not become ready");
        assert_eq!(err.kind(), SendErrorKind::NotReady);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn call_outliving_total_budget_is_a_transport_failure() {
        let handle = Arc::new(FakeHandle::new(true, None));
        let err = RpcSendOne
            .send_one(handle, BatchRequest::default(), budget(Some(10), Some(30)))
            .await
            .expect_err("call never answers");
        assert_eq!(err.kind(), SendErrorKind::Transport);
        assert!(err.can_retry());
    }
}
