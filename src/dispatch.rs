use std::fmt;
use std::future::pending;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};

use crate::{
    ordering::order_candidates,
    send_one::{Outcome, RpcSendOne, SendOne},
    AggregateFailure, AttemptBudget, BatchRequest, BatchResponse, BoxFuture, ConnectionAccess,
    DispatchError, Replica, Result, SendError, SendOptions,
};

/// Sends one request to a set of replicas and returns the first success.
///
/// Candidates are launched one at a time; whenever the outstanding attempts
/// stay silent for [`SendOptions::send_next_timeout`], or one of them fails,
/// the next candidate is launched as well. Earlier attempts keep running, and
/// a success from any of them wins.
#[derive(Clone)]
pub struct Dispatcher {
    access: Arc<dyn ConnectionAccess>,
    send_one: Arc<dyn SendOne>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher that calls replicas through [`RpcSendOne`].
    pub fn new(access: Arc<dyn ConnectionAccess>) -> Self {
        Self {
            access,
            send_one: Arc::new(RpcSendOne),
        }
    }

    /// Replaces the per-candidate send strategy.
    pub fn with_send_one(mut self, send_one: impl SendOne + 'static) -> Self {
        self.send_one = Arc::new(send_one);
        self
    }

    /// Sends `request` to `replicas` according to `options`.
    ///
    /// Attempts still outstanding when this returns are aborted.
    pub async fn send(
        &self,
        options: &SendOptions,
        replicas: Vec<Replica>,
        request: BatchRequest,
    ) -> Result<BatchResponse> {
        let candidates = order_candidates(replicas, options.ordering);
        if candidates.is_empty() {
            return Err(DispatchError::NoCandidates);
        }

        let budget = options.attempt_budget();
        let mut attempts: JoinSet<Outcome> = JoinSet::new();
        let mut failures: Vec<SendError> = Vec::new();

        self.launch(&candidates[0], &request, budget, &mut attempts);
        let mut next = 1;

        let send_next = sleep(options.send_next_timeout);
        tokio::pin!(send_next);
        let deadline = async {
            match budget.total {
                Some(timeout) => sleep(timeout).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                Some(joined) = attempts.join_next(), if !attempts.is_empty() => {
                    let outcome = joined.unwrap_or_else(|err| {
                        Err(SendError::application(
                            format!("attempt task failed: {err}"),
                            Some(false),
                        ))
                    });
                    let err = match outcome {
                        Ok(response) => return Ok(response),
                        Err(err) => err,
                    };

                    if err.is_fatal() {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("send aborted: {}", err);
                        return Err(DispatchError::ConnectionClosed(err));
                    }

                    failures.push(err);
                    if next < candidates.len() {
                        self.launch(&candidates[next], &request, budget, &mut attempts);
                        next += 1;
                        send_next
                            .as_mut()
                            .reset(Instant::now() + options.send_next_timeout);
                    } else if attempts.is_empty() {
                        return Err(DispatchError::Exhausted(AggregateFailure::new(failures)));
                    }
                }
                _ = &mut deadline => {
                    let outstanding = attempts.len();
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "send deadline of {:?} elapsed with {} attempt(s) outstanding",
                        options.timeout,
                        outstanding
                    );
                    failures.push(SendError::deadline_exceeded(outstanding, options.timeout));
                    return Err(DispatchError::DeadlineExceeded {
                        timeout: options.timeout,
                        failures: AggregateFailure::new(failures),
                    });
                }
                _ = &mut send_next, if next < candidates.len() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "no reply within {:?}, escalating to {}",
                        options.send_next_timeout,
                        candidates[next]
                    );
                    self.launch(&candidates[next], &request, budget, &mut attempts);
                    next += 1;
                    send_next
                        .as_mut()
                        .reset(Instant::now() + options.send_next_timeout);
                }
            }
        }
    }

    fn launch(
        &self,
        replica: &Replica,
        request: &BatchRequest,
        budget: AttemptBudget,
        attempts: &mut JoinSet<Outcome>,
    ) {
        #[cfg(feature = "tracing")]
        tracing::debug!("launching attempt against {}", replica);

        let call: BoxFuture<'static, Outcome> = match self.access.connect(replica) {
            Ok(handle) => self.send_one.send_one(handle, request.clone(), budget),
            Err(err) => Box::pin(async move { Err(err) }),
        };

        #[cfg(feature = "tracing")]
        let replica = replica.clone();
        attempts.spawn(async move {
            let outcome = call.await;
            #[cfg(feature = "tracing")]
            match &outcome {
                Ok(_) => tracing::debug!("{} answered successfully", replica),
                Err(err) => tracing::debug!("{} failed: {}", replica, err),
            }
            outcome
        });
    }
}

/// Sends `request` to `replicas` through `access` with the default strategy.
pub async fn send(
    options: &SendOptions,
    replicas: Vec<Replica>,
    request: BatchRequest,
    access: Arc<dyn ConnectionAccess>,
) -> Result<BatchResponse> {
    Dispatcher::new(access).send(options, replicas, request).await
}
