use std::fmt;
use std::future::pending;

use reqwest::{header, StatusCode};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::{
    wire::BatchEnvelope, BatchRequest, BatchResponse, BoxFuture, CallError, ConnectionOptions,
    RpcHandle,
};

/// Formats a replica address into the base URL of its HTTP endpoint.
///
/// Example: `"10.0.0.1:26257"` → `"http://10.0.0.1:26257"`
pub fn address_to_base_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    }
}

/// Health of an [`HttpConnection`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    /// No health check has succeeded yet.
    Connecting,
    Ready,
    /// The last health check failed.
    Unhealthy,
    /// Closed by its owner; terminal.
    Closed,
}

/// HTTP client handle for one replica address.
pub struct HttpConnection {
    http: reqwest::Client,
    address: String,
    base_url: String,
    options: ConnectionOptions,
    state: watch::Sender<ConnectionState>,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish()
    }
}

impl HttpConnection {
    pub fn new(
        http: reqwest::Client,
        address: impl Into<String>,
        options: ConnectionOptions,
    ) -> Self {
        let address = address.into();
        Self {
            http,
            base_url: address_to_base_url(&address),
            address,
            options,
            state: watch::channel(ConnectionState::Connecting).0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Closes the connection. Calls pending on it resolve as closed.
    pub fn close(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("closing connection to {}", self.address);
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Checks `GET /health` once and records the result.
    pub async fn check_health(&self) -> bool {
        let healthy = match self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(self.options.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        };
        let next = if healthy {
            ConnectionState::Ready
        } else {
            ConnectionState::Unhealthy
        };
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed || *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            #[cfg(feature = "tracing")]
            tracing::debug!("connection to {} is now {:?}", self.address, next);
        }
        healthy && !self.is_closed()
    }

    async fn post_batch(
        &self,
        request: BatchRequest,
    ) -> std::result::Result<BatchResponse, CallError> {
        let response = self
            .http
            .post(format!("{}/batch", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.options.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| CallError::Transport(err.to_string()))?;

        if !status.is_success() && should_retry_status(status) {
            return Err(CallError::Transport(format!("http error {status}: {body}")));
        }

        let envelope = serde_json::from_str::<BatchEnvelope>(&body);
        if !status.is_success() {
            return Err(match envelope {
                Ok(BatchEnvelope {
                    error: Some(error), ..
                }) => CallError::Application {
                    message: error.message,
                    retryable: error.retryable,
                },
                _ => CallError::Application {
                    message: format!("http error {status}: {body}"),
                    retryable: None,
                },
            });
        }

        let envelope = envelope.map_err(|err| CallError::Application {
            message: format!("invalid batch response JSON: {err}; body: {body}"),
            retryable: None,
        })?;
        match envelope {
            BatchEnvelope {
                error: Some(error), ..
            } => Err(CallError::Application {
                message: error.message,
                retryable: error.retryable,
            }),
            BatchEnvelope {
                response: Some(response),
                ..
            } => Ok(BatchResponse(response)),
            BatchEnvelope { .. } => Err(CallError::Application {
                message: "batch response carries neither response nor error".to_owned(),
                retryable: None,
            }),
        }
    }
}

impl RpcHandle for HttpConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn ready(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            loop {
                match self.state() {
                    ConnectionState::Ready => return,
                    ConnectionState::Closed => break,
                    ConnectionState::Connecting | ConnectionState::Unhealthy => {}
                }
                if self.check_health().await {
                    return;
                }
                sleep(self.options.health_retry_interval).await;
            }
            pending::<()>().await
        })
    }

    fn closed(&self) -> BoxFuture<'_, ()> {
        let mut state = self.state.subscribe();
        Box::pin(async move {
            let _ = state
                .wait_for(|state| *state == ConnectionState::Closed)
                .await;
        })
    }

    fn execute_batch(
        &self,
        request: BatchRequest,
    ) -> BoxFuture<'_, std::result::Result<BatchResponse, CallError>> {
        Box::pin(self.post_batch(request))
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{address_to_base_url, should_retry_status, ConnectionState, HttpConnection};
    use crate::ConnectionOptions;

    #[test]
    fn base_url_adds_scheme_when_missing() {
        assert_eq!(address_to_base_url("10.0.0.1:26257"), "http://10.0.0.1:26257");
        assert_eq!(
            address_to_base_url("https://replica.local/"),
            "https://replica.local"
        );
    }

    #[test]
    fn overload_and_gateway_statuses_are_transport_failures() {
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let conn = HttpConnection::new(
            reqwest::Client::new(),
            "127.0.0.1:1",
            ConnectionOptions::default(),
        );
        assert_eq!(conn.state(), ConnectionState::Connecting);
        conn.close();
        assert!(conn.is_closed());
        assert!(!conn.check_health().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
