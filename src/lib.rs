//! `kvdispatch` is the client-side dispatch layer of a distributed key-value
//! store.
//!
//! Given a request and the replicas that may serve it, [`Dispatcher::send`]
//! contacts replicas with staggered fan-out, returns the first successful
//! response, and otherwise classifies the overall failure as retryable or
//! fatal:
//! - [`Dispatcher`] / [`send`]: the fan-out dispatcher
//! - [`SendOne`]: per-candidate call strategy, swappable for tests
//! - [`ConnectionPool`]: cached HTTP connections per replica address

mod connection;
mod dispatch;
mod error;
mod options;
mod ordering;
mod pool;
mod send_one;
mod transport;
mod types;
mod wire;

pub use connection::{address_to_base_url, ConnectionState, HttpConnection};
pub use dispatch::{send, Dispatcher};
pub use error::{AggregateFailure, CallError, DispatchError, Retryable, SendError, SendErrorKind};
pub use options::{AttemptBudget, ConnectionOptions, OrderingPolicy, SendOptions};
pub use ordering::order_candidates;
pub use pool::ConnectionPool;
pub use send_one::{send_one_fn, Outcome, RpcSendOne, SendOne, SendOneFn};
pub use transport::{BoxFuture, ConnectionAccess, RpcHandle};
pub use types::{BatchRequest, BatchResponse, NodeId, Replica};

pub type Result<T> = std::result::Result<T, DispatchError>;
