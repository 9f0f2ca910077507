//! Boundary to the connection layer.
//!
//! Connections are owned and cached outside the dispatcher; it only reads
//! their health signal and issues calls through them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{BatchRequest, BatchResponse, CallError, Replica, SendError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reusable client handle for one replica address.
pub trait RpcHandle: Send + Sync {
    fn address(&self) -> &str;

    /// Resolves once the connection is healthy. Never resolves after the
    /// handle has been closed.
    fn ready(&self) -> BoxFuture<'_, ()>;

    /// Resolves once the handle has been closed by its owner.
    fn closed(&self) -> BoxFuture<'_, ()>;

    /// Issues the "execute batch" remote call.
    fn execute_batch(
        &self,
        request: BatchRequest,
    ) -> BoxFuture<'_, std::result::Result<BatchResponse, CallError>>;
}

/// Hands out client handles per replica.
pub trait ConnectionAccess: Send + Sync {
    /// Returns the handle for `replica`, or a transport failure if one
    /// cannot be dialed.
    fn connect(&self, replica: &Replica) -> std::result::Result<Arc<dyn RpcHandle>, SendError>;
}
