use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{ConnectionAccess, ConnectionOptions, HttpConnection, Replica, RpcHandle, SendError};

/// Caches one [`HttpConnection`] per replica address.
///
/// Handles are shared across attempts and across sends. Closing an address
/// evicts its handle, so the next send dials a fresh one.
#[derive(Clone)]
pub struct ConnectionPool {
    http: reqwest::Client,
    options: ConnectionOptions,
    connections: Arc<Mutex<HashMap<String, Arc<HttpConnection>>>>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("options", &self.options)
            .field("connections", &self.lock().len())
            .finish()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::with_options(ConnectionOptions::default())
    }

    pub fn with_options(options: ConnectionOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            options,
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the cached handle for `address`, creating it if needed.
    pub fn get(&self, address: &str) -> Arc<HttpConnection> {
        let mut connections = self.lock();
        if let Some(conn) = connections.get(address) {
            if !conn.is_closed() {
                return conn.clone();
            }
        }
        let conn = Arc::new(HttpConnection::new(
            self.http.clone(),
            address,
            self.options.clone(),
        ));
        connections.insert(address.to_owned(), conn.clone());
        conn
    }

    /// Closes and evicts the handle for `address`. Returns whether one existed.
    pub fn close(&self, address: &str) -> bool {
        match self.lock().remove(address) {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Closes every cached handle.
    pub fn close_all(&self) {
        for (_, conn) in self.lock().drain() {
            conn.close();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<HttpConnection>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionAccess for ConnectionPool {
    fn connect(&self, replica: &Replica) -> std::result::Result<Arc<dyn RpcHandle>, SendError> {
        let conn: Arc<dyn RpcHandle> = self.get(replica.address());
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ConnectionPool;

    #[test]
    fn handles_are_cached_per_address() {
        let pool = ConnectionPool::new();
        let first = pool.get("127.0.0.1:7001");
        let again = pool.get("127.0.0.1:7001");
        let other = pool.get("127.0.0.1:7002");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn close_evicts_and_closes_handle() {
        let pool = ConnectionPool::new();
        let conn = pool.get("127.0.0.1:7001");

        assert!(pool.close("127.0.0.1:7001"));
        assert!(conn.is_closed());
        assert!(!pool.close("127.0.0.1:7001"));

        let fresh = pool.get("127.0.0.1:7001");
        assert!(!fresh.is_closed());
        assert!(!Arc::ptr_eq(&conn, &fresh));
    }

    #[test]
    fn close_all_empties_pool() {
        let pool = ConnectionPool::new();
        let conn = pool.get("127.0.0.1:7001");
        pool.get("127.0.0.1:7002");

        pool.close_all();
        assert!(pool.is_empty());
        assert!(conn.is_closed());
    }
}
