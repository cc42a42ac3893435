use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::error::{CloseCause, Error, Result};

/// Information about the connection after a finished key exchange.
///
/// A new snapshot is published every time the server confirms the new keys with
/// `SSH_MSG_NEWKEYS`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ConnectionInfo {
    /// Negotiated key exchange algorithm.
    pub kex_algo: String,
    /// Negotiated server host key algorithm.
    pub host_key_algo: String,
    /// Negotiated cipher for packets from client to server.
    pub cipher_cts: String,
    /// Negotiated cipher for packets from server to client.
    pub cipher_stc: String,
    /// Negotiated MAC for packets from client to server.
    pub mac_cts: String,
    /// Negotiated MAC for packets from server to client.
    pub mac_stc: String,
    /// Negotiated compression for packets from client to server.
    pub compression_cts: String,
    /// Negotiated compression for packets from server to client.
    pub compression_stc: String,
    /// Public key blob of the server, as sent in the kex reply.
    pub server_host_key: Bytes,
    /// Number of finished key exchanges on this connection, starting from 1.
    pub kex_count: u32,
}

#[derive(Debug, Default)]
struct SlotState {
    conn_info: Option<ConnectionInfo>,
    closed: Option<CloseCause>,
}

/// Single-slot mailbox with the latest [`ConnectionInfo`].
#[derive(Debug, Default)]
pub(crate) struct ConnInfoSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl ConnInfoSlot {
    pub fn publish(&self, conn_info: ConnectionInfo) {
        let mut state = self.state.lock();
        log::debug!("publishing connection info after key exchange {}", conn_info.kex_count);
        state.conn_info = Some(conn_info);
        self.cond.notify_all();
    }

    pub fn close(&self, cause: CloseCause) {
        let mut state = self.state.lock();
        if state.closed.is_none() {
            log::debug!("connection closed, waking up key exchange waiters: {}", cause);
            state.closed = Some(cause);
        }
        self.cond.notify_all();
    }

    /// Blocks until at least `min_kex_count` exchanges finished, the connection is closed or the
    /// `timeout` elapses.
    pub fn wait(&self, min_kex_count: u32, timeout: Duration) -> Result<ConnectionInfo> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(conn_info) = state.conn_info.as_ref() {
                if conn_info.kex_count >= min_kex_count {
                    return Ok(conn_info.clone())
                }
            }

            if let Some(cause) = state.closed.as_ref() {
                return Err(Error::ConnectionClosed(cause.clone()))
            }

            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        // the exchange may have finished just at the deadline
                        return match state.conn_info.as_ref() {
                            Some(conn_info) if conn_info.kex_count >= min_kex_count =>
                                Ok(conn_info.clone()),
                            _ => Err(Error::Timeout),
                        }
                    }
                },
                None => self.cond.wait(&mut state),
            }
        }
    }
}

/// Handle that waits for key exchanges to finish, usable from other threads.
///
/// You obtain it from [`KexManager::waiter()`][crate::KexManager::waiter()]. The handle is cheap
/// to clone.
#[derive(Debug, Clone)]
pub struct KexWaiter {
    slot: Arc<ConnInfoSlot>,
    timeout: Duration,
}

impl KexWaiter {
    pub(crate) fn new(slot: Arc<ConnInfoSlot>, timeout: Duration) -> KexWaiter {
        KexWaiter { slot, timeout }
    }

    /// Blocks until at least `min_kex_count` key exchanges have finished and returns the latest
    /// [`ConnectionInfo`].
    ///
    /// Fails with [`Error::ConnectionClosed`] if the connection is closed before that, and with
    /// [`Error::Timeout`] after [`KexConfig::wait_timeout`][crate::KexConfig::wait_timeout]. The
    /// timeout does not affect the key exchange itself, so you can wait again later.
    pub fn wait_for_conn_info(&self, min_kex_count: u32) -> Result<ConnectionInfo> {
        self.slot.wait(min_kex_count, self.timeout)
    }

    /// Like [`wait_for_conn_info()`][Self::wait_for_conn_info()], but with an explicit timeout.
    pub fn wait_for_conn_info_timeout(&self, min_kex_count: u32, timeout: Duration) -> Result<ConnectionInfo> {
        self.slot.wait(min_kex_count, timeout)
    }
}
