//! Connection admission
//!
//! Counts open connections per IP address so one host cannot exhaust the
//! server. A slot is held by a [`ConnectionGuard`] and released on drop.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::NetworkError;

/// Thread-safe per-IP connection counter
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    per_ip: Arc<DashMap<IpAddr, usize>>,
    max_per_ip: usize,
}

impl ConnectionTracker {
    pub fn new(max_per_ip: usize) -> Self {
        Self {
            per_ip: Arc::new(DashMap::new()),
            max_per_ip,
        }
    }

    /// Reserve a slot for `ip`, failing when it already holds the maximum
    pub fn try_acquire(&self, ip: IpAddr) -> Result<ConnectionGuard, NetworkError> {
        {
            let mut count = self.per_ip.entry(ip).or_insert(0);
            if *count >= self.max_per_ip {
                warn!(
                    ip = %ip,
                    count = *count,
                    max = self.max_per_ip,
                    "Connection limit exceeded for IP"
                );
                return Err(NetworkError::TooManyConnections(ip.to_string()));
            }
            *count += 1;
        }

        Ok(ConnectionGuard {
            per_ip: Arc::clone(&self.per_ip),
            ip,
        })
    }

    /// Open connections from `ip`
    pub fn count(&self, ip: IpAddr) -> usize {
        self.per_ip.get(&ip).map(|c| *c).unwrap_or(0)
    }

    /// Open connections across all addresses
    pub fn total(&self) -> usize {
        self.per_ip.iter().map(|entry| *entry.value()).sum()
    }
}

/// Holds one connection slot until dropped
#[derive(Debug)]
pub struct ConnectionGuard {
    per_ip: Arc<DashMap<IpAddr, usize>>,
    ip: IpAddr,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.per_ip.get_mut(&self.ip) {
            *count = count.saturating_sub(1);
        }
        // The entry guard above must be released before removing
        self.per_ip.remove_if(&self.ip, |_, count| *count == 0);
        debug!(ip = %self.ip, "Connection slot released");
    }
}
