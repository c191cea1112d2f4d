//! Default port allocation and session connection over TCP.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::remote::RemoteFirefox;
use crate::transport::{
    DEBUGGER_HOST, DEFAULT_DEBUGGER_PORT, DEFAULT_PORT_CANDIDATES, RetryPolicy,
    connect_with_retry, find_free_port,
};

use super::traits::{PortAllocator, RemoteConnector};

// ============================================================================
// TcpPortAllocator
// ============================================================================

/// Probes consecutive local ports for a free one.
#[derive(Debug, Clone, Copy)]
pub struct TcpPortAllocator {
    /// Host to probe.
    pub host: IpAddr,
    /// First port tried.
    pub start: u16,
    /// Number of ports tried.
    pub count: u16,
}

impl Default for TcpPortAllocator {
    fn default() -> Self {
        Self {
            host: DEBUGGER_HOST,
            start: DEFAULT_DEBUGGER_PORT,
            count: DEFAULT_PORT_CANDIDATES,
        }
    }
}

#[async_trait]
impl PortAllocator for TcpPortAllocator {
    async fn allocate(&self) -> Result<u16> {
        find_free_port(self.host, self.start, self.count).await
    }
}

// ============================================================================
// TcpRemoteConnector
// ============================================================================

/// Connects to a local debugger server, waiting for Firefox to start it.
#[derive(Debug, Clone, Copy)]
pub struct TcpRemoteConnector {
    /// Host the debugger server listens on.
    pub host: IpAddr,
    /// How long to wait for the server.
    pub policy: RetryPolicy,
}

impl TcpRemoteConnector {
    /// Creates a connector for the local host.
    #[inline]
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            host: DEBUGGER_HOST,
            policy,
        }
    }
}

impl Default for TcpRemoteConnector {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl RemoteConnector for TcpRemoteConnector {
    async fn connect(&self, port: u16) -> Result<RemoteFirefox> {
        let addr = SocketAddr::new(self.host, port);
        let connection = connect_with_retry(addr, &self.policy).await?;
        debug!(%addr, "Remote Firefox session established");
        Ok(RemoteFirefox::new(connection))
    }
}

// ============================================================================
// Tests
// ============================================================================
