//! Bounded retry for session establishment and port negotiation.
//!
//! Firefox opens its debugger server some time after the process starts.
//! Until then every connection attempt is refused, which is the signal to
//! wait and try again. Any other failure is terminal.
//!
//! The same refusal signal drives free-port discovery: a refused probe means
//! nothing listens on the port, so Firefox can be told to use it.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Default number of connection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 250;

/// Default pause between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(120);

/// First port tried for the debugger server.
pub const DEFAULT_DEBUGGER_PORT: u16 = 6005;

/// Number of consecutive ports probed from [`DEFAULT_DEBUGGER_PORT`].
pub const DEFAULT_PORT_CANDIDATES: u16 = 10;

/// Host the debugger server listens on.
pub const DEBUGGER_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

// ============================================================================
// RetryPolicy
// ============================================================================

/// How often and how fast to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Sets the number of attempts.
    #[inline]
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the pause between attempts.
    #[inline]
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

// ============================================================================
// Retry Loop
// ============================================================================

/// Outcome of one attempt inside [`retry`].
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished with a value.
    Done(T),
    /// Not yet; try again after the interval.
    Retry,
}

/// Runs `attempt` until it is done or the policy is exhausted.
///
/// `attempt` receives the 1-based attempt number.
///
/// # Errors
///
/// - Any error returned by `attempt`, immediately
/// - [`Error::TooManyRetries`] once `max_attempts` attempts asked to retry
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    for number in 1..=policy.max_attempts {
        match attempt(number).await? {
            Attempt::Done(value) => {
                trace!(operation, attempt = number, "Retry loop finished");
                return Ok(value);
            }
            Attempt::Retry => {
                trace!(operation, attempt = number, "Attempt asked to retry");
                if number < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }

    Err(Error::too_many_retries(operation, policy.max_attempts))
}

// ============================================================================
// Connect
// ============================================================================

/// Connects to a debugger server, retrying while the connection is refused.
///
/// # Errors
///
/// - [`Error::TooManyRetries`] if the server never accepted
/// - Any non-refusal connection or handshake failure, immediately
pub async fn connect_with_retry(addr: SocketAddr, policy: &RetryPolicy) -> Result<Connection> {
    debug!(%addr, max_attempts = policy.max_attempts, "Connecting to debugger server");

    retry(policy, "connect to Firefox", |attempt| async move {
        match Connection::connect(addr).await {
            Ok(connection) => Ok(Attempt::Done(connection)),
            Err(e) if e.is_connection_refused() => {
                trace!(%addr, attempt, "Connection refused, Firefox not ready yet");
                Ok(Attempt::Retry)
            }
            Err(e) => Err(e),
        }
    })
    .await
}

// ============================================================================
// Port Discovery
// ============================================================================

/// Returns the first candidate port the probe finds free.
///
/// `probe` tries to connect: a refused connection means the port is free,
/// success means it is occupied.
///
/// # Errors
///
/// - Any probe failure other than refusal, immediately
/// - [`Error::TooManyRetries`] if every candidate is occupied
pub async fn probe_ports<I, F, Fut>(candidates: I, mut probe: F) -> Result<u16>
where
    I: IntoIterator<Item = u16>,
    F: FnMut(u16) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempts = 0u32;

    for port in candidates {
        attempts += 1;
        match probe(port).await {
            Ok(()) => trace!(port, "Port occupied"),
            Err(e) if e.is_connection_refused() => {
                debug!(port, "Found free port");
                return Ok(port);
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::too_many_retries("find a free port", attempts))
}

/// Probes `count` consecutive ports from `start` on `host` over TCP.
///
/// # Errors
///
/// See [`probe_ports`].
pub async fn find_free_port(host: IpAddr, start: u16, count: u16) -> Result<u16> {
    let candidates = (0..count).filter_map(|offset| start.checked_add(offset));

    probe_ports(candidates, |port| async move {
        TcpStream::connect((host, port))
            .await
            .map(|_| ())
            .map_err(Error::from)
    })
    .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Error as IoError, ErrorKind};

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::protocol::encode_frame;
    use crate::testing::greeting;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    fn refused() -> Error {
        IoError::new(ErrorKind::ConnectionRefused, "refused").into()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 250);
        assert_eq!(policy.interval, Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_retry_until_done() {
        let mut calls = 0;
        let value = retry(&fast(5), "test", |attempt| {
            calls += 1;
            async move {
                Ok(if attempt < 3 {
                    Attempt::Retry
                } else {
                    Attempt::Done(attempt)
                })
            }
        })
        .await
        .expect("done on third attempt");

        assert_eq!(value, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let mut calls = 0;
        let err = retry::<(), _, _>(&fast(4), "wait for thing", |_| {
            calls += 1;
            async { Ok(Attempt::Retry) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 4);
        assert!(matches!(
            err,
            Error::TooManyRetries { ref operation, attempts: 4 } if operation == "wait for thing"
        ));
    }

    #[tokio::test]
    async fn test_retry_propagates_error_immediately() {
        let mut calls = 0;
        let err = retry::<(), _, _>(&fast(10), "test", |_| {
            calls += 1;
            async { Err(Error::protocol("boom")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_probe_ports_skips_occupied() {
        let port = tokio_test::assert_ok!(
            probe_ports([6000, 6001, 6002], |port| async move {
                if port < 6002 { Ok(()) } else { Err(refused()) }
            })
            .await
        );

        assert_eq!(port, 6002);
    }

    #[tokio::test]
    async fn test_probe_ports_all_occupied() {
        let err = tokio_test::assert_err!(probe_ports([7000, 7001], |_| async { Ok(()) }).await);
        assert!(matches!(err, Error::TooManyRetries { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_probe_ports_propagates_other_errors() {
        let err = probe_ports([7000, 7001], |_| async {
            Err(IoError::new(ErrorKind::PermissionDenied, "denied").into())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_find_free_port_rejects_listening_port() {
        let listener = TcpListener::bind((DEBUGGER_HOST, 0)).await.expect("bind");
        let occupied = listener.local_addr().expect("addr").port();

        let err = find_free_port(DEBUGGER_HOST, occupied, 1).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRetries { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_connect_with_retry_connects_and_handshakes() {
        let listener = TcpListener::bind((DEBUGGER_HOST, 0)).await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let frame = encode_frame(&greeting()).expect("encode");
            socket.write_all(&frame).await.expect("write greeting");
            // Keep the socket open until the client goes away.
            let mut sink = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut socket, &mut sink).await;
        });

        let connection = connect_with_retry(addr, &fast(3)).await.expect("connect");
        assert!(!connection.is_closed());
        connection.disconnect();
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up_when_refused() {
        let addr = {
            let listener = TcpListener::bind((DEBUGGER_HOST, 0)).await.expect("bind");
            listener.local_addr().expect("addr")
        };

        let err = connect_with_retry(addr, &fast(3)).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRetries { attempts: 3, .. }));
        assert!(err.is_usage_error());
    }
}
