//! Debugger server connection and event loop.
//!
//! This module handles one TCP connection to Firefox's debugger server,
//! including frame decoding, request/response correlation by actor and
//! routing of unsolicited notifications.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming bytes from the server (buffered until a frame is complete)
//! - Outgoing requests from the Rust API
//! - Request/response correlation by `from` actor
//! - Unsolicited notifications and diagnostics as [`ConnectionEvent`]s
//!
//! # Ordering
//!
//! Replies carry no request id, so requests to one actor are sent one at a
//! time and replies are matched to the single in-flight request of the
//! sending actor. Requests to different actors proceed independently.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ActorId;
use crate::protocol::{FrameStatus, Message, decode_frame, encode_frame};

use super::registry::RequestRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Initial capacity of the incoming byte buffer.
const READ_BUFFER_CAPACITY: usize = 16 * 1024;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Low-level transport events, delivered to every subscriber.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// [`Connection::disconnect`] was called.
    Disconnected,

    /// The server closed the stream.
    End,

    /// A notification the server pushed without a request.
    Unsolicited(Message),

    /// A diagnostic error: malformed frame, stray reply, socket failure.
    Error(Arc<Error>),
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a request that the registry has activated.
    Send(Message),
    /// Stop the event loop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Connection to a Firefox debugger server.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Example
///
/// ```no_run
/// use firefox_extension_runner::protocol::Message;
/// use firefox_extension_runner::transport::Connection;
///
/// # async fn example() -> firefox_extension_runner::Result<()> {
/// let connection = Connection::connect(([127, 0, 0, 1], 6005).into()).await?;
/// let reply = connection.request(Message::request("root", "listAddons")).await?;
/// println!("{:?}", reply.get("addons"));
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Request bookkeeping (shared with event loop).
    registry: Arc<Mutex<RequestRegistry>>,
    /// Event fan-out.
    events: broadcast::Sender<ConnectionEvent>,
    /// Set by the first [`Connection::disconnect`].
    disconnected: Arc<AtomicBool>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            disconnected: Arc::clone(&self.disconnected),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connects to a debugger server and waits for the root greeting.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the TCP connection fails (refusal keeps its
    ///   [`std::io::ErrorKind::ConnectionRefused`] kind)
    /// - [`Error::ConnectionClosed`] if the server hangs up before greeting
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(%addr, "Connected to debugger server");

        Self::handshake(stream).await
    }

    /// Wraps an already connected stream and waits for the root greeting.
    ///
    /// The server greets every new connection from the `root` actor before
    /// anything else; the greeting is registered as the root actor's first
    /// expected reply so requests to `root` queue behind it.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the stream ends before the greeting
    /// - [`Error::Remote`] if the greeting is an error payload
    pub async fn handshake<S>(stream: S) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (greeting_tx, greeting_rx) = oneshot::channel();
        let connection = Self::spawn(stream, greeting_tx);

        let greeting = greeting_rx.await.map_err(|_| Error::ConnectionClosed)??;
        debug!(
            application_type = greeting.get_str("applicationType").unwrap_or("unknown"),
            "Root greeting received"
        );

        Ok(connection)
    }

    /// Creates the handle and spawns the event loop task.
    fn spawn<S>(stream: S, greeting_tx: oneshot::Sender<Result<Message>>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut registry = RequestRegistry::new();
        registry.expect_reply(ActorId::root(), greeting_tx);
        let registry = Arc::new(Mutex::new(registry));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(Self::run_event_loop(
            stream,
            command_rx,
            Arc::clone(&registry),
            events.clone(),
        ));

        Self {
            command_tx,
            registry,
            events,
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sends a request and waits for the reply of its target actor.
    ///
    /// If the actor already has a request in flight, this one is queued and
    /// sent once every earlier request to the same actor has settled.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the request has no `to` actor
    /// - [`Error::Remote`] if the actor replies with an error payload
    /// - [`Error::ConnectionClosed`] if the connection closes first
    pub async fn request(&self, request: Message) -> Result<Message> {
        let actor = request
            .to
            .clone()
            .ok_or_else(|| Error::invalid_argument("request has no 'to' actor"))?;

        let (response_tx, response_rx) = oneshot::channel();
        let ready = self.registry.lock().submit(actor.clone(), request, response_tx);

        if let Some(message) = ready {
            trace!(actor = %actor, kind = message.kind(), "Sending request");
            if self
                .command_tx
                .send(ConnectionCommand::Send(message))
                .is_err()
            {
                reject_outstanding(&self.registry);
            }
        }

        response_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Subscribes to transport events.
    ///
    /// Only events emitted after subscribing are received.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Disconnects and rejects every outstanding request.
    ///
    /// Active and queued requests all fail with [`Error::ConnectionClosed`].
    /// Calling this again is a no-op.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        let rejected = reject_outstanding(&self.registry);
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
        let _ = self.events.send(ConnectionEvent::Disconnected);

        debug!(rejected, "Disconnected from debugger server");
    }

    /// Returns the number of active plus queued requests.
    #[inline]
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.registry.lock().outstanding()
    }

    /// Returns `true` once the connection no longer accepts requests.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registry.lock().is_closed()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

impl Connection {
    /// Event loop that handles socket I/O.
    async fn run_event_loop<S>(
        stream: S,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        registry: Arc<Mutex<RequestRegistry>>,
        events: broadcast::Sender<ConnectionEvent>,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buffer: Vec<u8> = Vec::with_capacity(READ_BUFFER_CAPACITY);

        loop {
            tokio::select! {
                // Incoming bytes from the server
                read = reader.read_buf(&mut buffer) => {
                    match read {
                        Ok(0) => {
                            debug!("Debugger server closed the stream");
                            let _ = events.send(ConnectionEvent::End);
                            break;
                        }

                        Ok(count) => {
                            trace!(count, buffered = buffer.len(), "Read from socket");

                            let drained = Self::drain_frames(&mut buffer, &registry, &events);
                            let outgoing = match drained {
                                Ok(outgoing) => outgoing,
                                Err(e) => {
                                    error!(error = %e, "Unrecoverable frame, closing connection");
                                    let _ = events.send(ConnectionEvent::Error(Arc::new(e)));
                                    break;
                                }
                            };

                            if let Err(e) = Self::write_all(&mut writer, &outgoing).await {
                                error!(error = %e, "Failed to send queued request");
                                let _ = events.send(ConnectionEvent::Error(Arc::new(e)));
                                break;
                            }
                        }

                        Err(e) => {
                            error!(error = %e, "Socket read error");
                            let error =
                                Error::connection(format!("Read from debugger server failed: {e}"));
                            let _ = events.send(ConnectionEvent::Error(Arc::new(error)));
                            break;
                        }
                    }
                }

                // Commands from Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(message)) => {
                            if let Err(e) = Self::write_all(&mut writer, &[message]).await {
                                error!(error = %e, "Failed to send request");
                                let _ = events.send(ConnectionEvent::Error(Arc::new(e)));
                                break;
                            }
                        }

                        Some(ConnectionCommand::Shutdown) | None => {
                            debug!("Shutdown command received");
                            let _ = writer.shutdown().await;
                            break;
                        }
                    }
                }
            }
        }

        // Fail all outstanding requests on shutdown
        let rejected = reject_outstanding(&registry);
        debug!(rejected, "Event loop terminated");
    }

    /// Decodes every complete frame in `buffer` and routes the messages.
    ///
    /// Returns queued requests that became ready to send.
    fn drain_frames(
        buffer: &mut Vec<u8>,
        registry: &Mutex<RequestRegistry>,
        events: &broadcast::Sender<ConnectionEvent>,
    ) -> Result<Vec<Message>> {
        let mut outgoing = Vec::new();

        loop {
            match decode_frame(buffer)? {
                FrameStatus::Incomplete => return Ok(outgoing),

                FrameStatus::Malformed(e) => {
                    warn!(error = %e, "Dropping malformed frame");
                    let _ = events.send(ConnectionEvent::Error(Arc::new(e)));
                }

                FrameStatus::Message(message) => {
                    outgoing.extend(Self::route_message(message, registry, events));
                }
            }
        }
    }

    /// Routes one incoming message.
    ///
    /// Returns queued requests released by settling the sender's request.
    fn route_message(
        message: Message,
        registry: &Mutex<RequestRegistry>,
        events: &broadcast::Sender<ConnectionEvent>,
    ) -> Vec<Message> {
        let Some(from) = message.from.clone() else {
            let error = match message.remote_error() {
                Some(error) => error,
                None => Error::protocol(format!(
                    "Received a message without 'from': {}",
                    serde_json::to_string(&message).unwrap_or_default()
                )),
            };
            warn!(error = %error, "Message without sender");
            let _ = events.send(ConnectionEvent::Error(Arc::new(error)));
            return Vec::new();
        };

        if message.is_unsolicited() {
            trace!(actor = %from, kind = message.kind(), "Unsolicited event");
            let _ = events.send(ConnectionEvent::Unsolicited(message));
            return Vec::new();
        }

        let (completion, ready) = {
            let mut registry = registry.lock();
            let completion = registry.settle(&from);
            let ready = if completion.is_some() {
                registry.flush()
            } else {
                Vec::new()
            };
            (completion, ready)
        };

        match completion {
            Some(completion) => {
                trace!(actor = %from, error = message.is_error(), "Reply received");
                let _ = completion.send(message.into_result());
            }
            None => {
                warn!(actor = %from, "Reply from actor with no active request");
                let _ = events.send(ConnectionEvent::Error(Arc::new(Error::protocol(
                    format!("Unexpected message from actor {from}"),
                ))));
            }
        }

        ready
    }

    /// Encodes and writes messages in order.
    async fn write_all<S>(writer: &mut WriteHalf<S>, messages: &[Message]) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        for message in messages {
            let frame = encode_frame(message)?;
            writer.write_all(&frame).await?;
        }
        if !messages.is_empty() {
            writer.flush().await?;
        }
        Ok(())
    }
}

// ============================================================================
// Private Helpers
// ============================================================================

/// Closes the registry and fails every outstanding request.
///
/// Returns how many requests were rejected (zero if already closed).
fn reject_outstanding(registry: &Mutex<RequestRegistry>) -> usize {
    let completions = registry.lock().close();
    let count = completions.len();

    for completion in completions {
        let _ = completion.send(Err(Error::ConnectionClosed));
    }

    count
}

// ============================================================================
// Tests
// ============================================================================
