//! Add-on management session over one debugger connection.
//!
//! [`RemoteFirefox`] discovers the add-ons actor, installs temporary
//! add-ons and reloads them. It copes with older Firefox releases:
//!
//! - `getRoot` is not understood everywhere, so actor discovery falls back to
//!   `listTabs`, which carried `addonsActor` before `getRoot` existed.
//! - Some releases install add-ons but cannot reload them; this is probed
//!   once per session with `requestTypes`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use tokio::sync::OnceCell;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ActorId, AddonId};
use crate::protocol::Message;
use crate::transport::{Connection, ConnectionEvent};

use super::Addon;

// ============================================================================
// RemoteFirefox
// ============================================================================

/// Session with a running Firefox for add-on management.
pub struct RemoteFirefox {
    /// Underlying debugger connection.
    connection: Connection,
    /// Whether add-on actors accept `reload`, probed on first use.
    reload_support: OnceCell<bool>,
}

impl fmt::Debug for RemoteFirefox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFirefox")
            .field("connection", &self.connection)
            .field("reload_support", &self.reload_support.get())
            .finish()
    }
}

impl RemoteFirefox {
    /// Wraps a connected debugger connection.
    ///
    /// Spawns a task that logs connection events at `debug` level.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        tokio::spawn(log_events(connection.subscribe()));

        Self {
            connection,
            reload_support: OnceCell::new(),
        }
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Subscribes to connection events.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.subscribe()
    }

    /// Disconnects from Firefox, rejecting outstanding requests.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }
}

// ============================================================================
// RemoteFirefox - Add-on Operations
// ============================================================================

impl RemoteFirefox {
    /// Finds the actor that installs add-ons.
    ///
    /// # Errors
    ///
    /// - [`Error::TempInstallUnsupported`] if Firefox exposes no add-ons actor
    /// - [`Error::RemoteRequest`] if the `listTabs` fallback fails
    pub async fn discover_addons_actor(&self) -> Result<ActorId> {
        match self.request(Message::request(ActorId::root(), "getRoot")).await {
            Ok(reply) => {
                if let Some(actor) = reply.get_str("addonsActor") {
                    trace!(actor, "Add-ons actor from getRoot");
                    return Ok(ActorId::from(actor));
                }
                debug!("getRoot reply has no addonsActor, falling back to listTabs");
            }
            Err(e) => debug!(error = %e, "getRoot failed, falling back to listTabs"),
        }

        let reply = self
            .request(Message::request(ActorId::root(), "listTabs"))
            .await?;

        match reply.get_str("addonsActor") {
            Some(actor) => {
                trace!(actor, "Add-ons actor from listTabs");
                Ok(ActorId::from(actor))
            }
            None => Err(Error::temp_install_unsupported(
                "This version of Firefox does not provide an add-ons actor for remote installation",
            )),
        }
    }

    /// Installs the add-on at `path` until the browser exits.
    ///
    /// # Errors
    ///
    /// - Errors of [`RemoteFirefox::discover_addons_actor`]
    /// - [`Error::RemoteRequest`] if the installation fails
    pub async fn install_temporary(&self, path: &Path, open_devtools: bool) -> Result<Addon> {
        let actor = self.discover_addons_actor().await?;

        let mut request = Message::request(actor, "installTemporaryAddon")
            .with("addonPath", path.to_string_lossy().into_owned());
        if open_devtools {
            request = request.with("openDevTools", true);
        }

        let reply = self.request(request).await?;
        let addon: Addon = reply
            .field("addon")
            .map_err(|e| Error::remote_request("installTemporaryAddon", e))?;

        info!(id = %addon.id, path = %path.display(), "Installed temporary add-on");
        Ok(addon)
    }

    /// Lists every installed add-on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteRequest`] if `listAddons` fails.
    pub async fn list_installed(&self) -> Result<Vec<Addon>> {
        let reply = self
            .request(Message::request(ActorId::root(), "listAddons"))
            .await?;

        reply
            .field("addons")
            .map_err(|e| Error::remote_request("listAddons", e))
    }

    /// Looks up an installed add-on by ID.
    ///
    /// # Errors
    ///
    /// - [`Error::AddonNotInstalled`] if no add-on has this ID
    /// - Errors of [`RemoteFirefox::list_installed`]
    pub async fn find(&self, id: &AddonId) -> Result<Addon> {
        self.list_installed()
            .await?
            .into_iter()
            .find(|addon| &addon.id == id)
            .ok_or_else(|| Error::addon_not_installed(id.clone()))
    }

    /// Checks that add-on actors accept `reload`.
    ///
    /// The answer is cached for the session after the first successful
    /// query. A failed query is not cached.
    ///
    /// # Errors
    ///
    /// - [`Error::ReloadUnsupported`] if Firefox cannot reload add-ons
    /// - [`Error::RemoteRequest`] if the `requestTypes` query fails
    pub async fn ensure_reloadable(&self, addon: &Addon) -> Result<()> {
        let supported = *self
            .reload_support
            .get_or_try_init(|| self.query_reload_support(addon))
            .await?;

        if supported {
            Ok(())
        } else {
            Err(Error::ReloadUnsupported)
        }
    }

    /// Reloads an installed add-on.
    ///
    /// # Errors
    ///
    /// - Errors of [`RemoteFirefox::find`]
    /// - Errors of [`RemoteFirefox::ensure_reloadable`]
    /// - [`Error::RemoteRequest`] if the reload fails
    pub async fn reload(&self, id: &AddonId) -> Result<()> {
        let addon = self.find(id).await?;
        self.ensure_reloadable(&addon).await?;

        self.request(Message::request(addon.actor, "reload")).await?;
        info!(id = %id, "Reloaded add-on");
        Ok(())
    }
}

// ============================================================================
// RemoteFirefox - Internal
// ============================================================================

impl RemoteFirefox {
    /// Sends a request, wrapping failures with the request type.
    async fn request(&self, request: Message) -> Result<Message> {
        let operation = request.kind().to_string();
        trace!(operation, "Remote request");

        self.connection
            .request(request)
            .await
            .map_err(|e| Error::remote_request(operation, e))
    }

    /// Asks the add-on actor which requests it understands.
    async fn query_reload_support(&self, addon: &Addon) -> Result<bool> {
        let reply = self
            .request(Message::request(addon.actor.clone(), "requestTypes"))
            .await?;

        let types: Vec<String> = reply
            .field("requestTypes")
            .map_err(|e| Error::remote_request("requestTypes", e))?;
        let supported = types.iter().any(|kind| kind == "reload");

        debug!(supported, "Probed add-on reload support");
        Ok(supported)
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Logs connection events until the connection goes away.
async fn log_events(mut events: broadcast::Receiver<ConnectionEvent>) {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Unsolicited(message)) => {
                debug!(kind = message.kind(), "Unsolicited debugger event");
            }
            Ok(ConnectionEvent::Error(e)) => debug!(error = %e, "Debugger connection error"),
            Ok(ConnectionEvent::End) => {
                debug!("Debugger connection ended");
                break;
            }
            Ok(ConnectionEvent::Disconnected) => {
                debug!("Disconnected from debugger");
                break;
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Dropped debugger events"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
