//! Test doubles shared by unit tests.
//!
//! - [`FakeServer`]: raw frame-level peer over an in-memory duplex stream
//! - [`FakeFirefox`]: scripted debugger server answering the add-on requests
//! - fake runner collaborators (profiles, launcher, ports, connector)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{FrameStatus, Message, decode_frame, encode_frame};
use crate::remote::RemoteFirefox;
use crate::runner::{
    BrowserLauncher, BrowserProcess, ExtensionDescriptor, FirefoxPreference, LaunchRequest,
    PortAllocator, Profile, ProfileProvider, RemoteConnector,
};
use crate::transport::Connection;

/// Installs a test subscriber once; respects `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FakeServer
// ============================================================================

/// Server end of an in-memory connection.
pub(crate) struct FakeServer {
    stream: DuplexStream,
    buffer: Vec<u8>,
}

impl FakeServer {
    pub(crate) fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Writes one framed message.
    pub(crate) async fn send(&mut self, message: &Message) {
        let frame = encode_frame(message).expect("encode frame");
        self.send_raw(&frame).await;
    }

    /// Writes raw bytes.
    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write to client");
    }

    /// Reads the next framed message; `None` once the client hangs up.
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        loop {
            match decode_frame(&mut self.buffer).expect("client sent valid frame") {
                FrameStatus::Message(message) => return Some(message),
                FrameStatus::Malformed(e) => panic!("client sent malformed frame: {e}"),
                FrameStatus::Incomplete => {}
            }

            let read = self.stream.read_buf(&mut self.buffer).await.ok()?;
            if read == 0 {
                return None;
            }
        }
    }
}

/// The greeting Firefox sends on every new connection.
pub(crate) fn greeting() -> Message {
    Message::reply("root")
        .with("applicationType", "browser")
        .with("traits", json!({}))
}

/// Connects a client to a [`FakeServer`] that has already greeted.
pub(crate) async fn connected_pair() -> (Connection, FakeServer) {
    init_tracing();
    let (client, server) = tokio::io::duplex(64 * 1024);
    let mut server = FakeServer::new(server);
    server.send(&greeting()).await;

    let connection = Connection::handshake(client).await.expect("handshake");
    (connection, server)
}

// ============================================================================
// FakeFirefox
// ============================================================================

/// Actor ID of the fake add-ons actor.
pub(crate) const ADDONS_ACTOR: &str = "server1.conn0.addonsActor1";

/// Behaviour switches of [`FakeFirefox`].
#[derive(Debug, Clone)]
pub(crate) struct FakeFirefoxConfig {
    /// `getRoot` is understood.
    pub get_root: bool,
    /// `getRoot` reply includes `addonsActor`.
    pub addons_actor_in_root: bool,
    /// `listTabs` reply includes `addonsActor`.
    pub addons_actor_in_list_tabs: bool,
    /// Add-on actors list `reload` in `requestTypes`.
    pub reload_supported: bool,
    /// Add-on paths whose installation fails.
    pub failing_installs: FxHashSet<String>,
    /// Add-on IDs whose reload fails.
    pub failing_reloads: FxHashSet<String>,
}

impl Default for FakeFirefoxConfig {
    fn default() -> Self {
        Self {
            get_root: true,
            addons_actor_in_root: true,
            addons_actor_in_list_tabs: true,
            reload_supported: true,
            failing_installs: FxHashSet::default(),
            failing_reloads: FxHashSet::default(),
        }
    }
}

/// What the fake server has seen.
#[derive(Debug, Default)]
pub(crate) struct FakeFirefoxState {
    /// Every request type, in arrival order.
    pub requests: Vec<String>,
    /// Installed add-ons as `(id, actor)`.
    pub installed: Vec<(String, String)>,
    /// Add-on IDs reloaded successfully, in order.
    pub reloaded: Vec<String>,
}

impl FakeFirefoxState {
    /// Counts requests of one type.
    pub(crate) fn count(&self, kind: &str) -> usize {
        self.requests.iter().filter(|k| *k == kind).count()
    }
}

/// Scripted debugger server speaking the add-on subset of the protocol.
#[derive(Clone)]
pub(crate) struct FakeFirefox {
    config: FakeFirefoxConfig,
    state: Arc<Mutex<FakeFirefoxState>>,
}

impl FakeFirefox {
    pub(crate) fn new(config: FakeFirefoxConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(FakeFirefoxState::default())),
        }
    }

    /// Shared view of what the server has seen.
    pub(crate) fn state(&self) -> Arc<Mutex<FakeFirefoxState>> {
        Arc::clone(&self.state)
    }

    /// Serves one new connection and returns the client end.
    pub(crate) async fn connect(&self) -> Connection {
        init_tracing();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut server = FakeServer::new(server);
        let this = self.clone();

        tokio::spawn(async move {
            server.send(&greeting()).await;
            while let Some(request) = server.recv().await {
                let reply = this.answer(&request);
                server.send(&reply).await;
            }
        });

        Connection::handshake(client).await.expect("handshake")
    }

    /// Serves one new connection wrapped in a session.
    pub(crate) async fn session(&self) -> RemoteFirefox {
        RemoteFirefox::new(self.connect().await)
    }

    /// Default installed add-on ID for a path: `<file name>@fake`.
    pub(crate) fn addon_id_for(path: &str) -> String {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{name}@fake")
    }

    fn answer(&self, request: &Message) -> Message {
        let to = request.to.clone().map(|a| a.as_str().to_string()).unwrap_or_default();
        let kind = request.kind().to_string();
        let mut state = self.state.lock();
        state.requests.push(kind.clone());

        let unrecognized = || {
            Message::reply(to.as_str()).with_error(
                "unrecognizedPacketType",
                format!("Actor {to} does not recognize '{kind}'"),
            )
        };

        match (to.as_str(), kind.as_str()) {
            ("root", "getRoot") if self.config.get_root => {
                let reply = Message::reply("root");
                if self.config.addons_actor_in_root {
                    reply.with("addonsActor", ADDONS_ACTOR)
                } else {
                    reply
                }
            }
            ("root", "listTabs") => {
                let reply = Message::reply("root").with("tabs", json!([]));
                if self.config.addons_actor_in_list_tabs {
                    reply.with("addonsActor", ADDONS_ACTOR)
                } else {
                    reply
                }
            }
            ("root", "listAddons") => {
                let addons: Vec<_> = state
                    .installed
                    .iter()
                    .map(|(id, actor)| json!({ "id": id, "actor": actor }))
                    .collect();
                Message::reply("root").with("addons", addons)
            }
            (ADDONS_ACTOR, "installTemporaryAddon") => {
                let path = request.get_str("addonPath").unwrap_or_default().to_string();
                if self.config.failing_installs.contains(&path) {
                    return Message::reply(ADDONS_ACTOR)
                        .with_error("installFailed", format!("Could not install {path}"));
                }
                let id = Self::addon_id_for(&path);
                let actor = format!("server1.conn0.addon-{id}");
                state.installed.push((id.clone(), actor.clone()));
                Message::reply(ADDONS_ACTOR).with("addon", json!({ "id": id, "actor": actor }))
            }
            (actor, "requestTypes") if state.installed.iter().any(|(_, a)| a == actor) => {
                let mut types = vec!["requestTypes"];
                if self.config.reload_supported {
                    types.push("reload");
                }
                Message::reply(actor).with("requestTypes", types)
            }
            (actor, "reload") if self.config.reload_supported => {
                let Some((id, _)) = state.installed.iter().find(|(_, a)| a == actor).cloned()
                else {
                    return unrecognized();
                };
                if self.config.failing_reloads.contains(&id) {
                    return Message::reply(actor).with_error("reloadFailed", format!("{id} broke"));
                }
                state.reloaded.push(id);
                Message::reply(actor)
            }
            _ => unrecognized(),
        }
    }
}

// ============================================================================
// Fake Runner Collaborators
// ============================================================================

/// Profile provider backed by temporary directories, recording calls.
#[derive(Default)]
pub(crate) struct FakeProfiles {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ProfileProvider for FakeProfiles {
    async fn create(&self) -> Result<Profile> {
        self.calls.lock().push("create".into());
        Profile::new_temp()
    }

    async fn copy_from(&self, source: &Path) -> Result<Profile> {
        self.calls.lock().push(format!("copy:{}", source.display()));
        Profile::new_temp()
    }

    async fn use_existing(&self, path: &Path) -> Result<Profile> {
        self.calls.lock().push(format!("use:{}", path.display()));
        Profile::from_path(path)
    }

    async fn configure(&self, _profile: &Profile, prefs: &[FirefoxPreference]) -> Result<()> {
        self.calls.lock().push(format!("configure:{}", prefs.len()));
        Ok(())
    }

    async fn install_proxy(
        &self,
        _profile: &Profile,
        extension: &ExtensionDescriptor,
    ) -> Result<()> {
        self.calls
            .lock()
            .push(format!("proxy:{}", extension.source_dir.display()));
        Ok(())
    }
}

/// A process that runs until killed or told to exit.
pub(crate) struct FakeProcess {
    exit_rx: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        if let Some(rx) = self.exit_rx.as_mut() {
            let _ = rx.await;
            self.exit_rx = None;
        }
        Ok(Some(0))
    }

    async fn kill(&mut self) -> Result<()> {
        self.exit_rx = None;
        Ok(())
    }
}

/// Launcher handing out [`FakeProcess`]es.
#[derive(Default)]
pub(crate) struct FakeLauncher {
    /// Every launch request received.
    pub launches: Mutex<Vec<LaunchRequest>>,
    /// Sender that makes the last launched process exit on its own.
    pub exit_tx: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn BrowserProcess>> {
        self.launches.lock().push(request);
        let (tx, rx) = oneshot::channel();
        *self.exit_tx.lock() = Some(tx);
        Ok(Box::new(FakeProcess { exit_rx: Some(rx) }))
    }
}

/// Always allocates the same port.
pub(crate) struct FixedPort(pub u16);

#[async_trait]
impl PortAllocator for FixedPort {
    async fn allocate(&self) -> Result<u16> {
        Ok(self.0)
    }
}

/// Connects runners to a [`FakeFirefox`].
pub(crate) struct FakeConnector {
    pub firefox: FakeFirefox,
    pub ports: Mutex<Vec<u16>>,
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self, port: u16) -> Result<RemoteFirefox> {
        self.ports.lock().push(port);
        Ok(self.firefox.session().await)
    }
}

/// Connector that always fails.
pub(crate) struct RefusingConnector;

#[async_trait]
impl RemoteConnector for RefusingConnector {
    async fn connect(&self, _port: u16) -> Result<RemoteFirefox> {
        Err(Error::too_many_retries("connect to Firefox", 3))
    }
}

/// Creates an extension directory with a manifest under `root`.
pub(crate) fn write_extension(root: &Path, name: &str, gecko_id: Option<&str>) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).expect("create extension dir");

    let mut manifest = json!({ "manifest_version": 2, "name": name, "version": "1.0" });
    if let Some(id) = gecko_id {
        manifest["browser_specific_settings"] = json!({ "gecko": { "id": id } });
    }
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).expect("write manifest");
    dir
}
