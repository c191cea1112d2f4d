//! Firefox process launching.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::traits::{BrowserLauncher, BrowserProcess};

// ============================================================================
// Constants
// ============================================================================

/// Environment set for every launched Firefox.
const FIREFOX_ENV: &[(&str, &str)] = &[
    ("MOZ_NO_REMOTE", "1"),
    ("MOZ_CRASHREPORTER_DISABLE", "1"),
    ("MOZ_DISABLE_AUTO_SAFE_MODE", "1"),
];

// ============================================================================
// LaunchRequest
// ============================================================================

/// Everything needed to start one browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Path to the Firefox binary.
    pub binary: PathBuf,
    /// Profile directory.
    pub profile: PathBuf,
    /// Port for `-start-debugger-server`.
    pub debug_port: u16,
    /// Additional arguments, appended last.
    pub args: Vec<String>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
}

impl LaunchRequest {
    /// Converts the request to Firefox command-line arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(6 + self.args.len());

        args.push("-start-debugger-server".to_string());
        args.push(self.debug_port.to_string());
        args.push("-profile".to_string());
        args.push(self.profile.to_string_lossy().into_owned());
        args.push("-no-remote".to_string());
        args.push("-foreground".to_string());

        args.extend(self.args.iter().cloned());
        args
    }
}

// ============================================================================
// FirefoxLauncher
// ============================================================================

/// Launches Firefox as a child process.
///
/// Child output is logged line by line at `debug` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirefoxLauncher;

#[async_trait]
impl BrowserLauncher for FirefoxLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn BrowserProcess>> {
        let mut cmd = Command::new(&request.binary);
        cmd.args(request.to_args());

        for (key, value) in FIREFOX_ENV {
            cmd.env(key, value);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(Error::process_launch_failed)?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_output(stderr, "stderr"));
        }

        let process = ChildProcess::new(child);
        info!(
            pid = process.pid,
            port = request.debug_port,
            binary = %request.binary.display(),
            "Firefox process spawned"
        );

        Ok(Box::new(process))
    }
}

/// Forwards child output to the log.
async fn log_output<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream, "Firefox: {line}");
    }
}

// ============================================================================
// ChildProcess
// ============================================================================

/// A launched Firefox; killed when dropped.
pub struct ChildProcess {
    /// The child process handle.
    child: Option<Child>,
    /// Process ID for logging.
    pid: Option<u32>,
}

impl ChildProcess {
    /// Takes ownership of a spawned child.
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child: Some(child),
            pid,
        }
    }
}

#[async_trait]
impl BrowserProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.wait().await?;
                debug!(pid = self.pid, %status, "Firefox process exited");
                Ok(status.code())
            }
            None => Ok(None),
        }
    }

    async fn kill(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            debug!(pid = self.pid, "Killing Firefox process");
            if let Err(e) = child.kill().await {
                debug!(pid = self.pid, error = %e, "Failed to kill process");
            }
            info!(pid = self.pid, "Process terminated");
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LaunchRequest {
        LaunchRequest {
            binary: PathBuf::from("/usr/bin/firefox"),
            profile: PathBuf::from("/tmp/profile"),
            debug_port: 6005,
            args: vec!["-jsconsole".into()],
            env: Vec::new(),
        }
    }

    #[test]
    fn test_launch_args() {
        assert_eq!(
            request().to_args(),
            vec![
                "-start-debugger-server",
                "6005",
                "-profile",
                "/tmp/profile",
                "-no-remote",
                "-foreground",
                "-jsconsole",
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_missing_binary_fails() {
        let mut request = request();
        request.binary = PathBuf::from("/nonexistent/firefox");

        let err = FirefoxLauncher.launch(request).await.err().expect("launch fails");
        assert!(matches!(err, Error::ProcessLaunchFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_process_wait_and_kill() {
        let mut child = ChildProcess::new(
            Command::new("sleep").arg("30").spawn().expect("spawn sleep"),
        );
        assert!(child.pid().is_some());

        child.kill().await.expect("kill");
        assert_eq!(child.wait().await.expect("wait"), None);
    }
}
