// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box test harness: spawns the real `gatewayd` binary and exercises it over its
//! external interfaces (design note 6) — never the `gateway` library directly.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `gatewayd` binary.
pub fn gateway_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("gatewayd")
}

/// Find a free TCP port by binding to `:0` then releasing it.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `gatewayd` process, killed on drop. Uses `--no-auth` and an isolated,
/// in-memory device store so specs never touch a developer's real state directory.
pub struct GatewayProcess {
    child: Child,
    port: u16,
}

impl GatewayProcess {
    /// Spawn `gatewayd` with `--no-auth` on a free port, plus any extra CLI flags.
    pub fn start(extra_args: &[&str]) -> anyhow::Result<Self> {
        let binary = gateway_binary();
        anyhow::ensure!(binary.exists(), "gatewayd binary not found at {}; run `cargo build` first", binary.display());

        let port = free_port()?;
        let mut args: Vec<String> =
            vec!["--host".into(), "127.0.0.1".into(), "--port".into(), port.to_string(), "--no-auth".into()];
        args.extend(extra_args.iter().map(|s| s.to_string()));

        let child = Command::new(&binary)
            .args(&args)
            .env("GATEWAY_IN_MEMORY_STORE", "1")
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Poll `/api/v1/health` until it answers or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("gatewayd did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
