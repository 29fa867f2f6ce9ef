//! Sandboxed phase execution.
//!
//! Every phase materializes the code snapshot into a fresh private
//! workspace, runs one tool invocation, and captures combined
//! stdout/stderr. The workspace is a [`tempfile::TempDir`], so release
//! happens on every exit path - including cancellation and panics.
//!
//! Two implementations share the interface: [`DockerSandbox`] (resource
//! caps, no network) and [`LocalSandbox`] (bare subprocess fallback for
//! hosts without a container runtime).

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use pf_domain::config::RunnerConfig;
use pf_domain::error::{Error, Result};
use pf_domain::session::CodeSnapshot;

use crate::demux::decode_if_framed;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exec request / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool invocation against a materialized snapshot.
pub struct ExecSpec<'a> {
    pub code: &'a CodeSnapshot,
    /// Full argv; `argv[0]` is the program.
    pub argv: Vec<String>,
    /// Container image (docker only).
    pub image: String,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

/// Result of one tool invocation. Non-zero exits are data, not errors.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    /// Combined stdout + stderr, demultiplexed where the runtime frames it.
    pub output: String,
    pub timed_out: bool,
}

impl ExecOutcome {
    pub fn ok(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Sandbox capability: run a tool over a snapshot, optionally reading the
/// workspace back (for fix-ups that rewrite files in place).
#[async_trait::async_trait]
pub trait Sandbox: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn exec(&self, spec: ExecSpec<'_>) -> Result<ExecOutcome>;

    /// Like [`Sandbox::exec`], but also returns the workspace contents
    /// after the tool ran (used by `format_fix`).
    async fn exec_and_collect(&self, spec: ExecSpec<'_>) -> Result<(ExecOutcome, CodeSnapshot)>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace materialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write the snapshot into a fresh private tempdir.
///
/// Rejects absolute paths and `..` components so a snapshot can never
/// escape its workspace.
fn materialize(code: &CodeSnapshot) -> Result<tempfile::TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("pairflow-run-")
        .tempdir()
        .map_err(Error::Io)?;

    for (rel_path, content) in code {
        let rel = Path::new(rel_path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(Error::BadRequest(format!(
                "snapshot path escapes workspace: {rel_path}"
            )));
        }
        let full = dir.path().join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        std::fs::write(&full, content).map_err(Error::Io)?;
    }

    Ok(dir)
}

/// Read every regular file under the workspace back into a snapshot.
fn collect(dir: &Path) -> Result<CodeSnapshot> {
    let mut code = CodeSnapshot::new();
    collect_into(dir, dir, &mut code)?;
    Ok(code)
}

fn collect_into(root: &Path, dir: &Path, code: &mut CodeSnapshot) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(Error::Io)? {
        let entry = entry.map_err(Error::Io)?;
        let path = entry.path();
        if path.is_dir() {
            collect_into(root, &path, code)?;
        } else if let Ok(content) = std::fs::read_to_string(&path) {
            // Binary artifacts (build outputs) are skipped.
            let rel = path
                .strip_prefix(root)
                .map_err(|e| Error::Internal(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            code.insert(rel, content);
        }
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Child process supervision
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn a command, capture combined output, and wait for exit, timeout,
/// or cancellation. The child is killed on the latter two.
async fn supervise(mut cmd: Command, timeout: Duration, cancel: &CancellationToken) -> Result<ExecOutcome> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        Error::Internal(format!("failed to spawn sandbox process: {e}"))
    })?;

    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

    let stdout_task = child.stdout.take().map(|mut stdout| {
        let buf = buffer.clone();
        tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            while let Ok(n) = stdout.read(&mut chunk).await {
                if n == 0 {
                    break;
                }
                buf.lock().extend_from_slice(&chunk[..n]);
            }
        })
    });
    let stderr_task = child.stderr.take().map(|mut stderr| {
        let buf = buffer.clone();
        tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            while let Ok(n) = stderr.read(&mut chunk).await {
                if n == 0 {
                    break;
                }
                buf.lock().extend_from_slice(&chunk[..n]);
            }
        })
    });

    let (exit_code, timed_out) = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| Error::Internal(format!("sandbox wait: {e}")))?;
            (status.code(), false)
        }
        _ = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            (None, true)
        }
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            if let Some(t) = stdout_task { t.abort(); }
            if let Some(t) = stderr_task { t.abort(); }
            return Err(Error::Cancelled);
        }
    };

    if let Some(t) = stdout_task {
        let _ = t.await;
    }
    if let Some(t) = stderr_task {
        let _ = t.await;
    }

    let raw = std::mem::take(&mut *buffer.lock());
    let mut output = decode_if_framed(&raw);
    if timed_out {
        output.push_str("\n[timed out]");
    }

    Ok(ExecOutcome {
        exit_code,
        output,
        timed_out,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local sandbox
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bare-subprocess fallback. Same interface as docker, weaker isolation:
/// no memory/cpu caps and the host network is reachable.
pub struct LocalSandbox;

impl LocalSandbox {
    fn command(spec: &ExecSpec<'_>, workdir: &Path) -> Result<Command> {
        let program = spec
            .argv
            .first()
            .ok_or_else(|| Error::Internal("empty sandbox argv".into()))?;
        let mut cmd = Command::new(program);
        cmd.args(&spec.argv[1..]);
        cmd.current_dir(workdir);
        Ok(cmd)
    }
}

#[async_trait::async_trait]
impl Sandbox for LocalSandbox {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn exec(&self, spec: ExecSpec<'_>) -> Result<ExecOutcome> {
        let dir = materialize(spec.code)?;
        let cmd = Self::command(&spec, dir.path())?;
        supervise(cmd, spec.timeout, &spec.cancel).await
        // `dir` dropped here - workspace removed on every path.
    }

    async fn exec_and_collect(&self, spec: ExecSpec<'_>) -> Result<(ExecOutcome, CodeSnapshot)> {
        let dir = materialize(spec.code)?;
        let cmd = Self::command(&spec, dir.path())?;
        let outcome = supervise(cmd, spec.timeout, &spec.cancel).await?;
        let code = collect(dir.path())?;
        Ok((outcome, code))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Docker sandbox
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Container-isolated execution: snapshot mounted at `/work`, memory and
/// cpu capped, network disabled unless configured otherwise.
pub struct DockerSandbox {
    memory_mb: u64,
    cpus: f64,
    network_enabled: bool,
}

impl DockerSandbox {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            memory_mb: config.memory_mb,
            cpus: config.cpus,
            network_enabled: config.network_enabled,
        }
    }

    /// Whether a docker daemon answers on this host.
    pub async fn available() -> bool {
        let probe = Command::new("docker")
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        matches!(probe, Ok(status) if status.success())
    }

    fn command(&self, spec: &ExecSpec<'_>, workdir: &Path) -> Command {
        let mut cmd = Command::new("docker");
        cmd.args(["run", "--rm", "-i"]);
        cmd.arg(format!("--memory={}m", self.memory_mb));
        cmd.arg(format!("--cpus={}", self.cpus));
        if !self.network_enabled {
            cmd.arg("--network=none");
        }
        cmd.arg("-v");
        cmd.arg(format!("{}:/work", workdir.display()));
        cmd.args(["-w", "/work"]);
        cmd.arg(&spec.image);
        cmd.args(&spec.argv);
        cmd
    }
}

#[async_trait::async_trait]
impl Sandbox for DockerSandbox {
    fn kind(&self) -> &'static str {
        "docker"
    }

    async fn exec(&self, spec: ExecSpec<'_>) -> Result<ExecOutcome> {
        let dir = materialize(spec.code)?;
        let cmd = self.command(&spec, dir.path());
        supervise(cmd, spec.timeout, &spec.cancel).await
    }

    async fn exec_and_collect(&self, spec: ExecSpec<'_>) -> Result<(ExecOutcome, CodeSnapshot)> {
        let dir = materialize(spec.code)?;
        let cmd = self.command(&spec, dir.path());
        let outcome = supervise(cmd, spec.timeout, &spec.cancel).await?;
        let code = collect(dir.path())?;
        Ok((outcome, code))
    }
}
