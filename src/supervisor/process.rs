//! Process lifecycle: spawns and supervises the `llama-server` child
//! process, probes for readiness, and tears it down cleanly.
//!
//! Grounded on the "one reader per std stream, one reaper, cancel
//! context before killing the child" shape `src/shell/pty.rs` and
//! `src/shell/signals.rs` use for the teacher's PTY-wrapped subprocess,
//! adapted from a foreground interactive child to a background HTTP
//! server child polled for readiness over `reqwest` instead of a PTY.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::known_models::model_profile;
use super::SupervisorError;

const READINESS_DEADLINE: Duration = Duration::from_secs(30);
const READINESS_PROBE_PATHS: &[&str] = &["/health", "/v1/models", "/"];
const MAX_PORT_PROBES: u16 = 100;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub port: u16,
    pub context_size: u32,
    pub threads: usize,
    pub gpu_layers: u32,
    pub verbose: bool,
}

impl SupervisorConfig {
    pub fn new(binary_path: PathBuf, model_path: PathBuf) -> Self {
        Self {
            binary_path,
            model_path,
            port: 8080,
            context_size: 2048,
            threads: default_thread_count(),
            gpu_layers: 0,
            verbose: false,
        }
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(2)
}

#[derive(Debug, Clone, Default)]
pub struct SupervisorStatus {
    pub running: bool,
    pub endpoint: Option<String>,
    pub model_filename: Option<String>,
    pub model_exists: bool,
    pub port: Option<u16>,
}

/// The running child's state, held behind the Supervisor's single
/// mutex per §5's shared-resource policy.
pub struct LlmServerState {
    pub running: bool,
    pub endpoint: String,
    pub model_path: PathBuf,
    pub context_size: u32,
    pub threads: usize,
    child: Option<Child>,
    cancel: CancellationToken,
}

/// Owns the optional local inference server child process exclusively;
/// every other component sees only [`Supervisor::status`]'s endpoint
/// string.
pub struct Supervisor {
    state: Mutex<Option<LlmServerState>>,
    http: reqwest::Client,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
            http: reqwest::Client::builder().timeout(Duration::from_secs(2)).build().expect("reqwest client"),
        }
    }

    pub fn status(&self, config: &SupervisorConfig) -> SupervisorStatus {
        let state = self.state.lock();
        match state.as_ref() {
            Some(s) => SupervisorStatus {
                running: s.running,
                endpoint: Some(s.endpoint.clone()),
                model_filename: config.model_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                model_exists: config.model_path.exists(),
                port: port_from_endpoint(&s.endpoint),
            },
            None => SupervisorStatus {
                running: false,
                endpoint: None,
                model_filename: config.model_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                model_exists: config.model_path.exists(),
                port: None,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().as_ref().is_some_and(|s| s.running)
    }

    pub fn endpoint(&self) -> Option<String> {
        self.state.lock().as_ref().map(|s| s.endpoint.clone())
    }

    /// Spawns the child, waits for readiness, and records its state.
    /// Refuses if a server is already running.
    pub async fn start(&self, config: &SupervisorConfig) -> Result<(), SupervisorError> {
        if self.is_running() {
            return Err(SupervisorError::AlreadyRunning);
        }

        if !config.binary_path.exists() {
            return Err(SupervisorError::BinaryMissing(config.binary_path.display().to_string()));
        }
        if !config.model_path.exists() {
            return Err(SupervisorError::ModelMissing(config.model_path.display().to_string()));
        }

        let port = find_free_port(config.port)?;
        let profile = model_profile(&config.model_path.to_string_lossy());
        tracing::debug!(?profile, "resolved model profile");

        let mut command = Command::new(&config.binary_path);
        command
            .arg("--model")
            .arg(&config.model_path)
            .arg("--port")
            .arg(port.to_string())
            .arg("--ctx-size")
            .arg(config.context_size.to_string())
            .arg("--threads")
            .arg(config.threads.to_string())
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--jinja")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if config.gpu_layers > 0 {
            command.arg("--n-gpu-layers").arg(config.gpu_layers.to_string());
        }

        let mut child = command.spawn()?;
        let cancel = CancellationToken::new();

        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, config.verbose, cancel.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, true, cancel.clone());
        }

        let endpoint = format!("http://127.0.0.1:{port}");
        if let Err(e) = self.wait_for_readiness(&endpoint).await {
            cancel.cancel();
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }

        *self.state.lock() = Some(LlmServerState {
            running: true,
            endpoint,
            model_path: config.model_path.clone(),
            context_size: config.context_size,
            threads: config.threads,
            child: Some(child),
            cancel,
        });

        Ok(())
    }

    async fn wait_for_readiness(&self, endpoint: &str) -> Result<(), SupervisorError> {
        let deadline = tokio::time::Instant::now() + READINESS_DEADLINE;

        loop {
            for path in READINESS_PROBE_PATHS {
                let url = format!("{endpoint}{path}");
                if let Ok(resp) = self.http.get(&url).send().await {
                    let status = resp.status().as_u16();
                    if status == 200 || status == 404 {
                        tracing::info!(%url, status, "embedded LLM server became ready");
                        return Ok(());
                    }
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(SupervisorError::ReadinessTimeout(READINESS_DEADLINE));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Idempotent: sends an interrupt, waits briefly, then kills. Safe
    /// to call with no server running.
    pub async fn stop(&self) {
        let taken = {
            let mut guard = self.state.lock();
            guard.take()
        };

        let Some(mut state) = taken else { return };
        state.cancel.cancel();

        if let Some(mut child) = state.child.take() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    unsafe {
                        libc::kill(pid as i32, libc::SIGINT);
                    }
                }
                tokio::select! {
                    _ = child.wait() => {}
                    _ = tokio::time::sleep(Duration::from_millis(500)) => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }

        state.running = false;
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn port_from_endpoint(endpoint: &str) -> Option<u16> {
    endpoint.rsplit(':').next().and_then(|p| p.parse().ok())
}

/// Finds the first free port starting at `preferred`, probing up to
/// `MAX_PORT_PROBES` successive ports.
fn find_free_port(preferred: u16) -> Result<u16, SupervisorError> {
    for offset in 0..=MAX_PORT_PROBES {
        let candidate = preferred.saturating_add(offset);
        if TcpListener::bind(("127.0.0.1", candidate)).is_ok() {
            return Ok(candidate);
        }
    }
    Err(SupervisorError::PortUnavailable(preferred))
}

/// Reads lines from a child's stdout/stderr. Lines that look
/// error-ish or report readiness are always surfaced at `warn`/`info`;
/// everything else only when `verbose`, matching the spec's "stderr and
/// lines containing error|fatal|failed|listening|model loaded MUST
/// always be surfaced" rule.
fn spawn_stream_reader<R>(stream: R, verbose: bool, cancel: CancellationToken)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if is_always_visible(&line) {
                                tracing::warn!(target: "k13d::supervisor", "{line}");
                            } else if verbose {
                                tracing::debug!(target: "k13d::supervisor", "{line}");
                            }
                        }
                        _ => break,
                    }
                }
            }
        }
    });
}

fn is_always_visible(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["error", "fatal", "failed", "listening", "model loaded"].iter().any(|kw| lower.contains(kw))
}
