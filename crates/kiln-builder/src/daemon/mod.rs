//! Rootless buildkitd lifecycle
//!
//! The daemon moves through [`DaemonState`] one event at a time:
//!
//! ```text
//! Stopped -> Starting -> Ready <-> Running
//!               |          |         |
//!               +----------+---------+--> Stopping -> Stopped
//! ```
//!
//! A crash in any live state goes straight back to `Stopped`.

pub mod config;

pub use config::ensure_insecure_registries;

use crate::backend::buildkit::PROGRAM as BUILDCTL;
use crate::error::{Error, Result};
use kiln_core::retry::{ClosurePredicate, RetryError, RetryExecutorBuilder, RetryPolicy};
use kiln_core::{validation, ChildHandle, CommandRunner, CommandSpec};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

/// Readiness probe interval
pub const READY_POLL_INTERVAL_MS: u64 = 1000;

/// Readiness probes before giving up
pub const READY_MAX_ATTEMPTS: u32 = 30;

/// Daemon lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    /// Process launched, socket not answering yet
    Starting,
    /// Accepting builds
    Ready,
    /// A build is in progress
    Running,
    Stopping,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Starting => write!(f, "starting"),
            DaemonState::Ready => write!(f, "ready"),
            DaemonState::Running => write!(f, "running"),
            DaemonState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Something that happened to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonEvent {
    Spawned,
    BecameReady,
    BuildStarted,
    BuildFinished,
    StopRequested,
    Exited,
}

impl fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl DaemonState {
    /// State after `event`, or an error if the event is not allowed here
    pub fn transition(self, event: DaemonEvent) -> Result<DaemonState> {
        use DaemonEvent::*;
        use DaemonState::*;

        let next = match (self, event) {
            (Stopped, Spawned) => Starting,
            (Starting, BecameReady) => Ready,
            (Ready, BuildStarted) => Running,
            (Running, BuildFinished) => Ready,
            (Starting | Ready | Running, StopRequested) => Stopping,
            (Starting | Ready | Running | Stopping, Exited) => Stopped,
            (from, event) => {
                return Err(Error::InvalidTransition {
                    from: from.to_string(),
                    event: event.to_string(),
                })
            }
        };
        Ok(next)
    }

    /// Whether a daemon process may still exist
    pub fn is_live(self) -> bool {
        !matches!(self, DaemonState::Stopped)
    }
}

/// Why a readiness probe attempt failed
#[derive(Debug, ThisError)]
pub enum ReadinessError {
    #[error("daemon is not answering yet")]
    NotReady,
    #[error("daemon process exited")]
    Exited,
}

/// Poll `check` until it reports ready, failing fast once `alive` is false
///
/// Returns the number of probes it took.
pub async fn wait_for_ready<C, F, A>(
    policy: &RetryPolicy,
    check: C,
    alive: A,
) -> std::result::Result<u32, RetryError<ReadinessError>>
where
    C: Fn() -> F,
    F: Future<Output = bool>,
    A: Fn() -> bool,
{
    let probes = AtomicU32::new(0);
    let executor = RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .with_predicate(ClosurePredicate::new(|err: &ReadinessError| {
            matches!(err, ReadinessError::NotReady)
        }))
        .build();

    executor
        .execute(|| {
            let attempt = probes.fetch_add(1, Ordering::SeqCst) + 1;
            let running = alive();
            let ready = check();
            async move {
                if !running {
                    return Err(ReadinessError::Exited);
                }
                if ready.await {
                    Ok(attempt)
                } else {
                    debug!("buildkitd not ready (probe {})", attempt);
                    Err(ReadinessError::NotReady)
                }
            }
        })
        .await
}

/// A rootless buildkitd owned by one build
///
/// [`BuildkitDaemon::stop`] is idempotent; a daemon dropped without being
/// stopped is killed.
pub struct BuildkitDaemon<'a> {
    runner: &'a dyn CommandRunner,
    socket: PathBuf,
    config: Option<PathBuf>,
    readiness: RetryPolicy,
    state: DaemonState,
    child: Option<Box<dyn ChildHandle>>,
}

impl<'a> BuildkitDaemon<'a> {
    pub fn new(runner: &'a dyn CommandRunner, socket: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            socket: socket.into(),
            config: None,
            readiness: RetryPolicy::fixed(READY_MAX_ATTEMPTS, READY_POLL_INTERVAL_MS),
            state: DaemonState::Stopped,
            child: None,
        }
    }

    /// Pass `--config <path>` when the file exists at start time
    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    pub fn with_readiness(mut self, policy: RetryPolicy) -> Self {
        self.readiness = policy;
        self
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn address(&self) -> String {
        format!("unix://{}", self.socket.display())
    }

    /// `rootlesskit buildkitd --addr unix://<socket> [--config <toml>]`
    pub fn launch_command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("rootlesskit")
            .arg("buildkitd")
            .args(["--addr".to_string(), self.address()]);
        if let Some(config) = self.config.as_ref().filter(|c| c.is_file()) {
            spec = spec.arg("--config").arg(config.to_string_lossy().into_owned());
        }
        spec
    }

    /// `buildctl --addr unix://<socket> debug workers`
    pub fn status_command(&self) -> CommandSpec {
        CommandSpec::new(BUILDCTL)
            .args(["--addr".to_string(), self.address()])
            .args(["debug", "workers"])
    }

    fn apply(&mut self, event: DaemonEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        debug!("buildkitd {} -> {} ({})", self.state, next, event);
        self.state = next;
        Ok(())
    }

    /// Launch the daemon and wait until it answers on its socket
    pub async fn start(&mut self) -> Result<()> {
        validation::validate_socket_path(&self.socket)?;
        if let Some(dir) = self.socket.parent() {
            std::fs::create_dir_all(dir)?;
        }

        self.apply(DaemonEvent::Spawned)?;
        let launch = self.launch_command();
        info!("Starting buildkitd on {}", self.address());
        let child = match self.runner.spawn(&launch) {
            Ok(child) => child,
            Err(e) => {
                self.apply(DaemonEvent::Exited)?;
                return Err(Error::daemon_start(e.to_string()));
            }
        };
        self.child = Some(child);

        let outcome = {
            let runner = self.runner;
            let status = &self.status_command();
            let child = self.child.as_deref();
            wait_for_ready(
                &self.readiness,
                move || async move {
                    runner
                        .run(status)
                        .await
                        .map(|output| output.success)
                        .unwrap_or(false)
                },
                move || child.is_some_and(|c| c.is_running()),
            )
            .await
        };

        match outcome {
            Ok(probes) => {
                self.apply(DaemonEvent::BecameReady)?;
                info!("buildkitd ready after {} probe(s)", probes);
                Ok(())
            }
            Err(RetryError::NonRetryable { .. }) => {
                self.child = None;
                self.apply(DaemonEvent::Exited)?;
                Err(Error::DaemonExited {
                    socket: self.socket.display().to_string(),
                })
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                self.stop().await?;
                Err(Error::DaemonNotReady {
                    socket: self.socket.display().to_string(),
                    attempts,
                })
            }
        }
    }

    /// Record that a build is using the daemon
    pub fn build_started(&mut self) -> Result<()> {
        self.apply(DaemonEvent::BuildStarted)
    }

    /// Record that the build finished
    pub fn build_finished(&mut self) -> Result<()> {
        self.apply(DaemonEvent::BuildFinished)
    }

    /// Kill the daemon and wait for it; does nothing when already stopped
    pub async fn stop(&mut self) -> Result<()> {
        if !self.state.is_live() {
            return Ok(());
        }
        if self.state != DaemonState::Stopping {
            self.apply(DaemonEvent::StopRequested)?;
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.terminate().await {
                warn!("Failed to stop buildkitd cleanly: {}", e);
            }
        }
        self.apply(DaemonEvent::Exited)?;
        info!("Stopped buildkitd");
        Ok(())
    }
}

impl Drop for BuildkitDaemon<'_> {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            warn!("buildkitd was not stopped; killing it");
            child.start_kill();
        }
    }
}
