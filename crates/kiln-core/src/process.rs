//! External process execution
//!
//! Builders, git, cosign and the buildkit daemon are all driven through the
//! [`CommandRunner`] trait so command construction can be tested without
//! any of those tools installed.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment, applied in order on top of the inherited one
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program followed by its arguments, space separated
    ///
    /// Not shell-quoted. Pass the result through a redactor before logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Trimmed stderr, or stdout when stderr is empty
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Handle to a long-running child process
#[async_trait]
pub trait ChildHandle: Send + Sync {
    /// Whether the process has not exited yet
    fn is_running(&self) -> bool;

    /// Send the kill signal without waiting; usable from `Drop`
    fn start_kill(&self);

    /// Kill the process and reap it
    async fn terminate(&mut self) -> Result<()>;
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing output
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error. Errors mean the program could not be run at all.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Start a background process
    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildHandle>>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct TokioRunner {
    echo: bool,
}

impl TokioRunner {
    /// Mirror child output to our stderr while capturing it
    pub fn new() -> Self {
        Self { echo: true }
    }

    /// Capture child output without mirroring it
    pub fn quiet() -> Self {
        Self { echo: false }
    }
}

impl Default for TokioRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(&spec.program, e))?;

        let stdout = child.stdout.take().map(|s| collect_lines(s, self.echo));
        let stderr = child.stderr.take().map(|s| collect_lines(s, self.echo));

        let status = child.wait().await?;

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: join_collected(stdout).await,
            stderr: join_collected(stderr).await,
        })
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildHandle>> {
        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn(&spec.program, e))?;

        if let Some(stderr) = child.stderr.take() {
            let program = spec.program.clone();
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{}: {}", program, line);
                }
            });
        }

        Ok(Box::new(TokioChild {
            child: Mutex::new(child),
        }))
    }
}

fn collect_lines<R>(reader: R, echo: bool) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if echo {
                eprintln!("{}", line);
            }
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

async fn join_collected(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

struct TokioChild {
    child: Mutex<Child>,
}

#[async_trait]
impl ChildHandle for TokioChild {
    fn is_running(&self) -> bool {
        self.child
            .lock()
            .map(|mut child| matches!(child.try_wait(), Ok(None)))
            .unwrap_or(false)
    }

    fn start_kill(&self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.start_kill();
        }
    }

    async fn terminate(&mut self) -> Result<()> {
        let child = self
            .child
            .get_mut()
            .map_err(|_| Error::invalid_config("child process handle poisoned"))?;
        if matches!(child.try_wait(), Ok(None)) {
            child.start_kill()?;
        }
        child.wait().await?;
        Ok(())
    }
}
