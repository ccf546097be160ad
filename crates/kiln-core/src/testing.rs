//! Test doubles for code that drives external processes
//!
//! Enabled for dependent crates through the `testing` feature.

use crate::error::{Error, Result};
use crate::process::{ChildHandle, CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Rule {
    prefix: String,
    responses: VecDeque<CommandOutput>,
}

/// A [`CommandRunner`] that replays canned responses and records every call
///
/// Responses are matched on the command line prefix; the longest matching
/// prefix wins. Queued responses are consumed in order and the last one
/// repeats. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
    spawned: Mutex<Vec<CommandSpec>>,
    spawn_failures: Mutex<Vec<String>>,
    child_alive: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            child_alive: Arc::new(AtomicBool::new(true)),
            ..Default::default()
        }
    }

    /// Queue a response for commands starting with `prefix`
    pub fn respond(&self, prefix: &str, output: CommandOutput) -> &Self {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.responses.push_back(output),
            None => rules.push(Rule {
                prefix: prefix.to_string(),
                responses: VecDeque::from([output]),
            }),
        }
        self
    }

    /// Make `spawn` fail for `program` as if it were not installed
    pub fn fail_spawn(&self, program: &str) -> &Self {
        self.spawn_failures.lock().unwrap().push(program.to_string());
        self
    }

    /// Whether spawned children report themselves as running
    pub fn set_child_alive(&self, alive: bool) {
        self.child_alive.store(alive, Ordering::SeqCst);
    }

    /// Every command passed to `run`, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every `run` call, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    /// Commands passed to `run` whose line starts with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.command_line().starts_with(prefix))
            .collect()
    }

    /// Every command passed to `spawn`, in order
    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.lock().unwrap().clone()
    }

    /// How many spawned children were terminated
    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    fn next_response(&self, line: &str) -> CommandOutput {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());

        match rule {
            Some(rule) if rule.responses.len() > 1 => {
                rule.responses.pop_front().unwrap_or_default()
            }
            Some(rule) => rule.responses.front().cloned().unwrap_or_default(),
            None => CommandOutput::success(""),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(self.next_response(&spec.command_line()))
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildHandle>> {
        if self.spawn_failures.lock().unwrap().contains(&spec.program) {
            return Err(Error::spawn(
                &spec.program,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            ));
        }
        self.spawned.lock().unwrap().push(spec.clone());
        Ok(Box::new(FakeChild {
            alive: Arc::clone(&self.child_alive),
            kills: Arc::clone(&self.kills),
            terminated: AtomicBool::new(false),
        }))
    }
}

struct FakeChild {
    alive: Arc<AtomicBool>,
    kills: Arc<AtomicUsize>,
    terminated: AtomicBool,
}

#[async_trait]
impl ChildHandle for FakeChild {
    fn is_running(&self) -> bool {
        !self.terminated.load(Ordering::SeqCst) && self.alive.load(Ordering::SeqCst)
    }

    fn start_kill(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            self.kills.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn terminate(&mut self) -> Result<()> {
        self.start_kill();
        Ok(())
    }
}
