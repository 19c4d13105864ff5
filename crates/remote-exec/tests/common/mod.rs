//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use remote_exec::{
    Command, ControlPathResolver, ExitStatus, Launcher, MuxManager, OutputSink, ProcessEvent,
    ProcessEventType, ProcessHandle, Result, StreamKind, sentinel::SENTINEL_PREFIX,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What a scripted process prints and how it exits
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
    /// Never finish; only a timeout gets the caller out
    pub hang: bool,
}

impl Script {
    pub fn stdout(lines: &[&str]) -> Self {
        Self {
            stdout: lines.iter().map(|line| line.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_stderr(mut self, lines: &[&str]) -> Self {
        self.stderr = lines.iter().map(|line| line.to_string()).collect();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }
}

type Responder = Box<dyn Fn(&Command) -> Script + Send + Sync>;

/// Launcher that answers every command from a script instead of spawning it
#[derive(Clone)]
pub struct ScriptedLauncher {
    responder: Arc<Responder>,
    launched: Arc<Mutex<Vec<Command>>>,
    stdin: Arc<Mutex<Vec<Vec<u8>>>>,
    killed: Arc<AtomicBool>,
}

impl ScriptedLauncher {
    pub fn new(responder: impl Fn(&Command) -> Script + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(Box::new(responder)),
            launched: Arc::new(Mutex::new(Vec::new())),
            stdin: Arc::new(Mutex::new(Vec::new())),
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every command launched, in order
    pub fn launched(&self) -> Vec<Command> {
        self.launched.lock().unwrap().clone()
    }

    /// Launched commands other than `ssh -O ...` control commands
    pub fn workload(&self) -> Vec<Command> {
        self.launched()
            .into_iter()
            .filter(|command| !is_control_command(command))
            .collect()
    }

    /// Bytes written to stdin, one entry per process that received any
    pub fn stdin_payloads(&self) -> Vec<Vec<u8>> {
        self.stdin.lock().unwrap().clone()
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

/// True for `ssh -O check|exit ...`
pub fn is_control_command(command: &Command) -> bool {
    command.get_program() == "ssh" && command.args_lossy().first().map(String::as_str) == Some("-O")
}

/// Lines end in `\n` as a real pipe delivers them. The exit marker is
/// printed with `printf` and has none.
fn terminated(line: &str) -> String {
    if line.starts_with(SENTINEL_PREFIX) {
        line.to_string()
    } else {
        format!("{line}\n")
    }
}

pub struct ScriptedHandle {
    exit_code: i32,
    hang: bool,
    stdin: Arc<Mutex<Vec<Vec<u8>>>>,
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    type EventStream = BoxStream<'static, ProcessEvent>;
    type Handle = ScriptedHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let script = (self.responder)(&command);
        self.launched.lock().unwrap().push(command);

        let mut events = vec![ProcessEvent::new(ProcessEventType::Started { pid: 4242 })];
        events.extend(script.stdout.iter().map(|line| ProcessEvent::stdout(terminated(line))));
        events.extend(script.stderr.iter().map(|line| ProcessEvent::stderr(terminated(line))));

        let events = if script.hang {
            stream::iter(events).chain(stream::pending()).boxed()
        } else {
            stream::iter(events).boxed()
        };

        let handle = ScriptedHandle {
            exit_code: script.exit_code,
            hang: script.hang,
            stdin: self.stdin.clone(),
            killed: self.killed.clone(),
        };
        Ok((events, handle))
    }
}

#[async_trait]
impl ProcessHandle for ScriptedHandle {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<()> {
        self.stdin.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn close_stdin(&mut self) {}

    async fn wait(&mut self) -> Result<ExitStatus> {
        if self.hang {
            futures::future::pending::<()>().await;
        }
        Ok(ExitStatus::from_code(self.exit_code))
    }

    async fn kill(&mut self) -> Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that remembers every line it is given
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(String, StreamKind, String)>>,
    pub debug: bool,
    pub very_verbose: bool,
}

impl RecordingSink {
    pub fn debug() -> Arc<Self> {
        Arc::new(Self {
            debug: true,
            very_verbose: true,
            ..Self::default()
        })
    }

    pub fn quiet() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<(String, StreamKind, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, _, text)| text).collect()
    }
}

impl OutputSink for RecordingSink {
    fn write_line(&self, host: &str, stream: StreamKind, text: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((host.to_string(), stream, text.to_string()));
    }

    fn is_debug(&self) -> bool {
        self.debug
    }

    fn is_very_verbose(&self) -> bool {
        self.very_verbose
    }
}

/// Manager with control paths under a fixed fake home
pub fn mux(default_enabled: bool) -> MuxManager {
    MuxManager::new(ControlPathResolver::new("/home/deploy"), default_enabled)
}
