//! Test doubles for the bus and command seams

use crate::bus::{BusFacade, PropertyStream, ResolveError};
use crate::executor::{CommandError, CommandExecutor, CommandOutput};
use crate::types::PropertyChange;
use async_trait::async_trait;
use futures::channel::mpsc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `lsmod` output with the default module loaded
pub const LSMOD_WITH_ATH6KL: &str = "\
Module                  Size  Used by
ath6kl_sdio            45056  0
ath6kl_core           294912  1 ath6kl_sdio
mac80211              901120  0
cfg80211              995328  2 ath6kl_core,mac80211
";

/// Ordered record of calls made against a fake
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Exit { code: i32, stdout: String, stderr: String },
    Missing,
}

/// Executor that records every call and answers from a script
pub struct FakeExecutor {
    calls: CallLog,
    script: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
}

impl FakeExecutor {
    /// rmmod and modprobe succeed, lsmod lists the default module
    pub fn healthy() -> Self {
        let mut script = HashMap::new();
        script.insert("rmmod".to_string(), exit(0, "", ""));
        script.insert("modprobe".to_string(), exit(0, "", ""));
        script.insert("lsmod".to_string(), exit(0, LSMOD_WITH_ATH6KL, ""));
        Self {
            calls: CallLog::default(),
            script,
            delays: HashMap::new(),
        }
    }

    /// `program` exits 1 with `stderr`
    pub fn fail(mut self, program: &str, stderr: &str) -> Self {
        self.script.insert(program.to_string(), exit(1, "", stderr));
        self
    }

    /// `program` cannot be spawned
    pub fn missing(mut self, program: &str) -> Self {
        self.script.insert(program.to_string(), Scripted::Missing);
        self
    }

    /// `lsmod` succeeds with `stdout`
    pub fn lsmod_output(mut self, stdout: &str) -> Self {
        self.script.insert("lsmod".to_string(), exit(0, stdout, ""));
        self
    }

    /// `program` takes `delay` to finish
    pub fn delay(mut self, program: &str, delay: Duration) -> Self {
        self.delays.insert(program.to_string(), delay);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> Scripted {
    Scripted::Exit {
        code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        if args.is_empty() {
            self.calls.push(program.to_string());
        } else {
            self.calls.push(format!("{} {}", program, args.join(" ")));
        }

        if let Some(delay) = self.delays.get(program) {
            tokio::time::sleep(*delay).await;
        }

        match self.script.get(program) {
            Some(Scripted::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(CommandOutput {
                code: Some(*code),
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            }),
            Some(Scripted::Missing) | None => Err(CommandError::SpawnFailed {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

/// Bus with scripted interface paths and hand-fed signal streams
pub struct FakeBus {
    calls: CallLog,
    interfaces: Mutex<HashMap<String, VecDeque<String>>>,
    ssid: Result<Option<String>, ()>,
    feeds: Mutex<HashMap<String, VecDeque<mpsc::UnboundedReceiver<PropertyChange>>>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            interfaces: Mutex::new(HashMap::new()),
            ssid: Ok(None),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_interface(self, name: &str, path: &str) -> Self {
        self.set_interface(name, path);
        self
    }

    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = Ok(Some(ssid.to_string()));
        self
    }

    pub fn with_ssid_error(mut self) -> Self {
        self.ssid = Err(());
        self
    }

    /// Path reported for `name` once every earlier path has been handed out
    pub fn then_interface(self, name: &str, path: &str) -> Self {
        self.interfaces
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(path.to_string());
        self
    }

    /// Change the path wpa_supplicant reports for `name`
    pub fn set_interface(&self, name: &str, path: &str) {
        self.interfaces
            .lock()
            .unwrap()
            .insert(name.to_string(), VecDeque::from([path.to_string()]));
    }

    /// Sender for the next subscription made on `path`
    ///
    /// Subscriptions without a queued feed never yield.
    pub fn feed(&self, path: &str) -> mpsc::UnboundedSender<PropertyChange> {
        let (tx, rx) = mpsc::unbounded();
        self.feeds
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl BusFacade for FakeBus {
    async fn interface_path(&self, interface: &str) -> Result<String, ResolveError> {
        self.calls.push(format!("resolve {}", interface));
        let mut interfaces = self.interfaces.lock().unwrap();
        let paths = interfaces
            .get_mut(interface)
            .ok_or_else(|| ResolveError::NotRegistered(interface.to_string()))?;

        // The last path sticks
        let path = if paths.len() > 1 {
            paths.pop_front()
        } else {
            paths.front().cloned()
        };
        path.ok_or_else(|| ResolveError::NotRegistered(interface.to_string()))
    }

    async fn current_ssid(&self, _path: &str) -> zbus::Result<Option<String>> {
        self.ssid
            .clone()
            .map_err(|_| zbus::Error::Failure("no current network".to_string()))
    }

    async fn properties_changed(&self, path: &str) -> zbus::Result<PropertyStream> {
        self.calls.push(format!("subscribe {}", path));
        let feed = self
            .feeds
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        Ok(match feed {
            Some(rx) => Box::pin(rx),
            None => Box::pin(futures::stream::pending()),
        })
    }
}
