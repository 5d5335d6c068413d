// ABOUTME: Scripted SSH connector, remote host, and HTTP probe.
// ABOUTME: Each host shares one journal so tests can inspect commands across connections.

use async_trait::async_trait;
use ephemeron::deploy::{Connector, HealthProbe, RemoteHost};
use ephemeron::ssh::{self, CommandOutput};
use parking_lot::Mutex;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CLOUD_INIT_TEXT: &str = "Cloud-init v. 22.2.2 finished\n";
pub const DEPLOYMENT_LOG_TEXT: &str = "BUILD SUCCESSFUL in 41s\n";

/// How the scripted host answers.
#[derive(Debug, Clone)]
pub struct HostScript {
    /// Exit status of the payload command.
    pub payload_exit: u32,
    pub artifact_present: bool,
    /// Panic while the payload runs.
    pub panic_on_payload: bool,
    /// Never return from the payload command.
    pub hang_on_payload: bool,
    pub logs_present: bool,
}

impl Default for HostScript {
    fn default() -> Self {
        Self {
            payload_exit: 0,
            artifact_present: true,
            panic_on_payload: false,
            hang_on_payload: false,
            logs_present: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    pub connects: Vec<(IpAddr, PathBuf)>,
    /// Whether the credential file existed when each connection was opened.
    pub credential_present: Vec<bool>,
    pub commands: Vec<String>,
    pub uploads: Vec<(String, usize)>,
    pub disconnects: u32,
}

pub struct FakeConnector {
    script: Arc<HostScript>,
    refuse: Option<String>,
    journal: Arc<Mutex<Journal>>,
}

impl FakeConnector {
    pub fn new(script: HostScript) -> Self {
        Self {
            script: Arc::new(script),
            refuse: None,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    /// Every connection attempt fails with `reason`.
    pub fn refusing(reason: &str) -> Self {
        Self {
            refuse: Some(reason.to_string()),
            ..Self::new(HostScript::default())
        }
    }

    pub fn journal(&self) -> parking_lot::MutexGuard<'_, Journal> {
        self.journal.lock()
    }

    pub fn payload_commands(&self) -> Vec<String> {
        self.journal()
            .commands
            .iter()
            .filter(|c| is_payload(c))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        address: IpAddr,
        credential: &Path,
        _known_hosts: &Path,
    ) -> ssh::Result<Box<dyn RemoteHost>> {
        {
            let mut journal = self.journal.lock();
            journal.connects.push((address, credential.to_path_buf()));
            journal.credential_present.push(credential.exists());
        }
        if let Some(reason) = &self.refuse {
            return Err(ssh::Error::Connection(reason.clone()));
        }
        Ok(Box::new(FakeHost {
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct FakeHost {
    script: Arc<HostScript>,
    journal: Arc<Mutex<Journal>>,
}

fn is_payload(command: &str) -> bool {
    command.contains("--target-dir")
}

fn output(exit_code: u32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl RemoteHost for FakeHost {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        self.journal.lock().commands.push(command.to_string());

        if is_payload(command) {
            if self.script.panic_on_payload {
                panic!("payload runner exploded");
            }
            if self.script.hang_on_payload {
                return std::future::pending().await;
            }
            return Ok(output(self.script.payload_exit, "", ""));
        }
        if command.contains("test -f") {
            return Ok(output(u32::from(!self.script.artifact_present), "", ""));
        }
        if command.contains("cloud-init-output.log") {
            return Ok(if self.script.logs_present {
                output(0, CLOUD_INIT_TEXT, "")
            } else {
                output(1, "", "cat: /var/log/cloud-init-output.log: No such file or directory")
            });
        }
        if command.starts_with("cat ") {
            return Ok(if self.script.logs_present {
                output(0, DEPLOYMENT_LOG_TEXT, "")
            } else {
                output(1, "", "cat: deploy/deployment.log: No such file or directory")
            });
        }
        Ok(output(0, "", ""))
    }

    async fn upload(&self, remote_path: &str, contents: &[u8]) -> ssh::Result<()> {
        self.journal
            .lock()
            .uploads
            .push((remote_path.to_string(), contents.len()));
        Ok(())
    }

    async fn disconnect(&self) -> ssh::Result<()> {
        self.journal.lock().disconnects += 1;
        Ok(())
    }
}

/// Answers every path with the same status, optionally only from a given attempt on.
pub struct FakeProbe {
    status: u16,
    healthy_from: Option<u32>,
    requests: Mutex<Vec<(SocketAddr, String)>>,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self {
            status: 200,
            healthy_from: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(status: u16) -> Self {
        Self {
            status,
            ..Self::healthy()
        }
    }

    /// 503 until the `attempt`-th request, 200 afterwards.
    pub fn healthy_from(attempt: u32) -> Self {
        Self {
            status: 503,
            healthy_from: Some(attempt),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(SocketAddr, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn get(&self, address: SocketAddr, path: &str) -> Result<u16, String> {
        let count = {
            let mut requests = self.requests.lock();
            requests.push((address, path.to_string()));
            requests.len() as u32
        };
        match self.healthy_from {
            Some(from) if count >= from => Ok(200),
            _ => Ok(self.status),
        }
    }
}
