// Shared fakes for core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use tokio::time::Instant;

use relayguard_core::{
    CommandResult, Device, DeviceApi, ProbeFailure, RelayAction, StatusRecord,
};

/// One scripted vendor answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Online,
    Offline,
    RateLimited,
    Timeout,
}

impl Reply {
    fn record(self) -> StatusRecord {
        let now = Utc::now();
        match self {
            Self::Online => StatusRecord::online(Some("10.0.0.5".into()), now),
            Self::Offline => StatusRecord::offline(now),
            Self::RateLimited => StatusRecord::failed(ProbeFailure::RateLimited, now),
            Self::Timeout => StatusRecord::failed(ProbeFailure::Timeout, now),
        }
    }
}

/// `DeviceApi` fake answering from per-device scripts.
pub struct ScriptedApi {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    latency: Duration,
    command_result: CommandResult,
    probes: Mutex<Vec<(String, Instant)>>,
    commands: Mutex<Vec<(String, RelayAction)>>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self {
            scripts: Mutex::default(),
            fallback: Reply::Online,
            latency: Duration::ZERO,
            command_result: CommandResult::success("door opened"),
            probes: Mutex::default(),
            commands: Mutex::default(),
        }
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, device_id: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(device_id.to_owned(), replies.into_iter().collect());
        self
    }

    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn command_result(mut self, result: CommandResult) -> Self {
        self.command_result = result;
        self
    }

    pub fn probes(&self) -> Vec<(String, Instant)> {
        self.probes.lock().unwrap().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<(String, RelayAction)> {
        self.commands.lock().unwrap().clone()
    }

    fn next_reply(&self, device_id: &str) -> Reply {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(device_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback)
    }
}

impl DeviceApi for ScriptedApi {
    async fn query_status(&self, device: &Device) -> StatusRecord {
        self.probes
            .lock()
            .unwrap()
            .push((device.id.clone(), Instant::now()));
        let reply = self.next_reply(&device.id);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        reply.record()
    }

    async fn send_command(&self, device: &Device, action: RelayAction) -> CommandResult {
        self.commands
            .lock()
            .unwrap()
            .push((device.id.clone(), action));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.command_result.clone()
    }
}

pub fn device(id: &str) -> Device {
    Device::new(
        id,
        "https://cloud.example",
        format!("vendor-{id}"),
        SecretString::from("secret-key".to_owned()),
    )
}
