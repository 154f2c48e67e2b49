//! In-memory sessions answering from a per-host script.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use fabric_device::{DeviceError, DeviceResult, DeviceTarget, Transport, TransportFactory};
use tracing::trace;

const EMPTY_DATA: &str = "<rpc-reply><data/></rpc-reply>";
const OK_REPLY: &str = "<ok/>";
const EMPTY_REPLY: &str = "<rpc-reply/>";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Request kinds a session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Login,
    GetConfig,
    EditConfig,
    Rpc,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub body: String,
}

/// How a scripted request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    NotAuthorized,
    /// A structured `rpc-error` carrying this message.
    Protocol(String),
    /// A connection-level failure.
    Transport(String),
}

impl Failure {
    fn to_error(&self, host: &str) -> DeviceError {
        match self {
            Failure::NotAuthorized => DeviceError::NotAuthorized,
            Failure::Protocol(message) => DeviceError::protocol(message.clone()),
            Failure::Transport(message) => DeviceError::transport(host, message.clone()),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(String),
}

impl Matcher {
    fn matches(&self, body: &str) -> bool {
        match self {
            Matcher::Exact(expected) => body == expected,
            Matcher::Contains(needle) => body.contains(needle.as_str()),
        }
    }

    fn same(&self, other: &Matcher) -> bool {
        match (self, other) {
            (Matcher::Exact(a), Matcher::Exact(b)) => a == b,
            (Matcher::Contains(a), Matcher::Contains(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RequestKind,
    matcher: Matcher,
    /// Consumed front to back; the last outcome repeats.
    outcomes: VecDeque<Result<String, Failure>>,
}

impl Rule {
    fn next(&mut self) -> Option<Result<String, Failure>> {
        if self.outcomes.len() > 1 {
            self.outcomes.pop_front()
        } else {
            self.outcomes.front().cloned()
        }
    }
}

/// What one device answers.
///
/// Requests no rule matches succeed with an empty data reply, `<ok/>` for
/// edits. Rules for the same request queue up, so a poll can see the device
/// change between attempts.
#[derive(Debug, Clone, Default)]
pub struct DeviceScript {
    rules: Vec<Rule>,
    login_failure: Option<Failure>,
    connect_failure: Option<Failure>,
    delay: Duration,
}

impl DeviceScript {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, kind: RequestKind, matcher: Matcher, outcome: Result<String, Failure>) -> Self {
        match self
            .rules
            .iter_mut()
            .find(|rule| rule.kind == kind && rule.matcher.same(&matcher))
        {
            Some(rule) => rule.outcomes.push_back(outcome),
            None => self.rules.push(Rule {
                kind,
                matcher,
                outcomes: VecDeque::from([outcome]),
            }),
        }
        self
    }

    /// Answers `get-config` for exactly this filter.
    pub fn on_get(self, filter: &str, reply: impl Into<String>) -> Self {
        self.push(
            RequestKind::GetConfig,
            Matcher::Exact(filter.to_string()),
            Ok(reply.into()),
        )
    }

    /// Answers any RPC containing `needle`.
    pub fn on_rpc(self, needle: &str, reply: impl Into<String>) -> Self {
        self.push(
            RequestKind::Rpc,
            Matcher::Contains(needle.to_string()),
            Ok(reply.into()),
        )
    }

    pub fn fail_get(self, filter: &str, failure: Failure) -> Self {
        self.push(
            RequestKind::GetConfig,
            Matcher::Exact(filter.to_string()),
            Err(failure),
        )
    }

    /// Fails any edit whose fragment contains `needle`.
    pub fn fail_edit(self, needle: &str, failure: Failure) -> Self {
        self.push(
            RequestKind::EditConfig,
            Matcher::Contains(needle.to_string()),
            Err(failure),
        )
    }

    pub fn fail_rpc(self, needle: &str, failure: Failure) -> Self {
        self.push(
            RequestKind::Rpc,
            Matcher::Contains(needle.to_string()),
            Err(failure),
        )
    }

    pub fn fail_login(mut self, failure: Failure) -> Self {
        self.login_failure = Some(failure);
        self
    }

    pub fn fail_connect(mut self, failure: Failure) -> Self {
        self.connect_failure = Some(failure);
        self
    }

    /// Sleeps before answering every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn answer(&mut self, kind: RequestKind, body: &str) -> Option<Result<String, Failure>> {
        self.rules
            .iter_mut()
            .find(|rule| rule.kind == kind && rule.matcher.matches(body))
            .and_then(Rule::next)
    }
}

/// Every request a host received, across all of its sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl SessionLog {
    fn record(&self, kind: RequestKind, body: &str) {
        lock(&self.requests).push(RecordedRequest {
            kind,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn bodies(&self, kind: RequestKind) -> Vec<String> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.body.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.bodies(RequestKind::EditConfig)
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        lock(&self.requests).iter().filter(|r| r.kind == kind).count()
    }

    /// True once every login was matched by a close.
    pub fn is_closed(&self) -> bool {
        let logins = self.count(RequestKind::Login);
        logins > 0 && self.count(RequestKind::Close) >= logins
    }
}

/// A session bound to one host's script and log.
#[derive(Debug)]
pub struct ScriptedTransport {
    host: String,
    script: Arc<Mutex<DeviceScript>>,
    log: SessionLog,
}

impl ScriptedTransport {
    pub fn new(host: impl Into<String>, script: DeviceScript) -> Self {
        Self {
            host: host.into(),
            script: Arc::new(Mutex::new(script)),
            log: SessionLog::default(),
        }
    }

    pub fn log(&self) -> SessionLog {
        self.log.clone()
    }

    async fn request(&mut self, kind: RequestKind, body: &str, default: &str) -> DeviceResult<String> {
        self.log.record(kind, body);
        let (delay, outcome) = {
            let mut script = lock(&self.script);
            (script.delay, script.answer(kind, body))
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        trace!(host = %self.host, ?kind, "Scripted request");
        match outcome {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(failure)) => Err(failure.to_error(&self.host)),
            None => Ok(default.to_string()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn host(&self) -> &str {
        &self.host
    }

    async fn login(&mut self) -> DeviceResult<()> {
        self.log.record(RequestKind::Login, "");
        let (delay, failure) = {
            let script = lock(&self.script);
            (script.delay, script.login_failure.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(failure) => Err(failure.to_error(&self.host)),
            None => Ok(()),
        }
    }

    async fn get_config(&mut self, filter: &str) -> DeviceResult<String> {
        self.request(RequestKind::GetConfig, filter, EMPTY_DATA).await
    }

    async fn edit_config(&mut self, fragment: &str) -> DeviceResult<String> {
        self.request(RequestKind::EditConfig, fragment, OK_REPLY).await
    }

    async fn execute_rpc(&mut self, request: &str) -> DeviceResult<String> {
        self.request(RequestKind::Rpc, request, EMPTY_REPLY).await
    }

    async fn close(&mut self) -> DeviceResult<()> {
        self.log.record(RequestKind::Close, "");
        Ok(())
    }
}

/// Hands out scripted sessions by host.
///
/// Hosts without a script get the empty default one, so every device in a
/// fan-out connects.
#[derive(Debug, Default)]
pub struct ScriptedTransportFactory {
    scripts: Mutex<HashMap<String, Arc<Mutex<DeviceScript>>>>,
    logs: Mutex<HashMap<String, SessionLog>>,
}

impl ScriptedTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, host: impl Into<String>, script: DeviceScript) -> Self {
        lock(&self.scripts).insert(host.into(), Arc::new(Mutex::new(script)));
        self
    }

    /// The request log of `host`, empty if it never connected.
    pub fn log(&self, host: &str) -> SessionLog {
        lock(&self.logs).entry(host.to_string()).or_default().clone()
    }

    /// Hosts that were asked to connect, sorted.
    pub fn connected_hosts(&self) -> Vec<String> {
        let logs = lock(&self.logs);
        let mut hosts: Vec<String> = logs
            .iter()
            .filter(|(_, log)| !lock(&log.requests).is_empty())
            .map(|(host, _)| host.clone())
            .collect();
        hosts.sort();
        hosts
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn connect(&self, target: &DeviceTarget) -> DeviceResult<Box<dyn Transport>> {
        let script = Arc::clone(
            lock(&self.scripts)
                .entry(target.host.clone())
                .or_default(),
        );
        if let Some(failure) = lock(&script).connect_failure.clone() {
            return Err(failure.to_error(&target.host));
        }
        Ok(Box::new(ScriptedTransport {
            host: target.host.clone(),
            script,
            log: self.log(&target.host),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_device::Role;

    #[tokio::test]
    async fn test_rules_queue_and_repeat_last() {
        let script = DeviceScript::new()
            .on_rpc("show-cluster", "<first/>")
            .on_rpc("show-cluster", "<second/>");
        let mut transport = ScriptedTransport::new("10.0.0.1", script);

        assert_eq!(transport.execute_rpc("<show-cluster/>").await.unwrap(), "<first/>");
        assert_eq!(transport.execute_rpc("<show-cluster/>").await.unwrap(), "<second/>");
        assert_eq!(transport.execute_rpc("<show-cluster/>").await.unwrap(), "<second/>");
        assert_eq!(transport.execute_rpc("<other/>").await.unwrap(), EMPTY_REPLY);
        assert_eq!(transport.log().count(RequestKind::Rpc), 4);
    }

    #[tokio::test]
    async fn test_failures_map_to_device_errors() {
        let script = DeviceScript::new()
            .fail_edit("router-bgp", Failure::Protocol("%Error: bad AS".into()))
            .fail_login(Failure::NotAuthorized);
        let mut transport = ScriptedTransport::new("10.0.0.1", script);

        assert!(matches!(transport.login().await, Err(DeviceError::NotAuthorized)));
        let err = transport.edit_config("<router-bgp/>").await.unwrap_err();
        assert_eq!(err.to_string(), "%Error: bad AS");
        assert_eq!(transport.edit_config("<loopback/>").await.unwrap(), OK_REPLY);
    }

    #[test]
    fn test_factory_logs_per_host() {
        let factory = ScriptedTransportFactory::new().with_device(
            "10.0.0.2",
            DeviceScript::new().fail_connect(Failure::Transport("connection refused".into())),
        );
        let ok = DeviceTarget::new("10.0.0.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let refused = DeviceTarget::new("10.0.0.2", "admin", "pw", "4000_18r.1.01a", Role::Spine);

        assert!(factory.connect(&ok).is_ok());
        assert!(factory.connect(&refused).is_err());
        assert!(factory.connected_hosts().is_empty());
    }
}
