//! NETCONF 1.0 session over an SSH subsystem child process.
//!
//! The session spawns the configured ssh client with `-s <host> netconf`,
//! exchanges hellos, and frames every message with `]]>]]>`. Passwords are
//! handed to the client through the `SSHPASS` environment variable, so an
//! `ssh_command` of `sshpass -e ssh` gives non-interactive password logins.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::error::{DeviceError, DeviceResult};
use crate::target::DeviceTarget;
use crate::transport::{
    build_edit_config, build_get_config, classify_reply, Transport, TransportFactory,
};

/// End-of-message marker for NETCONF 1.0 framing.
pub const FRAME_DELIMITER: &str = "]]>]]>";

const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

static MESSAGE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(?:\w+:)?rpc-reply\b[^>]*\bmessage-id="(\d+)""#).expect("Invalid regex pattern")
});

/// Session parameters shared by every device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetconfSettings {
    pub port: u16,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Program and leading arguments of the ssh client.
    pub ssh_command: Vec<String>,
}

impl Default for NetconfSettings {
    fn default() -> Self {
        Self {
            port: 830,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            ssh_command: vec!["ssh".to_string()],
        }
    }
}

/// Builds the client hello message.
pub fn build_hello() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><hello xmlns=\"{}\"><capabilities>\
         <capability>urn:ietf:params:netconf:base:1.0</capability></capabilities></hello>{}",
        NETCONF_BASE_NS, FRAME_DELIMITER
    )
}

/// Wraps an operation body in a framed `<rpc>` envelope.
pub fn build_rpc(message_id: u64, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rpc message-id=\"{}\" xmlns=\"{}\">{}</rpc>{}",
        message_id, NETCONF_BASE_NS, body, FRAME_DELIMITER
    )
}

/// Splits the first complete message off `buf`.
///
/// Returns the trimmed message and the number of bytes it consumed,
/// delimiter included.
pub fn split_frame(buf: &[u8]) -> Option<(String, usize)> {
    let delimiter = FRAME_DELIMITER.as_bytes();
    let pos = buf
        .windows(delimiter.len())
        .position(|window| window == delimiter)?;
    let message = String::from_utf8_lossy(&buf[..pos]).trim().to_string();
    Some((message, pos + delimiter.len()))
}

/// The `message-id` of an `<rpc-reply>`, if it carries a numeric one.
pub fn reply_message_id(reply: &str) -> Option<u64> {
    MESSAGE_ID_RE
        .captures(reply)
        .and_then(|caps| caps[1].parse().ok())
}

/// A live NETCONF session with one switch.
pub struct NetconfSession {
    host: String,
    user: String,
    password: String,
    settings: NetconfSettings,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    pending: Vec<u8>,
    message_id: u64,
}

impl NetconfSession {
    pub fn new(target: &DeviceTarget, settings: NetconfSettings) -> Self {
        Self {
            host: target.host.clone(),
            user: target.user.clone(),
            password: target.password.clone(),
            settings,
            child: None,
            stdin: None,
            stdout: None,
            pending: Vec::new(),
            message_id: 0,
        }
    }

    fn spawn(&self) -> DeviceResult<Child> {
        let (program, leading) = self
            .settings
            .ssh_command
            .split_first()
            .ok_or_else(|| DeviceError::invalid_param("ssh_command", "must not be empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg("-p")
            .arg(self.settings.port.to_string())
            .arg("-l")
            .arg(&self.user)
            .arg("-s")
            .arg(&self.host)
            .arg("netconf")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if !self.password.is_empty() {
            cmd.env("SSHPASS", &self.password);
        }

        cmd.spawn()
            .map_err(|e| DeviceError::login(self.host.clone(), e.to_string()))
    }

    async fn write_message(&mut self, message: &str) -> DeviceResult<()> {
        let host = self.host.clone();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DeviceError::transport(host.clone(), "session is not open"))?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| DeviceError::io(host.clone(), e))?;
        stdin.flush().await.map_err(|e| DeviceError::io(host, e))
    }

    async fn read_message(&mut self) -> DeviceResult<String> {
        let host = self.host.clone();
        let mut chunk = [0u8; 8192];
        loop {
            if let Some((message, consumed)) = split_frame(&self.pending) {
                self.pending.drain(..consumed);
                return Ok(message);
            }
            let stdout = self
                .stdout
                .as_mut()
                .ok_or_else(|| DeviceError::transport(host.clone(), "session is not open"))?;
            let n = stdout
                .read(&mut chunk)
                .await
                .map_err(|e| DeviceError::io(host.clone(), e))?;
            if n == 0 {
                return Err(DeviceError::transport(host, "session closed by peer"));
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Reads until the reply to `message_id`, dropping late replies to
    /// requests that already timed out.
    async fn read_reply(&mut self, message_id: u64) -> DeviceResult<String> {
        loop {
            let reply = self.read_message().await?;
            match reply_message_id(&reply) {
                Some(id) if id < message_id => {
                    debug!(host = %self.host, stale = id, message_id, "Discarding late reply");
                }
                _ => return Ok(reply),
            }
        }
    }

    /// Drops the pipes so every later request fails with a transport error.
    fn abandon(&mut self) {
        warn!(host = %self.host, "Request was cut off mid-write, abandoning session");
        self.stdin = None;
        self.stdout = None;
        self.pending.clear();
    }

    async fn exchange(&mut self, operation: &str, body: &str) -> DeviceResult<String> {
        self.message_id += 1;
        let message_id = self.message_id;
        let request = build_rpc(message_id, body);
        debug!(host = %self.host, message_id, operation, "Sending rpc");

        let timeout = self.settings.request_timeout;
        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.write_message(&request)).await {
            Ok(written) => written?,
            Err(_) => {
                // A half-written request leaves the peer's framing unusable.
                self.abandon();
                return Err(DeviceError::timeout(operation, timeout));
            }
        }

        let reply = tokio::time::timeout_at(deadline, self.read_reply(message_id))
            .await
            .map_err(|_| DeviceError::timeout(operation, timeout))??;

        classify_reply(&reply)?;
        Ok(reply)
    }
}

#[async_trait]
impl Transport for NetconfSession {
    fn host(&self) -> &str {
        &self.host
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn login(&mut self) -> DeviceResult<()> {
        let mut child = self.spawn()?;
        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.child = Some(child);

        let timeout = self.settings.connect_timeout;
        let server_hello = tokio::time::timeout(timeout, self.read_message())
            .await
            .map_err(|_| DeviceError::login(self.host.clone(), "timed out waiting for hello"))?
            .map_err(|e| DeviceError::login(self.host.clone(), e.to_string()))?;
        if !server_hello.contains("hello") {
            return Err(DeviceError::login(
                self.host.clone(),
                "peer did not send a NETCONF hello",
            ));
        }

        self.write_message(&build_hello()).await?;
        debug!("NETCONF session established");
        Ok(())
    }

    async fn get_config(&mut self, filter: &str) -> DeviceResult<String> {
        self.exchange("get-config", &build_get_config(filter)).await
    }

    async fn edit_config(&mut self, fragment: &str) -> DeviceResult<String> {
        self.exchange("edit-config", &build_edit_config(fragment))
            .await
    }

    async fn execute_rpc(&mut self, request: &str) -> DeviceResult<String> {
        self.exchange("rpc", request).await
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn close(&mut self) -> DeviceResult<()> {
        if self.stdin.is_some() {
            if let Err(e) = self.exchange("close-session", "<close-session/>").await {
                debug!(error = %e, "close-session was not acknowledged");
            }
        }
        self.stdin = None;
        self.stdout = None;
        self.pending.clear();

        if let Some(mut child) = self.child.take() {
            let waited = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            if waited.is_err() {
                warn!("ssh client did not exit, killing it");
                child
                    .kill()
                    .await
                    .map_err(|e| DeviceError::io(self.host.clone(), e))?;
            }
        }
        Ok(())
    }
}

/// Opens [`NetconfSession`]s with shared settings.
#[derive(Debug, Clone, Default)]
pub struct NetconfTransportFactory {
    settings: NetconfSettings,
}

impl NetconfTransportFactory {
    pub fn new(settings: NetconfSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NetconfSettings {
        &self.settings
    }
}

impl TransportFactory for NetconfTransportFactory {
    fn connect(&self, target: &DeviceTarget) -> DeviceResult<Box<dyn Transport>> {
        Ok(Box::new(NetconfSession::new(target, self.settings.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_frame_waits_for_delimiter() {
        assert_eq!(split_frame(b"<hello/>"), None);
        assert_eq!(split_frame(b"<hello/>]]>]]"), None);
    }

    #[test]
    fn test_split_frame_keeps_remainder() {
        let buf = b"  <hello/>\n]]>]]><rpc-reply>";
        let (message, consumed) = split_frame(buf).unwrap();
        assert_eq!(message, "<hello/>");
        assert_eq!(&buf[consumed..], b"<rpc-reply>");
    }

    #[test]
    fn test_build_rpc() {
        let rpc = build_rpc(7, "<get/>");
        assert!(rpc.contains("message-id=\"7\""));
        assert!(rpc.contains("<get/></rpc>"));
        assert!(rpc.ends_with(FRAME_DELIMITER));
    }

    #[test]
    fn test_hello_is_framed() {
        let hello = build_hello();
        assert!(hello.contains("urn:ietf:params:netconf:base:1.0"));
        assert!(hello.ends_with(FRAME_DELIMITER));
    }

    #[test]
    fn test_factory_creates_unopened_session() {
        let factory = NetconfTransportFactory::default();
        let target = DeviceTarget::new("10.0.0.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let session = factory.connect(&target).unwrap();
        assert_eq!(session.host(), "10.0.0.1");
        assert_eq!(factory.settings().port, 830);
    }

    #[tokio::test]
    async fn test_requests_fail_before_login() {
        let target = DeviceTarget::new("10.0.0.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let mut session = NetconfSession::new(&target, NetconfSettings::default());
        let err = session.get_config("/").await.unwrap_err();
        assert!(matches!(err, DeviceError::Transport { .. }));
    }

    #[test]
    fn test_reply_message_id() {
        assert_eq!(
            reply_message_id(r#"<rpc-reply message-id="12" xmlns="urn:x"><ok/></rpc-reply>"#),
            Some(12)
        );
        assert_eq!(
            reply_message_id(r#"<nc:rpc-reply xmlns:nc="urn:x" message-id="3"><ok/></nc:rpc-reply>"#),
            Some(3)
        );
        assert_eq!(reply_message_id("<rpc-reply><ok/></rpc-reply>"), None);
        assert_eq!(reply_message_id("<hello/>"), None);
    }

    fn scripted_server(script: &str, request_timeout: Duration) -> NetconfSession {
        let target = DeviceTarget::new("10.0.0.1", "admin", "", "4000_18r.1.01a", Role::Spine);
        let settings = NetconfSettings {
            request_timeout,
            // The remaining ssh arguments land in $1.. and are ignored.
            ssh_command: vec!["sh".into(), "-c".into(), script.into(), "sh".into()],
            ..NetconfSettings::default()
        };
        NetconfSession::new(&target, settings)
    }

    #[tokio::test]
    async fn test_late_reply_is_not_taken_for_the_next_one() {
        // Answers request 1 only after it has timed out, then request 2.
        let script = r#"printf '<hello/>]]>]]>'
sleep 1
printf '<rpc-reply message-id="1"><data>late</data></rpc-reply>]]>]]>'
printf '<rpc-reply message-id="2"><data>fresh</data></rpc-reply>]]>]]>'
sleep 5"#;
        let mut session = scripted_server(script, Duration::from_millis(700));
        session.login().await.unwrap();

        let err = session.get_config("/b").await.unwrap_err();
        assert!(matches!(err, DeviceError::Timeout { .. }), "{err:?}");

        let reply = session.get_config("/c").await.unwrap();
        assert!(reply.contains("fresh"), "{reply}");
        assert!(!reply.contains("late"));
    }

    #[tokio::test]
    async fn test_abandoned_session_fails_with_transport() {
        let target = DeviceTarget::new("10.0.0.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let mut session = NetconfSession::new(&target, NetconfSettings::default());
        session.abandon();
        assert!(matches!(
            session.execute_rpc("<x/>").await,
            Err(DeviceError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_with_empty_command_is_rejected() {
        let target = DeviceTarget::new("10.0.0.1", "admin", "", "4000_18r.1.01a", Role::Spine);
        let settings = NetconfSettings {
            ssh_command: Vec::new(),
            ..NetconfSettings::default()
        };
        let mut session = NetconfSession::new(&target, settings);
        assert!(matches!(
            session.login().await,
            Err(DeviceError::InvalidParam { .. })
        ));
    }
}
