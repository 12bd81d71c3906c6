//! Scheduler daemon protocol.
//!
//! The daemon owns the actual enqueueing of work. This module only sends it
//! submit/cancel requests and classifies the replies. Requests are issued one
//! at a time from the caller's task; there is no internal timeout, so callers
//! that need one should wrap the call in `tokio::time::timeout`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DaemonConfig;
use crate::error::{Result, ScheduleError};
use crate::logging::OpTimer;

/// Prefix the daemon side uses for replies that report a connection failure.
pub const CONNECTION_FAILURE_SENTINEL: &str = "Exception while connecting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    CreateTaskSchedule,
    CancelTaskSchedule,
}

/// Wire message sent to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub request_type: RequestType,
    /// Schedule id.
    pub request_content: String,
}

impl DaemonRequest {
    pub fn submit(schedule_id: &str) -> Self {
        Self {
            request_type: RequestType::CreateTaskSchedule,
            request_content: schedule_id.to_string(),
        }
    }

    pub fn cancel(schedule_id: &str) -> Self {
        Self {
            request_type: RequestType::CancelTaskSchedule,
            request_content: schedule_id.to_string(),
        }
    }
}

/// Moves a request to the daemon and brings back its reply text.
#[async_trait]
pub trait DaemonTransport: Send + Sync {
    /// Send one request. `Ok(None)` means the daemon replied with nothing.
    async fn send(&self, request: &DaemonRequest) -> anyhow::Result<Option<String>>;

    /// Where requests go, for error messages.
    fn endpoint(&self) -> String;
}

/// JSON over a Unix-domain stream socket; the reply is a single read.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    max_response_bytes: usize,
}

#[cfg(unix)]
impl UnixSocketTransport {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>, max_response_bytes: usize) -> Self {
        Self {
            socket_path: socket_path.into(),
            max_response_bytes,
        }
    }

    #[must_use]
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(&config.socket_path, config.max_response_bytes)
    }
}

#[cfg(unix)]
#[async_trait]
impl DaemonTransport for UnixSocketTransport {
    async fn send(&self, request: &DaemonRequest) -> anyhow::Result<Option<String>> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let payload = serde_json::to_vec(request)?;
        let mut stream = tokio::net::UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| {
                format!(
                    "{CONNECTION_FAILURE_SENTINEL} to socket {}",
                    self.socket_path.display()
                )
            })?;

        stream
            .write_all(&payload)
            .await
            .context("Failed to write request to scheduler socket")?;

        let mut buf = vec![0u8; self.max_response_bytes];
        let n = stream
            .read(&mut buf)
            .await
            .context("Failed to read reply from scheduler socket")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()))
    }

    fn endpoint(&self) -> String {
        self.socket_path.display().to_string()
    }
}

/// Sends submit/cancel requests and interprets the daemon's replies.
#[derive(Clone)]
pub struct SchedulerClient {
    transport: Arc<dyn DaemonTransport>,
}

impl std::fmt::Debug for SchedulerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerClient")
            .field("endpoint", &self.transport.endpoint())
            .finish()
    }
}

impl SchedulerClient {
    #[must_use]
    pub fn new(transport: Arc<dyn DaemonTransport>) -> Self {
        Self { transport }
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Ask the daemon to (re)load a schedule. The daemon upserts by id.
    ///
    /// Successful replies are returned verbatim for display.
    #[tracing::instrument(skip(self))]
    pub async fn submit(&self, schedule_id: &str) -> Result<String> {
        self.request(DaemonRequest::submit(schedule_id), "submit")
            .await
    }

    /// Ask the daemon to drop a schedule. Callers treat this as best-effort.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, schedule_id: &str) -> Result<String> {
        self.request(DaemonRequest::cancel(schedule_id), "cancel")
            .await
    }

    async fn request(&self, request: DaemonRequest, operation: &'static str) -> Result<String> {
        let timer = OpTimer::new("daemon", operation, request.request_content.clone());

        let result = match self.transport.send(&request).await {
            Ok(Some(text)) if text.trim().is_empty() => Err(ScheduleError::DaemonUnreachable {
                endpoint: self.transport.endpoint(),
            }),
            Ok(Some(text)) if text.starts_with(CONNECTION_FAILURE_SENTINEL) => {
                Err(ScheduleError::Daemon(text))
            }
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(ScheduleError::DaemonUnreachable {
                endpoint: self.transport.endpoint(),
            }),
            Err(e) => Err(ScheduleError::Daemon(format!("{e:#}"))),
        };

        timer.finish_with_result(result.as_ref());
        result
    }
}

/// How the in-memory daemon answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonReply {
    /// Reply with this text.
    Text(String),
    /// Reply with nothing.
    Silent,
    /// Fail in the transport, as if the socket were unreachable.
    TransportError(String),
}

/// In-process daemon stand-in for tests and dry runs.
///
/// Records every request and answers with a per-schedule scripted reply, or
/// an acknowledgement naming the schedule.
#[derive(Debug, Default)]
pub struct InMemoryDaemon {
    requests: parking_lot::Mutex<Vec<DaemonRequest>>,
    replies: parking_lot::RwLock<HashMap<String, DaemonReply>>,
}

impl InMemoryDaemon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the reply for every request about `schedule_id`.
    pub fn set_reply(&self, schedule_id: &str, reply: DaemonReply) {
        self.replies.write().insert(schedule_id.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<DaemonRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, schedule_id: &str) -> Vec<DaemonRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.request_content == schedule_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DaemonTransport for InMemoryDaemon {
    async fn send(&self, request: &DaemonRequest) -> anyhow::Result<Option<String>> {
        self.requests.lock().push(request.clone());

        let reply = self.replies.read().get(&request.request_content).cloned();
        match reply {
            Some(DaemonReply::Text(text)) => Ok(Some(text)),
            Some(DaemonReply::Silent) => Ok(None),
            Some(DaemonReply::TransportError(message)) => Err(anyhow::anyhow!(message)),
            None => {
                let verb = match request.request_type {
                    RequestType::CreateTaskSchedule => "scheduled",
                    RequestType::CancelTaskSchedule => "cancelled",
                };
                Ok(Some(format!(
                    "Task Schedule {} has been {verb}.",
                    request.request_content
                )))
            }
        }
    }

    fn endpoint(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(daemon: &Arc<InMemoryDaemon>) -> SchedulerClient {
        SchedulerClient::new(Arc::clone(daemon) as Arc<dyn DaemonTransport>)
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&DaemonRequest::submit("TS000001")).unwrap();
        assert_eq!(
            json,
            r#"{"request_type":"create_task_schedule","request_content":"TS000001"}"#
        );
        let json = serde_json::to_string(&DaemonRequest::cancel("TS000001")).unwrap();
        assert!(json.contains("cancel_task_schedule"));
    }

    #[tokio::test]
    async fn test_submit_passes_reply_through() {
        let daemon = Arc::new(InMemoryDaemon::new());
        daemon.set_reply("TS1", DaemonReply::Text("Loaded TS1 into RQ".into()));

        let reply = client(&daemon).submit("TS1").await.unwrap();
        assert_eq!(reply, "Loaded TS1 into RQ");
        assert_eq!(daemon.requests(), vec![DaemonRequest::submit("TS1")]);
    }

    #[tokio::test]
    async fn test_no_reply_is_unreachable() {
        let daemon = Arc::new(InMemoryDaemon::new());
        daemon.set_reply("TS1", DaemonReply::Silent);

        let err = client(&daemon).submit("TS1").await.unwrap_err();
        assert!(matches!(err, ScheduleError::DaemonUnreachable { .. }));

        daemon.set_reply("TS1", DaemonReply::Text("  \n".into()));
        let err = client(&daemon).submit("TS1").await.unwrap_err();
        assert!(matches!(err, ScheduleError::DaemonUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_sentinel_reply_is_daemon_error() {
        let daemon = Arc::new(InMemoryDaemon::new());
        let text = "Exception while connecting to socket: [Errno 111] Connection refused";
        daemon.set_reply("TS1", DaemonReply::Text(text.into()));

        let err = client(&daemon).submit("TS1").await.unwrap_err();
        match err {
            ScheduleError::Daemon(message) => assert_eq!(message, text),
            other => panic!("expected Daemon error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_daemon_error() {
        let daemon = Arc::new(InMemoryDaemon::new());
        daemon.set_reply("TS1", DaemonReply::TransportError("broken pipe".into()));

        let err = client(&daemon).cancel("TS1").await.unwrap_err();
        assert!(matches!(err, ScheduleError::Daemon(_)));
        assert_eq!(daemon.requests(), vec![DaemonRequest::cancel("TS1")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_round_trip() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            let request: DaemonRequest = serde_json::from_slice(&buf[..n]).unwrap();
            stream
                .write_all(format!("reloaded {}", request.request_content).as_bytes())
                .await
                .unwrap();
            request
        });

        let transport = UnixSocketTransport::new(&path, 4096);
        let reply = SchedulerClient::new(Arc::new(transport))
            .submit("TS000042")
            .await
            .unwrap();

        assert_eq!(reply, "reloaded TS000042");
        assert_eq!(server.await.unwrap(), DaemonRequest::submit("TS000042"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_missing_is_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = UnixSocketTransport::new(dir.path().join("absent.sock"), 4096);

        let err = SchedulerClient::new(Arc::new(transport))
            .submit("TS1")
            .await
            .unwrap_err();
        match err {
            ScheduleError::Daemon(message) => {
                assert!(message.starts_with(CONNECTION_FAILURE_SENTINEL), "{message}");
            }
            other => panic!("expected Daemon error, got {other:?}"),
        }
    }
}
