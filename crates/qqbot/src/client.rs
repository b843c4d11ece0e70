//! Request/response calls over an asynchronous transport.
//!
//! The remote end answers calls on the same connection that carries updates,
//! so responses arrive out of band. [`Client`] correlates them by echo token:
//!
//! 1. Assign an echo to the request, unless the caller already set one.
//! 2. Register a oneshot channel under that echo in the pending map.
//! 3. Hand the serialized request to the [`Transport`].
//! 4. Await the oneshot, which [`Client::handle_response`] resolves when the
//!    matching response is read off the connection.
//!
//! Pending entries are keyed by the canonical JSON text of the echo, so `1`
//! and `"1"` never match each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use qqbot_core::{ApiError, ApiResult, TransportError, TransportResult};

use crate::config::ClientConfig;
use crate::model::{Request, Response};

// =============================================================================
// Transport
// =============================================================================

/// The outbound half of a connection to the remote end.
///
/// Implementations write one JSON frame per call. Reading frames is not part
/// of this trait; whoever owns the read side feeds them to
/// [`UpdateSender::push_frame`](crate::UpdateSender::push_frame).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one serialized request.
    async fn send(&self, frame: Vec<u8>) -> TransportResult<()>;
}

/// A [`Transport`] that forwards frames into a tokio channel.
///
/// Useful when a separate task owns the socket and drains the channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Creates a transport together with the receiving end of its channel.
    pub fn pair(buffer: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: Vec<u8>) -> TransportResult<()> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Issues API calls and matches their responses by echo.
pub struct Client {
    transport: Arc<dyn Transport>,
    /// Canonical echo text -> waiting caller.
    pending: Mutex<HashMap<String, oneshot::Sender<Response>>>,
    echo_counter: AtomicU64,
    echo_prefix: Option<String>,
    api_timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pending", &self.pending.lock().len())
            .field("echo_prefix", &self.echo_prefix)
            .field("api_timeout", &self.api_timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            pending: Mutex::new(HashMap::new()),
            echo_counter: AtomicU64::new(1),
            echo_prefix: config.echo_prefix.clone(),
            api_timeout: config.api_timeout(),
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// A response with a non-`"ok"` status is returned as `Ok`; inspect it
    /// with [`Response::is_ok`]. Calls are never retried.
    ///
    /// # Errors
    /// - [`ApiError::DuplicateEcho`] if another call is waiting on the same
    ///   caller-supplied echo.
    /// - [`ApiError::Transport`] if the frame could not be sent.
    /// - [`ApiError::Timeout`] if no response arrived in time.
    /// - [`ApiError::NotConnected`] if [`clear_pending`](Self::clear_pending)
    ///   ran while waiting.
    pub async fn call(&self, mut request: Request) -> ApiResult<Response> {
        // Register before sending so a fast response is never missed.
        let (tx, rx) = oneshot::channel();
        let key = {
            let mut pending = self.pending.lock();
            let key = if request.has_echo() {
                let key = echo_key(&request.echo);
                if pending.contains_key(&key) {
                    return Err(ApiError::DuplicateEcho(key));
                }
                key
            } else {
                // Skip tokens a caller-supplied echo already holds.
                loop {
                    let echo = self.next_echo();
                    let key = echo_key(&echo);
                    if !pending.contains_key(&key) {
                        request.echo = echo;
                        break key;
                    }
                }
            };
            pending.insert(key.clone(), tx);
            key
        };
        let mut entry = PendingEntry {
            pending: &self.pending,
            key,
            rx,
        };

        let frame = request.to_bytes()?;
        debug!(action = %request.action, echo = %entry.key, "Calling API");
        trace!(request = %String::from_utf8_lossy(&frame), "API request");

        self.transport.send(frame).await?;

        match timeout(self.api_timeout, &mut entry.rx).await {
            Ok(Ok(response)) => {
                trace!(echo = %entry.key, status = %response.status, retcode = response.retcode, "API response");
                Ok(response)
            }
            Ok(Err(_)) => Err(ApiError::NotConnected),
            Err(_) => {
                warn!(action = %request.action, echo = %entry.key, "API call timed out");
                Err(ApiError::Timeout)
            }
        }
    }

    /// Routes a response to the call waiting on its echo.
    ///
    /// Returns `false` when nobody is waiting, e.g. the call already timed
    /// out.
    pub fn handle_response(&self, response: Response) -> bool {
        let key = echo_key(&response.echo);
        let Some(tx) = self.pending.lock().remove(&key) else {
            warn!(echo = %key, "Received API response for unknown echo (timed out?)");
            return false;
        };
        // The caller may have given up between lookup and send.
        tx.send(response).is_ok()
    }

    /// Fails every outstanding call with [`ApiError::NotConnected`].
    ///
    /// Call this when the connection drops.
    pub fn clear_pending(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!(count = pending.len(), "Clearing pending API calls");
            pending.clear();
        }
    }

    /// Returns the number of calls waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn next_echo(&self) -> Value {
        let n = self.echo_counter.fetch_add(1, Ordering::Relaxed);
        match &self.echo_prefix {
            Some(prefix) => Value::String(format!("{prefix}{n}")),
            None => Value::from(n),
        }
    }
}

fn echo_key(echo: &Value) -> String {
    echo.to_string()
}

/// A registered call. Dropping it, whether the call finished, failed or was
/// cancelled, removes its entry from the pending map.
struct PendingEntry<'a> {
    pending: &'a Mutex<HashMap<String, oneshot::Sender<Response>>>,
    key: String,
    rx: oneshot::Receiver<Response>,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.rx.close();
        let mut pending = self.pending.lock();
        // The key may since belong to another call; only our sender is closed.
        if pending.get(&self.key).is_some_and(oneshot::Sender::is_closed) {
            pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn send(&self, _frame: Vec<u8>) -> TransportResult<()> {
            Err(TransportError::SendFailed("broken pipe".into()))
        }
    }

    fn client_with(config: ClientConfig) -> (Arc<Client>, mpsc::Receiver<Vec<u8>>) {
        let (transport, rx) = ChannelTransport::pair(8);
        (Arc::new(Client::new(Arc::new(transport), &config)), rx)
    }

    fn reply_to(frame: &[u8], data: Value) -> Response {
        let sent: Value = serde_json::from_slice(frame).unwrap();
        let reply = json!({"status": "ok", "retcode": 0, "data": data, "echo": sent["echo"]});
        Response::from_slice(reply.to_string().as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_call_matches_response_by_echo() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info()).await })
        };

        let frame = rx.recv().await.unwrap();
        let sent: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(sent["action"], "get_login_info");
        assert!(sent["echo"].is_u64());

        assert!(client.handle_response(reply_to(&frame, json!({"user_id": 1}))));
        let response = caller.await.unwrap().unwrap();
        assert!(response.is_ok());
        assert_eq!(response.echo, sent["echo"]);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_echo_prefix_generates_strings() {
        let (client, mut rx) = client_with(ClientConfig {
            echo_prefix: Some("bot-".into()),
            ..ClientConfig::default()
        });

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_group_list()).await })
        };

        let frame = rx.recv().await.unwrap();
        let sent: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(sent["echo"], "bot-1");

        client.handle_response(reply_to(&frame, json!([])));
        assert_eq!(caller.await.unwrap().unwrap().echo, json!("bot-1"));
    }

    #[tokio::test]
    async fn test_echo_type_is_part_of_the_key() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::delete_msg(1).with_echo(12345)).await })
        };
        let frame = rx.recv().await.unwrap();

        let wrong: Response =
            serde_json::from_str(r#"{"status":"ok","retcode":0,"echo":"12345"}"#).unwrap();
        assert!(!client.handle_response(wrong));
        assert_eq!(client.pending_count(), 1);

        assert!(client.handle_response(reply_to(&frame, Value::Null)));
        let response = caller.await.unwrap().unwrap();
        assert_eq!(response.echo, json!(12345));
    }

    #[tokio::test]
    async fn test_failed_status_is_not_an_error() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::delete_msg(9)).await })
        };
        let frame = rx.recv().await.unwrap();
        let sent: Value = serde_json::from_slice(&frame).unwrap();
        let reply = json!({"status": "failed", "retcode": 100, "echo": sent["echo"]});
        client.handle_response(Response::from_slice(reply.to_string().as_bytes()).unwrap());

        let response = caller.await.unwrap().unwrap();
        assert!(!response.is_ok());
        assert_eq!(response.retcode, 100);
    }

    #[tokio::test]
    async fn test_duplicate_echo_rejected() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info().with_echo("x")).await })
        };
        let _frame = rx.recv().await.unwrap();

        let second = client.call(Request::get_login_info().with_echo("x")).await;
        assert!(matches!(second, Err(ApiError::DuplicateEcho(key)) if key == "\"x\""));

        client.clear_pending();
        assert!(matches!(first.await.unwrap(), Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_assigned_echo_skips_caller_echo() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info().with_echo(1)).await })
        };
        rx.recv().await.unwrap();

        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_group_list()).await })
        };
        let frame = rx.recv().await.unwrap();
        let sent: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(sent["echo"], 2);

        assert!(client.handle_response(reply_to(&frame, json!([]))));
        assert!(second.await.unwrap().unwrap().is_ok());

        client.clear_pending();
        assert!(matches!(first.await.unwrap(), Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_cancelled_call_removes_pending_entry() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let result = timeout(Duration::from_millis(10), client.call(Request::get_login_info())).await;
        assert!(result.is_err());
        assert_eq!(client.pending_count(), 0);

        // A response for the abandoned call finds nobody waiting.
        let frame = rx.recv().await.unwrap();
        assert!(!client.handle_response(reply_to(&frame, Value::Null)));
    }

    #[tokio::test]
    async fn test_finished_call_keeps_reused_echo() {
        let (client, mut rx) = client_with(ClientConfig::default());

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info().with_echo("r")).await })
        };
        let frame = rx.recv().await.unwrap();
        assert!(client.handle_response(reply_to(&frame, Value::Null)));
        first.await.unwrap().unwrap();

        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info().with_echo("r")).await })
        };
        rx.recv().await.unwrap();
        assert_eq!(client.pending_count(), 1);

        client.clear_pending();
        assert!(second.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (client, _rx) = client_with(ClientConfig::default());
        let client = Arc::new(Client {
            api_timeout: Duration::from_millis(20),
            ..Arc::into_inner(client).unwrap()
        });

        let result = client.call(Request::get_login_info()).await;
        assert!(matches!(result, Err(ApiError::Timeout)));
        assert_eq!(client.pending_count(), 0);

        let late: Response =
            serde_json::from_str(r#"{"status":"ok","retcode":0,"echo":1}"#).unwrap();
        assert!(!client.handle_response(late));
    }

    #[tokio::test]
    async fn test_send_failure_cleans_up() {
        let client = Client::new(Arc::new(FailingTransport), &ClientConfig::default());
        let result = client.call(Request::get_login_info()).await;
        assert!(matches!(
            result,
            Err(ApiError::Transport(TransportError::SendFailed(_)))
        ));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_transport() {
        let (client, rx) = client_with(ClientConfig::default());
        drop(rx);
        let result = client.call(Request::get_login_info()).await;
        assert!(matches!(
            result,
            Err(ApiError::Transport(TransportError::Closed))
        ));
    }
}
