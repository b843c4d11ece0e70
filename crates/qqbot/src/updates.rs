//! Update delivery.
//!
//! Inbound frames are pushed into an [`UpdateSender`], which tells API
//! responses apart from updates, hands responses to the [`Client`] and
//! delivers normalized updates, in arrival order, to the [`UpdatesChannel`].
//!
//! The producer owns the channel's lifetime: dropping every `UpdateSender`
//! ends the sequence.

use std::pin::Pin;
use std::str;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use qqbot_core::{DecodeError, DecodeResult};

use crate::client::Client;
use crate::config::UpdatesConfig;
use crate::model::{Response, Update, UpdateKind};

/// Creates a connected sender/receiver pair.
pub fn updates_channel(config: &UpdatesConfig) -> (UpdateSender, UpdatesChannel) {
    let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
    let sender = UpdateSender {
        tx,
        client: None,
        skip_meta_events: config.skip_meta_events,
    };
    (sender, UpdatesChannel { rx })
}

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// An update was queued for the consumer.
    Delivered,
    /// A meta event was dropped by configuration.
    Skipped,
    /// The frame was an API response; `matched` tells whether a call was
    /// waiting for it.
    Response { matched: bool },
    /// The consumer is gone; the update was discarded.
    Closed,
}

/// The producing half of the update channel.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: mpsc::Sender<Update>,
    client: Option<Arc<Client>>,
    skip_meta_events: bool,
}

impl UpdateSender {
    /// Routes API responses found among the frames to `client`.
    pub fn with_client(mut self, client: Arc<Client>) -> Self {
        self.client = Some(client);
        self
    }

    /// Classifies and processes one raw frame.
    ///
    /// An object with `post_type` is an update; an object with `echo` and no
    /// `post_type` is an API response. Waits for room in the channel when it
    /// is full.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] when the frame cannot be decoded. Only that
    /// frame is lost; the sender stays usable.
    pub async fn push_frame(&self, frame: &[u8]) -> DecodeResult<FrameOutcome> {
        let result = self.process_frame(frame).await;
        if let Err(e) = &result {
            warn!(
                error = %e,
                raw_data = %String::from_utf8_lossy(frame),
                "Failed to decode frame"
            );
        }
        result
    }

    async fn process_frame(&self, frame: &[u8]) -> DecodeResult<FrameOutcome> {
        let text = str::from_utf8(frame)?;
        trace!(raw_data = %text, "Received frame");

        let value: Value = serde_json::from_str(text)?;
        let Value::Object(fields) = &value else {
            return Err(DecodeError::NotAnObject);
        };

        if fields.contains_key("post_type") {
            let update = Update::from_value(value)?;
            return Ok(self.push_update(update).await);
        }
        if fields.contains_key("echo") {
            // `data` is kept as raw JSON text, so decode from the source.
            let response: Response = serde_json::from_str(text)?;
            return Ok(FrameOutcome::Response {
                matched: self.route_response(response),
            });
        }
        Err(DecodeError::Unrecognized)
    }

    /// Delivers an already decoded update.
    pub async fn push_update(&self, update: Update) -> FrameOutcome {
        match &update.kind {
            UpdateKind::MetaEvent(meta) => {
                if meta.is_heartbeat() {
                    trace!("Received heartbeat");
                } else {
                    debug!(
                        meta_event_type = %meta.meta_event_type,
                        sub_type = %meta.sub_type,
                        "Received meta event"
                    );
                }
                if self.skip_meta_events {
                    return FrameOutcome::Skipped;
                }
            }
            _ => {
                info!(post_type = %update.post_type(), "Received update");
                debug!(text = %update.text, "Update content");
            }
        }

        match self.tx.send(update).await {
            Ok(()) => FrameOutcome::Delivered,
            Err(_) => {
                debug!("Update receiver dropped, discarding update");
                FrameOutcome::Closed
            }
        }
    }

    fn route_response(&self, response: Response) -> bool {
        match &self.client {
            Some(client) => client.handle_response(response),
            None => {
                warn!(echo = %response.echo, "No client attached, dropping API response");
                false
            }
        }
    }

    /// Returns true once the consuming half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The consuming half of the update channel.
///
/// Also usable as a [`Stream`] of updates.
#[derive(Debug)]
pub struct UpdatesChannel {
    rx: mpsc::Receiver<Update>,
}

impl UpdatesChannel {
    /// Waits for the next update. `None` once every sender is dropped and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Takes the next update if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.rx.try_recv().ok()
    }

    /// Stops accepting new updates. Buffered ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for UpdatesChannel {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::client::ChannelTransport;
    use crate::config::ClientConfig;
    use crate::model::Request;

    const GROUP_MESSAGE: &[u8] = br#"{"post_type":"message","message_type":"group","group_id":1001,"user_id":7,"message":"hello","sender":{"user_id":7,"nickname":"Bob"}}"#;
    const HEARTBEAT: &[u8] = br#"{"post_type":"meta_event","meta_event_type":"heartbeat","interval":5000}"#;

    #[tokio::test]
    async fn test_updates_delivered_in_order() {
        let (sender, mut updates) = updates_channel(&UpdatesConfig::default());

        assert_eq!(
            sender.push_frame(GROUP_MESSAGE).await.unwrap(),
            FrameOutcome::Delivered
        );
        sender
            .push_frame(br#"{"post_type":"notice","notice_type":"group_increase","group_id":1}"#)
            .await
            .unwrap();

        let first = updates.recv().await.unwrap();
        assert_eq!(first.message().unwrap().from.name(), "Bob");
        let second = updates.recv().await.unwrap();
        assert!(second.message().is_none());
        assert!(updates.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_bad_frame_does_not_block_later_frames() {
        let (sender, mut updates) = updates_channel(&UpdatesConfig::default());

        assert!(matches!(
            sender.push_frame(b"{not json").await,
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            sender.push_frame(&[0xff, 0xfe]).await,
            Err(DecodeError::Utf8(_))
        ));
        assert!(matches!(
            sender.push_frame(b"[1, 2]").await,
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            sender.push_frame(br#"{"hello":"world"}"#).await,
            Err(DecodeError::Unrecognized)
        ));

        sender.push_frame(GROUP_MESSAGE).await.unwrap();
        assert_eq!(updates.recv().await.unwrap().text, "hello");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_update_content_not_logged_at_info() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (sender, _updates) = updates_channel(&UpdatesConfig::default());
        sender.push_frame(GROUP_MESSAGE).await.unwrap();

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert!(output.contains("Received update"));
        assert!(output.contains("post_type=message"));
        assert!(!output.contains("hello"));
    }

    #[tokio::test]
    async fn test_skip_meta_events() {
        let config = UpdatesConfig {
            skip_meta_events: true,
            ..UpdatesConfig::default()
        };
        let (sender, mut updates) = updates_channel(&config);

        assert_eq!(
            sender.push_frame(HEARTBEAT).await.unwrap(),
            FrameOutcome::Skipped
        );
        sender.push_frame(GROUP_MESSAGE).await.unwrap();
        assert!(updates.recv().await.unwrap().message().is_some());

        let (sender, mut updates) = updates_channel(&UpdatesConfig::default());
        sender.push_frame(HEARTBEAT).await.unwrap();
        assert!(updates.recv().await.unwrap().meta_event().is_some());
    }

    #[tokio::test]
    async fn test_response_routed_to_client() {
        let (transport, mut outbound) = ChannelTransport::pair(4);
        let client = Arc::new(Client::new(Arc::new(transport), &ClientConfig::default()));
        let (sender, mut updates) = updates_channel(&UpdatesConfig::default());
        let sender = sender.with_client(client.clone());

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call(Request::get_login_info()).await })
        };
        let request: Value = serde_json::from_slice(&outbound.recv().await.unwrap()).unwrap();

        let reply = json!({
            "status": "ok",
            "retcode": 0,
            "data": {"user_id": 10, "nickname": "bot"},
            "echo": request["echo"]
        });
        assert_eq!(
            sender.push_frame(reply.to_string().as_bytes()).await.unwrap(),
            FrameOutcome::Response { matched: true }
        );

        let response = caller.await.unwrap().unwrap();
        let me: crate::model::User = response.decode().unwrap();
        assert_eq!(me.nickname, "bot");
        assert!(updates.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_response_without_client() {
        let (sender, _updates) = updates_channel(&UpdatesConfig::default());
        let outcome = sender
            .push_frame(br#"{"status":"ok","retcode":0,"echo":3}"#)
            .await
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Response { matched: false });
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (sender, updates) = updates_channel(&UpdatesConfig::default());
        sender.push_frame(GROUP_MESSAGE).await.unwrap();
        sender.push_frame(GROUP_MESSAGE).await.unwrap();
        drop(sender);

        let collected: Vec<Update> = updates.collect().await;
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (sender, updates) = updates_channel(&UpdatesConfig::default());
        drop(updates);
        assert!(sender.is_closed());
        assert_eq!(
            sender.push_frame(GROUP_MESSAGE).await.unwrap(),
            FrameOutcome::Closed
        );
    }
}
