//! Session Dispatcher
//!
//! Batches are serialized once at the pipeline edge into a `Frame`, then
//! queued on the session's mpsc channel. A single writer task per session
//! drains the queue and performs exactly one socket write per frame, so
//! concurrent pipelines can never interleave bytes on the wire.

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::channels::Channel;
use super::error::HubError;

/// One serialized outbound message: a JSON array of channel items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(pub String);

/// Serialize a batch into its wire form.
pub fn encode_batch<T: Serialize>(channel: Channel, items: &[T]) -> Result<Frame, HubError> {
    serde_json::to_string(items)
        .map(Frame)
        .map_err(|source| HubError::Serialize { channel, source })
}

/// Drain the session's send queue into the socket, one write per frame.
/// Ends when the queue closes or a write fails; a failed write surfaces as
/// a disconnect to the rest of the session, not as a per-frame error.
pub async fn run_session_writer<S>(mut rx: mpsc::Receiver<Frame>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(Frame(json)) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            debug!("session write failed, stopping writer: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DownloadSpeed;
    use futures::StreamExt;

    #[test]
    fn encode_batch_is_a_json_array() {
        let frame = encode_batch(
            Channel::DownloadSpeed,
            &[DownloadSpeed { speed: 1024 }, DownloadSpeed { speed: 2048 }],
        )
        .unwrap();
        assert_eq!(frame.0, r#"[{"speed":1024},{"speed":2048}]"#);
    }

    #[test]
    fn encode_empty_batch() {
        let frame = encode_batch::<DownloadSpeed>(Channel::DownloadSpeed, &[]).unwrap();
        assert_eq!(frame.0, "[]");
    }

    #[tokio::test]
    async fn writer_preserves_queue_order() {
        let (tx, rx) = mpsc::channel::<Frame>(8);
        let (sink, mut stream) = futures::channel::mpsc::unbounded::<Message>();

        tx.send(Frame("[1]".to_string())).await.unwrap();
        tx.send(Frame("[2]".to_string())).await.unwrap();
        tx.send(Frame("[3]".to_string())).await.unwrap();
        drop(tx);

        run_session_writer(rx, sink).await;

        let mut seen = Vec::new();
        while let Some(Message::Text(text)) = stream.next().await {
            seen.push(text.to_string());
        }
        assert_eq!(seen, vec!["[1]", "[2]", "[3]"]);
    }

    #[tokio::test]
    async fn writer_stops_when_sink_is_gone() {
        let (tx, rx) = mpsc::channel::<Frame>(8);
        let (sink, stream) = futures::channel::mpsc::unbounded::<Message>();
        drop(stream);

        tx.send(Frame("[1]".to_string())).await.unwrap();
        // Writer must return on the failed write even though the queue
        // still has a sender.
        run_session_writer(rx, sink).await;
    }
}
