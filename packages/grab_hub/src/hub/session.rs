//! Session Lifecycle
//!
//! Per-connection handler: decode inbound commands, drive the registry,
//! spawn pipelines, clean everything up on disconnect. Subscribe order is
//! fixed: replace any previous handle, send the snapshot, then attach the
//! live feed — so the snapshot frame always precedes the first live batch
//! on the session's queue.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HubConfig;
use crate::metrics::ServerMetrics;
use crate::state::StateExchange;
use super::channels::Channel;
use super::dispatcher::{Frame, encode_batch, run_session_writer};
use super::pipeline::{self, EventFilter, PipelineContext};
use super::protocol::{ClientCommand, HubOp};
use super::registry::{SessionId, SubscriptionRegistry};

pub async fn handle_hub_session(
    socket: WebSocket,
    exchange: Arc<StateExchange>,
    registry: Arc<SubscriptionRegistry>,
    config: Arc<HubConfig>,
    metrics: Arc<ServerMetrics>,
) {
    let session: SessionId = Uuid::new_v4();
    info!(%session, "new hub session");
    metrics.session_opened();

    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Frame>(config.send_queue_capacity);
    let writer = tokio::spawn(run_session_writer(rx, ws_sender));

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientCommand::decode(&text) {
                Ok(cmd) => {
                    metrics.command_received();
                    apply_command(cmd, session, &exchange, &registry, &config, &tx, &metrics)
                        .await;
                }
                Err(e) => {
                    // Malformed frames are dropped without a reply or close.
                    metrics.command_rejected();
                    warn!(%session, "dropping inbound frame: {}", e);
                }
            },
            Ok(Message::Close(_)) => {
                debug!(%session, "client closed session");
                break;
            }
            Err(e) => {
                warn!(%session, "websocket error: {}", e);
                break;
            }
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            _ => {}
        }
    }

    let dropped = registry.drop_session(session).await;
    metrics.subscriptions_ended_by(dropped as u64);

    // Cancelled pipelines drop their queue senders; the writer drains and
    // exits once the last one is gone.
    drop(tx);
    let _ = writer.await;

    metrics.session_closed();
    info!(%session, subscriptions = dropped, "hub session closed");
}

async fn apply_command(
    cmd: ClientCommand,
    session: SessionId,
    exchange: &Arc<StateExchange>,
    registry: &Arc<SubscriptionRegistry>,
    config: &HubConfig,
    tx: &mpsc::Sender<Frame>,
    metrics: &Arc<ServerMetrics>,
) {
    match cmd.into_op() {
        HubOp::Subscribe { channel, param } => {
            subscribe(channel, param, session, exchange, registry, config, tx, metrics).await;
        }
        HubOp::Unsubscribe { channel } => {
            // Unsubscribing without a subscription is a silent no-op.
            let removed = registry.remove(session, channel).await;
            if removed {
                metrics.subscription_ended();
            }
            debug!(%session, %channel, removed, "unsubscribe");
        }
    }
}

async fn subscribe(
    channel: Channel,
    param: Option<String>,
    session: SessionId,
    exchange: &Arc<StateExchange>,
    registry: &Arc<SubscriptionRegistry>,
    config: &HubConfig,
    tx: &mpsc::Sender<Frame>,
    metrics: &Arc<ServerMetrics>,
) {
    let (generation, cancel, replaced) = registry.begin(session, channel, param.clone()).await;
    metrics.subscription_started();
    if replaced {
        metrics.subscription_ended();
    }
    debug!(%session, %channel, generation, replaced, "subscribe");

    let ctx = PipelineContext {
        session,
        channel,
        generation,
        cancel,
        registry: registry.clone(),
        out: tx.clone(),
        metrics: metrics.clone(),
    };
    let policy = channel.policy(config);

    match channel {
        Channel::Posts => {
            let snapshot = exchange.snapshot_posts().await;
            send_snapshot(channel, &snapshot, tx, metrics).await;
            pipeline::spawn(ctx, exchange.live_posts(), None, policy);
        }
        Channel::GrabQueue => {
            let snapshot = exchange.snapshot_queue().await;
            send_snapshot(channel, &snapshot, tx, metrics).await;
            pipeline::spawn(ctx, exchange.live_queue(), None, policy);
        }
        Channel::PostDetails => {
            // serde requires the payload on POST_DETAILS_SUB, so this only
            // guards against future callers.
            let Some(post_id) = param else {
                warn!(%session, "post details subscribe without a post id");
                if registry.remove(session, channel).await {
                    metrics.subscription_ended();
                }
                return;
            };
            let snapshot = exchange.snapshot_images(&post_id).await;
            send_snapshot(channel, &snapshot, tx, metrics).await;
            let keep: EventFilter<crate::models::PostImage> =
                Box::new(move |img| img.post_id == post_id);
            pipeline::spawn(ctx, exchange.live_images(), Some(keep), policy);
        }
        Channel::GlobalState => {
            let snapshot = exchange.snapshot_global().await;
            send_snapshot(channel, std::slice::from_ref(&snapshot), tx, metrics).await;
            pipeline::spawn(ctx, exchange.live_global(), None, policy);
        }
        Channel::DownloadSpeed => {
            let snapshot = exchange.snapshot_speed().await;
            send_snapshot(channel, std::slice::from_ref(&snapshot), tx, metrics).await;
            pipeline::spawn(ctx, exchange.live_speed(), None, policy);
        }
        Channel::User => {
            let snapshot = exchange.snapshot_user().await;
            send_snapshot(channel, std::slice::from_ref(&snapshot), tx, metrics).await;
            pipeline::spawn(ctx, exchange.live_user(), None, policy);
        }
    }
}

/// Queue the snapshot frame. Best effort: a failure here is logged and the
/// subscription stays live.
async fn send_snapshot<T: Serialize>(
    channel: Channel,
    items: &[T],
    tx: &mpsc::Sender<Frame>,
    metrics: &Arc<ServerMetrics>,
) {
    match encode_batch(channel, items) {
        Ok(frame) => {
            if tx.send(frame).await.is_err() {
                debug!(%channel, "snapshot dropped, session writer gone");
            } else {
                metrics.batch_sent(items.len() as u64);
            }
        }
        Err(e) => {
            metrics.serialize_failure();
            warn!(%channel, "snapshot encode failed: {}", e);
        }
    }
}
