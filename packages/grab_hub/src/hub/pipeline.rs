//! Coalescing Pipeline
//!
//! One task per live subscription. Events from the channel's broadcast
//! feed accumulate under the channel's batching policy and flush to the
//! session's send queue as a single serialized frame. The latency timer
//! arms when the first event of a window arrives, so an idle channel never
//! produces traffic and spaced events go out one by one.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;
use super::channels::{BatchPolicy, Channel};
use super::dispatcher::{Frame, encode_batch};
use super::registry::{SessionId, SubscriptionRegistry};

/// Predicate applied to each event before it enters the window.
pub type EventFilter<T> = Box<dyn Fn(&T) -> bool + Send>;

/// Everything a pipeline needs to run and to clean up after itself.
pub struct PipelineContext {
    pub session: SessionId,
    pub channel: Channel,
    pub generation: u64,
    pub cancel: CancellationToken,
    pub registry: Arc<SubscriptionRegistry>,
    pub out: mpsc::Sender<Frame>,
    pub metrics: Arc<ServerMetrics>,
}

pub fn spawn<T>(
    ctx: PipelineContext,
    rx: broadcast::Receiver<T>,
    filter: Option<EventFilter<T>>,
    policy: BatchPolicy,
) -> JoinHandle<()>
where
    T: Clone + Serialize + Send + 'static,
{
    tokio::spawn(run(ctx, rx, filter, policy))
}

async fn run<T>(
    ctx: PipelineContext,
    mut rx: broadcast::Receiver<T>,
    filter: Option<EventFilter<T>>,
    policy: BatchPolicy,
) where
    T: Clone + Serialize + Send + 'static,
{
    let (max_latency, max_items) = match policy {
        BatchPolicy::Immediate => (None, 1),
        BatchPolicy::Windowed {
            max_latency,
            max_items,
        } => (Some(max_latency), max_items),
    };

    let mut batch: Vec<T> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => {
                // Unsubscribe/replace discards the pending window.
                debug!(session = %ctx.session, channel = %ctx.channel, "pipeline cancelled");
                return;
            }
            _ = wait_until(deadline) => {
                flush(&ctx, &mut batch).await;
                deadline = None;
            }
            event = rx.recv() => match event {
                Ok(item) => {
                    if let Some(keep) = &filter {
                        if !keep(&item) {
                            continue;
                        }
                    }
                    batch.push(item);
                    if batch.len() >= max_items {
                        flush(&ctx, &mut batch).await;
                        deadline = None;
                    } else if deadline.is_none() {
                        if let Some(latency) = max_latency {
                            deadline = Some(Instant::now() + latency);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Coalescing already tolerates gaps; log and keep going.
                    ctx.metrics.events_dropped_by(n);
                    warn!(
                        session = %ctx.session,
                        channel = %ctx.channel,
                        "live feed lagged by {} events", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    flush(&ctx, &mut batch).await;
                    let removed = ctx
                        .registry
                        .remove_if_current(ctx.session, ctx.channel, ctx.generation)
                        .await;
                    if removed {
                        ctx.metrics.subscription_ended();
                    }
                    warn!(
                        session = %ctx.session,
                        channel = %ctx.channel,
                        "live feed closed, ending subscription"
                    );
                    return;
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn flush<T: Serialize>(ctx: &PipelineContext, batch: &mut Vec<T>) {
    if batch.is_empty() {
        return;
    }
    match encode_batch(ctx.channel, batch) {
        Ok(frame) => {
            if ctx.out.send(frame).await.is_err() {
                // Writer gone; session cleanup will cancel us shortly.
                debug!(session = %ctx.session, channel = %ctx.channel, "send queue closed");
            } else {
                ctx.metrics.batch_sent(batch.len() as u64);
            }
        }
        Err(e) => {
            ctx.metrics.serialize_failure();
            warn!(session = %ctx.session, "dropping batch: {}", e);
        }
    }
    batch.clear();
}
