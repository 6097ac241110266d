use thiserror::Error;

use super::channels::Channel;

/// Errors raised at the hub's seams. Malformed inbound frames are dropped
/// where they are decoded; serialization failures drop the batch but keep
/// the subscription alive.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("malformed command frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to serialize {channel} batch: {source}")]
    Serialize {
        channel: Channel,
        #[source]
        source: serde_json::Error,
    },
}
