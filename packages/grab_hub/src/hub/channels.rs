//! Channel Catalog
//!
//! The named channels clients can subscribe to, and how each one batches
//! live events before hitting the wire.

use std::fmt;
use std::time::Duration;

use crate::config::HubConfig;

/// A named stream of state updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    GlobalState,
    DownloadSpeed,
    User,
    Posts,
    GrabQueue,
    /// Per-image progress for a single post; parametrized by post id.
    PostDetails,
}

impl Channel {
    /// Scalar channels carry a single current value; collection channels
    /// carry incremental entity updates.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Channel::GlobalState | Channel::DownloadSpeed | Channel::User
        )
    }

    /// How live events on this channel are coalesced into outbound batches.
    pub fn policy(&self, config: &HubConfig) -> BatchPolicy {
        match self {
            Channel::GlobalState | Channel::DownloadSpeed | Channel::User => {
                BatchPolicy::Immediate
            }
            Channel::Posts | Channel::GrabQueue => BatchPolicy::Windowed {
                max_latency: config.window,
                max_items: config.max_batch,
            },
            Channel::PostDetails => BatchPolicy::Windowed {
                max_latency: config.window,
                max_items: config.details_max_batch,
            },
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::GlobalState => "global_state",
            Channel::DownloadSpeed => "download_speed",
            Channel::User => "user",
            Channel::Posts => "posts",
            Channel::GrabQueue => "grab_queue",
            Channel::PostDetails => "post_details",
        };
        f.write_str(name)
    }
}

/// Per-channel batching discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Every event goes out as a singleton batch as soon as it arrives.
    Immediate,
    /// Events accumulate until the window's max latency elapses or the
    /// batch reaches max items, whichever comes first.
    Windowed {
        max_latency: Duration,
        max_items: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_channels_are_immediate() {
        let config = HubConfig::default();
        for channel in [Channel::GlobalState, Channel::DownloadSpeed, Channel::User] {
            assert!(channel.is_scalar());
            assert_eq!(channel.policy(&config), BatchPolicy::Immediate);
        }
    }

    #[test]
    fn collection_channels_are_windowed() {
        let config = HubConfig::default();
        match Channel::Posts.policy(&config) {
            BatchPolicy::Windowed {
                max_latency,
                max_items,
            } => {
                assert_eq!(max_latency, Duration::from_millis(2000));
                assert_eq!(max_items, 200);
            }
            other => panic!("expected windowed policy, got {:?}", other),
        }
    }

    #[test]
    fn post_details_window_is_wider() {
        let config = HubConfig::default();
        match Channel::PostDetails.policy(&config) {
            BatchPolicy::Windowed { max_items, .. } => assert_eq!(max_items, 500),
            other => panic!("expected windowed policy, got {:?}", other),
        }
    }
}
