//! Wire Protocol
//!
//! Inbound client commands. Each text frame carries one JSON object tagged
//! by `cmd`; only `POST_DETAILS_SUB` takes a payload (the post id).
//! Outbound traffic has no envelope: every outgoing frame is a JSON array
//! of channel items.

use serde::Deserialize;

use super::channels::Channel;
use super::error::HubError;

/// The complete inbound command set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    GlobalStateSub,
    GlobalStateUnsub,
    SpeedSub,
    SpeedUnsub,
    UserSub,
    UserUnsub,
    PostsSub,
    PostsUnsub,
    GrabQueueSub,
    GrabQueueUnsub,
    PostDetailsSub { payload: String },
    PostDetailsUnsub,
}

/// What a command asks the hub to do, with the channel made explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubOp {
    Subscribe {
        channel: Channel,
        param: Option<String>,
    },
    Unsubscribe {
        channel: Channel,
    },
}

impl ClientCommand {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, HubError> {
        serde_json::from_str(text).map_err(HubError::Decode)
    }

    pub fn into_op(self) -> HubOp {
        match self {
            ClientCommand::GlobalStateSub => HubOp::Subscribe {
                channel: Channel::GlobalState,
                param: None,
            },
            ClientCommand::GlobalStateUnsub => HubOp::Unsubscribe {
                channel: Channel::GlobalState,
            },
            ClientCommand::SpeedSub => HubOp::Subscribe {
                channel: Channel::DownloadSpeed,
                param: None,
            },
            ClientCommand::SpeedUnsub => HubOp::Unsubscribe {
                channel: Channel::DownloadSpeed,
            },
            ClientCommand::UserSub => HubOp::Subscribe {
                channel: Channel::User,
                param: None,
            },
            ClientCommand::UserUnsub => HubOp::Unsubscribe {
                channel: Channel::User,
            },
            ClientCommand::PostsSub => HubOp::Subscribe {
                channel: Channel::Posts,
                param: None,
            },
            ClientCommand::PostsUnsub => HubOp::Unsubscribe {
                channel: Channel::Posts,
            },
            ClientCommand::GrabQueueSub => HubOp::Subscribe {
                channel: Channel::GrabQueue,
                param: None,
            },
            ClientCommand::GrabQueueUnsub => HubOp::Unsubscribe {
                channel: Channel::GrabQueue,
            },
            ClientCommand::PostDetailsSub { payload } => HubOp::Subscribe {
                channel: Channel::PostDetails,
                param: Some(payload),
            },
            ClientCommand::PostDetailsUnsub => HubOp::Unsubscribe {
                channel: Channel::PostDetails,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_plain_subscribe() {
        let cmd = ClientCommand::decode(r#"{"cmd":"POSTS_SUB"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::PostsSub);
        assert_eq!(
            cmd.into_op(),
            HubOp::Subscribe {
                channel: Channel::Posts,
                param: None
            }
        );
    }

    #[test]
    fn decode_all_unparametrized_commands() {
        let cases = [
            ("GLOBAL_STATE_SUB", ClientCommand::GlobalStateSub),
            ("GLOBAL_STATE_UNSUB", ClientCommand::GlobalStateUnsub),
            ("SPEED_SUB", ClientCommand::SpeedSub),
            ("SPEED_UNSUB", ClientCommand::SpeedUnsub),
            ("USER_SUB", ClientCommand::UserSub),
            ("USER_UNSUB", ClientCommand::UserUnsub),
            ("POSTS_SUB", ClientCommand::PostsSub),
            ("POSTS_UNSUB", ClientCommand::PostsUnsub),
            ("GRAB_QUEUE_SUB", ClientCommand::GrabQueueSub),
            ("GRAB_QUEUE_UNSUB", ClientCommand::GrabQueueUnsub),
            ("POST_DETAILS_UNSUB", ClientCommand::PostDetailsUnsub),
        ];
        for (name, expected) in cases {
            let frame = format!(r#"{{"cmd":"{}"}}"#, name);
            assert_eq!(ClientCommand::decode(&frame).unwrap(), expected, "{}", name);
        }
    }

    #[test]
    fn decode_post_details_with_payload() {
        let cmd = ClientCommand::decode(r#"{"cmd":"POST_DETAILS_SUB","payload":"42"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::PostDetailsSub {
                payload: "42".to_string()
            }
        );
        assert_eq!(
            cmd.into_op(),
            HubOp::Subscribe {
                channel: Channel::PostDetails,
                param: Some("42".to_string())
            }
        );
    }

    #[test]
    fn post_details_sub_requires_payload() {
        assert!(ClientCommand::decode(r#"{"cmd":"POST_DETAILS_SUB"}"#).is_err());
    }

    #[test]
    fn unknown_cmd_is_rejected() {
        assert!(ClientCommand::decode(r#"{"cmd":"FROBNICATE"}"#).is_err());
    }

    #[test]
    fn non_json_frame_is_rejected() {
        assert!(ClientCommand::decode("hello there").is_err());
    }
}
