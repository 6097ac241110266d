//! Wire-facing records published on the hub channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Download lifecycle of a post or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Complete,
    Error,
    Stopped,
}

/// A gallery post tracked by the download engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub post_id: String,
    pub post_title: String,
    pub status: DownloadStatus,
    pub url: String,
    /// Images downloaded so far.
    pub done: u32,
    /// Total images in the post.
    pub total: u32,
    pub host: String,
    /// Position in the download queue; snapshot ordering key.
    pub rank: i32,
}

/// A forum thread waiting in the grab queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub thread_id: String,
    pub link: String,
    /// True while the thread is still being parsed.
    pub loading: bool,
}

/// Per-image progress within a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostImage {
    pub post_id: String,
    pub url: String,
    pub status: DownloadStatus,
    /// Position of the image within its post; snapshot ordering key.
    pub index: u32,
    pub current: u64,
    pub total: u64,
}

/// Aggregate download throughput in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSpeed {
    pub speed: u64,
}

/// Forum account currently logged in, if any. The `type` marker lets
/// clients tell this record apart from other single-object payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Option<String>,
}

impl LoggedUser {
    pub fn new(user: Option<String>) -> Self {
        Self {
            kind: "user".to_string(),
            user,
        }
    }
}

impl Default for LoggedUser {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Coarse status of the whole download engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalState {
    pub running: u64,
    pub remaining: u64,
    pub error: u64,
    pub bytes_downloaded: u64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_serializes_camel_case() {
        let post = Post {
            post_id: "42".to_string(),
            post_title: "Spring gallery".to_string(),
            status: DownloadStatus::Downloading,
            url: "https://example.org/threads/1".to_string(),
            done: 3,
            total: 10,
            host: "imagehost".to_string(),
            rank: 0,
        };

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["postId"], "42");
        assert_eq!(json["postTitle"], "Spring gallery");
        assert_eq!(json["status"], "DOWNLOADING");
        assert_eq!(json["done"], 3);
    }

    #[test]
    fn logged_user_carries_type_marker() {
        let user = LoggedUser::new(Some("alice".to_string()));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["user"], "alice");
    }

    #[test]
    fn logged_user_absent_is_null() {
        let json = serde_json::to_value(LoggedUser::default()).unwrap();
        assert_eq!(json["type"], "user");
        assert!(json["user"].is_null());
    }

    #[test]
    fn status_round_trips_screaming_snake() {
        let json = serde_json::to_string(&DownloadStatus::Complete).unwrap();
        assert_eq!(json, "\"COMPLETE\"");
        let back: DownloadStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DownloadStatus::Complete);
    }
}
