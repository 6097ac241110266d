//! State Exchange
//!
//! The hub's upstream contract. The download engine publishes here; each
//! channel pairs a point-in-time snapshot with a broadcast live feed that
//! any number of pipelines can follow independently. Publishing updates
//! the backing state first, then broadcasts, so a snapshot taken after a
//! publish always includes it.

use std::collections::HashMap;

use tokio::sync::{RwLock, broadcast};

use crate::hub::channels::Channel;
use crate::models::{DownloadSpeed, GlobalState, LoggedUser, Post, PostImage, QueueItem};

pub struct StateExchange {
    posts: RwLock<HashMap<String, Post>>,
    queue: RwLock<HashMap<String, QueueItem>>,
    /// Keyed by (post id, image index).
    images: RwLock<HashMap<(String, u32), PostImage>>,
    global: RwLock<GlobalState>,
    speed: RwLock<DownloadSpeed>,
    user: RwLock<LoggedUser>,

    posts_tx: broadcast::Sender<Post>,
    queue_tx: broadcast::Sender<QueueItem>,
    images_tx: broadcast::Sender<PostImage>,
    global_tx: broadcast::Sender<GlobalState>,
    speed_tx: broadcast::Sender<DownloadSpeed>,
    user_tx: broadcast::Sender<LoggedUser>,
}

impl StateExchange {
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            queue: RwLock::new(HashMap::new()),
            images: RwLock::new(HashMap::new()),
            global: RwLock::new(GlobalState::default()),
            speed: RwLock::new(DownloadSpeed::default()),
            user: RwLock::new(LoggedUser::default()),
            posts_tx: broadcast::channel(feed_capacity).0,
            queue_tx: broadcast::channel(feed_capacity).0,
            images_tx: broadcast::channel(feed_capacity).0,
            global_tx: broadcast::channel(feed_capacity).0,
            speed_tx: broadcast::channel(feed_capacity).0,
            user_tx: broadcast::channel(feed_capacity).0,
        }
    }

    // ── Producer API (driven by the download engine) ───────────────────

    pub async fn publish_post(&self, post: Post) {
        self.posts
            .write()
            .await
            .insert(post.post_id.clone(), post.clone());
        let _ = self.posts_tx.send(post);
    }

    pub async fn publish_queue_item(&self, item: QueueItem) {
        self.queue
            .write()
            .await
            .insert(item.thread_id.clone(), item.clone());
        let _ = self.queue_tx.send(item);
    }

    pub async fn publish_image(&self, image: PostImage) {
        self.images
            .write()
            .await
            .insert((image.post_id.clone(), image.index), image.clone());
        let _ = self.images_tx.send(image);
    }

    pub async fn set_global_state(&self, state: GlobalState) {
        *self.global.write().await = state.clone();
        let _ = self.global_tx.send(state);
    }

    pub async fn record_speed(&self, bytes_per_sec: u64) {
        let speed = DownloadSpeed {
            speed: bytes_per_sec,
        };
        *self.speed.write().await = speed;
        let _ = self.speed_tx.send(speed);
    }

    pub async fn set_user(&self, user: Option<String>) {
        let user = LoggedUser::new(user);
        *self.user.write().await = user.clone();
        let _ = self.user_tx.send(user);
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    pub async fn snapshot_posts(&self) -> Vec<Post> {
        let mut posts: Vec<_> = self.posts.read().await.values().cloned().collect();
        posts.sort_by_key(|p| p.rank);
        posts
    }

    pub async fn snapshot_queue(&self) -> Vec<QueueItem> {
        let mut items: Vec<_> = self.queue.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        items
    }

    /// Images belonging to one post, ordered by index.
    pub async fn snapshot_images(&self, post_id: &str) -> Vec<PostImage> {
        let mut images: Vec<_> = self
            .images
            .read()
            .await
            .values()
            .filter(|img| img.post_id == post_id)
            .cloned()
            .collect();
        images.sort_by_key(|img| img.index);
        images
    }

    pub async fn snapshot_global(&self) -> GlobalState {
        self.global.read().await.clone()
    }

    pub async fn snapshot_speed(&self) -> DownloadSpeed {
        *self.speed.read().await
    }

    pub async fn snapshot_user(&self) -> LoggedUser {
        self.user.read().await.clone()
    }

    // ── Live feeds ─────────────────────────────────────────────────────

    pub fn live_posts(&self) -> broadcast::Receiver<Post> {
        self.posts_tx.subscribe()
    }

    pub fn live_queue(&self) -> broadcast::Receiver<QueueItem> {
        self.queue_tx.subscribe()
    }

    pub fn live_images(&self) -> broadcast::Receiver<PostImage> {
        self.images_tx.subscribe()
    }

    pub fn live_global(&self) -> broadcast::Receiver<GlobalState> {
        self.global_tx.subscribe()
    }

    pub fn live_speed(&self) -> broadcast::Receiver<DownloadSpeed> {
        self.speed_tx.subscribe()
    }

    pub fn live_user(&self) -> broadcast::Receiver<LoggedUser> {
        self.user_tx.subscribe()
    }

    /// Number of live receivers on a channel's feed.
    pub fn listener_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::GlobalState => self.global_tx.receiver_count(),
            Channel::DownloadSpeed => self.speed_tx.receiver_count(),
            Channel::User => self.user_tx.receiver_count(),
            Channel::Posts => self.posts_tx.receiver_count(),
            Channel::GrabQueue => self.queue_tx.receiver_count(),
            Channel::PostDetails => self.images_tx.receiver_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DownloadStatus;

    fn post(id: &str, rank: i32) -> Post {
        Post {
            post_id: id.to_string(),
            post_title: format!("post {}", id),
            status: DownloadStatus::Pending,
            url: format!("https://example.org/threads/{}", id),
            done: 0,
            total: 5,
            host: "imagehost".to_string(),
            rank,
        }
    }

    fn image(post_id: &str, index: u32) -> PostImage {
        PostImage {
            post_id: post_id.to_string(),
            url: format!("https://img.example.org/{}/{}", post_id, index),
            status: DownloadStatus::Pending,
            index,
            current: 0,
            total: 100,
        }
    }

    #[tokio::test]
    async fn publish_without_listeners_does_not_panic() {
        let exchange = StateExchange::new(16);
        exchange.publish_post(post("1", 0)).await;
        exchange.record_speed(512).await;
    }

    #[tokio::test]
    async fn snapshot_reflects_prior_publishes_in_rank_order() {
        let exchange = StateExchange::new(16);
        exchange.publish_post(post("b", 2)).await;
        exchange.publish_post(post("a", 1)).await;

        let snapshot = exchange.snapshot_posts().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].post_id, "a");
        assert_eq!(snapshot[1].post_id, "b");
    }

    #[tokio::test]
    async fn republish_replaces_the_stored_post() {
        let exchange = StateExchange::new(16);
        exchange.publish_post(post("1", 0)).await;
        let mut updated = post("1", 0);
        updated.done = 5;
        exchange.publish_post(updated).await;

        let snapshot = exchange.snapshot_posts().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].done, 5);
    }

    #[tokio::test]
    async fn image_snapshot_is_scoped_to_the_post() {
        let exchange = StateExchange::new(16);
        exchange.publish_image(image("42", 1)).await;
        exchange.publish_image(image("7", 0)).await;
        exchange.publish_image(image("42", 0)).await;

        let snapshot = exchange.snapshot_images("42").await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].index, 0);
        assert_eq!(snapshot[1].index, 1);
        assert!(snapshot.iter().all(|img| img.post_id == "42"));
    }

    #[tokio::test]
    async fn scalar_snapshots_report_the_current_value() {
        let exchange = StateExchange::new(16);
        exchange.record_speed(1024).await;
        exchange.set_user(Some("alice".to_string())).await;

        assert_eq!(exchange.snapshot_speed().await.speed, 1024);
        assert_eq!(
            exchange.snapshot_user().await.user,
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn live_feed_sees_publishes_after_subscribe() {
        let exchange = StateExchange::new(16);
        let mut rx = exchange.live_posts();
        exchange.publish_post(post("1", 0)).await;

        let seen = rx.recv().await.unwrap();
        assert_eq!(seen.post_id, "1");
    }

    #[tokio::test]
    async fn listener_count_tracks_receivers() {
        let exchange = StateExchange::new(16);
        assert_eq!(exchange.listener_count(Channel::Posts), 0);

        let rx = exchange.live_posts();
        assert_eq!(exchange.listener_count(Channel::Posts), 1);
        drop(rx);
        assert_eq!(exchange.listener_count(Channel::Posts), 0);
    }
}
