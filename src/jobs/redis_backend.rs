//! Redis backend for the work queue, job store and notification channel.
//!
//! # Key Schema
//!
//! | Key Pattern | Type | Purpose |
//! |-------------|------|---------|
//! | `{queue_key}` | List | Work queue; producers `LPUSH`, the worker `BRPOP`s |
//! | `{status_key_prefix}:{job_id}` | String | Job status, set with `EX` |
//! | `{result_key_prefix}:{job_id}` | String | Generated presentation, set with `EX` and `NX` |
//! | `{notification_channel}` | Pub/Sub | Wake-up signal published after each enqueue |
//!
//! # Connection Model
//!
//! Blocking pops hold their connection for up to the pop timeout, so they
//! get a dedicated connection manager. Store writes, pushes and publishes
//! share a second one. A manager reports the command that hit a dropped
//! socket as a transport error and reconnects in the background, so the
//! next command goes out on a fresh connection. Neither manager sets a
//! response timeout, which would cut a `BRPOP` short. Pub/sub uses its own
//! connection owned by the relay task.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job_store::JobStore;
use super::notifier::{NotificationHub, NotificationPublisher};
use super::types::JobStatus;
use super::work_queue::WorkQueue;
use crate::config::RedisConfig;
use crate::errors::{QueueResult, StoreError, StoreResult};

/// Redis-backed work queue, job store and notification publisher
#[derive(Clone)]
pub struct RedisBackend {
    client: redis::Client,
    commands: ConnectionManager,
    blocking: ConnectionManager,
    config: RedisConfig,
}

impl RedisBackend {
    /// Open both connection managers. Fails fast if Redis is unreachable;
    /// later connection losses are recovered on the following command.
    pub async fn connect(config: &RedisConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let commands = ConnectionManager::new(client.clone()).await?;
        let blocking = ConnectionManager::new(client.clone()).await?;
        info!(queue = %config.queue_key, "Connected to Redis");
        Ok(Self {
            client,
            commands,
            blocking,
            config: config.clone(),
        })
    }

    /// Subscribe to the notification channel and forward every message into
    /// `hub` until `cancel` fires.
    ///
    /// The first subscription is made before returning so a misconfigured
    /// server is reported at startup. Later connection losses are retried
    /// after `resubscribe_delay`.
    pub async fn start_notification_relay(
        &self,
        hub: NotificationHub,
        cancel: CancellationToken,
    ) -> QueueResult<JoinHandle<()>> {
        let pubsub = subscribe(&self.client, &self.config.notification_channel).await?;
        info!(
            channel = %self.config.notification_channel,
            "Subscribed to job notifications"
        );
        Ok(tokio::spawn(relay_notifications(
            self.client.clone(),
            self.config.notification_channel.clone(),
            self.config.resubscribe_delay,
            pubsub,
            hub,
            cancel,
        )))
    }
}

async fn subscribe(client: &redis::Client, channel: &str) -> redis::RedisResult<PubSub> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(pubsub)
}

async fn relay_notifications(
    client: redis::Client,
    channel: String,
    resubscribe_delay: Duration,
    mut pubsub: PubSub,
    hub: NotificationHub,
    cancel: CancellationToken,
) {
    loop {
        {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    message = messages.next() => match message {
                        Some(message) => {
                            let payload: Option<String> = message.get_payload().ok();
                            debug!(?payload, "Job notification received");
                            hub.notify();
                        }
                        None => break,
                    }
                }
            }
        }

        warn!(
            %channel,
            "Notification subscription lost, resubscribing in {:?}", resubscribe_delay
        );
        pubsub = loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(resubscribe_delay) => {}
            }
            match subscribe(&client, &channel).await {
                Ok(pubsub) => {
                    info!(%channel, "Resubscribed to job notifications");
                    // Anything published while disconnected was missed
                    hub.notify();
                    break pubsub;
                }
                Err(e) => warn!(%channel, "Resubscribe failed: {}", e),
            }
        };
    }
}

/// Redis `EX` takes whole seconds and rejects zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl WorkQueue for RedisBackend {
    async fn push(&self, entry: &str) -> QueueResult<()> {
        let mut conn = self.commands.clone();
        let _length: i64 = redis::cmd("LPUSH")
            .arg(&self.config.queue_key)
            .arg(entry)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> QueueResult<Option<String>> {
        let mut conn = self.blocking.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.config.queue_key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(popped.map(|(_queue, entry)| entry))
    }
}

#[async_trait]
impl JobStore for RedisBackend {
    async fn set_status(&self, job_id: &str, status: JobStatus, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.commands.clone();
        let _: () = redis::cmd("SET")
            .arg(self.config.status_key(job_id))
            .arg(status.as_str())
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_result(&self, job_id: &str, result: &str, ttl: Duration) -> StoreResult<()> {
        let key = self.config.result_key(job_id);
        let mut conn = self.commands.clone();
        let written: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(result)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        match written {
            Some(_) => Ok(()),
            None => Err(StoreError::Conflict { key }),
        }
    }

    async fn status(&self, job_id: &str) -> StoreResult<Option<JobStatus>> {
        let key = self.config.status_key(job_id);
        let mut conn = self.commands.clone();
        let value: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        value
            .map(|value| {
                value
                    .parse::<JobStatus>()
                    .map_err(|_| StoreError::InvalidValue { key, value })
            })
            .transpose()
    }

    async fn result(&self, job_id: &str) -> StoreResult<Option<String>> {
        let mut conn = self.commands.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(self.config.result_key(job_id))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl NotificationPublisher for RedisBackend {
    async fn publish(&self, payload: &str) -> QueueResult<()> {
        let mut conn = self.commands.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.config.notification_channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        debug!(payload, receivers, "Published job notification");
        Ok(())
    }
}
