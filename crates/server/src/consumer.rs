//! Queue consumer
//!
//! Drains the Redis list queue with the reliable-queue pattern: BLMOVE each
//! raw message onto a processing list, hand it to the dispatcher in its own
//! task, then settle according to the returned disposition (acknowledge,
//! dead-letter, or push back for redelivery). An admission semaphore bounds
//! the number of in-flight reconciliations; a slow message occupies one
//! permit, never the whole loop.
//!
//! Redeliveries are budgeted: each retry increments a per-message counter in
//! a Redis hash, and a message that exhausts `MAX_DELIVERY_ATTEMPTS` is
//! dead-lettered instead of requeued. Requeues are also delayed so a
//! persistently failing message on an otherwise idle queue cannot spin the
//! BLMOVE/RPUSH cycle hot.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use tokio::sync::Semaphore;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{error, info, warn};

use collector_core::{Dispatcher, Disposition};

use crate::config::Config;

/// Spacing between a negative acknowledgement and the redelivery push
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect to the queue broker, retrying with exponential backoff
pub async fn connect(queue_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(queue_url)?;

    let strategy = ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(10);

    let manager = Retry::spawn(strategy, || async {
        client.get_connection_manager().await.map_err(|e| {
            warn!(error = %e, "Queue connection attempt failed");
            e
        })
    })
    .await?;

    info!("Queue connection established");
    Ok(manager)
}

/// Probe queue connectivity
pub async fn queue_healthy(redis: &ConnectionManager) -> bool {
    let mut conn = redis.clone();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Queue health probe failed");
            false
        }
    }
}

/// Where a settled message ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleAction {
    /// Acknowledged; remove the in-flight copy and clear its retry counter
    Drop,
    /// Remove the in-flight copy, park on the dead-letter list, clear counter
    DeadLetter,
    /// Remove the in-flight copy and push back onto the live queue
    Requeue,
}

/// Map a disposition and the message's delivery attempt count to a settle
/// action. A retry past the budget dead-letters: a store failure that
/// survives this many redeliveries is not transient.
fn settle_action(disposition: Disposition, attempts: i64, max_attempts: u32) -> SettleAction {
    match disposition {
        Disposition::Ack => SettleAction::Drop,
        Disposition::DeadLetter => SettleAction::DeadLetter,
        Disposition::Retry if attempts >= i64::from(max_attempts) => SettleAction::DeadLetter,
        Disposition::Retry => SettleAction::Requeue,
    }
}

/// Everything a spawned delivery task needs to process and settle a message
#[derive(Clone)]
struct DeliveryContext {
    redis: ConnectionManager,
    dispatcher: Arc<Dispatcher>,
    queue_key: Arc<str>,
    processing_key: Arc<str>,
    dead_letter_key: Arc<str>,
    retries_key: Arc<str>,
    max_delivery_attempts: u32,
}

impl DeliveryContext {
    async fn handle(mut self, raw: String) {
        let disposition = match serde_json::from_str(&raw) {
            Ok(payload) => self.dispatcher.process(payload).await,
            Err(e) => {
                error!(error = %e, "Delivery is not valid JSON");
                Disposition::DeadLetter
            }
        };

        // Count this delivery only when it asks for another one
        let attempts = if disposition == Disposition::Retry {
            match redis::cmd("HINCRBY")
                .arg(&*self.retries_key)
                .arg(&raw)
                .arg(1)
                .query_async::<i64>(&mut self.redis)
                .await
            {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Failed to count delivery attempt");
                    1
                }
            }
        } else {
            0
        };

        let action = settle_action(disposition, attempts, self.max_delivery_attempts);
        if disposition == Disposition::Retry && action == SettleAction::DeadLetter {
            error!(
                attempts = attempts,
                max_attempts = self.max_delivery_attempts,
                "Delivery exhausted its retry budget; dead-lettering"
            );
        }

        // Always remove the in-flight copy first; dead-letter and requeue
        // then re-home the raw message
        let mut pipe = redis::pipe();
        pipe.cmd("LREM").arg(&*self.processing_key).arg(1).arg(&raw);
        match action {
            SettleAction::Drop => {
                pipe.cmd("HDEL").arg(&*self.retries_key).arg(&raw);
            }
            SettleAction::DeadLetter => {
                pipe.cmd("LPUSH").arg(&*self.dead_letter_key).arg(&raw);
                pipe.cmd("HDEL").arg(&*self.retries_key).arg(&raw);
            }
            SettleAction::Requeue => {
                // An immediate RPUSH on an idle queue comes straight back
                tokio::time::sleep(RETRY_DELAY).await;
                pipe.cmd("RPUSH").arg(&*self.queue_key).arg(&raw);
            }
        }

        if let Err(e) = pipe.query_async::<()>(&mut self.redis).await {
            // The message stays on the processing list; an operator (or a
            // future reaper) can requeue it from there
            error!(
                error = %e,
                disposition = ?disposition,
                "Failed to settle delivery"
            );
        }
    }
}

pub struct QueueConsumer {
    context: DeliveryContext,
    limit: Arc<Semaphore>,
}

impl QueueConsumer {
    pub fn new(redis: ConnectionManager, dispatcher: Arc<Dispatcher>, config: &Config) -> Self {
        Self {
            context: DeliveryContext {
                redis,
                dispatcher,
                queue_key: config.queue_key().into(),
                processing_key: config.processing_key().into(),
                dead_letter_key: config.dead_letter_key().into(),
                retries_key: config.retries_key().into(),
                max_delivery_attempts: config.max_delivery_attempts,
            },
            limit: Arc::new(Semaphore::new(config.max_in_flight)),
        }
    }

    /// Consume until the process shuts down. Each delivery is processed as
    /// an independently scheduled unit of work behind an owned permit.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            queue = %self.context.queue_key,
            max_in_flight = self.limit.available_permits(),
            max_delivery_attempts = self.context.max_delivery_attempts,
            "Queue consumer started"
        );

        let mut conn = self.context.redis.clone();

        loop {
            let permit = self.limit.clone().acquire_owned().await?;

            // Blocking pop with a timeout so shutdown signals and broker
            // hiccups surface in the loop instead of hanging it forever
            let raw: Option<String> = match redis::cmd("BLMOVE")
                .arg(&*self.context.queue_key)
                .arg(&*self.context.processing_key)
                .arg("LEFT")
                .arg("RIGHT")
                .arg(5.0)
                .query_async(&mut conn)
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, "Failed to fetch from queue; backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let Some(raw) = raw else {
                // Timeout with an empty queue; release the permit and poll again
                continue;
            };

            let context = self.context.clone();
            tokio::spawn(async move {
                let _permit = permit;
                context.handle(raw).await;
            });
        }
    }
}
