use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{JobDescriptor, JobQueue, QueueError};

/// How long a single BRPOP blocks before returning empty-handed.
const POLL_SECONDS: u64 = 5;

/// Redis list used as a FIFO queue: producers `LPUSH`, the worker `BRPOP`s.
///
/// Delivery is acknowledged by the pop itself. A worker that dies mid-evaluation
/// loses that message; the record stays in `processing`.
///
/// Publisher and consumer hold separate connections so a blocking pop never
/// stalls submission. A connection that errors is dropped and re-dialed on next use.
pub struct RedisJobQueue {
    client: Client,
    queue_name: String,
    publish_timeout: Duration,
    publisher: Mutex<Option<MultiplexedConnection>>,
    consumer: Mutex<Option<MultiplexedConnection>>,
}

impl RedisJobQueue {
    /// Connects and verifies the broker answers within `publish_timeout`.
    pub async fn open(
        url: &str,
        queue_name: &str,
        publish_timeout: Duration,
    ) -> Result<Self, QueueError> {
        let client = Client::open(url)?;
        let queue = Self {
            client,
            queue_name: queue_name.to_string(),
            publish_timeout,
            publisher: Mutex::new(None),
            consumer: Mutex::new(None),
        };

        let ping = async {
            let mut conn = queue.connection(&queue.publisher).await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, QueueError>(())
        };
        tokio::time::timeout(publish_timeout, ping)
            .await
            .map_err(|_| QueueError::Timeout(publish_timeout))??;

        info!(queue = %queue.queue_name, "Connected to Redis job queue");
        Ok(queue)
    }

    async fn connection(
        &self,
        slot: &Mutex<Option<MultiplexedConnection>>,
    ) -> Result<MultiplexedConnection, QueueError> {
        let mut guard = slot.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self, slot: &Mutex<Option<MultiplexedConnection>>) {
        *slot.lock().await = None;
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn publish(&self, job: &JobDescriptor) -> Result<(), QueueError> {
        let body = job.encode()?;

        let push = async {
            let mut conn = self.connection(&self.publisher).await?;
            let depth: i64 = redis::cmd("LPUSH")
                .arg(&self.queue_name)
                .arg(&body)
                .query_async(&mut conn)
                .await?;
            Ok::<_, QueueError>(depth)
        };

        match tokio::time::timeout(self.publish_timeout, push).await {
            Ok(Ok(depth)) => {
                debug!(evaluation_id = job.evaluation_id, depth, "Published job");
                Ok(())
            }
            Ok(Err(e)) => {
                self.reset(&self.publisher).await;
                Err(e)
            }
            Err(_) => {
                self.reset(&self.publisher).await;
                Err(QueueError::Timeout(self.publish_timeout))
            }
        }
    }

    async fn receive(&self) -> Result<Option<JobDescriptor>, QueueError> {
        let mut conn = self.connection(&self.consumer).await?;

        let popped: Option<(String, String)> = match redis::cmd("BRPOP")
            .arg(&self.queue_name)
            .arg(POLL_SECONDS)
            .query_async(&mut conn)
            .await
        {
            Ok(popped) => popped,
            Err(e) => {
                warn!(error = %e, "BRPOP failed, dropping consumer connection");
                self.reset(&self.consumer).await;
                return Err(e.into());
            }
        };

        match popped {
            Some((_, body)) => JobDescriptor::decode(&body).map(Some),
            None => Ok(None),
        }
    }
}
