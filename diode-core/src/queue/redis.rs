//! Redis-backed queue driver.
//!
//! Lists as FIFOs: RPUSH appends, LPOP removes the head, LLEN reports
//! depth. The connection manager reconnects on its own; callers layer
//! the bounded retry policy on top.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::error::QueueError;
use crate::queue::MessageQueue;

/// Where and how to reach the Redis server.
#[derive(Debug, Clone)]
pub struct RedisEndpoint {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisEndpoint {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisEndpoint {
    fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    /// Connect and verify the server answers a PING.
    pub async fn connect(endpoint: &RedisEndpoint) -> Result<Self, QueueError> {
        let client = Client::open(endpoint.url())?;
        let mut conn = ConnectionManager::new(client).await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(host = %endpoint.host, port = endpoint.port, "connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn push(&mut self, queue: &str, item: &[u8]) -> Result<(), QueueError> {
        let _: i64 = self.conn.rpush(queue, item).await?;
        Ok(())
    }

    async fn pop(&mut self, queue: &str) -> Result<Option<Vec<u8>>, QueueError> {
        let item: Option<Vec<u8>> = self.conn.lpop(queue, None).await?;
        Ok(item)
    }

    async fn len(&mut self, queue: &str) -> Result<u64, QueueError> {
        let depth: u64 = self.conn.llen(queue).await?;
        Ok(depth)
    }
}
