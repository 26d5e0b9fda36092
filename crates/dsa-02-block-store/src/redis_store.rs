//! Redis-backed block store.
//!
//! Keys are `{prefix}:{source_address}`, values the strings `blocked` or
//! `clear`. The multiplexed connection is opened on first use and dropped
//! after any failure, so the next operation reconnects.

use crate::error::StoreError;
use crate::ports::BlockStore;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use shared_types::{BlockState, FlagLookup};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct RedisBlockStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    key_prefix: String,
    connect_timeout: Duration,
    op_timeout: Duration,
}

impl RedisBlockStore {
    /// Parse the address. Does not connect.
    pub fn new(
        address: &str,
        key_prefix: &str,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::open(address).map_err(|e| StoreError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            key_prefix: key_prefix.to_string(),
            connect_timeout,
            op_timeout,
        })
    }

    pub fn key(&self, source_address: &str) -> String {
        format!("{}:{}", self.key_prefix, source_address)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.connect_timeout))??;
        info!(
            address = ?self.client.get_connection_info().addr,
            "[dsa-02] Connected to Redis"
        );
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        self.connection.lock().await.take();
    }

    /// Run one command under the op timeout, dropping the connection on failure.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        let result = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => StoreError::from(e),
            Err(_) => StoreError::Timeout(self.op_timeout),
        };
        warn!(op, error = %result, "[dsa-02] Redis operation failed, reconnecting on next use");
        self.reset_connection().await;
        Err(result)
    }
}

#[async_trait]
impl BlockStore for RedisBlockStore {
    async fn get(&self, source_address: &str) -> Result<FlagLookup, StoreError> {
        let key = self.key(source_address);
        let mut conn = self.connection().await?;
        let value: Option<String> = self
            .bounded("get", async { conn.get(key.as_str()).await })
            .await?;

        match value {
            None => Ok(FlagLookup::Absent),
            Some(raw) => raw
                .parse::<BlockState>()
                .map(FlagLookup::from)
                .map_err(|_| StoreError::CorruptValue { key, value: raw }),
        }
    }

    async fn set_blocked(&self, source_address: &str) -> Result<(), StoreError> {
        let key = self.key(source_address);
        let mut conn = self.connection().await?;
        self.bounded("set", async {
            conn.set::<_, _, ()>(key.as_str(), BlockState::Blocked.as_str())
                .await
        })
        .await?;
        debug!(source = %source_address, key = %key, "[dsa-02] Flag set");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
