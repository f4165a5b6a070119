//! Redis-backed mirror store.
//!
//! Works against Redis or any server speaking its protocol (Dragonfly,
//! KeyDB, Valkey). Every trait method is a single command, so there is
//! nothing to roll back when one fails.

use fred::prelude::*;

use crate::{Fields, MirrorError, MirrorStore};

/// Mirror store on a shared `fred` client.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Connects to the server at `url`.
    ///
    /// The URL follows the Redis scheme: `redis://host:port` or
    /// `redis://host:port/db`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the URL cannot be parsed.
    /// Returns [`MirrorError::Store`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, MirrorError> {
        let config = Config::from_url(url)
            .map_err(|e| MirrorError::Config(format!("invalid redis url: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("connected to mirror store");
        Ok(Self { client })
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Store`] if `QUIT` fails.
    pub async fn close(&self) -> Result<(), MirrorError> {
        self.client.quit().await?;
        Ok(())
    }
}

impl MirrorStore for RedisStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), MirrorError> {
        let _: i64 = self.client.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), MirrorError> {
        let _: i64 = self.client.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, MirrorError> {
        Ok(self.client.smembers(key).await?)
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), MirrorError> {
        // HSET with no field/value pairs is a syntax error server-side.
        if fields.is_empty() {
            return Ok(());
        }
        let _: i64 = self.client.hset(key, fields).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<Fields, MirrorError> {
        Ok(self.client.hgetall(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), MirrorError> {
        let _: i64 = self.client.del(key).await?;
        Ok(())
    }
}
