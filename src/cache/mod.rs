use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

pub mod performances;

/// Redis-backed response cache. Every failure is treated as a miss.
#[derive(Clone)]
pub struct CacheService {
    conn: MultiplexedConnection,
    ttl_seconds: u64,
}

impl CacheService {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        info!("Redis connected");
        Ok(Self { conn, ttl_seconds })
    }

    /// Удаляет все ключи по шаблону, возвращает количество удалённых
    async fn delete_matching(&self, pattern: &str) -> redis::RedisResult<usize> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await?;

        if !keys.is_empty() {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.del(key).ignore();
            }
            pipe.query_async::<()>(&mut conn).await?;
        }
        Ok(keys.len())
    }
}
