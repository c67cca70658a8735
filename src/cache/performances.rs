use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::CacheService;

const PREFIX: &str = "performances";

/// Cache key for one page of the schedule.
pub fn key_for(fragments: &[&str]) -> String {
    let digest = Sha256::digest(fragments.join("|").as_bytes());
    format!("{PREFIX}:{digest:x}")
}

impl CacheService {
    /// Получает закешированную страницу расписания.
    pub async fn get_performances(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("performance cache read failed: {:?}", e);
                None
            }
        }
    }

    /// Сохраняет страницу расписания с TTL из конфигурации.
    pub async fn put_performances(&self, key: &str, body: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, body, self.ttl_seconds).await {
            warn!("performance cache write failed: {:?}", e);
        }
    }

    /// Any change to tickets, performances, halls or plays shifts availability.
    pub async fn invalidate_performances(&self) {
        match self.delete_matching(&format!("{PREFIX}:*")).await {
            Ok(n) => debug!("Invalidated {} cached performance pages", n),
            Err(e) => warn!("performance cache invalidation failed: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_deterministic() {
        let a = key_for(&["play=1&hall=&date=", "p=1&ps=20"]);
        let b = key_for(&["play=1&hall=&date=", "p=1&ps=20"]);
        let c = key_for(&["play=2&hall=&date=", "p=1&ps=20"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("performances:"));
        assert_eq!(a.len(), "performances:".len() + 64);
    }
}
