use crate::model::user::{User, normalize_username};
use crate::store::{RecordStore, StoreError};
use anyhow::Result;
use autoscale_cuckoo_filter::CuckooFilter;
use moka::future::Cache;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Case-insensitive username lookups in front of the record store.
///
/// The moka cache maps lower-cased usernames to users (users are never
/// deleted, so positive entries stay valid). The cuckoo filter answers
/// "definitely unused" for registration without touching the store.
pub struct UsernameIndex {
    store: Arc<dyn RecordStore>,
    cache: Cache<String, User>,
    filter: RwLock<CuckooFilter<String>>,
}

impl UsernameIndex {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(500_000) // tune based on memory
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }

    /// Finds a user regardless of the case the username was typed in.
    pub async fn resolve(&self, username: &str) -> Result<Option<User>, StoreError> {
        let key = normalize_username(username);

        if let Some(user) = self.cache.get(&key).await {
            return Ok(Some(user));
        }

        let found = self.store.find_user_by_username(&key).await?;
        if let Some(user) = &found {
            self.record(user).await;
        }
        Ok(found)
    }

    /// Check if a username might exist (false positives possible)
    pub fn might_exist(&self, username: &str) -> bool {
        let key = normalize_username(username);
        self.filter
            .read()
            .map(|filter| filter.contains(&key))
            // a poisoned filter can no longer rule anything out
            .unwrap_or(true)
    }

    /// true  => username AVAILABLE
    /// false => username TAKEN
    pub async fn is_available(&self, username: &str) -> Result<bool, StoreError> {
        // 1️⃣ Cuckoo filter — fast negative
        if !self.might_exist(username) {
            return Ok(true);
        }

        // 2️⃣ Moka cache — fast positive
        if self.cache.contains_key(&normalize_username(username)) {
            return Ok(false);
        }

        // 3️⃣ Store fallback
        Ok(self.resolve(username).await?.is_none())
    }

    /// Remembers a user that now exists in the store.
    pub async fn record(&self, user: &User) {
        let key = normalize_username(&user.username);
        if let Ok(mut filter) = self.filter.write() {
            filter.add(&key);
        }
        self.cache.insert(key, user.clone()).await;
    }

    /// Loads every known username into the filter and cache, in batches.
    pub async fn warmup(&self, batch_size: usize) -> Result<usize> {
        let users = self.store.list_users().await?;
        let total = users.len();

        for batch in users.chunks(batch_size.max(1)) {
            if let Ok(mut filter) = self.filter.write() {
                for user in batch {
                    filter.add(&normalize_username(&user.username));
                }
            }

            let inserts: Vec<_> = batch
                .iter()
                .map(|u| self.cache.insert(normalize_username(&u.username), u.clone()))
                .collect();
            // Await all insertions concurrently
            futures::future::join_all(inserts).await;
        }

        log::info!("Username index warmup complete: {} users", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::model::user::NewUser;
    use crate::store::UserStore;
    use crate::store::memory::MemoryStore;

    async fn seeded() -> (Arc<MemoryStore>, UsernameIndex) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(NewUser {
                username: "Alice".into(),
                password: "x".into(),
                role: Role::Employee,
            })
            .await
            .unwrap();
        let index = UsernameIndex::new(store.clone());
        (store, index)
    }

    #[actix_web::test]
    async fn resolve_ignores_case() {
        let (_, index) = seeded().await;

        let user = index.resolve("aLiCe").await.unwrap().unwrap();
        assert_eq!(user.username, "Alice");
        assert!(index.resolve("mallory").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn warmup_fills_filter_and_cache() {
        let (_, index) = seeded().await;
        assert!(!index.might_exist("alice"));

        let warmed = index.warmup(1).await.unwrap();
        assert_eq!(warmed, 1);
        assert!(index.might_exist("alice"));
        assert!(!index.is_available("Alice").await.unwrap());
        assert!(index.is_available("bob").await.unwrap());
    }

    #[actix_web::test]
    async fn recorded_user_is_taken_without_store_lookup() {
        let (store, index) = seeded().await;
        let bob = store
            .insert_user(NewUser {
                username: "Bob".into(),
                password: "x".into(),
                role: Role::Approver,
            })
            .await
            .unwrap();

        index.record(&bob).await;
        assert!(index.might_exist("BOB"));
        assert!(!index.is_available("bob").await.unwrap());
    }
}
