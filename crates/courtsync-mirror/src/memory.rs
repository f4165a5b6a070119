use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::{Fields, MirrorError, MirrorStore};

#[derive(Debug, Default)]
struct Keyspace {
    sets: HashMap<String, BTreeSet<String>>,
    hashes: HashMap<String, Fields>,
}

/// In-process mirror store.
///
/// Behaves like the Redis subset the mirror uses: sets disappear when
/// their last member is removed and missing keys read as empty. Call
/// [`set_online(false)`](Self::set_online) to make every operation fail
/// with [`MirrorError::Unavailable`] until it is brought back.
#[derive(Debug)]
pub struct MemoryStore {
    keys: RwLock<Keyspace>,
    online: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            keys: RwLock::default(),
            online: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether a key of any type exists.
    pub async fn contains_key(&self, key: &str) -> bool {
        let keys = self.keys.read().await;
        keys.sets.contains_key(key) || keys.hashes.contains_key(key)
    }

    fn check_online(&self) -> Result<(), MirrorError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MirrorError::Unavailable)
        }
    }
}

impl MirrorStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<(), MirrorError> {
        self.check_online()?;
        self.keys
            .write()
            .await
            .sets
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), MirrorError> {
        self.check_online()?;
        let mut keys = self.keys.write().await;
        if let Some(set) = keys.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                keys.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, MirrorError> {
        self.check_online()?;
        let keys = self.keys.read().await;
        Ok(keys
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), MirrorError> {
        self.check_online()?;
        if fields.is_empty() {
            return Ok(());
        }
        self.keys
            .write()
            .await
            .hashes
            .entry(key.to_owned())
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<Fields, MirrorError> {
        self.check_online()?;
        Ok(self
            .keys
            .read()
            .await
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), MirrorError> {
        self.check_online()?;
        let mut keys = self.keys.write().await;
        keys.sets.remove(key);
        keys.hashes.remove(key);
        Ok(())
    }
}
