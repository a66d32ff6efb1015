//! Local environment-key cache.
//!
//! Holds the resolved key for each `(project, env)` plus a short history
//! of superseded versions, so records still encrypted under an older key
//! can be read until they are re-encrypted. Writes go through to the
//! secret store under `env:<project>:<env>:kek`; the cache can be dropped
//! and rebuilt from the remote service at any time.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::core::cipher::SymmetricKey;
use crate::core::constants::RETAINED_KEK_VERSIONS;
use crate::core::domain::{KeyVersion, Scope};
use crate::core::encoding;
use crate::core::store::SecretStore;
use crate::core::types::Fingerprint;
use crate::error::{Result, StoreError};

/// A resolved environment key.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedKey {
    pub key: SymmetricKey,
    pub version: u32,
    pub fingerprint: Fingerprint,
}

impl CachedKey {
    pub fn new(key: SymmetricKey, version: u32) -> Self {
        let fingerprint = key.fingerprint();
        Self {
            key,
            version,
            fingerprint,
        }
    }

    pub fn matches(&self, version: u32, fingerprint: &str) -> bool {
        self.version == version && self.fingerprint == fingerprint
    }

    pub fn key_version(&self) -> KeyVersion {
        KeyVersion {
            version: self.version,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl std::fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedKey")
            .field("version", &self.version)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
struct Entry {
    current: Option<CachedKey>,
    retained: VecDeque<CachedKey>,
}

impl Entry {
    fn retain(&mut self, old: CachedKey) {
        if self.retained.iter().any(|k| k.fingerprint == old.fingerprint) {
            return;
        }
        self.retained.push_front(old);
        self.retained.truncate(RETAINED_KEK_VERSIONS);
    }

    fn all(&self) -> impl Iterator<Item = &CachedKey> {
        self.current.iter().chain(self.retained.iter())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredKey {
    version: u32,
    fingerprint: Fingerprint,
    key_b64: String,
}

#[derive(Serialize, Deserialize, Default)]
struct StoredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<StoredKey>,
    #[serde(default)]
    retained: Vec<StoredKey>,
}

fn to_stored(key: &CachedKey) -> StoredKey {
    StoredKey {
        version: key.version,
        fingerprint: key.fingerprint.clone(),
        key_b64: encoding::encode(key.key.as_bytes()),
    }
}

fn from_stored(name: &str, stored: &StoredKey) -> Result<CachedKey> {
    let bytes = Zeroizing::new(encoding::decode("key_b64", &stored.key_b64)?);
    let key = SymmetricKey::from_slice(&bytes)?;
    if key.fingerprint() != stored.fingerprint {
        return Err(StoreError::InvalidFormat {
            name: name.to_string(),
            reason: "cached key does not match its fingerprint".to_string(),
        }
        .into());
    }
    Ok(CachedKey {
        key,
        version: stored.version,
        fingerprint: stored.fingerprint.clone(),
    })
}

fn registry() -> &'static Mutex<HashMap<usize, Weak<KeyCache>>> {
    static CACHES: OnceLock<Mutex<HashMap<usize, Weak<KeyCache>>>> = OnceLock::new();
    CACHES.get_or_init(Default::default)
}

/// Write-through environment-key cache with per-scope single-flight locks.
///
/// Locks only serialize callers holding the same `KeyCache`; use
/// [`KeyCache::shared`] unless the cache is deliberately private.
pub struct KeyCache {
    store: Arc<dyn SecretStore>,
    entries: Mutex<HashMap<String, Entry>>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyCache {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide cache for `store`.
    ///
    /// Every caller passing the same store gets the same cache, and so the
    /// same per-scope locks. The cache lives as long as someone holds it.
    pub fn shared(store: Arc<dyn SecretStore>) -> Arc<Self> {
        let id = Arc::as_ptr(&store) as *const () as usize;
        let mut caches = registry().lock().unwrap_or_else(|p| p.into_inner());
        caches.retain(|_, cache| cache.strong_count() > 0);
        if let Some(cache) = caches.get(&id).and_then(Weak::upgrade) {
            return cache;
        }
        let cache = Arc::new(Self::new(store));
        caches.insert(id, Arc::downgrade(&cache));
        cache
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Lock serializing read-modify-write of one scope's key.
    pub fn flight(&self, scope: &Scope) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().unwrap_or_else(|p| p.into_inner());
        flights.entry(scope.cache_key()).or_default().clone()
    }

    fn load(&self, scope: &Scope) -> Result<Entry> {
        let name = scope.cache_key();
        if let Some(entry) = self.entries().get(&name) {
            return Ok(entry.clone());
        }

        let Some(bytes) = self.store.get_key(&name)? else {
            return Ok(Entry::default());
        };
        let stored: StoredEntry = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::InvalidFormat {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let entry = Entry {
            current: stored
                .current
                .as_ref()
                .map(|k| from_stored(&name, k))
                .transpose()?,
            retained: stored
                .retained
                .iter()
                .map(|k| from_stored(&name, k))
                .collect::<Result<_>>()?,
        };
        trace!(scope = %scope, "loaded cached key from store");
        self.entries().insert(name, entry.clone());
        Ok(entry)
    }

    fn save(&self, scope: &Scope, entry: Entry) -> Result<()> {
        let name = scope.cache_key();
        let stored = StoredEntry {
            current: entry.current.as_ref().map(to_stored),
            retained: entry.retained.iter().map(to_stored).collect(),
        };
        let bytes = Zeroizing::new(serde_json::to_vec(&stored)?);
        self.store.set_key(&name, &bytes)?;
        self.entries().insert(name, entry);
        Ok(())
    }

    /// Current key for a scope.
    pub fn get(&self, scope: &Scope) -> Result<Option<CachedKey>> {
        Ok(self.load(scope)?.current)
    }

    /// Make `key` current. A different previous key moves to history.
    pub fn put(&self, scope: &Scope, key: CachedKey) -> Result<()> {
        let mut entry = self.load(scope)?;
        if let Some(old) = entry.current.take() {
            if old.fingerprint != key.fingerprint {
                entry.retain(old);
            }
        }
        entry.retained.retain(|k| k.fingerprint != key.fingerprint);
        debug!(scope = %scope, version = key.version, "cached environment key");
        entry.current = Some(key);
        self.save(scope, entry)
    }

    /// Demote the current key to history. Used when the remote reports a
    /// different version or fingerprint.
    pub fn evict(&self, scope: &Scope) -> Result<()> {
        let mut entry = self.load(scope)?;
        if let Some(old) = entry.current.take() {
            debug!(scope = %scope, version = old.version, "evicted cached environment key");
            entry.retain(old);
            self.save(scope, entry)?;
        }
        Ok(())
    }

    /// Drop the current key if it is `fingerprint`, without keeping it in
    /// history. For a minted key that never reached the remote service.
    pub fn discard(&self, scope: &Scope, fingerprint: &str) -> Result<()> {
        let mut entry = self.load(scope)?;
        if entry
            .current
            .as_ref()
            .is_some_and(|k| k.fingerprint == fingerprint)
        {
            entry.current = None;
            debug!(scope = %scope, "discarded unpublished environment key");
            self.save(scope, entry)?;
        }
        Ok(())
    }

    /// Forget everything about a scope, history included.
    pub fn clear(&self, scope: &Scope) -> Result<()> {
        let name = scope.cache_key();
        self.entries().remove(&name);
        self.store.delete_key(&name)
    }

    /// Current or retained key with the given fingerprint.
    pub fn key_for_fingerprint(&self, scope: &Scope, fingerprint: &str) -> Result<Option<CachedKey>> {
        Ok(self
            .load(scope)?
            .all()
            .find(|k| k.fingerprint == fingerprint)
            .cloned())
    }

    /// Current key first, then retained history, newest first.
    pub fn keys(&self, scope: &Scope) -> Result<Vec<CachedKey>> {
        Ok(self.load(scope)?.all().cloned().collect())
    }
}
