/*
[INPUT]:  Token records to persist, generation expectations from callers
[OUTPUT]: Durable token storage and generation-checked commits
[POS]:    Auth layer - token persistence (source of truth for the route gate)
[UPDATE]: When storage format, file permissions, or commit semantics change
*/

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::http::{Result, SessionError};
use crate::types::StoredTokens;

/// Durable holder of the current token pair.
///
/// Implementations must never persist or hand back a partial pair: `save`
/// refuses one, and a record missing either token is reported as absent.
pub trait TokenStore: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<Option<StoredTokens>>;

    fn save(&self, tokens: &StoredTokens) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Thread-safe in-memory token store
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    data: Arc<RwLock<Option<StoredTokens>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredTokens>> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone().filter(StoredTokens::is_well_formed))
    }

    fn save(&self, tokens: &StoredTokens) -> Result<()> {
        ensure_well_formed(tokens)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

/// JSON file token store; survives process restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredTokens>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<StoredTokens>(&content) {
            Ok(tokens) if tokens.is_well_formed() => Ok(Some(tokens)),
            Ok(_) => {
                warn!(path = %self.path.display(), "persisted token pair is partial; treating as absent");
                Ok(None)
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "persisted token file unreadable; treating as absent");
                Ok(None)
            }
        }
    }

    fn save(&self, tokens: &StoredTokens) -> Result<()> {
        ensure_well_formed(tokens)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so readers never observe a half-written pair
        let temp_path = self.temp_path();
        fs::write(&temp_path, serde_json::to_vec_pretty(tokens)?)?;
        restrict_permissions(&temp_path)?;
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "token pair persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn ensure_well_formed(tokens: &StoredTokens) -> Result<()> {
    if tokens.is_well_formed() {
        Ok(())
    } else {
        Err(SessionError::MalformedTokenPair(
            "refusing to persist a partial token pair".to_string(),
        ))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Persisted tokens tagged with the generation they were read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub generation: u64,
    pub tokens: StoredTokens,
}

/// Generation-tagged front of a [`TokenStore`].
///
/// Every write bumps the generation. Writers holding an older generation are
/// refused instead of overwriting newer state.
#[derive(Debug)]
pub struct TokenLedger {
    store: Arc<dyn TokenStore>,
    generation: Mutex<u64>,
}

impl TokenLedger {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            generation: Mutex::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        *self.lock()
    }

    /// Re-read persisted state; never served from a cache.
    pub fn current(&self) -> Result<Option<LedgerEntry>> {
        let generation = self.lock();
        Ok(self.store.load()?.map(|tokens| LedgerEntry {
            generation: *generation,
            tokens,
        }))
    }

    pub fn is_present(&self) -> bool {
        matches!(self.store.load(), Ok(Some(_)))
    }

    /// Unconditional write (login, explicit token set). Returns the new generation.
    pub fn replace(&self, tokens: &StoredTokens) -> Result<u64> {
        let mut generation = self.lock();
        self.store.save(tokens)?;
        *generation += 1;
        Ok(*generation)
    }

    /// Write only if nothing happened since `expected`.
    pub fn replace_if_current(&self, expected: u64, tokens: &StoredTokens) -> Result<Option<u64>> {
        let mut generation = self.lock();
        if *generation != expected {
            return Ok(None);
        }
        self.store.save(tokens)?;
        *generation += 1;
        Ok(Some(*generation))
    }

    /// Commit a rotated pair produced from `previous_refresh_token`.
    ///
    /// Refused when the generation moved or when storage now holds a pair
    /// written by another process sharing the same store.
    pub fn commit_rotation(
        &self,
        expected: u64,
        previous_refresh_token: &str,
        tokens: &StoredTokens,
    ) -> Result<Option<u64>> {
        let mut generation = self.lock();
        if *generation != expected {
            return Ok(None);
        }
        match self.store.load()? {
            Some(current) if current.refresh_token == previous_refresh_token => {}
            _ => return Ok(None),
        }
        self.store.save(tokens)?;
        *generation += 1;
        Ok(Some(*generation))
    }

    /// Remove persisted tokens, returning what was there.
    pub fn take(&self) -> Result<Option<StoredTokens>> {
        let mut generation = self.lock();
        *generation += 1;
        let previous = self.store.load().unwrap_or_else(|err| {
            warn!(error = %err, "could not read tokens before clearing");
            None
        });
        self.store.clear()?;
        Ok(previous)
    }

    /// Remove persisted tokens only if they still belong to `expected`.
    pub fn clear_if_current(&self, expected: u64) -> Result<bool> {
        let mut generation = self.lock();
        if *generation != expected {
            return Ok(false);
        }
        *generation += 1;
        self.store.clear()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("marketplace-session-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn tokens(access: &str, refresh: &str) -> StoredTokens {
        let now = Utc::now();
        StoredTokens {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            token_type: "Bearer".to_string(),
            expires_at: now + Duration::hours(1),
            stored_at: now,
        }
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&tokens("a", "r")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "a");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_refuses_partial_pair() {
        let store = MemoryTokenStore::new();
        store.save(&tokens("a", "r")).unwrap();

        let err = store.save(&tokens("a2", "")).unwrap_err();
        assert!(matches!(err, SessionError::MalformedTokenPair(_)));
        assert_eq!(store.load().unwrap().unwrap().access_token, "a");
    }

    #[test]
    fn test_file_store_refuses_partial_pair() {
        let dir = temp_dir();
        let store = FileTokenStore::new(dir.join("session.json"));

        let err = store.save(&tokens("", "r")).unwrap_err();
        assert!(matches!(err, SessionError::MalformedTokenPair(_)));
        assert!(!store.path().exists());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_hides_partial_record() {
        let dir = temp_dir();
        let path = dir.join("session.json");
        let mut partial = tokens("a", "r");
        partial.refresh_token = String::new();
        fs::write(&path, serde_json::to_vec(&partial).unwrap()).unwrap();

        assert!(FileTokenStore::new(&path).load().unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_round_trip_and_permissions() {
        let dir = temp_dir();
        let store = FileTokenStore::new(dir.join("nested").join("session.json"));

        assert!(store.load().unwrap().is_none());
        let saved = tokens("a", "r");
        store.save(&saved).unwrap();

        let reopened = FileTokenStore::new(store.path());
        assert_eq!(reopened.load().unwrap(), Some(saved));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(store.path()).unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_store_treats_garbage_as_absent() {
        let dir = temp_dir();
        let path = dir.join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(store.load().unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_ledger_generation_bumps_on_every_write() {
        let ledger = TokenLedger::new(Arc::new(MemoryTokenStore::new()));
        assert_eq!(ledger.generation(), 0);

        assert_eq!(ledger.replace(&tokens("a", "r")).unwrap(), 1);
        assert_eq!(ledger.current().unwrap().unwrap().generation, 1);

        assert_eq!(ledger.take().unwrap().unwrap().access_token, "a");
        assert_eq!(ledger.generation(), 2);
        assert!(!ledger.is_present());
    }

    #[test]
    fn test_ledger_refuses_stale_commits() {
        let ledger = TokenLedger::new(Arc::new(MemoryTokenStore::new()));
        let generation = ledger.replace(&tokens("a1", "r1")).unwrap();

        ledger.take().unwrap();
        let committed = ledger
            .commit_rotation(generation, "r1", &tokens("a2", "r2"))
            .unwrap();

        assert!(committed.is_none());
        assert!(ledger.current().unwrap().is_none());
        assert!(!ledger.clear_if_current(generation).unwrap());
    }

    #[test]
    fn test_ledger_refuses_rotation_over_foreign_write() {
        let store = Arc::new(MemoryTokenStore::new());
        let ledger = TokenLedger::new(store.clone());
        let generation = ledger.replace(&tokens("a1", "r1")).unwrap();

        // another process sharing the store rotated first
        store.save(&tokens("a9", "r9")).unwrap();

        let committed = ledger
            .commit_rotation(generation, "r1", &tokens("a2", "r2"))
            .unwrap();
        assert!(committed.is_none());
        assert_eq!(ledger.current().unwrap().unwrap().tokens.access_token, "a9");
    }
}
