//! Persisted user-name slot

use std::sync::Mutex;

use crate::Result;
use crate::db::{DbPool, KvRepo};

/// Key under which the last known user name is kept
pub const USER_NAME_KEY: &str = "user_name";

/// A single persisted name slot
///
/// Written by the naming turn, read at greeting time, cleared on teardown.
pub trait NameStore: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the backing store fails
    fn load(&self) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns error if the backing store fails
    fn save(&self, name: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the backing store fails
    fn clear(&self) -> Result<()>;
}

/// Name slot stored in the local database
#[derive(Clone)]
pub struct SqliteNameStore {
    repo: KvRepo,
}

impl SqliteNameStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self {
            repo: KvRepo::new(pool),
        }
    }
}

impl NameStore for SqliteNameStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.repo.get(USER_NAME_KEY)?.filter(|n| !n.trim().is_empty()))
    }

    fn save(&self, name: &str) -> Result<()> {
        self.repo.set(USER_NAME_KEY, name)
    }

    fn clear(&self) -> Result<()> {
        self.repo.delete(USER_NAME_KEY)
    }
}

/// Name slot that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryNameStore {
    name: Mutex<Option<String>>,
}

impl MemoryNameStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a name already remembered
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Mutex::new(Some(name.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        match self.name.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NameStore for MemoryNameStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn save(&self, name: &str) -> Result<()> {
        *self.slot() = Some(name.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}
