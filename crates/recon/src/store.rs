//! Collaborator seams: the author record store and the user directory.
//!
//! The engine only talks to these traits. `MemoryStore` / `MemoryDirectory`
//! back the CLI (via [`Snapshot`]) and the tests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{AuthorId, AuthorRecord, AuthorSource, AuthorView, UserRecord};

pub type TermMeta = BTreeMap<String, String>;

pub trait RecordStore {
    /// One page of authors in stable listing order.
    fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<AuthorSource>, ReconError>;

    fn count_authors(&self) -> Result<usize, ReconError>;

    fn get_author(&self, id: AuthorId) -> Result<Option<AuthorSource>, ReconError>;

    /// `Ok(None)` when the key is absent.
    fn get_term_meta(&self, id: AuthorId, key: &str) -> Result<Option<String>, ReconError>;

    fn set_term_meta(&mut self, id: AuthorId, key: &str, value: &str) -> Result<(), ReconError>;

    /// Persistence hook for provider-backed author objects.
    fn save_author(&mut self, author: &AuthorRecord) -> Result<(), ReconError>;
}

pub trait IdentityDirectory {
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ReconError>;

    fn find_user_by_login(&self, login: &str) -> Result<Option<UserRecord>, ReconError>;

    fn search_users_by_display_name(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<UserRecord>, ReconError>;

    fn search_users_by_first_last_name(
        &self,
        first: &str,
        last: &str,
    ) -> Result<Vec<UserRecord>, ReconError>;
}

// ---------------------------------------------------------------------------
// In-memory record store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    authors: Vec<AuthorSource>,
    meta: BTreeMap<AuthorId, TermMeta>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authors(authors: Vec<AuthorSource>) -> Self {
        Self { authors, meta: BTreeMap::new() }
    }

    pub fn push_author(&mut self, author: AuthorSource) {
        self.authors.push(author);
    }

    /// Seed a meta value. Unlike `set_term_meta` this never fails.
    pub fn insert_meta(&mut self, id: AuthorId, key: impl Into<String>, value: impl Into<String>) {
        self.meta.entry(id).or_default().insert(key.into(), value.into());
    }

    pub fn meta_for(&self, id: AuthorId) -> Option<&TermMeta> {
        self.meta.get(&id)
    }

    pub fn authors(&self) -> &[AuthorSource] {
        &self.authors
    }
}

impl RecordStore for MemoryStore {
    fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<AuthorSource>, ReconError> {
        Ok(self.authors.iter().skip(offset).take(limit).cloned().collect())
    }

    fn count_authors(&self) -> Result<usize, ReconError> {
        Ok(self.authors.len())
    }

    fn get_author(&self, id: AuthorId) -> Result<Option<AuthorSource>, ReconError> {
        Ok(self.authors.iter().find(|a| a.id() == id).cloned())
    }

    fn get_term_meta(&self, id: AuthorId, key: &str) -> Result<Option<String>, ReconError> {
        Ok(self.meta.get(&id).and_then(|m| m.get(key)).cloned())
    }

    fn set_term_meta(&mut self, id: AuthorId, key: &str, value: &str) -> Result<(), ReconError> {
        if !self.authors.iter().any(|a| a.id() == id) {
            return Err(ReconError::StoreWrite(format!("author {id} does not exist")));
        }
        self.insert_meta(id, key, value);
        Ok(())
    }

    fn save_author(&mut self, author: &AuthorRecord) -> Result<(), ReconError> {
        let slot = self
            .authors
            .iter_mut()
            .find(|a| a.id() == author.id)
            .ok_or_else(|| ReconError::StoreWrite(format!("author {} does not exist", author.id)))?;
        match slot {
            AuthorSource::Native(existing) => {
                *existing = author.clone();
                Ok(())
            }
            AuthorSource::Fallback(_) => Err(ReconError::StoreWrite(format!(
                "author {} has no provider object to save",
                author.id
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory user directory
// ---------------------------------------------------------------------------

/// User directory with case-insensitive exact lookups, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    users: Vec<UserRecord>,
}

impl MemoryDirectory {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    fn find(&self, pred: impl Fn(&UserRecord) -> bool) -> Option<UserRecord> {
        self.users.iter().find(|u| pred(u)).cloned()
    }
}

fn same(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn same_opt(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|a| same(a, b))
}

impl IdentityDirectory for MemoryDirectory {
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ReconError> {
        if email.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.find(|u| same(&u.email, email)))
    }

    fn find_user_by_login(&self, login: &str) -> Result<Option<UserRecord>, ReconError> {
        if login.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.find(|u| same(&u.login, login)))
    }

    fn search_users_by_display_name(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<UserRecord>, ReconError> {
        Ok(self
            .users
            .iter()
            .filter(|u| same(&u.display_name, text))
            .take(limit)
            .cloned()
            .collect())
    }

    fn search_users_by_first_last_name(
        &self,
        first: &str,
        last: &str,
    ) -> Result<Vec<UserRecord>, ReconError> {
        Ok(self
            .users
            .iter()
            .filter(|u| same_opt(u.first_name.as_deref(), first))
            .filter(|u| same_opt(u.last_name.as_deref(), last))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Snapshot file
// ---------------------------------------------------------------------------

/// JSON document holding both record sets plus term meta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub authors: Vec<AuthorSource>,
    #[serde(default)]
    pub term_meta: BTreeMap<AuthorId, TermMeta>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

impl Snapshot {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReconError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn into_parts(self) -> (MemoryStore, MemoryDirectory) {
        let store = MemoryStore { authors: self.authors, meta: self.term_meta };
        (store, MemoryDirectory::new(self.users))
    }

    pub fn from_parts(store: MemoryStore, directory: MemoryDirectory) -> Self {
        Self {
            authors: store.authors,
            term_meta: store.meta,
            users: directory.users,
        }
    }
}
