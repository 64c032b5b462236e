//! Author → user link persistence on top of a [`RecordStore`].

use crate::config::MetaKeys;
use crate::error::ReconError;
use crate::model::{AuthorId, AuthorRecord, AuthorSource, AuthorView, UserId, UserRecord};
use crate::store::RecordStore;

pub struct LinkStore<'a, S: RecordStore + ?Sized> {
    store: &'a mut S,
    keys: &'a MetaKeys,
}

impl<'a, S: RecordStore + ?Sized> LinkStore<'a, S> {
    pub fn new(store: &'a mut S, keys: &'a MetaKeys) -> Self {
        Self { store, keys }
    }

    /// Current link: the meta slot first, then the link embedded in the author object.
    pub fn get_link(&self, author_id: AuthorId) -> Option<UserId> {
        read_link(&*self.store, self.keys, author_id)
    }

    /// Write the link slot and mirror it onto a provider object when one exists.
    ///
    /// Only the slot write decides success; mirror failures are logged.
    pub fn set_link(&mut self, author_id: AuthorId, user_id: UserId) -> Result<(), ReconError> {
        self.store
            .set_term_meta(author_id, &self.keys.link, &user_id.to_string())?;

        self.mirror(author_id, |record| record.user_id = Some(user_id));
        Ok(())
    }

    /// Copy the user's public fields onto the author, then write the link.
    ///
    /// Empty user fields are left alone on the author.
    pub fn sync_fields(&mut self, author_id: AuthorId, user: &UserRecord) -> Result<(), ReconError> {
        let fields = [
            (&self.keys.display_name, Some(user.display_name.as_str())),
            (&self.keys.user_email, Some(user.email.as_str())),
            (&self.keys.user_url, user.url.as_deref()),
            (&self.keys.description, user.description.as_deref()),
        ];
        for (key, value) in fields {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                self.store.set_term_meta(author_id, key, value)?;
            }
        }

        self.store
            .set_term_meta(author_id, &self.keys.link, &user.id.to_string())?;

        self.mirror(author_id, |record| {
            record.user_id = Some(user.id);
            if !user.display_name.trim().is_empty() {
                record.display_name = Some(user.display_name.clone());
            }
            if !user.email.trim().is_empty() {
                record.email = Some(user.email.clone());
            }
            if let Some(url) = user.url.as_ref().filter(|v| !v.trim().is_empty()) {
                record.url = Some(url.clone());
            }
            if let Some(bio) = user.description.as_ref().filter(|v| !v.trim().is_empty()) {
                record.description = Some(bio.clone());
            }
        });
        Ok(())
    }

    fn mirror(&mut self, author_id: AuthorId, apply: impl FnOnce(&mut AuthorRecord)) {
        let mut record = match self.store.get_author(author_id) {
            Ok(Some(AuthorSource::Native(record))) => record,
            Ok(_) => return,
            Err(e) => {
                log::warn!("author {author_id}: cannot load provider object for mirror: {e}");
                return;
            }
        };
        apply(&mut record);
        if let Err(e) = self.store.save_author(&record) {
            log::warn!("author {author_id}: provider object save failed: {e}");
        }
    }
}

/// Read-only link lookup usable without a mutable store borrow.
pub fn read_link<S>(store: &S, keys: &MetaKeys, author_id: AuthorId) -> Option<UserId>
where
    S: RecordStore + ?Sized,
{
    match store.get_term_meta(author_id, &keys.link) {
        Ok(Some(raw)) => {
            if let Some(id) = parse_user_id(&raw) {
                return Some(id);
            }
        }
        Ok(None) => {}
        Err(e) => log::warn!("author {author_id}: reading link slot failed: {e}"),
    }

    match store.get_author(author_id) {
        Ok(Some(author)) => author.embedded_link(),
        Ok(None) => None,
        Err(e) => {
            log::warn!("author {author_id}: loading author object failed: {e}");
            None
        }
    }
}

/// Positive integer ids only; anything else counts as "not linked".
fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}
