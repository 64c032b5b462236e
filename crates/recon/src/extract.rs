use std::sync::OnceLock;

use regex::Regex;

use crate::config::MetaKeys;
use crate::model::{AuthorSource, AuthorView, EmailSource};
use crate::store::RecordStore;

// No `\b`: the Unicode-aware boundary rejects addresses glued to CJK or accented text
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEmail {
    pub email: String,
    pub source: EmailSource,
}

/// First address-looking substring of free text.
pub fn scan_for_email(text: &str) -> Option<&str> {
    email_regex().find(text).map(|m| m.as_str())
}

/// Check the author's email sources in priority order; first non-empty wins.
///
/// Store read failures on a source are logged and treated as an empty source.
/// `None` is a normal outcome.
pub fn extract_email<S>(store: &S, author: &AuthorSource, keys: &MetaKeys) -> Option<ExtractedEmail>
where
    S: RecordStore + ?Sized,
{
    let id = author.id();
    let found = |email: &str, source| {
        Some(ExtractedEmail {
            email: email.trim().to_string(),
            source,
        })
    };

    if let Some(email) = read_meta(store, id, &keys.user_email) {
        return found(&email, EmailSource::TermMetaUserEmail);
    }
    if let Some(email) = read_meta(store, id, &keys.email) {
        return found(&email, EmailSource::TermMetaEmail);
    }
    if let Some(email) = non_empty(author.email_attr()) {
        return found(email, EmailSource::AuthorEmailProperty);
    }
    if let Some(email) = author.description().and_then(scan_for_email) {
        return found(email, EmailSource::AuthorDescription);
    }
    // Only provider objects carry their own term handle for the alternate key
    if author.has_term_handle() {
        if let Some(email) = read_meta(store, id, &keys.alt_email) {
            return found(&email, EmailSource::AuthorMetaEmail);
        }
    }
    None
}

fn read_meta<S>(store: &S, id: u64, key: &str) -> Option<String>
where
    S: RecordStore + ?Sized,
{
    match store.get_term_meta(id, key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            log::warn!("author {id}: reading meta '{key}' failed, treating as empty: {e}");
            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
