use crate::config::{AmbiguityPolicy, MetaKeys};
use crate::error::ReconError;
use crate::extract::{extract_email, ExtractedEmail};
use crate::model::{AuthorSource, CriterionKind, MatchCriterion, MatchReason, UserRecord};
use crate::store::{IdentityDirectory, RecordStore};

/// Case-insensitive comparison of two identity strings, ignoring surrounding whitespace.
pub fn same_identity(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

/// Resolve the target user for a criterion.
///
/// Directory read failures degrade to "no user". Display-name lookups fall back
/// to an exact first/last name lookup when the direct search finds nothing.
pub fn find_user_for_criterion<D>(
    directory: &D,
    criterion: &MatchCriterion,
    ambiguity: AmbiguityPolicy,
) -> Result<Option<UserRecord>, ReconError>
where
    D: IdentityDirectory + ?Sized,
{
    let value = criterion.value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let user = match criterion.kind {
        CriterionKind::Email => degrade(directory.find_user_by_email(value), "email lookup"),
        CriterionKind::Username => degrade(directory.find_user_by_login(value), "login lookup"),
        CriterionKind::DisplayName => find_by_display_name(directory, value, ambiguity)?,
    };
    Ok(user)
}

fn find_by_display_name<D>(
    directory: &D,
    name: &str,
    ambiguity: AmbiguityPolicy,
) -> Result<Option<UserRecord>, ReconError>
where
    D: IdentityDirectory + ?Sized,
{
    // Ask for a second hit only when we need to detect ties
    let limit = match ambiguity {
        AmbiguityPolicy::FirstWins => 1,
        AmbiguityPolicy::Reject => 2,
    };
    let hits = degrade(
        directory.search_users_by_display_name(name, limit),
        "display name search",
    );
    if let Some(user) = pick(hits, name, ambiguity)? {
        return Ok(Some(user));
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() < 2 {
        return Ok(None);
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    let hits = degrade(
        directory.search_users_by_first_last_name(first, last),
        "first/last name search",
    );
    pick(hits, name, ambiguity)
}

fn pick(
    mut hits: Vec<UserRecord>,
    name: &str,
    ambiguity: AmbiguityPolicy,
) -> Result<Option<UserRecord>, ReconError> {
    if ambiguity == AmbiguityPolicy::Reject && hits.len() > 1 {
        return Err(ReconError::AmbiguousMatch {
            value: name.to_string(),
            count: hits.len(),
        });
    }
    if hits.is_empty() {
        return Ok(None);
    }
    Ok(Some(hits.swap_remove(0)))
}

fn degrade<T: Default>(result: Result<T, ReconError>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        log::warn!("{what} failed, treating as no result: {e}");
        T::default()
    })
}

/// Outcome of comparing one author against a target user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorMatch {
    pub email: Option<ExtractedEmail>,
    pub display_name: Option<String>,
    pub reason: Option<MatchReason>,
}

/// Compare an author against a user.
///
/// Email equality is always attempted. For `Username` / `DisplayName` criteria
/// the author's resolved display name is also compared to the user's login /
/// display name.
pub fn author_matches_user<S>(
    store: &S,
    keys: &MetaKeys,
    author: &AuthorSource,
    user: &UserRecord,
    kind: CriterionKind,
) -> AuthorMatch
where
    S: RecordStore + ?Sized,
{
    let email = if user.email.trim().is_empty() {
        None
    } else {
        extract_email(store, author, keys)
    };

    if let Some(found) = &email {
        if same_identity(&found.email, &user.email) {
            return AuthorMatch {
                email,
                display_name: None,
                reason: Some(MatchReason::Email),
            };
        }
    }

    let (target, reason) = match kind {
        CriterionKind::Email => {
            return AuthorMatch { email, display_name: None, reason: None };
        }
        CriterionKind::Username => (user.login.as_str(), MatchReason::Username),
        CriterionKind::DisplayName => (user.display_name.as_str(), MatchReason::DisplayName),
    };

    let display_name = author.resolved_display_name().map(str::to_string);
    let reason = display_name
        .as_deref()
        .filter(|name| same_identity(name, target))
        .map(|_| reason);

    AuthorMatch { email, display_name, reason }
}
