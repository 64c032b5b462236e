use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::extract::extract_email;
use crate::link::{read_link, LinkStore};
use crate::matcher::{author_matches_user, find_user_for_criterion};
use crate::model::{
    AuthorId, AuthorSource, AuthorTrace, AuthorView, BatchCursor, BatchReport, CriterionKind,
    MatchCriterion, OutcomeTally, PriorLink, RunMeta, TargetReport, TraceAction, UpdateMode,
    UserId, UserRecord, WriteResult,
};
use crate::store::{IdentityDirectory, RecordStore};
use crate::summary::{batch_message, target_message, EMPTY_PAGE_MESSAGE};

/// Reconciliation engine over an injected record store and user directory.
///
/// Stateless across calls apart from the collaborators it owns: every
/// operation is a function of store contents and request parameters.
pub struct ReconEngine<S, D> {
    store: S,
    directory: D,
    config: ReconConfig,
}

impl<S: RecordStore, D: IdentityDirectory> ReconEngine<S, D> {
    pub fn new(store: S, directory: D, config: ReconConfig) -> Self {
        Self { store, directory, config }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn into_parts(self) -> (S, D) {
        (self.store, self.directory)
    }

    /// Total number of authors. A failing store reports zero.
    pub fn get_count(&self) -> usize {
        self.store.count_authors().unwrap_or_else(|e| {
            log::warn!("counting authors failed: {e}");
            0
        })
    }

    /// Current link for one author, if any.
    pub fn get_link(&self, author_id: AuthorId) -> Option<UserId> {
        read_link(&self.store, &self.config.meta_keys, author_id)
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    /// Reconcile one page of authors by email.
    ///
    /// Every email match is (re)written regardless of `force` unless
    /// `policy.bulk_respects_force` is set. Per-author failures are tallied;
    /// only an unreachable store fails the call.
    pub fn run_batch(
        &mut self,
        cursor: BatchCursor,
        force: bool,
        mode: UpdateMode,
    ) -> Result<BatchReport, ReconError> {
        let cursor = if cursor.limit == 0 {
            BatchCursor::new(cursor.offset, self.config.batch.limit)
        } else {
            cursor
        };

        let total = self
            .store
            .count_authors()
            .map_err(|e| ReconError::StoreUnavailable(e.to_string()))?;
        let page = self
            .store
            .list_authors(cursor.offset, cursor.limit)
            .map_err(|e| ReconError::StoreUnavailable(e.to_string()))?;

        let meta = RunMeta::now(mode, force);
        if page.is_empty() {
            return Ok(BatchReport {
                meta,
                cursor,
                updated: 0,
                total,
                processed: 0,
                remaining: 0,
                message: EMPTY_PAGE_MESSAGE.to_string(),
                tally: OutcomeTally::default(),
            });
        }

        if let Some(first) = page.first() {
            self.log_author_structure(first);
        }

        let mut tally = OutcomeTally::default();
        for author in &page {
            self.reconcile_by_email(author, force, mode, &mut tally);
        }

        let processed = page.len();
        let remaining = total.saturating_sub(cursor.offset + processed);
        let message = batch_message(&tally);
        log::info!(
            "batch offset={} limit={} processed={processed} remaining={remaining}: {message}",
            cursor.offset,
            cursor.limit
        );

        Ok(BatchReport {
            meta,
            cursor,
            updated: tally.updated,
            total,
            processed,
            remaining,
            message,
            tally,
        })
    }

    fn reconcile_by_email(
        &mut self,
        author: &AuthorSource,
        force: bool,
        mode: UpdateMode,
        tally: &mut OutcomeTally,
    ) {
        let author_id = author.id();
        let Some(found) = extract_email(&self.store, author, &self.config.meta_keys) else {
            tally.no_identity += 1;
            tally.skipped += 1;
            return;
        };
        tally.email_sources.record(found.source);

        let user = match self.find_user(&MatchCriterion::new(CriterionKind::Email, &found.email)) {
            Some(user) => user,
            None => {
                tally.no_matching_user += 1;
                tally.skipped += 1;
                return;
            }
        };

        let prior = self.get_link(author_id);
        match prior {
            Some(prior) if prior == user.id => tally.already_mapped_same_user += 1,
            Some(prior) => {
                tally.already_mapped_different_user += 1;
                if self.config.policy.bulk_respects_force && !force {
                    log::debug!("author {author_id}: linked to user {prior}, not forced; skipping");
                    tally.skipped += 1;
                    return;
                }
            }
            None => {}
        }

        match self.write(author_id, &user, mode) {
            Ok(()) => tally.updated += 1,
            Err(e) => {
                log::warn!("author {author_id}: writing link to user {} failed: {e}", user.id);
                tally.errors += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Single target
    // -----------------------------------------------------------------------

    /// Reconcile every author matching one target user.
    ///
    /// Matching is done over the full author set before any write, so a run
    /// that finds nothing performs no writes. Authors linked to a different
    /// user are only overwritten with `force`.
    pub fn run_for_target(
        &mut self,
        criterion: &MatchCriterion,
        force: bool,
        mode: UpdateMode,
    ) -> Result<TargetReport, ReconError> {
        if criterion.value.trim().is_empty() {
            return Err(ReconError::NoUserSpecified);
        }
        let user = find_user_for_criterion(
            &self.directory,
            criterion,
            self.config.policy.ambiguity,
        )?
        .ok_or_else(|| ReconError::UserNotFound {
            kind: criterion.kind,
            value: criterion.value.clone(),
        })?;
        log::info!(
            "target {} \"{}\" resolved to user {} ({})",
            criterion.kind,
            criterion.value,
            user.id,
            user.login
        );

        let mut tally = OutcomeTally::default();
        let mut trace = Vec::new();
        let mut matched = Vec::new();
        for author in self.all_authors()? {
            let m = author_matches_user(
                &self.store,
                &self.config.meta_keys,
                &author,
                &user,
                criterion.kind,
            );
            let mut entry = AuthorTrace::scanned(author.id(), author.term_name());
            if let Some(found) = m.email {
                tally.email_sources.record(found.source);
                entry.email = Some(found.email);
                entry.email_source = Some(found.source);
            }
            entry.match_reason = m.reason;
            if entry.matched() {
                matched.push(trace.len());
            }
            trace.push(entry);
        }

        if matched.is_empty() {
            return Err(ReconError::NoMatchingAuthors {
                user_id: user.id,
                display_name: user.display_name.clone(),
                trace,
            });
        }

        for &idx in &matched {
            let entry = &mut trace[idx];
            let author_id = entry.author_id;
            let prior = read_link(&self.store, &self.config.meta_keys, author_id);

            match prior {
                Some(prior) if prior != user.id => {
                    entry.prior_link = PriorLink::DifferentUser(prior);
                    tally.already_mapped_different_user += 1;
                    if !force {
                        entry.action = Some(TraceAction::SkipMappedElsewhere);
                        tally.skipped += 1;
                        continue;
                    }
                    entry.action = Some(TraceAction::ForceUpdate);
                }
                Some(_) => {
                    entry.prior_link = PriorLink::SameUser;
                    tally.already_mapped_same_user += 1;
                    entry.action = Some(TraceAction::Update);
                }
                None => entry.action = Some(TraceAction::Update),
            }

            let result = write_link(&mut self.store, &self.config, author_id, &user, mode);
            match result {
                Ok(()) => {
                    entry.write_result = Some(WriteResult::Success);
                    tally.updated += 1;
                }
                Err(e) => {
                    log::warn!("author {author_id}: writing link to user {} failed: {e}", user.id);
                    entry.write_result = Some(WriteResult::Failed);
                    tally.errors += 1;
                }
            }
        }

        let message = target_message(matched.len(), &tally);
        log::info!("{message}");

        Ok(TargetReport {
            meta: RunMeta::now(mode, force),
            criterion: criterion.clone(),
            user,
            message,
            tally,
            matched_authors: matched.len(),
            trace,
        })
    }

    // -----------------------------------------------------------------------
    // Bulk admin action
    // -----------------------------------------------------------------------

    /// Link selected, currently unlinked authors by their verified email.
    ///
    /// Already-linked authors are never touched. Returns the number of links written.
    pub fn auto_map_unlinked(&mut self, selected: &[AuthorId]) -> usize {
        let mut count = 0;
        for &author_id in selected {
            match self.store.get_author(author_id) {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("author {author_id}: lookup failed: {e}");
                    continue;
                }
            }
            if self.get_link(author_id).is_some() {
                continue;
            }

            let email = match self.store.get_term_meta(author_id, &self.config.meta_keys.user_email) {
                Ok(Some(email)) if !email.trim().is_empty() => email,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("author {author_id}: reading email failed: {e}");
                    continue;
                }
            };

            let Some(user) = self.find_user(&MatchCriterion::new(CriterionKind::Email, email)) else {
                continue;
            };
            match self.write(author_id, &user, UpdateMode::LinkOnly) {
                Ok(()) => count += 1,
                Err(e) => log::warn!("author {author_id}: auto-map write failed: {e}"),
            }
        }
        log::info!("auto-mapped {count} of {} selected authors", selected.len());
        count
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn find_user(&self, criterion: &MatchCriterion) -> Option<UserRecord> {
        // Email and login lookups never report ambiguity; errors here are degraded reads
        find_user_for_criterion(&self.directory, criterion, self.config.policy.ambiguity)
            .unwrap_or_else(|e| {
                log::warn!("user lookup for {} failed: {e}", criterion.kind);
                None
            })
    }

    fn write(&mut self, author_id: AuthorId, user: &UserRecord, mode: UpdateMode) -> Result<(), ReconError> {
        write_link(&mut self.store, &self.config, author_id, user, mode)
    }

    /// Every author, fetched page by page.
    fn all_authors(&self) -> Result<Vec<AuthorSource>, ReconError> {
        let total = self
            .store
            .count_authors()
            .map_err(|e| ReconError::StoreUnavailable(e.to_string()))?;
        let limit = self.config.batch.limit;
        let mut authors = Vec::with_capacity(total);
        let mut offset = 0;
        while offset < total {
            let page = self
                .store
                .list_authors(offset, limit)
                .map_err(|e| ReconError::StoreUnavailable(e.to_string()))?;
            if page.is_empty() {
                break;
            }
            offset += limit;
            authors.extend(page);
        }
        Ok(authors)
    }

    fn log_author_structure(&self, author: &AuthorSource) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let keys = &self.config.meta_keys;
        let meta: Vec<(&str, Option<String>)> = [
            keys.link.as_str(),
            keys.user_email.as_str(),
            keys.email.as_str(),
            keys.alt_email.as_str(),
        ]
        .into_iter()
        .map(|k| (k, self.store.get_term_meta(author.id(), k).ok().flatten()))
        .collect();
        log::debug!("author data structure: {author:?}; term meta: {meta:?}");
    }
}

fn write_link<S: RecordStore>(
    store: &mut S,
    config: &ReconConfig,
    author_id: AuthorId,
    user: &UserRecord,
    mode: UpdateMode,
) -> Result<(), ReconError> {
    let mut links = LinkStore::new(store, &config.meta_keys);
    match mode {
        UpdateMode::LinkOnly => links.set_link(author_id, user.id),
        UpdateMode::SyncFields => links.sync_fields(author_id, user),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthorRecord, EmailSource, FallbackAuthor, MatchReason};
    use crate::store::{MemoryDirectory, MemoryStore};
    use pretty_assertions::assert_eq;

    fn user(id: u64, email: &str, login: &str, display: &str) -> UserRecord {
        UserRecord {
            id,
            email: email.into(),
            login: login.into(),
            display_name: display.into(),
            ..Default::default()
        }
    }

    fn native(id: u64, name: &str) -> AuthorSource {
        AuthorSource::Native(AuthorRecord {
            id,
            term_name: name.into(),
            slug: name.to_lowercase().replace(' ', "-"),
            ..Default::default()
        })
    }

    fn engine(
        store: MemoryStore,
        users: Vec<UserRecord>,
    ) -> ReconEngine<MemoryStore, MemoryDirectory> {
        ReconEngine::new(store, MemoryDirectory::new(users), ReconConfig::default())
    }

    /// Store wrapper that rejects writes for chosen authors.
    struct RejectingStore {
        inner: MemoryStore,
        reject: Vec<AuthorId>,
    }

    impl RecordStore for RejectingStore {
        fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<AuthorSource>, ReconError> {
            self.inner.list_authors(offset, limit)
        }
        fn count_authors(&self) -> Result<usize, ReconError> {
            self.inner.count_authors()
        }
        fn get_author(&self, id: AuthorId) -> Result<Option<AuthorSource>, ReconError> {
            self.inner.get_author(id)
        }
        fn get_term_meta(&self, id: AuthorId, key: &str) -> Result<Option<String>, ReconError> {
            self.inner.get_term_meta(id, key)
        }
        fn set_term_meta(&mut self, id: AuthorId, key: &str, value: &str) -> Result<(), ReconError> {
            if self.reject.contains(&id) {
                return Err(ReconError::StoreWrite(format!("author {id} is read-only")));
            }
            self.inner.set_term_meta(id, key, value)
        }
        fn save_author(&mut self, author: &AuthorRecord) -> Result<(), ReconError> {
            self.inner.save_author(author)
        }
    }

    /// Store whose meta reads fail for chosen authors; listing still works.
    struct UnreadableMetaStore {
        inner: MemoryStore,
        unreadable: Vec<AuthorId>,
    }

    impl RecordStore for UnreadableMetaStore {
        fn list_authors(&self, offset: usize, limit: usize) -> Result<Vec<AuthorSource>, ReconError> {
            self.inner.list_authors(offset, limit)
        }
        fn count_authors(&self) -> Result<usize, ReconError> {
            self.inner.count_authors()
        }
        fn get_author(&self, id: AuthorId) -> Result<Option<AuthorSource>, ReconError> {
            self.inner.get_author(id)
        }
        fn get_term_meta(&self, id: AuthorId, key: &str) -> Result<Option<String>, ReconError> {
            if self.unreadable.contains(&id) {
                return Err(ReconError::StoreRead(format!("meta for author {id} is corrupt")));
            }
            self.inner.get_term_meta(id, key)
        }
        fn set_term_meta(&mut self, id: AuthorId, key: &str, value: &str) -> Result<(), ReconError> {
            self.inner.set_term_meta(id, key, value)
        }
        fn save_author(&mut self, author: &AuthorRecord) -> Result<(), ReconError> {
            self.inner.save_author(author)
        }
    }

    /// Directory whose email lookups fail for chosen addresses.
    struct FlakyDirectory {
        inner: MemoryDirectory,
        failing: Vec<String>,
    }

    impl IdentityDirectory for FlakyDirectory {
        fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, ReconError> {
            if self.failing.iter().any(|f| f == email) {
                return Err(ReconError::StoreRead(format!("lookup for {email} timed out")));
            }
            self.inner.find_user_by_email(email)
        }
        fn find_user_by_login(&self, login: &str) -> Result<Option<UserRecord>, ReconError> {
            self.inner.find_user_by_login(login)
        }
        fn search_users_by_display_name(
            &self,
            text: &str,
            limit: usize,
        ) -> Result<Vec<UserRecord>, ReconError> {
            self.inner.search_users_by_display_name(text, limit)
        }
        fn search_users_by_first_last_name(
            &self,
            first: &str,
            last: &str,
        ) -> Result<Vec<UserRecord>, ReconError> {
            self.inner.search_users_by_first_last_name(first, last)
        }
    }

    /// Store that cannot be reached at all.
    struct DownStore;

    impl RecordStore for DownStore {
        fn list_authors(&self, _: usize, _: usize) -> Result<Vec<AuthorSource>, ReconError> {
            Err(ReconError::StoreRead("connection refused".into()))
        }
        fn count_authors(&self) -> Result<usize, ReconError> {
            Err(ReconError::StoreRead("connection refused".into()))
        }
        fn get_author(&self, _: AuthorId) -> Result<Option<AuthorSource>, ReconError> {
            Err(ReconError::StoreRead("connection refused".into()))
        }
        fn get_term_meta(&self, _: AuthorId, _: &str) -> Result<Option<String>, ReconError> {
            Err(ReconError::StoreRead("connection refused".into()))
        }
        fn set_term_meta(&mut self, _: AuthorId, _: &str, _: &str) -> Result<(), ReconError> {
            Err(ReconError::StoreWrite("connection refused".into()))
        }
        fn save_author(&mut self, _: &AuthorRecord) -> Result<(), ReconError> {
            Err(ReconError::StoreWrite("connection refused".into()))
        }
    }

    #[test]
    fn batch_links_by_email_and_counts_outcomes() {
        let mut store = MemoryStore::with_authors(vec![
            native(1, "Linked Later"),
            native(2, "No Email"),
            native(3, "Stranger"),
        ]);
        store.insert_meta(1, "user_email", "Jane@Example.com");
        store.insert_meta(3, "email", "nobody@example.com");
        let mut e = engine(store, vec![user(10, "jane@example.com", "jane", "Jane")]);

        let report = e.run_batch(BatchCursor::new(0, 50), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.processed, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.tally.no_identity, 1);
        assert_eq!(report.tally.no_matching_user, 1);
        assert_eq!(report.tally.skipped, 2);
        assert_eq!(report.tally.email_sources.get(EmailSource::TermMetaUserEmail), 1);
        assert_eq!(report.tally.email_sources.get(EmailSource::TermMetaEmail), 1);
        assert_eq!(e.get_link(1), Some(10));
        assert_eq!(e.get_link(2), None);
        assert!(report.message.starts_with("Updated 1 authors."));
    }

    #[test]
    fn batch_overwrites_conflicting_link_without_force() {
        let mut store = MemoryStore::with_authors(vec![native(1, "A"), native(2, "B")]);
        store.insert_meta(1, "user_email", "a@example.com");
        store.insert_meta(1, "user_id", "99");
        store.insert_meta(2, "user_email", "b@example.com");
        store.insert_meta(2, "user_id", "20");
        let mut e = engine(
            store,
            vec![user(10, "a@example.com", "a", "A"), user(20, "b@example.com", "b", "B")],
        );

        let report = e.run_batch(BatchCursor::new(0, 10), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.updated, 2);
        assert_eq!(report.tally.already_mapped_different_user, 1);
        assert_eq!(report.tally.already_mapped_same_user, 1);
        assert_eq!(e.get_link(1), Some(10));
    }

    #[test]
    fn batch_respects_force_when_configured() {
        let mut store = MemoryStore::with_authors(vec![native(1, "A")]);
        store.insert_meta(1, "user_email", "a@example.com");
        store.insert_meta(1, "user_id", "99");
        let mut config = ReconConfig::default();
        config.policy.bulk_respects_force = true;
        let mut e = ReconEngine::new(
            store,
            MemoryDirectory::new(vec![user(10, "a@example.com", "a", "A")]),
            config,
        );

        let report = e.run_batch(BatchCursor::new(0, 10), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.tally.skipped, 1);
        assert_eq!(e.get_link(1), Some(99));

        let report = e.run_batch(BatchCursor::new(0, 10), true, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(e.get_link(1), Some(10));
    }

    #[test]
    fn batch_write_failure_is_isolated() {
        let mut inner = MemoryStore::with_authors(vec![native(1, "A"), native(2, "B")]);
        inner.insert_meta(1, "user_email", "a@example.com");
        inner.insert_meta(2, "user_email", "b@example.com");
        let store = RejectingStore { inner, reject: vec![1] };
        let mut e = ReconEngine::new(
            store,
            MemoryDirectory::new(vec![
                user(10, "a@example.com", "a", "A"),
                user(20, "b@example.com", "b", "B"),
            ]),
            ReconConfig::default(),
        );

        let report = e.run_batch(BatchCursor::new(0, 10), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.tally.errors, 1);
        assert_eq!(e.get_link(2), Some(20));
    }

    #[test]
    fn failed_reads_degrade_to_no_result() {
        let mut inner = MemoryStore::with_authors(vec![native(1, "A"), native(2, "B"), native(3, "C")]);
        inner.insert_meta(1, "user_email", "a@example.com");
        inner.insert_meta(2, "user_email", "b@example.com");
        inner.insert_meta(3, "user_email", "c@example.com");
        let store = UnreadableMetaStore { inner, unreadable: vec![1] };
        let directory = FlakyDirectory {
            inner: MemoryDirectory::new(vec![
                user(10, "a@example.com", "a", "A"),
                user(20, "b@example.com", "b", "B"),
                user(30, "c@example.com", "c", "C"),
            ]),
            failing: vec!["c@example.com".into()],
        };
        let mut e = ReconEngine::new(store, directory, ReconConfig::default());

        let report = e.run_batch(BatchCursor::new(0, 10), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.tally.no_identity, 1);
        assert_eq!(report.tally.no_matching_user, 1);
        assert_eq!(report.tally.skipped, 2);
        assert_eq!(report.tally.errors, 0);
        assert_eq!(report.updated, 1);
        assert_eq!(e.get_link(1), None);
        assert_eq!(e.get_link(2), Some(20));
        assert_eq!(e.get_link(3), None);
    }

    #[test]
    fn unreachable_store_fails_whole_call() {
        let mut e = ReconEngine::new(DownStore, MemoryDirectory::default(), ReconConfig::default());
        assert_eq!(e.get_count(), 0);
        let err = e
            .run_batch(BatchCursor::new(0, 10), false, UpdateMode::LinkOnly)
            .unwrap_err();
        assert!(matches!(err, ReconError::StoreUnavailable(_)));
    }

    #[test]
    fn empty_page_reports_nothing_left() {
        let store = MemoryStore::with_authors(vec![native(1, "A")]);
        let mut e = engine(store, vec![]);
        let report = e.run_batch(BatchCursor::new(50, 50), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.message, EMPTY_PAGE_MESSAGE);
    }

    #[test]
    fn zero_limit_uses_configured_page_size() {
        let store = MemoryStore::with_authors((1..=60).map(|i| native(i, "A")).collect());
        let mut e = engine(store, vec![]);
        let report = e.run_batch(BatchCursor::new(0, 0), false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.cursor.limit, 50);
        assert_eq!(report.processed, 50);
        assert_eq!(report.remaining, 10);
    }

    #[test]
    fn target_by_email_links_matching_authors() {
        let mut store = MemoryStore::with_authors(vec![
            native(1, "Jane"),
            native(2, "Other"),
            native(3, "Jane Again"),
        ]);
        store.insert_meta(1, "user_email", "JANE@example.com");
        store.insert_meta(3, "email", "jane@example.com");
        let mut e = engine(store, vec![user(10, "jane@example.com", "jane", "Jane")]);

        let criterion = MatchCriterion::new(CriterionKind::Email, "Jane@Example.com");
        let report = e.run_for_target(&criterion, false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.matched_authors, 2);
        assert_eq!(report.tally.updated, 2);
        assert_eq!(report.message, "Found 2 matching authors. Updated: 2, Skipped: 0, Errors: 0");
        assert_eq!(report.trace.len(), 3);
        assert_eq!(report.trace[0].match_reason, Some(MatchReason::Email));
        assert_eq!(report.trace[0].write_result, Some(WriteResult::Success));
        assert_eq!(report.trace[1].match_reason, None);
        assert_eq!(report.trace[1].action, None);
        assert_eq!(e.get_link(3), Some(10));
    }

    #[test]
    fn target_skips_conflicting_link_unless_forced() {
        let mut store = MemoryStore::with_authors(vec![native(1, "jdoe"), native(2, "JDOE")]);
        store.insert_meta(2, "user_id", "77");
        let users = vec![user(10, "jdoe@example.com", "jdoe", "Jane Doe")];
        let mut e = engine(store, users);

        let criterion = MatchCriterion::new(CriterionKind::Username, "jdoe");
        let report = e.run_for_target(&criterion, false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.tally.updated, 1);
        assert_eq!(report.tally.skipped, 1);
        assert_eq!(report.trace[1].prior_link, PriorLink::DifferentUser(77));
        assert_eq!(report.trace[1].action, Some(TraceAction::SkipMappedElsewhere));
        assert_eq!(e.get_link(2), Some(77));

        let report = e.run_for_target(&criterion, true, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.tally.updated, 2);
        assert_eq!(report.trace[0].prior_link, PriorLink::SameUser);
        assert_eq!(report.trace[1].action, Some(TraceAction::ForceUpdate));
        assert_eq!(e.get_link(2), Some(10));
    }

    #[test]
    fn target_user_not_found() {
        let mut e = engine(MemoryStore::with_authors(vec![native(1, "A")]), vec![]);
        let criterion = MatchCriterion::new(CriterionKind::Username, "ghost");
        let err = e.run_for_target(&criterion, false, UpdateMode::LinkOnly).unwrap_err();
        assert!(matches!(err, ReconError::UserNotFound { kind: CriterionKind::Username, .. }));
    }

    #[test]
    fn target_with_blank_criterion_is_rejected() {
        let mut e = engine(MemoryStore::with_authors(vec![native(1, "A")]), vec![]);
        let criterion = MatchCriterion::new(CriterionKind::Email, "   ");
        let err = e.run_for_target(&criterion, false, UpdateMode::LinkOnly).unwrap_err();
        assert!(matches!(err, ReconError::NoUserSpecified));
        assert_eq!(err.to_string(), "No user specified.");
    }

    #[test]
    fn target_without_matches_writes_nothing() {
        let mut store = MemoryStore::with_authors(vec![native(1, "Someone")]);
        store.insert_meta(1, "user_email", "someone@example.com");
        let mut e = engine(store, vec![user(10, "jane@example.com", "jane", "Jane")]);

        let criterion = MatchCriterion::new(CriterionKind::Email, "jane@example.com");
        let err = e.run_for_target(&criterion, true, UpdateMode::LinkOnly).unwrap_err();
        match &err {
            ReconError::NoMatchingAuthors { user_id, trace, .. } => {
                assert_eq!(*user_id, 10);
                assert_eq!(trace.len(), 1);
                assert_eq!(trace[0].email.as_deref(), Some("someone@example.com"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(e.store().meta_for(1).unwrap().get("user_id").is_none());
    }

    #[test]
    fn target_write_failure_is_traced() {
        let mut inner = MemoryStore::with_authors(vec![native(1, "Jane")]);
        inner.insert_meta(1, "user_email", "jane@example.com");
        let store = RejectingStore { inner, reject: vec![1] };
        let mut e = ReconEngine::new(
            store,
            MemoryDirectory::new(vec![user(10, "jane@example.com", "jane", "Jane")]),
            ReconConfig::default(),
        );
        let criterion = MatchCriterion::new(CriterionKind::Email, "jane@example.com");
        let report = e.run_for_target(&criterion, false, UpdateMode::LinkOnly).unwrap();
        assert_eq!(report.tally.errors, 1);
        assert_eq!(report.trace[0].write_result, Some(WriteResult::Failed));
    }

    #[test]
    fn sync_fields_mode_copies_user_profile() {
        let mut store = MemoryStore::with_authors(vec![native(1, "Jane Doe")]);
        store.insert_meta(1, "email", "jane@example.com");
        let mut u = user(10, "jane@example.com", "jane", "Jane Q. Doe");
        u.url = Some("https://jane.example.com".into());
        u.description = Some("Writes about tea.".into());
        let mut e = engine(store, vec![u]);

        let criterion = MatchCriterion::new(CriterionKind::DisplayName, "Jane Q. Doe");
        let report = e.run_for_target(&criterion, false, UpdateMode::SyncFields).unwrap();
        assert_eq!(report.tally.updated, 1);

        let meta = e.store().meta_for(1).unwrap();
        assert_eq!(meta["display_name"], "Jane Q. Doe");
        assert_eq!(meta["description"], "Writes about tea.");
        assert_eq!(meta["user_id"], "10");
    }

    #[test]
    fn auto_map_leaves_linked_authors_alone() {
        let fallback = AuthorSource::Fallback(FallbackAuthor {
            id: 3,
            term_name: "Guest".into(),
            slug: "guest".into(),
            user_id: Some(55),
        });
        let mut store = MemoryStore::with_authors(vec![native(1, "A"), native(2, "B"), fallback]);
        store.insert_meta(1, "user_email", "a@example.com");
        store.insert_meta(2, "user_email", "b@example.com");
        store.insert_meta(2, "user_id", "42");
        store.insert_meta(3, "user_email", "a@example.com");
        // Only the verified-email slot counts for auto-mapping
        store.insert_meta(4, "email", "a@example.com");
        let mut e = engine(
            store,
            vec![user(10, "a@example.com", "a", "A"), user(20, "b@example.com", "b", "B")],
        );

        let count = e.auto_map_unlinked(&[1, 2, 3, 4, 404]);
        assert_eq!(count, 1);
        assert_eq!(e.get_link(1), Some(10));
        assert_eq!(e.get_link(2), Some(42));
        assert_eq!(e.get_link(3), Some(55));
    }
}
