use serde::{Deserialize, Serialize};

pub type AuthorId = u64;
pub type UserId = u64;

// ---------------------------------------------------------------------------
// Authors
// ---------------------------------------------------------------------------

/// Full author object as exposed by the author provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: AuthorId,
    /// Name of the underlying term / category.
    pub term_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Link embedded in the author object itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Minimal author built straight from the term when no provider object exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackAuthor {
    pub id: AuthorId,
    pub term_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AuthorSource {
    Native(AuthorRecord),
    Fallback(FallbackAuthor),
}

/// Read access shared by both author shapes. Absent attributes are `None`.
pub trait AuthorView {
    fn id(&self) -> AuthorId;
    fn term_name(&self) -> &str;
    fn email_attr(&self) -> Option<&str> {
        None
    }
    fn description(&self) -> Option<&str> {
        None
    }
    fn display_name_attr(&self) -> Option<&str> {
        None
    }
    fn name_attr(&self) -> Option<&str> {
        None
    }
    fn embedded_link(&self) -> Option<UserId>;
    /// Whether the object carries its own term handle (provider objects do).
    fn has_term_handle(&self) -> bool {
        false
    }
}

impl AuthorView for AuthorRecord {
    fn id(&self) -> AuthorId {
        self.id
    }
    fn term_name(&self) -> &str {
        &self.term_name
    }
    fn email_attr(&self) -> Option<&str> {
        self.email.as_deref()
    }
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    fn display_name_attr(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
    fn name_attr(&self) -> Option<&str> {
        self.name.as_deref()
    }
    fn embedded_link(&self) -> Option<UserId> {
        self.user_id.filter(|id| *id > 0)
    }
    fn has_term_handle(&self) -> bool {
        true
    }
}

impl AuthorView for FallbackAuthor {
    fn id(&self) -> AuthorId {
        self.id
    }
    fn term_name(&self) -> &str {
        &self.term_name
    }
    fn embedded_link(&self) -> Option<UserId> {
        self.user_id.filter(|id| *id > 0)
    }
}

impl AuthorSource {
    fn view(&self) -> &dyn AuthorView {
        match self {
            Self::Native(a) => a,
            Self::Fallback(a) => a,
        }
    }

    pub fn as_native(&self) -> Option<&AuthorRecord> {
        match self {
            Self::Native(a) => Some(a),
            Self::Fallback(_) => None,
        }
    }

    /// First non-empty of term name, display-name attribute, name attribute.
    pub fn resolved_display_name(&self) -> Option<&str> {
        [
            Some(self.term_name()),
            self.display_name_attr(),
            self.name_attr(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
    }
}

impl AuthorView for AuthorSource {
    fn id(&self) -> AuthorId {
        self.view().id()
    }
    fn term_name(&self) -> &str {
        self.view().term_name()
    }
    fn email_attr(&self) -> Option<&str> {
        self.view().email_attr()
    }
    fn description(&self) -> Option<&str> {
        self.view().description()
    }
    fn display_name_attr(&self) -> Option<&str> {
        self.view().display_name_attr()
    }
    fn name_attr(&self) -> Option<&str> {
        self.view().name_attr()
    }
    fn embedded_link(&self) -> Option<UserId> {
        self.view().embedded_link()
    }
    fn has_term_handle(&self) -> bool {
        self.view().has_term_handle()
    }
}

// ---------------------------------------------------------------------------
// Users + criteria
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub login: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Email,
    Username,
    DisplayName,
}

impl std::fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Username => write!(f, "username"),
            Self::DisplayName => write!(f, "display_name"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriterion {
    pub kind: CriterionKind,
    pub value: String,
}

impl MatchCriterion {
    pub fn new(kind: CriterionKind, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Email,
    Username,
    DisplayName,
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "Email match"),
            Self::Username => write!(f, "Username match"),
            Self::DisplayName => write!(f, "Display name match"),
        }
    }
}

// ---------------------------------------------------------------------------
// Email provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSource {
    TermMetaUserEmail,
    TermMetaEmail,
    AuthorEmailProperty,
    AuthorDescription,
    AuthorMetaEmail,
}

impl EmailSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TermMetaUserEmail => "term_meta_user_email",
            Self::TermMetaEmail => "term_meta_email",
            Self::AuthorEmailProperty => "author_email_property",
            Self::AuthorDescription => "author_description",
            Self::AuthorMetaEmail => "author_meta_email",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmailSourceCounts {
    pub term_meta_user_email: usize,
    pub term_meta_email: usize,
    pub author_email_property: usize,
    pub author_description: usize,
    pub author_meta_email: usize,
}

impl EmailSourceCounts {
    pub fn record(&mut self, source: EmailSource) {
        *self.slot(source) += 1;
    }

    pub fn get(&self, source: EmailSource) -> usize {
        match source {
            EmailSource::TermMetaUserEmail => self.term_meta_user_email,
            EmailSource::TermMetaEmail => self.term_meta_email,
            EmailSource::AuthorEmailProperty => self.author_email_property,
            EmailSource::AuthorDescription => self.author_description,
            EmailSource::AuthorMetaEmail => self.author_meta_email,
        }
    }

    fn slot(&mut self, source: EmailSource) -> &mut usize {
        match source {
            EmailSource::TermMetaUserEmail => &mut self.term_meta_user_email,
            EmailSource::TermMetaEmail => &mut self.term_meta_email,
            EmailSource::AuthorEmailProperty => &mut self.author_email_property,
            EmailSource::AuthorDescription => &mut self.author_description,
            EmailSource::AuthorMetaEmail => &mut self.author_meta_email,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.term_meta_user_email += other.term_meta_user_email;
        self.term_meta_email += other.term_meta_email;
        self.author_email_property += other.author_email_property;
        self.author_description += other.author_description;
        self.author_meta_email += other.author_meta_email;
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Outcome counters for one invocation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub no_identity: usize,
    pub no_matching_user: usize,
    pub already_mapped_same_user: usize,
    pub already_mapped_different_user: usize,
    pub email_sources: EmailSourceCounts,
}

impl OutcomeTally {
    pub fn merge(&mut self, other: &OutcomeTally) {
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.no_identity += other.no_identity;
        self.no_matching_user += other.no_matching_user;
        self.already_mapped_same_user += other.already_mapped_same_user;
        self.already_mapped_different_user += other.already_mapped_different_user;
        self.email_sources.merge(&other.email_sources);
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Write payload: link only, or link plus user fields copied onto the author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    #[default]
    LinkOnly,
    SyncFields,
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkOnly => write!(f, "link_only"),
            Self::SyncFields => write!(f, "sync_fields"),
        }
    }
}

/// One page of authors: `[offset, offset + limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    pub offset: usize,
    pub limit: usize,
}

impl BatchCursor {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Next page. Advances by the page size requested, not by items returned.
    pub fn advance(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "user_id", rename_all = "snake_case")]
pub enum PriorLink {
    #[default]
    None,
    SameUser,
    DifferentUser(UserId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceAction {
    Update,
    ForceUpdate,
    SkipMappedElsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Success,
    Failed,
}

/// Per-author diagnostics for single-target runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorTrace {
    pub author_id: AuthorId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_source: Option<EmailSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_reason: Option<MatchReason>,
    pub prior_link: PriorLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TraceAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_result: Option<WriteResult>,
}

impl AuthorTrace {
    pub fn scanned(author_id: AuthorId, name: impl Into<String>) -> Self {
        Self {
            author_id,
            name: name.into(),
            email: None,
            email_source: None,
            match_reason: None,
            prior_link: PriorLink::None,
            action: None,
            write_result: None,
        }
    }

    pub fn matched(&self) -> bool {
        self.match_reason.is_some()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub mode: UpdateMode,
    pub force: bool,
    pub engine_version: String,
    pub run_at: String,
}

impl RunMeta {
    pub fn now(mode: UpdateMode, force: bool) -> Self {
        Self {
            mode,
            force,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub meta: RunMeta,
    pub cursor: BatchCursor,
    pub updated: usize,
    pub total: usize,
    pub processed: usize,
    pub remaining: usize,
    pub message: String,
    pub tally: OutcomeTally,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub meta: RunMeta,
    pub criterion: MatchCriterion,
    pub user: UserRecord,
    pub message: String,
    pub tally: OutcomeTally,
    pub matched_authors: usize,
    pub trace: Vec<AuthorTrace>,
}
