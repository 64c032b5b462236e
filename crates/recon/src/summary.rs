use crate::model::{EmailSource, OutcomeTally};

const SOURCES: [EmailSource; 5] = [
    EmailSource::TermMetaUserEmail,
    EmailSource::TermMetaEmail,
    EmailSource::AuthorEmailProperty,
    EmailSource::AuthorDescription,
    EmailSource::AuthorMetaEmail,
];

pub const EMPTY_PAGE_MESSAGE: &str = "No authors found or error occurred.";

/// `term_meta_user_email: 3, term_meta_email: 0, ...`
pub fn source_breakdown(tally: &OutcomeTally) -> String {
    SOURCES
        .iter()
        .map(|s| format!("{}: {}", s.label(), tally.email_sources.get(*s)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Display-ready summary for one bulk page.
pub fn batch_message(tally: &OutcomeTally) -> String {
    format!(
        "Updated {} authors. Already mapped (same user): {}, Already mapped (different user): {}, \
         No email: {}, No matching user: {}, Skipped: {}, Errors: {} | Email sources: {}",
        tally.updated,
        tally.already_mapped_same_user,
        tally.already_mapped_different_user,
        tally.no_identity,
        tally.no_matching_user,
        tally.skipped,
        tally.errors,
        source_breakdown(tally),
    )
}

/// Display-ready summary for a single-target run.
pub fn target_message(matched: usize, tally: &OutcomeTally) -> String {
    format!(
        "Found {matched} matching authors. Updated: {}, Skipped: {}, Errors: {}",
        tally.updated, tally.skipped, tally.errors
    )
}
