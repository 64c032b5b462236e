//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | gate             | Request token / capability checks        |
//! | 10-19   | target           | Single-target reconciliation outcomes    |
//! | 20-29   | store            | Snapshot, config and store failures      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in [`recon_exit_code`] if it comes from the engine

use authorlink_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Gate (3-9)
// =============================================================================

/// Missing or wrong request token.
pub const EXIT_GATE_TOKEN: u8 = 3;

/// Caller lacks the capability to manage author links.
pub const EXIT_GATE_PERMISSION: u8 = 4;

// =============================================================================
// Target (10-19)
// =============================================================================

/// No user matches the criterion.
pub const EXIT_TARGET_NO_USER: u8 = 10;

/// User found but no author matched it. Nothing was written.
pub const EXIT_TARGET_NO_AUTHORS: u8 = 11;

/// Several users share the display name and ambiguity policy is `reject`.
pub const EXIT_TARGET_AMBIGUOUS: u8 = 12;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Record store could not be reached (count or listing failed).
pub const EXIT_STORE_UNAVAILABLE: u8 = 20;

/// Config file failed to parse or validate.
pub const EXIT_STORE_INVALID_CONFIG: u8 = 21;

/// Snapshot could not be read, parsed or written back.
pub const EXIT_STORE_SNAPSHOT: u8 = 22;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::SecurityCheckFailed => EXIT_GATE_TOKEN,
        ReconError::PermissionDenied => EXIT_GATE_PERMISSION,
        ReconError::NoUserSpecified => EXIT_USAGE,
        ReconError::UserNotFound { .. } => EXIT_TARGET_NO_USER,
        ReconError::NoMatchingAuthors { .. } => EXIT_TARGET_NO_AUTHORS,
        ReconError::AmbiguousMatch { .. } => EXIT_TARGET_AMBIGUOUS,
        ReconError::StoreUnavailable(_) => EXIT_STORE_UNAVAILABLE,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_STORE_INVALID_CONFIG,
        ReconError::Snapshot(_) | ReconError::Io(_) => EXIT_STORE_SNAPSHOT,
        ReconError::StoreRead(_) | ReconError::StoreWrite(_) => EXIT_ERROR,
    }
}
