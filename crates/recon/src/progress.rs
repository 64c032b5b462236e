//! Driver loop for the bulk protocol: call `run_batch` page after page until
//! nothing remains or the caller cancels.

use serde::Serialize;

use crate::engine::ReconEngine;
use crate::error::ReconError;
use crate::model::{BatchCursor, BatchReport, OutcomeTally, UpdateMode};
use crate::store::{IdentityDirectory, RecordStore};

/// Returned by the per-page callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Cancel,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DriveSummary {
    pub pages: usize,
    pub total: usize,
    pub remaining: usize,
    pub cancelled: bool,
    pub tally: OutcomeTally,
}

/// Run every page starting at offset 0.
///
/// Cancellation is only observed between pages; a page in flight always
/// completes. Stops on `remaining == 0` or an empty page.
pub fn drive<S, D, F>(
    engine: &mut ReconEngine<S, D>,
    limit: usize,
    force: bool,
    mode: UpdateMode,
    mut on_page: F,
) -> Result<DriveSummary, ReconError>
where
    S: RecordStore,
    D: IdentityDirectory,
    F: FnMut(&BatchReport) -> Progress,
{
    let mut cursor = BatchCursor::new(0, limit);
    let mut summary = DriveSummary::default();

    loop {
        let report = engine.run_batch(cursor, force, mode)?;
        summary.pages += 1;
        summary.total = report.total;
        summary.remaining = report.remaining;
        summary.tally.merge(&report.tally);

        if report.remaining == 0 || report.processed == 0 {
            // Last page is still reported; a Cancel here has nothing left to stop
            if on_page(&report) == Progress::Cancel {
                log::debug!("cancel on final page ignored");
            }
            break;
        }
        if on_page(&report) == Progress::Cancel {
            log::info!("run cancelled after {} pages, {} authors left", summary.pages, report.remaining);
            summary.cancelled = true;
            break;
        }
        // The engine may have substituted its configured page size for 0
        cursor = report.cursor.advance();
    }

    Ok(summary)
}
